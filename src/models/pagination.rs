use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, IntoParams)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginationInfo {
    pub current_page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: u32,
}

impl PaginationParams {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page, per_page }
    }

    pub fn get_page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn get_per_page(&self) -> u32 {
        self.per_page.unwrap_or(10).clamp(1, 100)
    }
}

impl PaginationInfo {
    pub fn new(current_page: u32, per_page: u32, total: i64) -> Self {
        let total_pages = if total == 0 {
            1
        } else {
            ((total as f64) / (per_page as f64)).ceil() as u32
        };

        Self {
            current_page,
            per_page,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_params() {
        let params = PaginationParams::new(Some(2), Some(25));
        assert_eq!(params.get_page(), 2);
        assert_eq!(params.get_per_page(), 25);
    }

    #[test]
    fn test_pagination_params_defaults_and_bounds() {
        let params = PaginationParams::new(None, None);
        assert_eq!(params.get_page(), 1);
        assert_eq!(params.get_per_page(), 10);

        let params = PaginationParams::new(Some(0), Some(1000));
        assert_eq!(params.get_page(), 1);
        assert_eq!(params.get_per_page(), 100);
    }

    #[test]
    fn test_pagination_info() {
        let info = PaginationInfo::new(2, 10, 25);
        assert_eq!(info.current_page, 2);
        assert_eq!(info.per_page, 10);
        assert_eq!(info.total, 25);
        assert_eq!(info.total_pages, 3);

        assert_eq!(PaginationInfo::new(1, 10, 0).total_pages, 1);
    }
}
