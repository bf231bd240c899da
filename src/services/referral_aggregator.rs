//! Referral statistics and paging over a user's referred-accounts list.
//!
//! The list is taken in the order the store returns it (insertion order);
//! nothing here sorts or filters.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{PaginationInfo, PaginationParams, Referral, ReferralResponse};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStats {
    pub total_referrals: u64,
    pub active_referrals: u64,
    pub total_earnings: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReferralPage {
    pub items: Vec<ReferralResponse>,
    pub pagination: PaginationInfo,
    pub stats: ReferralStats,
}

impl ReferralStats {
    pub fn from_referrals(referrals: &[Referral]) -> Self {
        referrals.iter().fold(Self::default(), |mut stats, r| {
            stats.total_referrals += 1;
            if r.is_active {
                stats.active_referrals += 1;
            }
            stats.total_earnings += r.earnings_from_user.unwrap_or(0.0);
            stats
        })
    }
}

/// Returns `items[(page-1)*per_page .. min(page*per_page, len)]`.
///
/// Page numbers start at 1 (0 is read as 1). Pages past the end and a zero
/// page size give an empty slice.
pub fn paginate<T>(items: &[T], page: u32, per_page: u32) -> &[T] {
    let page = page.max(1) as usize;
    let per_page = per_page as usize;

    let Some(start) = (page - 1).checked_mul(per_page) else {
        return &[];
    };
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(per_page).min(items.len());
    &items[start..end]
}

pub fn referral_page(referrals: &[Referral], params: &PaginationParams) -> ReferralPage {
    let page = params.get_page();
    let per_page = params.get_per_page();

    ReferralPage {
        items: paginate(referrals, page, per_page)
            .iter()
            .map(ReferralResponse::from)
            .collect(),
        pagination: PaginationInfo::new(page, per_page, referrals.len() as i64),
        stats: ReferralStats::from_referrals(referrals),
    }
}
