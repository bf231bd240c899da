use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// When set, 5xx responses carry the underlying error text in `"error"`.
static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

pub fn expose_internal_errors(enabled: bool) {
    EXPOSE_INTERNAL_ERRORS.store(enabled, Ordering::Relaxed);
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.render(EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed))
    }
}

impl AppError {
    /// Builds the `{success, code, message}` envelope. With `expose_detail`,
    /// 5xx responses also carry the error text in `"error"`.
    pub fn render(&self, expose_detail: bool) -> HttpResponse {
        let (error_code, message) = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                ("VALIDATION_ERROR", msg.clone())
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                ("AUTH_ERROR", msg.clone())
            }
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            AppError::Forbidden => {
                log::warn!("Forbidden access");
                ("FORBIDDEN", "Forbidden".to_string())
            }
            AppError::ExternalApiError(msg) => {
                log::error!("External API error: {msg}");
                (
                    "EXTERNAL_SERVICE_ERROR",
                    "External service unavailable, please try again later".to_string(),
                )
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                ("DATABASE_ERROR", "Database error".to_string())
            }
            _ => {
                log::error!("Internal error: {self}");
                ("INTERNAL_ERROR", "Internal server error".to_string())
            }
        };

        let status_code = self.status_code();
        let mut body = json!({
            "success": false,
            "code": error_code,
            "message": message,
        });
        if status_code.is_server_error() && expose_detail {
            body["error"] = json!(self.to_string());
        }

        HttpResponse::build(status_code).json(body)
    }
}
