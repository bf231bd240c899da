pub mod auth;
pub mod user;
pub mod withdrawal;

pub use auth::auth_config;
pub use user::user_config;
pub use withdrawal::withdrawal_config;

use crate::error::AppError;
use actix_web::{error, web};

/// Malformed or mistyped JSON bodies answer with the usual error envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = match &err {
            error::JsonPayloadError::ContentType => "Expected a JSON body".to_string(),
            other => format!("Invalid JSON body: {other}"),
        };
        error::Error::from(AppError::ValidationError(message))
    })
}

/// Everything served under `/api`.
pub fn api_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).service(
        web::scope("/api")
            .configure(auth_config)
            .configure(user_config)
            .configure(withdrawal_config),
    );
}
