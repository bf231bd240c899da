use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{UserRole, WithdrawalStatus};
use crate::handlers;
use crate::models::*;
use crate::services::{ReferralPage, ReferralStats};

/// Registers the `session_cookie` scheme under the configured cookie name.
struct SecurityAddon<'a> {
    cookie_name: &'a str,
}

impl Modify for SecurityAddon<'_> {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(self.cookie_name))),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::verify_email,
        handlers::auth::resend_verification,
        handlers::auth::forgot_password,
        handlers::auth::reset_password,
        handlers::user::get_profile,
        handlers::user::get_referrals,
        handlers::user::upload_avatar,
        handlers::user::change_password,
        handlers::withdrawal::get_withdrawals,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            VerifyEmailRequest,
            EmailRequest,
            ResetPasswordRequest,
            ChangePasswordRequest,
            AvatarUploadForm,
            AuthResponse,
            UserResponse,
            UserRole,
            AvatarResponse,
            ReferralResponse,
            ReferredUserResponse,
            ReferralStats,
            ReferralPage,
            PaginationInfo,
            WithdrawalResponse,
            WithdrawalStatus,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and account recovery"),
        (name = "user", description = "Profile, avatar and referrals"),
        (name = "withdrawal", description = "Withdrawal history"),
    ),
    info(
        title = "Referral Backend API",
        version = "1.0.0",
        description = "REST API for accounts, referrals and withdrawals"
    )
)]
pub struct ApiDoc;

pub fn api_doc(cookie_name: &str) -> utoipa::openapi::OpenApi {
    let mut openapi = ApiDoc::openapi();
    SecurityAddon { cookie_name }.modify(&mut openapi);
    openapi
}

pub fn swagger_config(cfg: &mut web::ServiceConfig, openapi: utoipa::openapi::OpenApi) {
    cfg.service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
        .route(
            "/swagger-ui",
            web::get().to(|| async {
                actix_web::HttpResponse::Found()
                    .append_header(("Location", "/swagger-ui/"))
                    .finish()
            }),
        );
}
