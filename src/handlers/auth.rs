use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::models::*;
use crate::services::AuthService;
use crate::utils::SessionCookie;

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification code sent", body = UserResponse),
        (status = 400, description = "Invalid input, duplicate account or unknown referral code"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register(
    auth_service: web::Data<AuthService>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    match auth_service.register(request.into_inner()).await {
        Ok(user) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "user": user,
            "message": "Registration successful, check your email for the verification code"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; the session cookie is set", body = AuthResponse),
        (status = 401, description = "Wrong credentials or unverified email")
    )
)]
pub async fn login(
    auth_service: web::Data<AuthService>,
    session_cookie: web::Data<SessionCookie>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    match auth_service.login(request.into_inner()).await {
        Ok(outcome) => Ok(HttpResponse::Ok()
            .cookie(session_cookie.build(outcome.token))
            .json(json!({
                "success": true,
                "user": outcome.user,
                "expiresIn": outcome.expires_in
            }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Session cookie cleared")
    )
)]
pub async fn logout(session_cookie: web::Data<SessionCookie>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok()
        .cookie(session_cookie.removal())
        .json(json!({
            "success": true,
            "message": "Logged out"
        })))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify",
    tag = "auth",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified"),
        (status = 400, description = "Missing input, already verified, wrong or expired code"),
        (status = 404, description = "No account with this email")
    )
)]
pub async fn verify_email(
    auth_service: web::Data<AuthService>,
    request: web::Json<VerifyEmailRequest>,
) -> Result<HttpResponse> {
    match auth_service.verify_email(request.into_inner()).await {
        Ok(_) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Email verified successfully"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-verification",
    tag = "auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "A new code was sent"),
        (status = 400, description = "Invalid email or account already verified"),
        (status = 404, description = "No account with this email")
    )
)]
pub async fn resend_verification(
    auth_service: web::Data<AuthService>,
    request: web::Json<EmailRequest>,
) -> Result<HttpResponse> {
    match auth_service.resend_verification(request.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Verification code sent"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    tag = "auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Same answer whether or not the account exists"),
        (status = 400, description = "Malformed email")
    )
)]
pub async fn forgot_password(
    auth_service: web::Data<AuthService>,
    request: web::Json<EmailRequest>,
) -> Result<HttpResponse> {
    match auth_service.forgot_password(request.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "If an account exists for this email, a reset link has been sent"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Invalid or expired reset token, or weak password")
    )
)]
pub async fn reset_password(
    auth_service: web::Data<AuthService>,
    request: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse> {
    match auth_service.reset_password(request.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Password has been reset"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/verify", web::post().to(verify_email))
            .route("/resend-verification", web::post().to(resend_verification))
            .route("/forgot-password", web::post().to(forgot_password))
            .route("/reset-password", web::post().to(reset_password)),
    );
}

#[cfg(test)]
mod tests {
    use crate::models::PasswordResetToken;
    use crate::store::{ResetTokenStore, UserStore};
    use crate::testing::TestContext;
    use crate::utils::verify_password;
    use actix_web::test;
    use chrono::{Duration, Utc};
    use serde_json::{Value, json};

    #[actix_web::test]
    async fn test_register_with_referral_code_then_login_sets_cookie() {
        let ctx = TestContext::new();
        let referrer = ctx.seed_user("alice", true).await;
        let app = init_app!(ctx);

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "username": "bob",
                "email": "Bob@Example.com",
                "password": "Password123",
                "referralCode": referrer.referral_code,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["user"]["email"], "bob@example.com");
        assert_eq!(json["user"]["isVerified"], false);

        let alice = ctx.store.find_by_id(referrer.id).await.unwrap().unwrap();
        assert_eq!(alice.referred_users.len(), 1);
        assert_eq!(alice.referred_users[0].user.username, "bob");

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"email": "alice@example.com", "password": "Password123"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == "authToken")
            .expect("session cookie");
        assert!(cookie.http_only().unwrap_or(false));
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["expiresIn"], 3600);
        assert_eq!(json["user"]["referralStats"]["totalReferrals"], 1);
    }

    #[actix_web::test]
    async fn test_verify_then_profile_reports_verified() {
        let ctx = TestContext::new();
        let user = ctx.seed_user("alice", false).await;
        let app = init_app!(ctx);

        let verify = || {
            test::TestRequest::post()
                .uri("/api/auth/verify")
                .set_json(json!({"email": "alice@example.com", "code": "123456"}))
                .to_request()
        };

        let resp = test::call_service(&app, verify()).await;
        assert_eq!(resp.status(), 200);

        let req = test::TestRequest::get()
            .uri("/api/user/profile")
            .cookie(ctx.session_for(user.id))
            .to_request();
        let json: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(json["user"]["isVerified"], true);

        let resp = test::call_service(&app, verify()).await;
        assert_eq!(resp.status(), 400);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["message"], "Account is already verified");
    }

    #[actix_web::test]
    async fn test_verify_rejects_expired_and_missing_input() {
        let ctx = TestContext::new();
        let mut user = ctx.seed_user("alice", false).await;
        user.verification_code_expires = Some(Utc::now() - Duration::minutes(1));
        ctx.store.save(&user).await.unwrap();
        let app = init_app!(ctx);

        let req = test::TestRequest::post()
            .uri("/api/auth/verify")
            .set_json(json!({"email": "alice@example.com", "code": "123456"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["message"], "Verification code has expired");

        let req = test::TestRequest::post()
            .uri("/api/auth/verify")
            .set_json(json!({"email": "alice@example.com"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::post()
            .uri("/api/auth/verify")
            .set_json(json!({"email": "nobody@example.com", "code": "123456"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);
    }

    #[actix_web::test]
    async fn test_reset_with_expired_token_keeps_password() {
        let ctx = TestContext::new();
        let user = ctx.seed_user("alice", true).await;
        let now = Utc::now();
        ResetTokenStore::create(
            ctx.store.as_ref(),
            PasswordResetToken {
                token: "expired-token".to_string(),
                user_id: user.id,
                expires_at: now - Duration::minutes(5),
                used_at: None,
                created_at: now - Duration::hours(1),
            },
        )
        .await
        .unwrap();
        let app = init_app!(ctx);

        let req = test::TestRequest::post()
            .uri("/api/auth/reset-password")
            .set_json(json!({"token": "expired-token", "password": "NewPassword1"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["message"], "Invalid or expired reset token");

        let stored = ctx.store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(verify_password("Password123", &stored.password_hash).unwrap());
    }

    #[actix_web::test]
    async fn test_reset_token_works_once() {
        let ctx = TestContext::new();
        let user = ctx.seed_user("alice", true).await;
        let now = Utc::now();
        ResetTokenStore::create(
            ctx.store.as_ref(),
            PasswordResetToken {
                token: "fresh-token".to_string(),
                user_id: user.id,
                expires_at: now + Duration::minutes(30),
                used_at: None,
                created_at: now,
            },
        )
        .await
        .unwrap();
        let app = init_app!(ctx);

        let reset = |password: &str| {
            test::TestRequest::post()
                .uri("/api/auth/reset-password")
                .set_json(json!({"token": "fresh-token", "password": password}))
                .to_request()
        };

        assert_eq!(test::call_service(&app, reset("NewPassword1")).await.status(), 200);
        assert_eq!(test::call_service(&app, reset("OtherPassword1")).await.status(), 400);

        let stored = ctx.store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(verify_password("NewPassword1", &stored.password_hash).unwrap());
    }

    #[actix_web::test]
    async fn test_forgot_password_answers_the_same_for_unknown_email() {
        let ctx = TestContext::new();
        ctx.seed_user("alice", true).await;
        let app = init_app!(ctx);

        let mut messages = Vec::new();
        for email in ["alice@example.com", "ghost@example.com"] {
            let req = test::TestRequest::post()
                .uri("/api/auth/forgot-password")
                .set_json(json!({ "email": email }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 200);
            let json: Value = test::read_body_json(resp).await;
            messages.push(json["message"].clone());
        }
        assert_eq!(messages[0], messages[1]);
        assert_eq!(ctx.mailer.sent().await.len(), 1);
    }

    #[actix_web::test]
    async fn test_malformed_json_uses_error_envelope() {
        let ctx = TestContext::new();
        let app = init_app!(ctx);

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[actix_web::test]
    async fn test_logout_clears_cookie() {
        let ctx = TestContext::new();
        let app = init_app!(ctx);

        let req = test::TestRequest::post().uri("/api/auth/logout").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == "authToken")
            .expect("removal cookie");
        assert_eq!(cookie.value(), "");
    }
}
