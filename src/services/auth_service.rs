use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::entities::UserRole;
use crate::error::{AppError, AppResult};
use crate::external::{Mailer, reset_password_mail, verification_mail};
use crate::models::*;
use crate::store::{ResetTokenStore, Stores, UserStore};
use crate::utils::*;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub bcrypt_cost: u32,
    pub verification_code_ttl_minutes: i64,
    pub reset_token_ttl_minutes: i64,
    pub public_url: String,
}

impl AuthSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bcrypt_cost: config.security.bcrypt_cost,
            verification_code_ttl_minutes: config.security.verification_code_ttl_minutes,
            reset_token_ttl_minutes: config.security.reset_token_ttl_minutes,
            public_url: config.app.public_url.trim_end_matches('/').to_string(),
        }
    }
}

/// A successful login: the profile to return and the token to put in the
/// session cookie.
pub struct LoginOutcome {
    pub user: UserResponse,
    pub token: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    reset_tokens: Arc<dyn ResetTokenStore>,
    mailer: Arc<dyn Mailer>,
    jwt_service: JwtService,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(
        stores: &Stores,
        mailer: Arc<dyn Mailer>,
        jwt_service: JwtService,
        settings: AuthSettings,
    ) -> Self {
        Self {
            users: stores.users.clone(),
            reset_tokens: stores.reset_tokens.clone(),
            mailer,
            jwt_service,
            settings,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<UserResponse> {
        let username = request.username.trim().to_string();
        let email = normalize_email(&request.email);
        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(&request.password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::ValidationError(
                "Email is already registered".to_string(),
            ));
        }
        if self.users.find_by_username(&username).await?.is_some() {
            return Err(AppError::ValidationError(
                "Username is already taken".to_string(),
            ));
        }

        let referrer = match request
            .referral_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            Some(code) => Some(
                self.users
                    .find_by_referral_code(&code.to_ascii_uppercase())
                    .await?
                    .ok_or_else(|| {
                        AppError::ValidationError("Invalid referral code".to_string())
                    })?,
            ),
            None => None,
        };

        let referral_code = self.unique_referral_code().await?;
        let password_hash = hash_password(&request.password, self.settings.bcrypt_cost)?;
        let code = generate_six_digit_code();
        let now = Utc::now();

        let user = self
            .users
            .create(NewUser {
                id: Uuid::new_v4(),
                username,
                email,
                password_hash,
                verification_code: code.clone(),
                verification_code_expires: now
                    + Duration::minutes(self.settings.verification_code_ttl_minutes),
                role: UserRole::User,
                country: request
                    .country
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty()),
                referral_code,
                referred_by: referrer.as_ref().map(|r| r.id),
            })
            .await?;

        if let Some(referrer) = &referrer {
            self.users.add_referral(referrer.id, user.id, now).await?;
            log::info!("User {} joined through referrer {}", user.id, referrer.id);
        }

        // Registration stands even if the mail cannot be delivered
        let mail = verification_mail(
            &user.email,
            &user.username,
            &code,
            self.settings.verification_code_ttl_minutes,
        );
        if let Err(e) = self.mailer.send(mail).await {
            log::error!("Failed to send verification email to user {}: {}", user.id, e);
        }

        log::info!("Registered user {}", user.id);
        Ok(UserResponse::from(user))
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<LoginOutcome> {
        let email = normalize_email(&request.email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::AuthError(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::AuthError(INVALID_CREDENTIALS.to_string()));
        }

        if !user.is_verified {
            return Err(AppError::AuthError(
                "Please verify your email before logging in".to_string(),
            ));
        }

        let token = self.jwt_service.generate_session_token(user.id)?;
        log::info!("User {} logged in", user.id);

        Ok(LoginOutcome {
            user: UserResponse::from(user),
            token,
            expires_in: self.jwt_service.get_expires_in(),
        })
    }

    pub async fn verify_email(&self, request: VerifyEmailRequest) -> AppResult<UserResponse> {
        let email = normalize_email(&request.email);
        let code = request.code.trim();
        if email.is_empty() || code.is_empty() {
            return Err(AppError::ValidationError(
                "Email and verification code are required".to_string(),
            ));
        }

        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        user.apply_verification_code(code, Utc::now())?;
        self.users.save(&user).await?;

        log::info!("User {} verified their email", user.id);
        Ok(UserResponse::from(user))
    }

    pub async fn resend_verification(&self, request: EmailRequest) -> AppResult<()> {
        let email = normalize_email(&request.email);
        validate_email(&email)?;

        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let code = generate_six_digit_code();
        let ttl = self.settings.verification_code_ttl_minutes;
        user.reissue_verification_code(code.clone(), Utc::now() + Duration::minutes(ttl))?;
        self.users.save(&user).await?;

        let mail = verification_mail(&user.email, &user.username, &code, ttl);
        if let Err(e) = self.mailer.send(mail).await {
            log::error!("Failed to resend verification email to user {}: {}", user.id, e);
        }
        Ok(())
    }

    /// Always succeeds for a well-formed address so callers cannot learn
    /// which emails are registered.
    pub async fn forgot_password(&self, request: EmailRequest) -> AppResult<()> {
        let email = normalize_email(&request.email);
        validate_email(&email)?;

        let Some(user) = self.users.find_by_email(&email).await? else {
            log::info!("Password reset requested for unknown email");
            return Ok(());
        };

        let now = Utc::now();
        let ttl = self.settings.reset_token_ttl_minutes;
        let token = generate_reset_token();
        self.reset_tokens
            .create(PasswordResetToken {
                token: token.clone(),
                user_id: user.id,
                expires_at: now + Duration::minutes(ttl),
                used_at: None,
                created_at: now,
            })
            .await?;

        let link = format!("{}/reset-password?token={}", self.settings.public_url, token);
        if let Err(e) = self
            .mailer
            .send(reset_password_mail(&user.email, &link, ttl))
            .await
        {
            log::error!("Failed to send reset email to user {}: {}", user.id, e);
        }
        Ok(())
    }

    pub async fn reset_password(&self, request: ResetPasswordRequest) -> AppResult<()> {
        let now = Utc::now();
        let token = self
            .reset_tokens
            .find(request.token.trim())
            .await?
            .filter(|t| t.is_usable(now))
            .ok_or_else(|| AppError::ValidationError(INVALID_RESET_TOKEN.to_string()))?;

        validate_password(&request.password)?;
        let password_hash = hash_password(&request.password, self.settings.bcrypt_cost)?;

        if !self
            .reset_tokens
            .consume(&token.token, now, &password_hash)
            .await?
        {
            return Err(AppError::ValidationError(INVALID_RESET_TOKEN.to_string()));
        }

        log::info!("User {} reset their password", token.user_id);
        Ok(())
    }

    async fn unique_referral_code(&self) -> AppResult<String> {
        for _ in 0..10 {
            let code = generate_referral_code();
            if self.users.find_by_referral_code(&code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(AppError::InternalError(
            "Failed to generate a unique referral code".to_string(),
        ))
    }
}
