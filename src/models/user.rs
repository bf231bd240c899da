use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::UserRole;
use crate::error::{AppError, AppResult};
use crate::services::referral_aggregator::ReferralStats;

/// A user document with its referral list attached.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub verification_code: Option<String>,
    pub verification_code_expires: Option<DateTime<Utc>>,
    pub avatar: Option<Avatar>,
    pub role: UserRole,
    pub country: Option<String>,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    /// Insertion order.
    pub referred_users: Vec<Referral>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    pub public_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferredUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// One account signed up with this user's referral code. `is_active` and
/// the money fields are maintained elsewhere; nothing here derives them.
#[derive(Debug, Clone, PartialEq)]
pub struct Referral {
    pub user: ReferredUser,
    pub joined_at: DateTime<Utc>,
    pub is_active: bool,
    pub total_deposited: f64,
    pub earnings_from_user: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub verification_code: String,
    pub verification_code_expires: DateTime<Utc>,
    pub role: UserRole,
    pub country: Option<String>,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
}

impl User {
    /// Consumes a one-time email verification code.
    pub fn apply_verification_code(&mut self, code: &str, now: DateTime<Utc>) -> AppResult<()> {
        if self.is_verified {
            return Err(AppError::ValidationError(
                "Account is already verified".to_string(),
            ));
        }

        if self.verification_code.as_deref() != Some(code) {
            return Err(AppError::ValidationError(
                "Invalid verification code".to_string(),
            ));
        }

        match self.verification_code_expires {
            Some(expires) if now <= expires => {}
            _ => {
                return Err(AppError::ValidationError(
                    "Verification code has expired".to_string(),
                ));
            }
        }

        self.is_verified = true;
        self.verification_code = None;
        self.verification_code_expires = None;
        Ok(())
    }

    pub fn reissue_verification_code(&mut self, code: String, expires: DateTime<Utc>) -> AppResult<()> {
        if self.is_verified {
            return Err(AppError::ValidationError(
                "Account is already verified".to_string(),
            ));
        }
        self.verification_code = Some(code);
        self.verification_code_expires = Some(expires);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[schema(example = "satoshi")]
    pub username: String,
    #[schema(example = "satoshi@example.com")]
    pub email: String,
    #[schema(example = "Password123")]
    pub password: String,
    #[schema(example = "Japan")]
    pub country: Option<String>,
    #[schema(example = "K7Q2M9XD")]
    pub referral_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "satoshi@example.com")]
    pub email: String,
    #[schema(example = "Password123")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    #[schema(example = "123456")]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AvatarResponse {
    pub public_id: String,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReferredUserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferralResponse {
    pub user: ReferredUserResponse,
    pub joined_at: DateTime<Utc>,
    pub is_active: bool,
    pub total_deposited: f64,
    pub earnings_from_user: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_verified: bool,
    pub avatar: Option<AvatarResponse>,
    pub role: UserRole,
    pub country: Option<String>,
    pub referral_code: String,
    pub referred_users: Vec<ReferralResponse>,
    pub referral_stats: ReferralStats,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserResponse,
    pub expires_in: i64,
}

/// Multipart body of the avatar upload, for the API docs only.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct AvatarUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub user_id: String,
}

impl From<&Referral> for ReferralResponse {
    fn from(referral: &Referral) -> Self {
        Self {
            user: ReferredUserResponse {
                id: referral.user.id,
                username: referral.user.username.clone(),
                email: referral.user.email.clone(),
            },
            joined_at: referral.joined_at,
            is_active: referral.is_active,
            total_deposited: referral.total_deposited,
            earnings_from_user: referral.earnings_from_user,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let referral_stats = ReferralStats::from_referrals(&user.referred_users);
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_verified: user.is_verified,
            avatar: user.avatar.map(|a| AvatarResponse {
                public_id: a.public_id,
                url: a.url,
            }),
            role: user.role,
            country: user.country,
            referral_code: user.referral_code,
            referred_users: user.referred_users.iter().map(ReferralResponse::from).collect(),
            referral_stats,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_user(email: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        username: email.split('@').next().unwrap_or("user").to_string(),
        email: email.to_string(),
        password_hash: String::new(),
        is_verified: false,
        verification_code: Some("123456".to_string()),
        verification_code_expires: Some(now + chrono::Duration::minutes(10)),
        avatar: None,
        role: UserRole::User,
        country: None,
        referral_code: "ABCD2345".to_string(),
        referred_by: None,
        referred_users: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_matching_code_verifies_once() {
        let mut user = sample_user("a@example.com");
        let now = Utc::now();

        user.apply_verification_code("123456", now).unwrap();
        assert!(user.is_verified);
        assert!(user.verification_code.is_none());
        assert!(user.verification_code_expires.is_none());

        let err = user.apply_verification_code("123456", now).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == "Account is already verified"));
    }

    #[test]
    fn test_wrong_code_is_rejected() {
        let mut user = sample_user("a@example.com");
        let err = user.apply_verification_code("654321", Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == "Invalid verification code"));
        assert!(!user.is_verified);
    }

    #[test]
    fn test_expired_code_is_rejected_even_when_matching() {
        let mut user = sample_user("a@example.com");
        let later = Utc::now() + Duration::minutes(11);
        let err = user.apply_verification_code("123456", later).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == "Verification code has expired"));
        assert!(!user.is_verified);
    }

    #[test]
    fn test_missing_expiry_counts_as_expired() {
        let mut user = sample_user("a@example.com");
        user.verification_code_expires = None;
        assert!(user.apply_verification_code("123456", Utc::now()).is_err());
    }

    #[test]
    fn test_reissue_refused_after_verification() {
        let mut user = sample_user("a@example.com");
        user.is_verified = true;
        assert!(user
            .reissue_verification_code("111111".into(), Utc::now())
            .is_err());
    }

    #[test]
    fn test_user_response_hides_credentials_and_adds_stats() {
        let mut user = sample_user("a@example.com");
        user.password_hash = "$2b$04$secret".to_string();
        user.referred_users.push(Referral {
            user: ReferredUser {
                id: Uuid::new_v4(),
                username: "bob".into(),
                email: "bob@example.com".into(),
            },
            joined_at: Utc::now(),
            is_active: true,
            total_deposited: 100.0,
            earnings_from_user: Some(5.0),
        });

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("verificationCode").is_none());
        assert_eq!(json["referralStats"]["totalReferrals"], 1);
        assert_eq!(json["referredUsers"][0]["user"]["username"], "bob");
        assert_eq!(json["referredUsers"][0]["isActive"], true);
    }
}
