use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Why a session was refused. Only ever logged; callers see a plain 401.
#[derive(Debug)]
pub enum SessionRejection {
    Missing,
    Invalid(jsonwebtoken::errors::Error),
    MissingUserId,
    MalformedUserId(String),
}

impl std::fmt::Display for SessionRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRejection::Missing => write!(f, "no session token"),
            SessionRejection::Invalid(e) => write!(f, "invalid session token: {e}"),
            SessionRejection::MissingUserId => write!(f, "session token has no userId claim"),
            SessionRejection::MalformedUserId(v) => {
                write!(f, "session token userId is not a uuid: {v}")
            }
        }
    }
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in: i64,
}

impl JwtService {
    pub fn new(secret: &str, expires_in: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expires_in,
        }
    }

    pub fn generate_session_token(&self, user_id: Uuid) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expires_in);

        let claims = SessionClaims {
            user_id: Some(user_id.to_string()),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AppError::JwtError)
    }

    pub fn verify_token(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<SessionClaims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }

    /// Resolves an optional session token to the user it was issued for.
    pub fn authenticate(&self, token: Option<&str>) -> Result<Uuid, SessionRejection> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(SessionRejection::Missing),
        };

        let claims = self.verify_token(token).map_err(SessionRejection::Invalid)?;
        let user_id = claims.user_id.ok_or(SessionRejection::MissingUserId)?;
        Uuid::parse_str(&user_id).map_err(|_| SessionRejection::MalformedUserId(user_id))
    }

    pub fn get_expires_in(&self) -> i64 {
        self.expires_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("test-secret", 3600)
    }

    fn sign(claims: &SessionClaims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_session_resolves_user_id() {
        let jwt = service();
        let user_id = Uuid::new_v4();
        let token = jwt.generate_session_token(user_id).unwrap();
        assert_eq!(jwt.authenticate(Some(&token)).unwrap(), user_id);
    }

    #[test]
    fn test_absent_token_is_missing() {
        let jwt = service();
        assert!(matches!(jwt.authenticate(None), Err(SessionRejection::Missing)));
        assert!(matches!(jwt.authenticate(Some("")), Err(SessionRejection::Missing)));
    }

    #[test]
    fn test_malformed_and_foreign_tokens_are_invalid() {
        let jwt = service();
        assert!(matches!(
            jwt.authenticate(Some("not-a-jwt")),
            Err(SessionRejection::Invalid(_))
        ));

        let now = Utc::now().timestamp();
        let forged = sign(
            &SessionClaims {
                user_id: Some(Uuid::new_v4().to_string()),
                exp: now + 600,
                iat: now,
            },
            "another-secret",
        );
        assert!(matches!(
            jwt.authenticate(Some(&forged)),
            Err(SessionRejection::Invalid(_))
        ));
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let jwt = service();
        let now = Utc::now().timestamp();
        let expired = sign(
            &SessionClaims {
                user_id: Some(Uuid::new_v4().to_string()),
                exp: now - 10,
                iat: now - 3600,
            },
            "test-secret",
        );
        assert!(matches!(
            jwt.authenticate(Some(&expired)),
            Err(SessionRejection::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_or_bad_user_claim_is_rejected() {
        let jwt = service();
        let now = Utc::now().timestamp();

        let anonymous = sign(
            &SessionClaims {
                user_id: None,
                exp: now + 600,
                iat: now,
            },
            "test-secret",
        );
        assert!(matches!(
            jwt.authenticate(Some(&anonymous)),
            Err(SessionRejection::MissingUserId)
        ));

        let numeric = sign(
            &SessionClaims {
                user_id: Some("42".to_string()),
                exp: now + 600,
                iat: now,
            },
            "test-secret",
        );
        assert!(matches!(
            jwt.authenticate(Some(&numeric)),
            Err(SessionRejection::MalformedUserId(_))
        ));
    }
}
