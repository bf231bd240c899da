//! Test doubles and app wiring shared by the unit and end-to-end tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::entities::UserRole;
use crate::error::{AppError, AppResult};
use crate::external::{Mailer, ObjectStorage, OutgoingMail, UploadOptions, UploadedObject};
use crate::models::{NewUser, User};
use crate::services::{AuthService, AuthSettings, UserService, WithdrawalService};
use crate::store::{MemoryStore, Stores, UserStore};
use crate::utils::{JwtService, SessionCookie, generate_referral_code, hash_password};

pub const TEST_SECRET: &str = "test-secret";
pub const COOKIE_NAME: &str = "authToken";

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl RecordingMailer {
    /// A mailer whose every delivery fails, as if SMTP were down.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()> {
        if self.fail {
            return Err(AppError::ExternalApiError("SMTP unavailable".to_string()));
        }
        self.sent.lock().await.push(mail);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStorage {
    uploads: Mutex<usize>,
}

impl FakeStorage {
    pub async fn uploads(&self) -> usize {
        *self.uploads.lock().await
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(&self, _bytes: Vec<u8>, options: UploadOptions) -> AppResult<UploadedObject> {
        *self.uploads.lock().await += 1;
        let public_id = format!("{}/{}", options.folder, options.public_id);
        Ok(UploadedObject {
            url: format!("https://cdn.example.com/{public_id}.png"),
            public_id,
        })
    }
}

/// Everything an end-to-end test needs to build the app and poke at state.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub storage: Arc<FakeStorage>,
    pub jwt: JwtService,
    pub session_cookie: SessionCookie,
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub withdrawal_service: WithdrawalService,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::from_backend(store.clone());
        let mailer = Arc::new(RecordingMailer::default());
        let storage = Arc::new(FakeStorage::default());
        let jwt = JwtService::new(TEST_SECRET, 3600);

        let auth_service = AuthService::new(
            &stores,
            mailer.clone(),
            jwt.clone(),
            AuthSettings {
                bcrypt_cost: 4,
                verification_code_ttl_minutes: 10,
                reset_token_ttl_minutes: 60,
                public_url: "https://app.example.com".to_string(),
            },
        );
        let user_service =
            UserService::new(&stores, storage.clone(), 4, "avatars".to_string(), 1024);
        let withdrawal_service = WithdrawalService::new(&stores);

        Self {
            store,
            mailer,
            storage,
            session_cookie: SessionCookie::new(COOKIE_NAME, false, jwt.get_expires_in()),
            jwt,
            auth_service,
            user_service,
            withdrawal_service,
        }
    }

    /// Inserts `name@example.com` with password `Password123` and the
    /// verification code `123456`.
    pub async fn seed_user(&self, name: &str, verified: bool) -> User {
        let mut user = UserStore::create(
            self.store.as_ref(),
            NewUser {
                id: Uuid::new_v4(),
                username: name.to_string(),
                email: format!("{name}@example.com"),
                password_hash: hash_password("Password123", 4).expect("hash"),
                verification_code: "123456".to_string(),
                verification_code_expires: Utc::now() + Duration::minutes(10),
                role: UserRole::User,
                country: None,
                referral_code: generate_referral_code(),
                referred_by: None,
            },
        )
        .await
        .expect("seed user");

        if verified {
            user.apply_verification_code("123456", Utc::now()).expect("verify");
            self.store.save(&user).await.expect("save user");
        }
        user
    }

    pub fn session_for(&self, user_id: Uuid) -> actix_web::cookie::Cookie<'static> {
        let token = self
            .jwt
            .generate_session_token(user_id)
            .expect("token generation");
        self.session_cookie.build(token)
    }
}

/// Builds the full `/api` app over a [`TestContext`], wrapped in the
/// session guard.
macro_rules! init_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap($crate::middlewares::AuthMiddleware::new(
                    $ctx.jwt.clone(),
                    $crate::testing::COOKIE_NAME,
                ))
                .app_data(actix_web::web::Data::new($ctx.auth_service.clone()))
                .app_data(actix_web::web::Data::new($ctx.user_service.clone()))
                .app_data(actix_web::web::Data::new($ctx.withdrawal_service.clone()))
                .app_data(actix_web::web::Data::new($ctx.session_cookie.clone()))
                .configure($crate::handlers::api_config),
        )
        .await
    };
}
