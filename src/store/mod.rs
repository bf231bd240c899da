//! Document store seams over the user, withdrawal and reset-token
//! collections.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Avatar, NewUser, PasswordResetToken, User, Withdrawal};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn find_by_referral_code(&self, code: &str) -> AppResult<Option<User>>;

    async fn create(&self, user: NewUser) -> AppResult<User>;

    /// Writes the mutable scalar fields back. The referral code, creation
    /// time and referral list are never touched.
    async fn save(&self, user: &User) -> AppResult<()>;

    /// Returns `None` when no such user exists.
    async fn update_avatar(&self, id: Uuid, avatar: Avatar) -> AppResult<Option<User>>;

    async fn add_referral(
        &self,
        referrer_id: Uuid,
        referred_user_id: Uuid,
        joined_at: DateTime<Utc>,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait WithdrawalStore: Send + Sync {
    /// Newest first.
    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<Withdrawal>>;

    async fn create(&self, withdrawal: Withdrawal) -> AppResult<Withdrawal>;
}

#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    async fn create(&self, token: PasswordResetToken) -> AppResult<()>;

    async fn find(&self, token: &str) -> AppResult<Option<PasswordResetToken>>;

    /// Marks an unused token as used and stores `password_hash` on its
    /// owner in one step. `false` if the token was already consumed or its
    /// owner is gone; nothing is written then.
    async fn consume(&self, token: &str, at: DateTime<Utc>, password_hash: &str)
    -> AppResult<bool>;
}

#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub withdrawals: Arc<dyn WithdrawalStore>,
    pub reset_tokens: Arc<dyn ResetTokenStore>,
}

impl Stores {
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: UserStore + WithdrawalStore + ResetTokenStore + 'static,
    {
        Self {
            users: backend.clone(),
            withdrawals: backend.clone(),
            reset_tokens: backend,
        }
    }
}
