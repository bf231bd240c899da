use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ResetTokenStore, UserStore, WithdrawalStore};
use crate::error::{AppError, AppResult};
use crate::models::{
    Avatar, NewUser, PasswordResetToken, Referral, ReferredUser, User, Withdrawal,
};

#[derive(Debug, Clone)]
struct ReferralLink {
    referred_user_id: Uuid,
    joined_at: DateTime<Utc>,
    is_active: bool,
    total_deposited: f64,
    earnings_from_user: Option<f64>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    // Keyed by referrer, insertion order preserved
    referrals: HashMap<Uuid, Vec<ReferralLink>>,
    withdrawals: Vec<Withdrawal>,
    reset_tokens: HashMap<String, PasswordResetToken>,
}

impl State {
    fn hydrate(&self, user: &User) -> User {
        let mut user = user.clone();
        user.referred_users = self
            .referrals
            .get(&user.id)
            .map(|links| {
                links
                    .iter()
                    .filter_map(|link| {
                        let referred = self.users.get(&link.referred_user_id)?;
                        Some(Referral {
                            user: ReferredUser {
                                id: referred.id,
                                username: referred.username.clone(),
                                email: referred.email.clone(),
                            },
                            joined_at: link.joined_at,
                            is_active: link.is_active,
                            total_deposited: link.total_deposited,
                            earnings_from_user: link.earnings_from_user,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        user
    }

    fn find_by<F>(&self, pred: F) -> Option<User>
    where
        F: Fn(&User) -> bool,
    {
        self.users.values().find(|&u| pred(u)).map(|u| self.hydrate(u))
    }
}

/// In-process store for development runs (`database.url = "memory://"`) and
/// tests. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the metadata of an existing referral link.
    pub async fn set_referral_activity(
        &self,
        referrer_id: Uuid,
        referred_user_id: Uuid,
        is_active: bool,
        total_deposited: f64,
        earnings_from_user: Option<f64>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let link = state
            .referrals
            .get_mut(&referrer_id)
            .and_then(|links| {
                links
                    .iter_mut()
                    .find(|l| l.referred_user_id == referred_user_id)
            })
            .ok_or_else(|| AppError::NotFound("Referral not found".to_string()))?;
        link.is_active = is_active;
        link.total_deposited = total_deposited;
        link.earnings_from_user = earnings_from_user;
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).map(|u| state.hydrate(u)))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.state.read().await.find_by(|u| u.email == email))
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self.state.read().await.find_by(|u| u.username == username))
    }

    async fn find_by_referral_code(&self, code: &str) -> AppResult<Option<User>> {
        Ok(self.state.read().await.find_by(|u| u.referral_code == code))
    }

    async fn create(&self, new_user: NewUser) -> AppResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| {
            u.email == new_user.email
                || u.username == new_user.username
                || u.referral_code == new_user.referral_code
        }) {
            return Err(AppError::ValidationError(
                "User already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: new_user.id,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            is_verified: false,
            verification_code: Some(new_user.verification_code),
            verification_code_expires: Some(new_user.verification_code_expires),
            avatar: None,
            role: new_user.role,
            country: new_user.country,
            referral_code: new_user.referral_code,
            referred_by: new_user.referred_by,
            referred_users: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> AppResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        stored.username = user.username.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.is_verified = user.is_verified;
        stored.verification_code = user.verification_code.clone();
        stored.verification_code_expires = user.verification_code_expires;
        stored.avatar = user.avatar.clone();
        stored.role = user.role;
        stored.country = user.country.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn update_avatar(&self, id: Uuid, avatar: Avatar) -> AppResult<Option<User>> {
        let mut state = self.state.write().await;
        let Some(stored) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        stored.avatar = Some(avatar);
        stored.updated_at = Utc::now();

        let snapshot = stored.clone();
        Ok(Some(state.hydrate(&snapshot)))
    }

    async fn add_referral(
        &self,
        referrer_id: Uuid,
        referred_user_id: Uuid,
        joined_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&referrer_id) {
            return Err(AppError::NotFound("Referrer not found".to_string()));
        }
        state
            .referrals
            .entry(referrer_id)
            .or_default()
            .push(ReferralLink {
                referred_user_id,
                joined_at,
                is_active: false,
                total_deposited: 0.0,
                earnings_from_user: None,
            });
        Ok(())
    }
}

#[async_trait]
impl WithdrawalStore for MemoryStore {
    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<Withdrawal>> {
        let state = self.state.read().await;
        let mut withdrawals: Vec<Withdrawal> = state
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        withdrawals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(withdrawals)
    }

    async fn create(&self, withdrawal: Withdrawal) -> AppResult<Withdrawal> {
        self.state.write().await.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }
}

#[async_trait]
impl ResetTokenStore for MemoryStore {
    async fn create(&self, token: PasswordResetToken) -> AppResult<()> {
        self.state
            .write()
            .await
            .reset_tokens
            .insert(token.token.clone(), token);
        Ok(())
    }

    async fn find(&self, token: &str) -> AppResult<Option<PasswordResetToken>> {
        Ok(self.state.read().await.reset_tokens.get(token).cloned())
    }

    async fn consume(
        &self,
        token: &str,
        at: DateTime<Utc>,
        password_hash: &str,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let State {
            users,
            reset_tokens,
            ..
        } = &mut *state;

        let Some(stored) = reset_tokens.get_mut(token).filter(|t| t.used_at.is_none()) else {
            return Ok(false);
        };
        let Some(user) = users.get_mut(&stored.user_id) else {
            return Ok(false);
        };

        stored.used_at = Some(at);
        user.password_hash = password_hash.to_string();
        user.updated_at = at;
        Ok(true)
    }
}
