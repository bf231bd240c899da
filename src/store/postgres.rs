use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;
use uuid::Uuid;

use super::{ResetTokenStore, UserStore, WithdrawalStore};
use crate::entities::{
    referral_entity as referrals, reset_token_entity as reset_tokens, user_entity as users,
    withdrawal_entity as withdrawals,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    Avatar, NewUser, PasswordResetToken, Referral, ReferredUser, User, Withdrawal,
};

#[derive(Clone)]
pub struct PgStore {
    pool: DatabaseConnection,
}

impl PgStore {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// Loads the referral list of `model` and turns it into a `User`.
    async fn hydrate(&self, model: users::Model) -> AppResult<User> {
        let links = referrals::Entity::find()
            .filter(referrals::Column::ReferrerId.eq(model.id))
            .order_by_asc(referrals::Column::Id)
            .all(&self.pool)
            .await?;

        let referred_ids: Vec<Uuid> = links.iter().map(|l| l.referred_user_id).collect();
        let referred: HashMap<Uuid, users::Model> = if referred_ids.is_empty() {
            HashMap::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(referred_ids))
                .all(&self.pool)
                .await?
                .into_iter()
                .map(|u| (u.id, u))
                .collect()
        };

        let referred_users = links
            .into_iter()
            .filter_map(|link| {
                let u = referred.get(&link.referred_user_id)?;
                Some(Referral {
                    user: ReferredUser {
                        id: u.id,
                        username: u.username.clone(),
                        email: u.email.clone(),
                    },
                    joined_at: link.joined_at,
                    is_active: link.is_active,
                    total_deposited: link.total_deposited,
                    earnings_from_user: link.earnings_from_user,
                })
            })
            .collect();

        Ok(user_from_model(model, referred_users))
    }

    async fn find_one(&self, filter: sea_orm::Condition) -> AppResult<Option<User>> {
        match users::Entity::find().filter(filter).one(&self.pool).await? {
            Some(model) => Ok(Some(self.hydrate(model).await?)),
            None => Ok(None),
        }
    }
}

fn user_from_model(m: users::Model, referred_users: Vec<Referral>) -> User {
    let avatar = match (m.avatar_public_id, m.avatar_url) {
        (Some(public_id), Some(url)) => Some(Avatar { public_id, url }),
        _ => None,
    };

    User {
        id: m.id,
        username: m.username,
        email: m.email,
        password_hash: m.password_hash,
        is_verified: m.is_verified,
        verification_code: m.verification_code,
        verification_code_expires: m.verification_code_expires,
        avatar,
        role: m.role,
        country: m.country,
        referral_code: m.referral_code,
        referred_by: m.referred_by,
        referred_users,
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.find_one(sea_orm::Condition::all().add(users::Column::Id.eq(id)))
            .await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.find_one(sea_orm::Condition::all().add(users::Column::Email.eq(email)))
            .await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.find_one(sea_orm::Condition::all().add(users::Column::Username.eq(username)))
            .await
    }

    async fn find_by_referral_code(&self, code: &str) -> AppResult<Option<User>> {
        self.find_one(sea_orm::Condition::all().add(users::Column::ReferralCode.eq(code)))
            .await
    }

    async fn create(&self, new_user: NewUser) -> AppResult<User> {
        let now = Utc::now();
        let model = users::ActiveModel {
            id: Set(new_user.id),
            username: Set(new_user.username),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            is_verified: Set(false),
            verification_code: Set(Some(new_user.verification_code)),
            verification_code_expires: Set(Some(new_user.verification_code_expires)),
            avatar_public_id: Set(None),
            avatar_url: Set(None),
            role: Set(new_user.role),
            country: Set(new_user.country),
            referral_code: Set(new_user.referral_code),
            referred_by: Set(new_user.referred_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.pool)
        .await?;

        Ok(user_from_model(model, Vec::new()))
    }

    async fn save(&self, user: &User) -> AppResult<()> {
        let mut model = users::Entity::find_by_id(user.id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?
            .into_active_model();

        model.username = Set(user.username.clone());
        model.email = Set(user.email.clone());
        model.password_hash = Set(user.password_hash.clone());
        model.is_verified = Set(user.is_verified);
        model.verification_code = Set(user.verification_code.clone());
        model.verification_code_expires = Set(user.verification_code_expires);
        model.avatar_public_id = Set(user.avatar.as_ref().map(|a| a.public_id.clone()));
        model.avatar_url = Set(user.avatar.as_ref().map(|a| a.url.clone()));
        model.role = Set(user.role);
        model.country = Set(user.country.clone());
        model.updated_at = Set(Utc::now());
        model.update(&self.pool).await?;
        Ok(())
    }

    async fn update_avatar(&self, id: Uuid, avatar: Avatar) -> AppResult<Option<User>> {
        let Some(model) = users::Entity::find_by_id(id).one(&self.pool).await? else {
            return Ok(None);
        };

        let mut model = model.into_active_model();
        model.avatar_public_id = Set(Some(avatar.public_id));
        model.avatar_url = Set(Some(avatar.url));
        model.updated_at = Set(Utc::now());
        let updated = model.update(&self.pool).await?;

        Ok(Some(self.hydrate(updated).await?))
    }

    async fn add_referral(
        &self,
        referrer_id: Uuid,
        referred_user_id: Uuid,
        joined_at: DateTime<Utc>,
    ) -> AppResult<()> {
        referrals::ActiveModel {
            referrer_id: Set(referrer_id),
            referred_user_id: Set(referred_user_id),
            joined_at: Set(joined_at),
            is_active: Set(false),
            total_deposited: Set(0.0),
            earnings_from_user: Set(None),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl WithdrawalStore for PgStore {
    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Vec<Withdrawal>> {
        let models = withdrawals::Entity::find()
            .filter(withdrawals::Column::UserId.eq(user_id))
            .order_by_desc(withdrawals::Column::CreatedAt)
            .all(&self.pool)
            .await?;
        Ok(models.into_iter().map(Withdrawal::from).collect())
    }

    async fn create(&self, withdrawal: Withdrawal) -> AppResult<Withdrawal> {
        let model = withdrawals::ActiveModel {
            id: Set(withdrawal.id),
            user_id: Set(withdrawal.user_id),
            amount: Set(withdrawal.amount),
            address: Set(withdrawal.address),
            status: Set(withdrawal.status),
            created_at: Set(withdrawal.created_at),
        }
        .insert(&self.pool)
        .await?;
        Ok(Withdrawal::from(model))
    }
}

#[async_trait]
impl ResetTokenStore for PgStore {
    async fn create(&self, token: PasswordResetToken) -> AppResult<()> {
        reset_tokens::ActiveModel {
            token: Set(token.token),
            user_id: Set(token.user_id),
            expires_at: Set(token.expires_at),
            used_at: Set(token.used_at),
            created_at: Set(token.created_at),
        }
        .insert(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, token: &str) -> AppResult<Option<PasswordResetToken>> {
        let model = reset_tokens::Entity::find_by_id(token.to_string())
            .one(&self.pool)
            .await?;
        Ok(model.map(PasswordResetToken::from))
    }

    async fn consume(
        &self,
        token: &str,
        at: DateTime<Utc>,
        password_hash: &str,
    ) -> AppResult<bool> {
        let txn = self.pool.begin().await?;

        let Some(stored) = reset_tokens::Entity::find_by_id(token.to_string())
            .one(&txn)
            .await?
        else {
            return Ok(false);
        };

        // Conditional update so two concurrent resets cannot both consume it
        let consumed = reset_tokens::Entity::update_many()
            .col_expr(reset_tokens::Column::UsedAt, Expr::value(Some(at)))
            .filter(reset_tokens::Column::Token.eq(token))
            .filter(reset_tokens::Column::UsedAt.is_null())
            .exec(&txn)
            .await?;
        if consumed.rows_affected != 1 {
            return Ok(false);
        }

        let updated = users::Entity::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(users::Column::UpdatedAt, Expr::value(at))
            .filter(users::Column::Id.eq(stored.user_id))
            .exec(&txn)
            .await?;
        if updated.rows_affected != 1 {
            return Ok(false);
        }

        txn.commit().await?;
        Ok(true)
    }
}
