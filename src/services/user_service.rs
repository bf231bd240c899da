use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::{ObjectStorage, UploadOptions};
use crate::models::*;
use crate::services::referral_aggregator::{ReferralPage, referral_page};
use crate::store::{Stores, UserStore};
use crate::utils::{hash_password, validate_password, verify_password};

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    storage: Arc<dyn ObjectStorage>,
    bcrypt_cost: u32,
    avatar_folder: String,
    max_avatar_bytes: usize,
}

impl UserService {
    pub fn new(
        stores: &Stores,
        storage: Arc<dyn ObjectStorage>,
        bcrypt_cost: u32,
        avatar_folder: String,
        max_avatar_bytes: usize,
    ) -> Self {
        Self {
            users: stores.users.clone(),
            storage,
            bcrypt_cost,
            avatar_folder,
            max_avatar_bytes,
        }
    }

    pub fn max_avatar_bytes(&self) -> usize {
        self.max_avatar_bytes
    }

    async fn load(&self, user_id: Uuid) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<UserResponse> {
        Ok(UserResponse::from(self.load(user_id).await?))
    }

    pub async fn get_referrals(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<ReferralPage> {
        let user = self.load(user_id).await?;
        Ok(referral_page(&user.referred_users, params))
    }

    pub async fn update_avatar(&self, user_id: Uuid, bytes: Vec<u8>) -> AppResult<UserResponse> {
        if bytes.is_empty() {
            return Err(AppError::ValidationError("No file uploaded".to_string()));
        }
        if bytes.len() > self.max_avatar_bytes {
            return Err(AppError::ValidationError(format!(
                "File exceeds the {} byte limit",
                self.max_avatar_bytes
            )));
        }

        // Skip the upload entirely for unknown users
        self.load(user_id).await?;

        let uploaded = self
            .storage
            .upload(
                bytes,
                UploadOptions {
                    folder: self.avatar_folder.clone(),
                    public_id: format!("avatar_{user_id}"),
                    overwrite: true,
                },
            )
            .await?;

        let user = self
            .users
            .update_avatar(
                user_id,
                Avatar {
                    public_id: uploaded.public_id,
                    url: uploaded.url,
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        log::info!("User {} updated their avatar", user_id);
        Ok(UserResponse::from(user))
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> AppResult<()> {
        let mut user = self.load(user_id).await?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AppError::ValidationError(
                "Current password is incorrect".to_string(),
            ));
        }
        validate_password(&request.new_password)?;
        if request.current_password == request.new_password {
            return Err(AppError::ValidationError(
                "New password must differ from the current one".to_string(),
            ));
        }

        user.password_hash = hash_password(&request.new_password, self.bcrypt_cost)?;
        self.users.save(&user).await?;
        log::info!("User {} changed their password", user_id);
        Ok(())
    }
}
