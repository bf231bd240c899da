use crate::entities::{WithdrawalStatus, withdrawal_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Withdrawal history entry. Records are never edited after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub address: Option<String>,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalResponse {
    pub id: Uuid,
    pub amount: f64,
    pub address: Option<String>,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}

impl From<withdrawal_entity::Model> for Withdrawal {
    fn from(m: withdrawal_entity::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            amount: m.amount,
            address: m.address,
            status: m.status,
            created_at: m.created_at,
        }
    }
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(w: Withdrawal) -> Self {
        Self {
            id: w.id,
            amount: w.amount,
            address: w.address,
            status: w.status,
            created_at: w.created_at,
        }
    }
}
