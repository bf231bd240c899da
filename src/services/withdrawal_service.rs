use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::WithdrawalResponse;
use crate::store::{Stores, WithdrawalStore};

#[derive(Clone)]
pub struct WithdrawalService {
    withdrawals: Arc<dyn WithdrawalStore>,
}

impl WithdrawalService {
    pub fn new(stores: &Stores) -> Self {
        Self {
            withdrawals: stores.withdrawals.clone(),
        }
    }

    /// The user's withdrawals, newest first.
    pub async fn history(&self, user_id: Uuid) -> AppResult<Vec<WithdrawalResponse>> {
        let withdrawals = self.withdrawals.find_by_user(user_id).await?;
        Ok(withdrawals.into_iter().map(WithdrawalResponse::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::WithdrawalStatus;
    use crate::models::Withdrawal;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_history_only_lists_own_withdrawals() {
        let store = Arc::new(MemoryStore::new());
        let service = WithdrawalService::new(&Stores::from_backend(store.clone()));
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        for (user_id, amount, minutes_ago) in [(me, 10.0, 30), (other, 99.0, 10), (me, 25.0, 5)] {
            WithdrawalStore::create(
                store.as_ref(),
                Withdrawal {
                    id: Uuid::new_v4(),
                    user_id,
                    amount,
                    address: Some("bc1qexample".to_string()),
                    status: WithdrawalStatus::Completed,
                    created_at: now - Duration::minutes(minutes_ago),
                },
            )
            .await
            .unwrap();
        }

        let history = service.history(me).await.unwrap();
        let amounts: Vec<f64> = history.iter().map(|w| w.amount).collect();
        assert_eq!(amounts, vec![25.0, 10.0]);
    }
}
