pub mod password_reset_tokens;
pub mod referrals;
pub mod users;
pub mod withdrawals;

pub use password_reset_tokens as reset_token_entity;
pub use referrals as referral_entity;
pub use users::UserRole;
pub use users as user_entity;
pub use withdrawals::WithdrawalStatus;
pub use withdrawals as withdrawal_entity;
