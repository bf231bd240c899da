pub mod auth_service;
pub mod referral_aggregator;
pub mod user_service;
pub mod withdrawal_service;

pub use auth_service::*;
pub use referral_aggregator::*;
pub use user_service::*;
pub use withdrawal_service::*;
