pub mod pagination;
pub mod password_reset;
pub mod user;
pub mod withdrawal;

pub use pagination::*;
pub use password_reset::*;
pub use user::*;
pub use withdrawal::*;
