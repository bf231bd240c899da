pub mod code_generator;
pub mod cookie;
pub mod jwt;
pub mod password;
pub mod validation;

pub use code_generator::{generate_referral_code, generate_reset_token, generate_six_digit_code};
pub use cookie::SessionCookie;
pub use jwt::*;
pub use password::*;
pub use validation::*;
