pub mod auth;
pub mod cors;

pub use auth::{AuthMiddleware, AuthUser, SessionUser};
pub use cors::create_cors;
