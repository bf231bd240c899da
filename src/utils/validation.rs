use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid email regex")
    })
}

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]{3,30}$").expect("valid username regex"))
}

/// Lower-cases and trims an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if !email_regex().is_match(email) {
        return Err(AppError::ValidationError(
            "Invalid email address".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> AppResult<()> {
    if !username_regex().is_match(username) {
        return Err(AppError::ValidationError(
            "Username must be 3-30 characters of letters, numbers or underscores".to_string(),
        ));
    }
    Ok(())
}
