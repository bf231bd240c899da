use actix_web::cookie::{Cookie, SameSite, time::Duration};

/// Settings for the cookie that carries the session token.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
    pub secure: bool,
    pub max_age_secs: i64,
}

impl SessionCookie {
    pub fn new(name: &str, secure: bool, max_age_secs: i64) -> Self {
        Self {
            name: name.to_string(),
            secure,
            max_age_secs,
        }
    }

    pub fn build(&self, token: String) -> Cookie<'static> {
        Cookie::build(self.name.clone(), token)
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(self.max_age_secs))
            .finish()
    }

    pub fn removal(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(self.name.clone(), "")
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .finish();
        cookie.make_removal();
        cookie
    }
}
