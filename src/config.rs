use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub cloudinary: CloudinaryConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `postgres://...` or `memory://` for the in-process store.
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in: i64, // seconds
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// `development` exposes internal error details in responses.
    pub environment: String,
    /// Base URL of the web client, used to build reset links.
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub bcrypt_cost: u32,
    pub verification_code_ttl_minutes: i64,
    pub reset_token_ttl_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
    pub max_file_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmtpConfig {
    /// Empty host disables delivery; messages are only logged.
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from: String,
}

fn default_cookie_name() -> String {
    "authToken".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "production".to_string(),
            public_url: "http://localhost:3000".to_string(),
        }
    }
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
            verification_code_ttl_minutes: 10,
            reset_token_ttl_minutes: 60,
        }
    }
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: "avatars".to_string(),
            max_file_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Sample secret shipped in `config.example.toml`; refused outside development.
const PLACEHOLDER_JWT_SECRET: &str = "change-me-in-production";

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    pub fn from_toml() -> anyhow::Result<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)
                .with_context(|| format!("Failed to parse config file {config_path}"))?,
            // No file: build everything from environment variables and defaults
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_env_only(get_env)?,
            Err(e) => {
                return Err(anyhow!("Unable to read config file {config_path}: {e}"));
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let secret = self.jwt.secret.trim();
        if secret.is_empty() {
            return Err(anyhow!("jwt.secret must not be empty"));
        }
        if secret == PLACEHOLDER_JWT_SECRET && !self.app.is_development() {
            return Err(anyhow!(
                "jwt.secret is still the sample value; set JWT_SECRET or app.environment = \"development\""
            ));
        }
        Ok(())
    }

    pub fn parse(config_str: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(config_str)?)
    }

    fn from_env_only(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            anyhow!("DATABASE_URL is not set and no config.toml was found")
        })?;
        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow!("JWT_SECRET is not set and no config.toml was found"))?;

        Ok(Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: 10,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expires_in: 7 * 24 * 3600,
                cookie_name: default_cookie_name(),
                cookie_secure: false,
            },
            app: AppConfig::default(),
            security: SecurityConfig::default(),
            cloudinary: CloudinaryConfig::default(),
            smtp: SmtpConfig {
                port: default_smtp_port(),
                ..SmtpConfig::default()
            },
        })
    }

    // Environment variables win even when a file is present
    fn apply_env_overrides(&mut self) {
        if let Some(v) = get_env("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(p) = get_env_parse("SERVER_PORT") {
            self.server.port = p;
        }
        if let Some(v) = get_env("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(mc) = get_env_parse("DB_MAX_CONNECTIONS") {
            self.database.max_connections = mc;
        }
        if let Some(v) = get_env("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Some(n) = get_env_parse("JWT_EXPIRES_IN") {
            self.jwt.expires_in = n;
        }
        if let Some(v) = get_env("SESSION_COOKIE_NAME") {
            self.jwt.cookie_name = v;
        }
        if let Some(b) = get_env_parse("SESSION_COOKIE_SECURE") {
            self.jwt.cookie_secure = b;
        }
        if let Some(v) = get_env("APP_ENV") {
            self.app.environment = v;
        }
        if let Some(v) = get_env("APP_PUBLIC_URL") {
            self.app.public_url = v;
        }
        if let Some(n) = get_env_parse("BCRYPT_COST") {
            self.security.bcrypt_cost = n;
        }
        if let Some(n) = get_env_parse("VERIFICATION_CODE_TTL_MINUTES") {
            self.security.verification_code_ttl_minutes = n;
        }
        if let Some(n) = get_env_parse("RESET_TOKEN_TTL_MINUTES") {
            self.security.reset_token_ttl_minutes = n;
        }
        if let Some(v) = get_env("CLOUDINARY_CLOUD_NAME") {
            self.cloudinary.cloud_name = v;
        }
        if let Some(v) = get_env("CLOUDINARY_API_KEY") {
            self.cloudinary.api_key = v;
        }
        if let Some(v) = get_env("CLOUDINARY_API_SECRET") {
            self.cloudinary.api_secret = v;
        }
        if let Some(v) = get_env("CLOUDINARY_FOLDER") {
            self.cloudinary.folder = v;
        }
        if let Some(n) = get_env_parse("CLOUDINARY_MAX_FILE_BYTES") {
            self.cloudinary.max_file_bytes = n;
        }
        if let Some(v) = get_env("SMTP_HOST") {
            self.smtp.host = v;
        }
        if let Some(p) = get_env_parse("SMTP_PORT") {
            self.smtp.port = p;
        }
        if let Some(v) = get_env("SMTP_USERNAME") {
            self.smtp.username = v;
        }
        if let Some(v) = get_env("SMTP_PASSWORD") {
            self.smtp.password = v;
        }
        if let Some(v) = get_env("SMTP_FROM") {
            self.smtp.from = v;
        }
    }
}
