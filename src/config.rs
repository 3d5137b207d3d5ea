//! Runtime configuration, read once from the environment at startup.

use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub host: String,
    pub port: u16,

    pub database_url: Option<String>,
    pub realtime_url: Option<String>,
    pub realtime_auth: Option<String>,
    pub realtime_messages_path: String,

    pub upload_dir: PathBuf,
    pub public_dir: PathBuf,
    /// Prefix for blob URLs handed to clients, e.g. `https://cdn.example.com`.
    /// Empty means URLs are site-relative (`/files/...`).
    pub public_base_url: String,

    pub jwt_secret: String,
    pub admin_email: Option<String>,
    pub admin_password_hash: Option<String>,
    pub admin_username: Option<String>,

    pub contact_limit: u64,
    pub contact_window: Option<Duration>,
    pub contact_email: String,
    pub contact_phone: String,
    pub trust_proxy: bool,

    pub site_url: String,
    pub site_title: String,
    pub site_description: String,
}

impl Config {
    pub fn from_env() -> Self {
        let admin_password_hash = optional("ADMIN_PASSWORD_HASH").or_else(|| {
            optional("ADMIN_PASSWORD").and_then(|plain| {
                bcrypt::hash(&plain, bcrypt::DEFAULT_COST)
                    .map_err(|e| tracing::error!("Failed to hash ADMIN_PASSWORD: {}", e))
                    .ok()
            })
        });

        Self {
            environment: load("ENVIRONMENT", "development".to_string()),
            host: load("HOST", "127.0.0.1".to_string()),
            port: load("PORT", 3001),

            database_url: optional("DATABASE_URL"),
            realtime_url: optional("REALTIME_URL"),
            realtime_auth: optional("REALTIME_AUTH"),
            realtime_messages_path: load("REALTIME_MESSAGES_PATH", "messages".to_string()),

            upload_dir: PathBuf::from(load("UPLOAD_DIR", "uploads".to_string())),
            public_dir: PathBuf::from(load("PUBLIC_DIR", "public".to_string())),
            public_base_url: load("PUBLIC_BASE_URL", String::new())
                .trim_end_matches('/')
                .to_string(),

            jwt_secret: load("JWT_SECRET", DEFAULT_JWT_SECRET.to_string()),
            admin_email: optional("ADMIN_EMAIL"),
            admin_password_hash,
            admin_username: optional("ADMIN_USERNAME"),

            contact_limit: load("CONTACT_SUBMISSION_LIMIT", 2),
            contact_window: optional("CONTACT_WINDOW_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            contact_email: load("CONTACT_EMAIL", "admin@example.com".to_string()),
            contact_phone: load("CONTACT_PHONE", "+1234567890".to_string()),
            trust_proxy: load("TRUST_PROXY", false),

            site_url: load("SITE_URL", "http://localhost:3001".to_string())
                .trim_end_matches('/')
                .to_string(),
            site_title: load("SITE_TITLE", "Portfolio Blog".to_string()),
            site_description: load(
                "SITE_DESCRIPTION",
                "Latest articles and insights".to_string(),
            ),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Message shown to visitors who hit the contact submission cap.
    pub fn contact_limit_message(&self) -> String {
        format!(
            "You have already submitted multiple messages. Please contact us directly at {} or call {} for assistance.",
            self.contact_email, self.contact_phone
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3001,
            database_url: None,
            realtime_url: None,
            realtime_auth: None,
            realtime_messages_path: "messages".to_string(),
            upload_dir: PathBuf::from("uploads"),
            public_dir: PathBuf::from("public"),
            public_base_url: String::new(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            admin_email: None,
            admin_password_hash: None,
            admin_username: None,
            contact_limit: 2,
            contact_window: None,
            contact_email: "admin@example.com".to_string(),
            contact_phone: "+1234567890".to_string(),
            trust_proxy: false,
            site_url: "http://localhost:3001".to_string(),
            site_title: "Portfolio Blog".to_string(),
            site_description: "Latest articles and insights".to_string(),
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match optional(key) {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!("Invalid {} value: {}. Using default: {}", key, e, default);
            default
        }),
        None => default,
    }
}
