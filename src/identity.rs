/**
 * Identity
 * Single admin credential, JWT access tokens, rotating refresh tokens
 * and a per-IP login throttle
 */
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Instant,
};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::models::AdminCredential;
use crate::store::{DocumentStore, Record, StoreError};

/// Access token expiry in minutes
pub const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 15;

/// Refresh token expiry in days
const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

pub const MIN_PASSWORD_LENGTH: usize = 6;

const ADMIN_SUBJECT: &str = "admin";
const ADMIN_ROLE: &str = "admin";

// ============================================================================
// Types
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone)]
struct RefreshTokenData {
    email: String,
    expires_at: i64,
    revoked: bool,
}

/// User info returned to frontend
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub email: String,
    pub role: String,
}

impl From<Claims> for UserInfo {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserInfo,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone)]
struct Credential {
    email: String,
    password_hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Too many login attempts. Please try again later.")]
    Throttled,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Current password is incorrect")]
    WrongCurrentPassword,

    #[error("Password must be at least 6 characters long")]
    WeakPassword,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("token encoding failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Sliding-window limit on login attempts per client IP.
#[derive(Debug, Clone, Copy)]
pub struct LoginThrottle {
    pub max_attempts: usize,
    pub window: std::time::Duration,
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: std::time::Duration::from_secs(60),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn generate_refresh_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 64)
}

/// Refresh tokens are only ever stored as their SHA-256 digest.
fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn verify_password(password: &str, password_hash: &str) -> Result<bool, IdentityError> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    // A malformed stored hash counts as a mismatch rather than a server error
    let ok = tokio::task::spawn_blocking(move || verify(&password, &password_hash).unwrap_or(false))
        .await?;
    Ok(ok)
}

// ============================================================================
// Identity
// ============================================================================

pub struct Identity {
    jwt_secret: String,
    env_credential: Option<Credential>,
    username_alias: Option<String>,
    documents: Arc<dyn DocumentStore>,
    throttle: LoginThrottle,
    refresh_tokens: RwLock<HashMap<String, RefreshTokenData>>,
    attempts: RwLock<HashMap<String, VecDeque<Instant>>>,
}

impl Identity {
    pub fn new(config: &Config, documents: Arc<dyn DocumentStore>) -> Self {
        let env_credential = match (&config.admin_email, &config.admin_password_hash) {
            (Some(email), Some(password_hash)) => Some(Credential {
                email: email.clone(),
                password_hash: password_hash.clone(),
            }),
            _ => None,
        };

        Self {
            jwt_secret: config.jwt_secret.clone(),
            env_credential,
            username_alias: config.admin_username.clone(),
            documents,
            throttle: LoginThrottle::default(),
            refresh_tokens: RwLock::new(HashMap::new()),
            attempts: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_throttle(mut self, throttle: LoginThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    /// The stored credential wins over the environment one. A store failure
    /// is an error: the environment credential may be one that was rotated away.
    async fn credential(&self) -> Result<Option<Credential>, IdentityError> {
        let stored = self
            .documents
            .get_record::<AdminCredential>(AdminCredential::DOCUMENT_ID)
            .await
            .inspect_err(|e| tracing::error!("Failed to load stored admin credential: {}", e))?;

        Ok(match stored {
            Some(stored) => Some(Credential {
                email: stored.record.email,
                password_hash: stored.record.password_hash,
            }),
            None => self.env_credential.clone(),
        })
    }

    /// Map the username alias onto the admin email; anything else passes through.
    fn resolve_login(&self, identifier: &str, admin_email: &str) -> String {
        let identifier = identifier.trim();
        match &self.username_alias {
            Some(alias) if alias.eq_ignore_ascii_case(identifier) => admin_email.to_string(),
            _ => identifier.to_string(),
        }
    }

    /// Record one attempt for `ip`. Returns false once the window is full.
    pub async fn check_throttle(&self, ip: &str) -> bool {
        let now = Instant::now();
        let window = self.throttle.window;
        let mut attempts = self.attempts.write().await;

        // Keep memory proportional to active IPs
        attempts.retain(|_, seen| {
            while seen.front().is_some_and(|t| now.duration_since(*t) >= window) {
                seen.pop_front();
            }
            !seen.is_empty()
        });

        let seen = attempts.entry(ip.to_string()).or_default();
        if seen.len() >= self.throttle.max_attempts {
            return false;
        }
        seen.push_back(now);
        true
    }

    pub async fn login(
        &self,
        ip: &str,
        identifier: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        if !self.check_throttle(ip).await {
            tracing::warn!(ip = %ip, "Login throttled");
            return Err(IdentityError::Throttled);
        }

        let Some(credential) = self.credential().await? else {
            tracing::warn!(
                "Login attempted but no admin credential is configured. \
                 Set ADMIN_EMAIL and ADMIN_PASSWORD_HASH."
            );
            return Err(IdentityError::InvalidCredentials);
        };

        let email = self.resolve_login(identifier, &credential.email);
        let email_matches = email.eq_ignore_ascii_case(&credential.email);
        let password_ok = verify_password(password, &credential.password_hash).await?;
        if !email_matches || !password_ok {
            tracing::warn!(ip = %ip, "Failed login attempt for: {}", email);
            return Err(IdentityError::InvalidCredentials);
        }

        let tokens = self.issue_tokens(&credential.email).await?;
        tracing::info!("Successful login for user: {}", credential.email);

        Ok(Session {
            user: UserInfo {
                user_id: ADMIN_SUBJECT.to_string(),
                email: credential.email,
                role: ADMIN_ROLE.to_string(),
            },
            tokens,
        })
    }

    pub fn create_access_token(&self, email: &str) -> Result<String, IdentityError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(ACCESS_TOKEN_EXPIRY_MINUTES);

        let claims = Claims {
            sub: ADMIN_SUBJECT.to_string(),
            email: email.to_string(),
            role: ADMIN_ROLE.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, IdentityError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("Token verification failed: {}", e);
            IdentityError::InvalidToken
        })
    }

    async fn issue_tokens(&self, email: &str) -> Result<TokenPair, IdentityError> {
        let access_token = self.create_access_token(email)?;
        let refresh_token = generate_refresh_token();
        let now = Utc::now();
        let expires_at = now + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);

        let mut tokens = self.refresh_tokens.write().await;
        // Spent entries can never be redeemed again
        tokens.retain(|_, data| !data.revoked && data.expires_at > now.timestamp());
        tokens.insert(
            hash_refresh_token(&refresh_token),
            RefreshTokenData {
                email: email.to_string(),
                expires_at: expires_at.timestamp(),
                revoked: false,
            },
        );
        drop(tokens);

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a live refresh token for a new pair. The old token is revoked.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, IdentityError> {
        let token_hash = hash_refresh_token(refresh_token);
        let now = Utc::now().timestamp();

        let email = {
            let mut tokens = self.refresh_tokens.write().await;
            match tokens.get_mut(&token_hash) {
                Some(data) if !data.revoked && data.expires_at > now => {
                    data.revoked = true;
                    data.email.clone()
                }
                _ => return Err(IdentityError::InvalidToken),
            }
        };

        self.issue_tokens(&email).await
    }

    /// Revoke one refresh token and, when an access token is valid, every
    /// token of its owner. Always succeeds.
    pub async fn logout(&self, refresh_token: Option<&str>, access_token: Option<&str>) {
        let mut tokens = self.refresh_tokens.write().await;

        if let Some(token) = refresh_token {
            if let Some(data) = tokens.get_mut(&hash_refresh_token(token)) {
                data.revoked = true;
            }
        }

        if let Some(claims) = access_token.and_then(|t| self.verify_access_token(t).ok()) {
            for data in tokens.values_mut() {
                if data.email.eq_ignore_ascii_case(&claims.email) {
                    data.revoked = true;
                }
            }
        }
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), IdentityError> {
        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(IdentityError::WeakPassword);
        }
        if new_password != confirm_password {
            return Err(IdentityError::PasswordMismatch);
        }

        let credential = self
            .credential()
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;
        if !verify_password(current_password, &credential.password_hash).await? {
            return Err(IdentityError::WrongCurrentPassword);
        }

        let new_password = new_password.to_string();
        let password_hash =
            tokio::task::spawn_blocking(move || hash(&new_password, DEFAULT_COST)).await??;

        let record = AdminCredential {
            email: credential.email.clone(),
            password_hash,
            updated_at: Utc::now(),
        };
        self.documents
            .insert(
                <AdminCredential as Record>::COLLECTION,
                Some(AdminCredential::DOCUMENT_ID),
                serde_json::to_value(&record).map_err(StoreError::from)?,
            )
            .await?;

        for data in self.refresh_tokens.write().await.values_mut() {
            data.revoked = true;
        }

        tracing::info!("Admin password changed for: {}", credential.email);
        Ok(())
    }
}
