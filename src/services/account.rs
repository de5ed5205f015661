//! Account service: registration, password login, password reset.
//!
//! DESIGN
//! ======
//! Passwords are stored as argon2id PHC strings. Hashing runs on the blocking
//! pool so a burst of logins cannot stall the async workers.
//!
//! Reset tokens are random, returned once to the caller for delivery, and
//! stored only as SHA-256 hashes. Consuming a token is a single
//! `UPDATE ... RETURNING`, so a token works at most once. A successful reset
//! also drops every session of the account.

use std::time::Duration;

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::session::{bytes_to_hex, generate_token};
use crate::error::ErrorCode;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("password must be 8-128 characters")]
    WeakPassword,
    #[error("email already registered")]
    EmailTaken,
    #[error("incorrect email or password")]
    InvalidCredentials,
    #[error("reset token is invalid or expired")]
    InvalidResetToken,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl ErrorCode for AccountError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::WeakPassword => "E_WEAK_PASSWORD",
            Self::EmailTaken => "E_EMAIL_TAKEN",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::InvalidResetToken => "E_INVALID_RESET_TOKEN",
            Self::Hashing(_) => "E_INTERNAL",
            Self::Db(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Db(_))
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

/// # Errors
///
/// Returns `WeakPassword` when the length is out of bounds.
pub fn validate_password(password: &str) -> Result<(), AccountError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(AccountError::WeakPassword);
    }
    Ok(())
}

#[must_use]
pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

// =============================================================================
// PASSWORD HASHING
// =============================================================================

fn hash_password_blocking(password: &str) -> Result<String, AccountError> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AccountError::Hashing(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::Hashing(e.to_string()))
}

fn verify_password_blocking(password: &str, stored: &str) -> Result<bool, AccountError> {
    let parsed = PasswordHash::new(stored).map_err(|e| AccountError::Hashing(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Hash a password to an argon2id PHC string off the async runtime.
pub async fn hash_password(password: String) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(|e| AccountError::Hashing(e.to_string()))?
}

/// Check a password against a stored PHC string off the async runtime.
pub async fn verify_password(password: String, stored: String) -> Result<bool, AccountError> {
    tokio::task::spawn_blocking(move || verify_password_blocking(&password, &stored))
        .await
        .map_err(|e| AccountError::Hashing(e.to_string()))?
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Create an account. Returns the new account ID.
pub async fn register(pool: &PgPool, email: &str, password: &str) -> Result<Uuid, AccountError> {
    let email = normalize_email(email).ok_or(AccountError::InvalidEmail)?;
    validate_password(password)?;
    let password_hash = hash_password(password.to_owned()).await?;

    let row = sqlx::query(
        r"INSERT INTO accounts (id, email, password_hash, created_at)
          VALUES ($1, $2, $3, now())
          ON CONFLICT (email) DO NOTHING
          RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(password_hash)
    .fetch_optional(pool)
    .await?;

    let id: Uuid = row.ok_or(AccountError::EmailTaken)?.get("id");
    info!(account_id = %id, "account registered");
    Ok(id)
}

/// Check email + password. Returns the account ID on success.
pub async fn authenticate(pool: &PgPool, email: &str, password: &str) -> Result<Uuid, AccountError> {
    let email = normalize_email(email).ok_or(AccountError::InvalidCredentials)?;

    let row = sqlx::query("SELECT id, password_hash FROM accounts WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?
        .ok_or(AccountError::InvalidCredentials)?;

    let stored: String = row.get("password_hash");
    if !verify_password(password.to_owned(), stored).await? {
        return Err(AccountError::InvalidCredentials);
    }
    Ok(row.get("id"))
}

// =============================================================================
// PASSWORD RESET
// =============================================================================

/// Receives freshly issued reset tokens for out-of-band delivery.
pub trait ResetTokenSink: Send + Sync {
    fn deliver(&self, email: &str, token: &str);
}

/// Records that a token is waiting for delivery. Never logs the token.
pub struct LogResetSink;

impl ResetTokenSink for LogResetSink {
    fn deliver(&self, _email: &str, _token: &str) {
        info!("password reset token ready for delivery");
    }
}

/// A freshly issued reset token and the normalized address it belongs to.
#[derive(Debug)]
pub struct ResetIssued {
    pub email: String,
    pub token: String,
}

/// Issue a reset token for `email`. Returns `None` for unknown addresses so
/// callers can respond identically either way.
pub async fn request_password_reset(
    pool: &PgPool,
    email: &str,
    ttl: Duration,
) -> Result<Option<ResetIssued>, AccountError> {
    let Some(email) = normalize_email(email) else {
        return Ok(None);
    };

    let Some(row) = sqlx::query("SELECT id FROM accounts WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };
    let account_id: Uuid = row.get("id");

    sqlx::query("DELETE FROM password_resets WHERE account_id = $1 AND consumed_at IS NULL")
        .bind(account_id)
        .execute(pool)
        .await?;

    let token = generate_token();
    sqlx::query(
        r"INSERT INTO password_resets (id, account_id, token_hash, expires_at)
          VALUES ($1, $2, $3, now() + make_interval(secs => $4))",
    )
    .bind(Uuid::new_v4())
    .bind(account_id)
    .bind(hash_reset_token(&token))
    .bind(ttl.as_secs_f64())
    .execute(pool)
    .await?;

    info!(account_id = %account_id, "password reset issued");
    Ok(Some(ResetIssued { email, token }))
}

/// Consume a reset token and set a new password. Returns the account ID.
pub async fn reset_password(pool: &PgPool, token: &str, new_password: &str) -> Result<Uuid, AccountError> {
    validate_password(new_password)?;
    let token = token.trim();
    if token.is_empty() {
        return Err(AccountError::InvalidResetToken);
    }
    let password_hash = hash_password(new_password.to_owned()).await?;

    let mut tx = pool.begin().await?;
    let account_id: Uuid = sqlx::query(
        r"UPDATE password_resets
          SET consumed_at = now()
          WHERE token_hash = $1 AND consumed_at IS NULL AND expires_at > now()
          RETURNING account_id",
    )
    .bind(hash_reset_token(token))
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AccountError::InvalidResetToken)?
    .get("account_id");

    sqlx::query("UPDATE accounts SET password_hash = $1 WHERE id = $2")
        .bind(password_hash)
        .bind(account_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM sessions WHERE account_id = $1")
        .bind(account_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(account_id = %account_id, "password reset completed");
    Ok(account_id)
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;
