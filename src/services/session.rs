//! Session management.
//!
//! ARCHITECTURE
//! ============
//! HTTP auth uses opaque random session tokens stored in `sessions`. Validating
//! a token also loads the two account facts the tier gate needs, so handlers
//! can gate writes without a second query.

use std::fmt::Write;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::tier::{SubscriptionStatus, TierAccount};

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Account row returned from session validation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionAccount {
    pub id: Uuid,
    pub email: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    pub subscription_status: SubscriptionStatus,
}

impl TierAccount for SessionAccount {
    fn created_at(&self) -> Option<OffsetDateTime> {
        self.created_at
    }

    fn subscription_status(&self) -> SubscriptionStatus {
        self.subscription_status
    }
}

/// Create a session for the given account, returning the token.
pub async fn create_session(pool: &PgPool, account_id: Uuid, ttl: Duration) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query(
        "INSERT INTO sessions (token, account_id, expires_at)
         VALUES ($1, $2, now() + make_interval(secs => $3))",
    )
    .bind(&token)
    .bind(account_id)
    .bind(ttl.as_secs_f64())
    .execute(pool)
    .await?;
    Ok(token)
}

/// Validate a session token and return the associated account.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<SessionAccount>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT a.id, a.email, a.created_at, a.subscription_status
          FROM sessions s
          JOIN accounts a ON a.id = s.account_id
          WHERE s.token = $1 AND s.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| {
        let status: Option<String> = r.get("subscription_status");
        SessionAccount {
            id: r.get("id"),
            email: r.get("email"),
            created_at: r.get("created_at"),
            subscription_status: SubscriptionStatus::from_db(status.as_deref()),
        }
    }))
}

/// Delete a session by token.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
