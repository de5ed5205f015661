//! Watchlist service: symbols an account follows without holding them.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::portfolio::{count_to_u64, normalize_symbol};
use super::session::SessionAccount;
use crate::error::ErrorCode;
use crate::tier::{LimitReached, LimitedResource, check_limit};

#[derive(Debug, thiserror::Error)]
pub enum WatchlistError {
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),
    #[error("symbol not on watchlist: {0}")]
    NotFound(String),
    #[error(transparent)]
    LimitReached(#[from] LimitReached),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for WatchlistError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidSymbol(_) => "E_INVALID_INPUT",
            Self::NotFound(_) => "E_SYMBOL_NOT_FOUND",
            Self::LimitReached(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchlistEntry {
    pub symbol: String,
    #[serde(with = "time::serde::rfc3339")]
    pub added_at: OffsetDateTime,
}

/// Add a symbol. Re-adding a watched symbol is a no-op and never hits the cap.
pub async fn add_symbol(pool: &PgPool, account: &SessionAccount, symbol: &str) -> Result<WatchlistEntry, WatchlistError> {
    let symbol = normalize_symbol(symbol).ok_or_else(|| WatchlistError::InvalidSymbol(symbol.to_owned()))?;

    let existing = sqlx::query_scalar::<_, OffsetDateTime>(
        "SELECT created_at FROM watchlist WHERE account_id = $1 AND symbol = $2",
    )
    .bind(account.id)
    .bind(&symbol)
    .fetch_optional(pool)
    .await?;
    if let Some(added_at) = existing {
        return Ok(WatchlistEntry { symbol, added_at });
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM watchlist WHERE account_id = $1")
        .bind(account.id)
        .fetch_one(pool)
        .await?;
    check_limit(account, LimitedResource::WatchlistSymbols, count_to_u64(count))?;

    let added_at = sqlx::query_scalar::<_, OffsetDateTime>(
        r"INSERT INTO watchlist (account_id, symbol, created_at)
          VALUES ($1, $2, now())
          ON CONFLICT (account_id, symbol) DO UPDATE SET created_at = watchlist.created_at
          RETURNING created_at",
    )
    .bind(account.id)
    .bind(&symbol)
    .fetch_one(pool)
    .await?;

    info!(account_id = %account.id, %symbol, "watchlist symbol added");
    Ok(WatchlistEntry { symbol, added_at })
}

pub async fn list_symbols(pool: &PgPool, account_id: Uuid) -> Result<Vec<WatchlistEntry>, WatchlistError> {
    let rows = sqlx::query_as::<_, (String, OffsetDateTime)>(
        "SELECT symbol, created_at FROM watchlist WHERE account_id = $1 ORDER BY created_at, symbol",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(symbol, added_at)| WatchlistEntry { symbol, added_at })
        .collect())
}

pub async fn remove_symbol(pool: &PgPool, account_id: Uuid, symbol: &str) -> Result<(), WatchlistError> {
    let symbol = normalize_symbol(symbol).ok_or_else(|| WatchlistError::NotFound(symbol.to_owned()))?;
    let result = sqlx::query("DELETE FROM watchlist WHERE account_id = $1 AND symbol = $2")
        .bind(account_id)
        .bind(&symbol)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(WatchlistError::NotFound(symbol));
    }
    Ok(())
}

#[cfg(test)]
#[path = "watchlist_test.rs"]
mod tests;
