//! Portfolio service: portfolios and their stock positions.
//!
//! DESIGN
//! ======
//! Portfolios belong to one account; every query filters on `account_id`, so
//! a foreign portfolio looks exactly like a missing one.
//!
//! Adding shares of a symbol already held folds the lot into the existing row
//! at a weighted-average cost. That never grows the position count, so only
//! brand-new symbols are checked against the tier cap.
//!
//! TRADE-OFFS
//! ==========
//! Caps are checked with a count query before the insert. Two concurrent
//! inserts can both pass at `limit - 1`; the caps are soft product limits and
//! one extra row is tolerated. Two concurrent buys of the same new symbol do
//! not fail: the insert yields on conflict and the loser merges instead.

use serde::Serialize;
use sqlx::{PgPool, Postgres, Row, Transaction};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::session::SessionAccount;
use crate::cost_basis::{CostBasisError, Lot, merge_lot};
use crate::error::ErrorCode;
use crate::tier::{LimitReached, LimitedResource, check_limit};

const DEFAULT_PORTFOLIO_NAME: &str = "My Portfolio";
const MAX_PORTFOLIO_NAME_LEN: usize = 64;
const MAX_SYMBOL_LEN: usize = 10;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PortfolioError {
    #[error("portfolio not found: {0}")]
    NotFound(Uuid),
    #[error("position not found: {0}")]
    PositionNotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    LimitReached(#[from] LimitReached),
    #[error(transparent)]
    CostBasis(#[from] CostBasisError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for PortfolioError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PORTFOLIO_NOT_FOUND",
            Self::PositionNotFound(_) => "E_POSITION_NOT_FOUND",
            Self::InvalidInput(_) | Self::CostBasis(_) => "E_INVALID_INPUT",
            Self::LimitReached(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioRow {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionRow {
    pub symbol: String,
    pub shares: f64,
    pub avg_cost: f64,
}

impl PositionRow {
    #[must_use]
    pub fn lot(&self) -> Lot {
        Lot { shares: self.shares, avg_cost: self.avg_cost }
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Upper-case ticker of 1-10 chars from `[A-Z0-9.-]`.
#[must_use]
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_ascii_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-');
    valid.then_some(symbol)
}

/// Trimmed name, defaulting when blank.
///
/// # Errors
///
/// Returns `InvalidInput` when the name is too long.
pub fn normalize_portfolio_name(raw: Option<&str>) -> Result<String, PortfolioError> {
    let name = raw.map(str::trim).filter(|n| !n.is_empty()).unwrap_or(DEFAULT_PORTFOLIO_NAME);
    if name.chars().count() > MAX_PORTFOLIO_NAME_LEN {
        return Err(PortfolioError::InvalidInput(format!(
            "portfolio name exceeds {MAX_PORTFOLIO_NAME_LEN} characters"
        )));
    }
    Ok(name.to_owned())
}

pub(crate) fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

// =============================================================================
// PORTFOLIOS
// =============================================================================

/// Create a portfolio, subject to the account's portfolio cap.
pub async fn create_portfolio(
    pool: &PgPool,
    account: &SessionAccount,
    name: Option<&str>,
) -> Result<PortfolioRow, PortfolioError> {
    let name = normalize_portfolio_name(name)?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM portfolios WHERE account_id = $1")
        .bind(account.id)
        .fetch_one(pool)
        .await?;
    check_limit(account, LimitedResource::Portfolios, count_to_u64(count))?;

    let row = sqlx::query(
        r"INSERT INTO portfolios (id, account_id, name, created_at)
          VALUES ($1, $2, $3, now())
          RETURNING id, name, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(account.id)
    .bind(&name)
    .fetch_one(pool)
    .await?;

    let portfolio = PortfolioRow { id: row.get("id"), name: row.get("name"), created_at: row.get("created_at") };
    info!(account_id = %account.id, portfolio_id = %portfolio.id, "portfolio created");
    Ok(portfolio)
}

/// List the account's portfolios, oldest first.
pub async fn list_portfolios(pool: &PgPool, account_id: Uuid) -> Result<Vec<PortfolioRow>, PortfolioError> {
    let rows = sqlx::query_as::<_, (Uuid, String, OffsetDateTime)>(
        "SELECT id, name, created_at FROM portfolios WHERE account_id = $1 ORDER BY created_at",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name, created_at)| PortfolioRow { id, name, created_at })
        .collect())
}

/// Delete a portfolio and its positions.
pub async fn delete_portfolio(pool: &PgPool, account_id: Uuid, portfolio_id: Uuid) -> Result<(), PortfolioError> {
    let mut tx = pool.begin().await?;
    let owned = sqlx::query("SELECT 1 FROM portfolios WHERE id = $1 AND account_id = $2 FOR UPDATE")
        .bind(portfolio_id)
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;
    if owned.is_none() {
        return Err(PortfolioError::NotFound(portfolio_id));
    }

    sqlx::query("DELETE FROM positions WHERE portfolio_id = $1")
        .bind(portfolio_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM portfolios WHERE id = $1")
        .bind(portfolio_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(account_id = %account_id, portfolio_id = %portfolio_id, "portfolio deleted");
    Ok(())
}

async fn ensure_owner(pool: &PgPool, account_id: Uuid, portfolio_id: Uuid) -> Result<(), PortfolioError> {
    let owned = sqlx::query("SELECT 1 FROM portfolios WHERE id = $1 AND account_id = $2")
        .bind(portfolio_id)
        .bind(account_id)
        .fetch_optional(pool)
        .await?;
    owned.map(|_| ()).ok_or(PortfolioError::NotFound(portfolio_id))
}

// =============================================================================
// POSITIONS
// =============================================================================

async fn lock_held(
    tx: &mut Transaction<'_, Postgres>,
    portfolio_id: Uuid,
    symbol: &str,
) -> Result<Option<Lot>, PortfolioError> {
    let held = sqlx::query_as::<_, (f64, f64)>(
        "SELECT shares, avg_cost FROM positions WHERE portfolio_id = $1 AND symbol = $2 FOR UPDATE",
    )
    .bind(portfolio_id)
    .bind(symbol)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(held.map(|(shares, avg_cost)| Lot { shares, avg_cost }))
}

async fn merge_into(
    tx: &mut Transaction<'_, Postgres>,
    portfolio_id: Uuid,
    symbol: &str,
    held: Lot,
    lot: Lot,
) -> Result<Lot, PortfolioError> {
    let merged = merge_lot(held, lot)?;
    sqlx::query("UPDATE positions SET shares = $1, avg_cost = $2 WHERE portfolio_id = $3 AND symbol = $4")
        .bind(merged.shares)
        .bind(merged.avg_cost)
        .bind(portfolio_id)
        .bind(symbol)
        .execute(&mut **tx)
        .await?;
    Ok(merged)
}

/// Buy `shares` of `symbol` at `price` into a portfolio.
///
/// An existing position is merged at weighted-average cost; a new symbol is
/// subject to the per-portfolio position cap. When a concurrent buy inserts
/// the same new symbol first, this buy merges into that row.
pub async fn add_position(
    pool: &PgPool,
    account: &SessionAccount,
    portfolio_id: Uuid,
    symbol: &str,
    shares: f64,
    price: f64,
) -> Result<PositionRow, PortfolioError> {
    let symbol = normalize_symbol(symbol).ok_or_else(|| PortfolioError::InvalidInput(format!("invalid symbol: {symbol}")))?;
    let lot = Lot::purchase(shares, price)?;
    ensure_owner(pool, account.id, portfolio_id).await?;

    let mut tx = pool.begin().await?;
    let merged = if let Some(held) = lock_held(&mut tx, portfolio_id, &symbol).await? {
        merge_into(&mut tx, portfolio_id, &symbol, held, lot).await?
    } else {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM positions WHERE portfolio_id = $1")
            .bind(portfolio_id)
            .fetch_one(&mut *tx)
            .await?;
        check_limit(account, LimitedResource::Positions, count_to_u64(count))?;

        let inserted = sqlx::query(
            r"INSERT INTO positions (id, portfolio_id, symbol, shares, avg_cost)
              VALUES ($1, $2, $3, $4, $5)
              ON CONFLICT (portfolio_id, symbol) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(portfolio_id)
        .bind(&symbol)
        .bind(lot.shares)
        .bind(lot.avg_cost)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 1 {
            lot
        } else {
            let held = lock_held(&mut tx, portfolio_id, &symbol)
                .await?
                .ok_or_else(|| PortfolioError::PositionNotFound(symbol.clone()))?;
            merge_into(&mut tx, portfolio_id, &symbol, held, lot).await?
        }
    };
    tx.commit().await?;

    info!(portfolio_id = %portfolio_id, %symbol, shares = merged.shares, "position updated");
    Ok(PositionRow { symbol, shares: merged.shares, avg_cost: merged.avg_cost })
}

/// List positions of one of the account's portfolios.
pub async fn list_positions(pool: &PgPool, account_id: Uuid, portfolio_id: Uuid) -> Result<Vec<PositionRow>, PortfolioError> {
    ensure_owner(pool, account_id, portfolio_id).await?;
    let rows = sqlx::query_as::<_, (String, f64, f64)>(
        "SELECT symbol, shares, avg_cost FROM positions WHERE portfolio_id = $1 ORDER BY symbol",
    )
    .bind(portfolio_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(symbol, shares, avg_cost)| PositionRow { symbol, shares, avg_cost })
        .collect())
}

/// Remove a whole position.
pub async fn remove_position(
    pool: &PgPool,
    account_id: Uuid,
    portfolio_id: Uuid,
    symbol: &str,
) -> Result<(), PortfolioError> {
    let symbol = normalize_symbol(symbol).ok_or_else(|| PortfolioError::PositionNotFound(symbol.to_owned()))?;
    ensure_owner(pool, account_id, portfolio_id).await?;

    let result = sqlx::query("DELETE FROM positions WHERE portfolio_id = $1 AND symbol = $2")
        .bind(portfolio_id)
        .bind(&symbol)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(PortfolioError::PositionNotFound(symbol));
    }
    Ok(())
}

#[cfg(test)]
#[path = "portfolio_test.rs"]
mod tests;
