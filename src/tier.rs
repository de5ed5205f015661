//! Access tier gate: decides whether usage caps apply to an account.
//!
//! DESIGN
//! ======
//! Enforcement is a pure function of the account's creation date and
//! subscription status. Accounts created before `EFFECTIVE_DATE` are
//! grandfathered; newer accounts are capped only while `active` or
//! `trialing`. The gate answers "are limits on for this account", callers
//! count their own rows and compare against the exported constants (or use
//! `check_limit`).
//!
//! A missing creation date is treated as exempt.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::datetime;

/// Accounts created at or after this instant are subject to limits.
pub const EFFECTIVE_DATE: OffsetDateTime = datetime!(2025-12-24 00:00:00 UTC);

pub const MAX_PORTFOLIOS: u32 = 3;
pub const MAX_POSITIONS_PER_PORTFOLIO: u32 = 10;
pub const MAX_WATCHLIST_SYMBOLS: u32 = 20;

// =============================================================================
// SUBSCRIPTION STATUS
// =============================================================================

/// Billing state mirrored from the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    None,
}

impl SubscriptionStatus {
    /// Parse the persisted column. NULL and unrecognized values mean no plan.
    #[must_use]
    pub fn from_db(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("active") => Self::Active,
            Some("trialing") => Self::Trialing,
            Some("past_due") => Self::PastDue,
            Some("canceled" | "cancelled") => Self::Canceled,
            _ => Self::None,
        }
    }

    fn is_capped_plan(self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

// =============================================================================
// GATE
// =============================================================================

/// The two account facts the gate looks at.
pub trait TierAccount {
    fn created_at(&self) -> Option<OffsetDateTime>;
    fn subscription_status(&self) -> SubscriptionStatus;
}

/// True iff the account was created on/after `EFFECTIVE_DATE` and is on an
/// active or trialing plan.
#[must_use]
pub fn should_enforce_limits(account: &impl TierAccount) -> bool {
    let Some(created_at) = account.created_at() else {
        return false;
    };
    created_at >= EFFECTIVE_DATE && account.subscription_status().is_capped_plan()
}

// =============================================================================
// LIMITS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitedResource {
    Portfolios,
    Positions,
    WatchlistSymbols,
}

impl LimitedResource {
    #[must_use]
    pub fn limit(self) -> u32 {
        match self {
            Self::Portfolios => MAX_PORTFOLIOS,
            Self::Positions => MAX_POSITIONS_PER_PORTFOLIO,
            Self::WatchlistSymbols => MAX_WATCHLIST_SYMBOLS,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Portfolios => "portfolios",
            Self::Positions => "positions",
            Self::WatchlistSymbols => "watchlist_symbols",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{} limit reached ({limit})", .resource.as_str())]
pub struct LimitReached {
    pub resource: LimitedResource,
    pub limit: u32,
}

/// Reject adding one more `resource` when limits apply and `current_count`
/// already meets the cap.
///
/// # Errors
///
/// Returns `LimitReached` when the account is capped and at its limit.
pub fn check_limit(account: &impl TierAccount, resource: LimitedResource, current_count: u64) -> Result<(), LimitReached> {
    let limit = resource.limit();
    if should_enforce_limits(account) && current_count >= u64::from(limit) {
        return Err(LimitReached { resource, limit });
    }
    Ok(())
}

#[cfg(test)]
#[path = "tier_test.rs"]
mod tests;
