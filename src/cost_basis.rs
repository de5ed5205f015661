//! Weighted-average cost basis for stock positions.

use serde::{Deserialize, Serialize};

/// Shares held at a single average price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub shares: f64,
    pub avg_cost: f64,
}

impl Lot {
    /// Total paid for the lot.
    #[must_use]
    pub fn cost_total(&self) -> f64 {
        self.shares * self.avg_cost
    }

    /// Validate a lot being bought.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLot` unless shares are finite and positive and the
    /// price is finite and non-negative.
    pub fn purchase(shares: f64, price: f64) -> Result<Self, CostBasisError> {
        if !shares.is_finite() || shares <= 0.0 {
            return Err(CostBasisError::InvalidLot("shares must be a positive number".into()));
        }
        if !price.is_finite() || price < 0.0 {
            return Err(CostBasisError::InvalidLot("price must be a non-negative number".into()));
        }
        Ok(Self { shares, avg_cost: price })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CostBasisError {
    #[error("invalid lot: {0}")]
    InvalidLot(String),
}

/// Fold `added` into `existing`: shares add, the average cost is weighted by
/// share count.
///
/// # Errors
///
/// Returns `InvalidLot` if `added` is not a valid purchase.
pub fn merge_lot(existing: Lot, added: Lot) -> Result<Lot, CostBasisError> {
    let added = Lot::purchase(added.shares, added.avg_cost)?;
    let shares = existing.shares + added.shares;
    if shares <= 0.0 {
        return Ok(added);
    }
    let avg_cost = (existing.cost_total() + added.cost_total()) / shares;
    Ok(Lot { shares, avg_cost })
}

#[cfg(test)]
#[path = "cost_basis_test.rs"]
mod tests;
