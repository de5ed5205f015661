//! Portfolio and position routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::auth::AuthUser;
use crate::services::portfolio::{self, PortfolioError, PortfolioRow, PositionRow};
use crate::state::AppState;

pub(crate) fn portfolio_error(err: PortfolioError) -> ApiError {
    match err {
        PortfolioError::LimitReached(limit) => ApiError::limit_reached(limit),
        PortfolioError::NotFound(_) | PortfolioError::PositionNotFound(_) => {
            ApiError::from_code(StatusCode::NOT_FOUND, &err)
        }
        PortfolioError::InvalidInput(_) | PortfolioError::CostBasis(_) => {
            ApiError::from_code(StatusCode::BAD_REQUEST, &err)
        }
        PortfolioError::Database(e) => {
            error!(error = %e, "portfolio query failed");
            ApiError::internal()
        }
    }
}

#[derive(Serialize)]
pub struct PositionResponse {
    pub symbol: String,
    pub shares: f64,
    pub avg_cost: f64,
    pub cost_basis: f64,
}

fn to_response(row: PositionRow) -> PositionResponse {
    let cost_basis = row.lot().cost_total();
    PositionResponse { symbol: row.symbol, shares: row.shares, avg_cost: row.avg_cost, cost_basis }
}

#[derive(Deserialize)]
pub struct CreatePortfolioBody {
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct AddPositionBody {
    pub symbol: String,
    pub shares: f64,
    pub price: f64,
}

/// `GET /api/portfolios`: list the caller's portfolios.
pub async fn list_portfolios(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<PortfolioRow>>, ApiError> {
    let rows = portfolio::list_portfolios(&state.pool, auth.account.id)
        .await
        .map_err(portfolio_error)?;
    Ok(Json(rows))
}

/// `POST /api/portfolios`: create a portfolio (tier-capped).
pub async fn create_portfolio(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Json(body), _): WithRejection<Json<CreatePortfolioBody>, ApiError>,
) -> Result<(StatusCode, Json<PortfolioRow>), ApiError> {
    let row = portfolio::create_portfolio(&state.pool, &auth.account, body.name.as_deref())
        .await
        .map_err(portfolio_error)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `DELETE /api/portfolios/:id`
pub async fn delete_portfolio(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Path(portfolio_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<StatusCode, ApiError> {
    portfolio::delete_portfolio(&state.pool, auth.account.id, portfolio_id)
        .await
        .map_err(portfolio_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/portfolios/:id/positions`
pub async fn list_positions(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Path(portfolio_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<Vec<PositionResponse>>, ApiError> {
    let rows = portfolio::list_positions(&state.pool, auth.account.id, portfolio_id)
        .await
        .map_err(portfolio_error)?;
    Ok(Json(rows.into_iter().map(to_response).collect()))
}

/// `POST /api/portfolios/:id/positions`: buy into a position.
///
/// Buying a held symbol merges at weighted-average cost; a new symbol is
/// tier-capped.
pub async fn add_position(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Path(portfolio_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(body), _): WithRejection<Json<AddPositionBody>, ApiError>,
) -> Result<(StatusCode, Json<PositionResponse>), ApiError> {
    let row = portfolio::add_position(&state.pool, &auth.account, portfolio_id, &body.symbol, body.shares, body.price)
        .await
        .map_err(portfolio_error)?;
    Ok((StatusCode::CREATED, Json(to_response(row))))
}

/// `DELETE /api/portfolios/:id/positions/:symbol`
pub async fn remove_position(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Path((portfolio_id, symbol)), _): WithRejection<Path<(Uuid, String)>, ApiError>,
) -> Result<StatusCode, ApiError> {
    portfolio::remove_position(&state.pool, auth.account.id, portfolio_id, &symbol)
        .await
        .map_err(portfolio_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "portfolios_test.rs"]
mod tests;
