//! Watchlist routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::error;

use crate::error::ApiError;
use crate::routes::auth::AuthUser;
use crate::services::watchlist::{self, WatchlistEntry, WatchlistError};
use crate::state::AppState;

pub(crate) fn watchlist_error(err: WatchlistError) -> ApiError {
    match err {
        WatchlistError::LimitReached(limit) => ApiError::limit_reached(limit),
        WatchlistError::InvalidSymbol(_) => ApiError::from_code(StatusCode::BAD_REQUEST, &err),
        WatchlistError::NotFound(_) => ApiError::from_code(StatusCode::NOT_FOUND, &err),
        WatchlistError::Database(e) => {
            error!(error = %e, "watchlist query failed");
            ApiError::internal()
        }
    }
}

#[derive(Deserialize)]
pub struct AddSymbolBody {
    pub symbol: String,
}

/// `GET /api/watchlist`
pub async fn list_symbols(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<WatchlistEntry>>, ApiError> {
    let entries = watchlist::list_symbols(&state.pool, auth.account.id)
        .await
        .map_err(watchlist_error)?;
    Ok(Json(entries))
}

/// `POST /api/watchlist`: follow a symbol (tier-capped, idempotent).
pub async fn add_symbol(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Json(body), _): WithRejection<Json<AddSymbolBody>, ApiError>,
) -> Result<Json<WatchlistEntry>, ApiError> {
    let entry = watchlist::add_symbol(&state.pool, &auth.account, &body.symbol)
        .await
        .map_err(watchlist_error)?;
    Ok(Json(entry))
}

/// `DELETE /api/watchlist/:symbol`
pub async fn remove_symbol(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Path(symbol), _): WithRejection<Path<String>, ApiError>,
) -> Result<StatusCode, ApiError> {
    watchlist::remove_symbol(&state.pool, auth.account.id, &symbol)
        .await
        .map_err(watchlist_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "watchlist_test.rs"]
mod tests;
