//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the JSON API under `/api` plus `/healthz`. Every matched `/api`
//! route first passes the generic per-client throttle; auth endpoints then
//! apply their own, tighter budgets inside the handlers.

pub mod auth;
pub mod portfolios;
pub mod watchlist;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::client_ip::{client_ip, throttle_key};
use crate::error::ApiError;
use crate::state::AppState;
use crate::throttle::ThrottleConfig;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/password-reset/request", post(auth::request_password_reset))
        .route("/api/auth/password-reset/confirm", post(auth::confirm_password_reset))
        .route(
            "/api/portfolios",
            get(portfolios::list_portfolios).post(portfolios::create_portfolio),
        )
        .route("/api/portfolios/{id}", delete(portfolios::delete_portfolio))
        .route(
            "/api/portfolios/{id}/positions",
            get(portfolios::list_positions).post(portfolios::add_position),
        )
        .route("/api/portfolios/{id}/positions/{symbol}", delete(portfolios::remove_position))
        .route("/api/watchlist", get(watchlist::list_symbols).post(watchlist::add_symbol))
        .route("/api/watchlist/{symbol}", delete(watchlist::remove_symbol))
        .route_layer(middleware::from_fn_with_state(state.clone(), api_throttle));

    Router::new()
        .merge(api)
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Count one attempt for `scope` against the caller's IP.
///
/// # Errors
///
/// Returns a 429 `ApiError` carrying the retry hint when the budget is spent.
pub(crate) fn enforce_throttle(
    state: &AppState,
    headers: &HeaderMap,
    scope: &str,
    config: ThrottleConfig,
) -> Result<(), ApiError> {
    let ip = client_ip(headers);
    let decision = state.throttle.check(&throttle_key(scope, &ip), config);
    if decision.allowed {
        return Ok(());
    }
    warn!(scope, %ip, retry_after = decision.reset_in_secs, "request throttled");
    Err(ApiError::rate_limited(decision))
}

async fn api_throttle(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Err(err) = enforce_throttle(&state, request.headers(), "api", ThrottleConfig::API) {
        return err.into_response();
    }
    next.run(request).await
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
