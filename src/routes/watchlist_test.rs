use super::*;
use crate::routes::app;
use crate::state::test_helpers::{request, send, test_app_state};
use crate::tier::{LimitReached, LimitedResource};

#[test]
fn watchlist_error_statuses() {
    let limit = watchlist_error(WatchlistError::LimitReached(LimitReached {
        resource: LimitedResource::WatchlistSymbols,
        limit: 20,
    }));
    assert_eq!(limit.status, StatusCode::FORBIDDEN);
    assert_eq!(limit.code(), "E_LIMIT_REACHED");

    assert_eq!(watchlist_error(WatchlistError::InvalidSymbol("$".into())).status, StatusCode::BAD_REQUEST);
    assert_eq!(watchlist_error(WatchlistError::NotFound("SPY".into())).status, StatusCode::NOT_FOUND);
    assert_eq!(
        watchlist_error(WatchlistError::Database(sqlx::Error::PoolTimedOut)).status,
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn watchlist_routes_require_session() {
    let (state, _clock) = test_app_state();
    let router = app(state);

    let (list, _, _) = send(&router, request("GET", "/api/watchlist", "192.0.2.60", None)).await;
    let (add, _, _) = send(
        &router,
        request("POST", "/api/watchlist", "192.0.2.60", Some(serde_json::json!({ "symbol": "SPY" }))),
    )
    .await;
    let (remove, _, _) = send(&router, request("DELETE", "/api/watchlist/SPY", "192.0.2.60", None)).await;
    assert_eq!(list, StatusCode::UNAUTHORIZED);
    assert_eq!(add, StatusCode::UNAUTHORIZED);
    assert_eq!(remove, StatusCode::UNAUTHORIZED);
}
