//! Auth routes: registration, password login, sessions, password reset.
//!
//! Each credential endpoint spends from its own per-IP throttle budget before
//! doing any work, so a flood of guesses is cut off ahead of argon2 and the
//! database. Bodies are extracted as `Result` so a malformed one still spends
//! budget before it is rejected.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRef, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;
use tracing::{error, warn};
use uuid::Uuid;

use super::enforce_throttle;
use crate::error::ApiError;
use crate::services::account::{self, AccountError};
use crate::services::session;
use crate::state::AppState;
use crate::throttle::ThrottleConfig;

pub(crate) const COOKIE_NAME: &str = "session_token";

pub(crate) fn account_error(err: AccountError) -> ApiError {
    let status = match &err {
        AccountError::InvalidEmail | AccountError::WeakPassword | AccountError::InvalidResetToken => {
            StatusCode::BAD_REQUEST
        }
        AccountError::EmailTaken => StatusCode::CONFLICT,
        AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AccountError::Hashing(_) | AccountError::Db(_) => {
            error!(error = %err, "account operation failed");
            return ApiError::internal();
        }
    };
    ApiError::from_code(status, &err)
}

pub(crate) fn session_cookie(token: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

async fn start_session(state: &AppState, account_id: Uuid) -> Result<CookieJar, ApiError> {
    let token = session::create_session(&state.pool, account_id, state.config.session_ttl)
        .await
        .map_err(|e| {
            error!(error = %e, "session creation failed");
            ApiError::internal()
        })?;
    let max_age = Duration::try_from(state.config.session_ttl).unwrap_or(Duration::MAX);
    Ok(CookieJar::new().add(session_cookie(token, state.config.cookie_secure, max_age)))
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated account extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub account: session::SessionAccount,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::unauthorized());
        }

        let app_state = AppState::from_ref(state);
        let account = session::validate_session(&app_state.pool, token)
            .await
            .map_err(|e| {
                error!(error = %e, "session lookup failed");
                ApiError::internal()
            })?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(Self { account, token: token.to_owned() })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct CredentialsBody {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/register`: create an account and sign it in.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    enforce_throttle(&state, &headers, "register", ThrottleConfig::REGISTRATION)?;
    let Json(body) = body?;

    let account_id = account::register(&state.pool, &body.email, &body.password)
        .await
        .map_err(account_error)?;
    let jar = start_session(&state, account_id).await?;
    Ok((StatusCode::CREATED, jar, Json(serde_json::json!({ "id": account_id }))))
}

/// `POST /api/auth/login`: verify credentials and set the session cookie.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    enforce_throttle(&state, &headers, "login", ThrottleConfig::LOGIN)?;
    let Json(body) = body?;

    let account_id = account::authenticate(&state.pool, &body.email, &body.password)
        .await
        .map_err(account_error)?;
    let jar = start_session(&state, account_id).await?;
    Ok((jar, Json(serde_json::json!({ "id": account_id }))))
}

/// `GET /api/auth/me`: return the current account.
pub async fn me(auth: AuthUser) -> Json<session::SessionAccount> {
    Json(auth.account)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        warn!(error = %e, "session delete failed");
    }

    let cookie = session_cookie(String::new(), state.config.cookie_secure, Duration::ZERO);
    (CookieJar::new().add(cookie), StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ResetRequestBody {
    pub email: String,
}

/// `POST /api/auth/password-reset/request`: issue a reset token.
///
/// Always 202 so the response does not reveal whether the address exists.
pub async fn request_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ResetRequestBody>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    enforce_throttle(&state, &headers, "reset-password", ThrottleConfig::PASSWORD_RESET)?;
    let Json(body) = body?;

    let issued = account::request_password_reset(&state.pool, &body.email, state.config.password_reset_ttl)
        .await
        .map_err(account_error)?;
    if let Some(issued) = issued {
        state.reset_sink.deliver(&issued.email, &issued.token);
    }
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
pub struct ResetConfirmBody {
    pub token: String,
    pub password: String,
}

/// `POST /api/auth/password-reset/confirm`: consume a token, set a new password.
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ResetConfirmBody>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    enforce_throttle(&state, &headers, "reset-password", ThrottleConfig::PASSWORD_RESET)?;
    let Json(body) = body?;

    account::reset_password(&state.pool, &body.token, &body.password)
        .await
        .map_err(account_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
