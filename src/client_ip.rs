//! Client identification for throttle keys.
//!
//! The service runs behind a reverse proxy, so the peer address is the proxy.
//! The first `X-Forwarded-For` hop wins, then `X-Real-IP`, then a shared
//! `"unknown"` bucket.

use axum::http::HeaderMap;

pub const UNKNOWN_CLIENT: &str = "unknown";

#[must_use]
pub fn client_ip(headers: &HeaderMap) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|raw| raw.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_str(headers, "x-real-ip").map(str::trim).filter(|ip| !ip.is_empty()))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_owned()
}

/// `"{scope}:{ip}"`, e.g. `"login:203.0.113.7"`.
#[must_use]
pub fn throttle_key(scope: &str, ip: &str) -> String {
    format!("{scope}:{ip}")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
#[path = "client_ip_test.rs"]
mod tests;
