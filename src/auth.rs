//! API key authentication for the stakescope HTTP API.
//!
//! When keys are configured, analysis requests must present one either in the
//! `X-API-Key` header or as an `Authorization: Bearer` token. With no keys
//! configured every request passes.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

/// Shared set of valid API keys.
pub type ApiKeySet = Arc<HashSet<String>>;

pub fn key_set(keys: Option<Vec<String>>) -> ApiKeySet {
    Arc::new(
        keys.unwrap_or_default()
            .into_iter()
            .filter(|k| !k.is_empty())
            .collect(),
    )
}

/// The key presented by a request, preferring `X-API-Key`.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(key);
    }
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Axum middleware rejecting requests without a configured key with 401.
pub async fn require_api_key(
    axum::extract::State(keys): axum::extract::State<ApiKeySet>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if keys.is_empty() {
        return Ok(next.run(request).await);
    }

    match presented_key(request.headers()) {
        Some(key) if keys.contains(key) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("request without API key");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
