//! Request gateway for the authenticated API: bearer credential validation
//! followed by a per-principal fixed-window rate limit.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::json;
use tracing::{error, warn};

use super::credentials::{Authenticated, CredentialStore};
use super::rate_limit::{RateDecision, RateLimiter};

pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

#[derive(Clone)]
pub struct GatewayState {
    pub credentials: Arc<CredentialStore>,
    pub limiter: Arc<RateLimiter>,
    pub max_requests: u32,
    pub window: Duration,
}

/// Wrap `router` so every route requires a valid credential and counts
/// against its owner's request budget.
pub fn protect(router: Router, state: GatewayState) -> Router {
    router
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(from_fn_with_state(state, authenticate))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(json!({ "error": message, "code": "UNAUTHORIZED" })),
    )
        .into_response()
}

pub async fn authenticate(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return unauthorized("Missing or invalid Authorization header");
    };

    let authenticated = match state.credentials.validate(token) {
        Ok(Some(authenticated)) => authenticated,
        Ok(None) => return unauthorized("Invalid or expired API key"),
        Err(error) => {
            error!(%error, "credential lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({ "error": "Authentication unavailable" })),
            )
                .into_response();
        }
    };

    request.extensions_mut().insert(authenticated);
    next.run(request).await
}

pub async fn rate_limit(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(owner) = request
        .extensions()
        .get::<Authenticated>()
        .map(|auth| auth.principal.id.clone())
    else {
        return unauthorized("Missing or invalid Authorization header");
    };

    let identity = format!("{owner}:global");
    let decision = state
        .limiter
        .check(&identity, state.max_requests, state.window);

    if !decision.allowed {
        let retry_after = decision.retry_after_secs(state.limiter.now());
        warn!(%owner, retry_after, "rate limit exceeded");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            axum::Json(json!({
                "error": "Too many requests",
                "code": "RATE_LIMIT_EXCEEDED",
                "retry_after_seconds": retry_after,
            })),
        )
            .into_response();
        apply_headers(response.headers_mut(), &decision);
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    let reset = decision.reset_at.timestamp()
        + i64::from(decision.reset_at.timestamp_subsec_nanos() > 0);
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(reset));
}
