//! Rate limiting, shop authentication and logging middleware.

use super::AppState;
use crate::auth::InboundRequest;
use crate::error::RegistrationError;
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{num::NonZeroU32, sync::Arc};
use tracing::{debug, warn};

/// Largest request body buffered for signature verification.
const MAX_SIGNED_BODY_BYTES: usize = 1024 * 1024;

/// Global rate limiter (not keyed by IP).
pub type GlobalLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter state shared across requests.
#[derive(Clone)]
pub struct RateLimitState {
    /// Global rate limiter for all requests
    pub global: Arc<GlobalLimiter>,
}

impl RateLimitState {
    /// Create a new rate limit state with the specified limits.
    pub fn new(requests_per_minute: u32) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));

        Self {
            global: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Create a permissive rate limiter for testing.
    pub fn permissive() -> Self {
        Self::new(1000)
    }
}

/// Rate limiting middleware.
///
/// Checks the global rate limit and returns 429 Too Many Requests if exceeded.
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RegistrationError> {
    if rate_limit.global.check().is_err() {
        warn!("Global rate limit exceeded");
        return Err(RegistrationError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}

/// Authenticate the calling shop and attach it as a request extension.
///
/// The body is buffered so the signature can be checked, then handed on
/// unchanged.
pub async fn shop_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RegistrationError> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_SIGNED_BODY_BYTES)
        .await
        .map_err(|e| {
            warn!(error = %e, "Rejected shop request body");
            RegistrationError::PayloadTooLarge
        })?;

    let inbound = InboundRequest::new(
        parts.method.clone(),
        parts.uri.clone(),
        parts.headers.clone(),
        bytes.clone(),
    );
    let shop = state.resolver.resolve(&inbound).await?;
    debug!(shop_id = %shop.shop_id(), "Shop request authenticated");

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(shop);

    Ok(next.run(request).await)
}

/// Logging middleware for requests.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    debug!(%method, %path, "Request started");

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_success() {
        debug!(%method, %path, %status, ?duration, "Request completed");
    } else {
        warn!(%method, %path, %status, ?duration, "Request failed");
    }

    response
}
