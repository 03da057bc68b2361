//! HTTP API for the registration handshake.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{
    logging_middleware, rate_limit_middleware, shop_auth_middleware, RateLimitState,
};
pub use types::*;

use crate::auth::ShopResolver;
use crate::registration::RegistrationService;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Register/confirm handshake
    pub registration: Arc<RegistrationService>,
    /// Authentication of registered shops
    pub resolver: ShopResolver,
}

impl AppState {
    pub fn new(registration: RegistrationService, resolver: ShopResolver) -> Self {
        Self {
            registration: Arc::new(registration),
            resolver,
        }
    }
}

/// Create the API router with default rate limiting.
pub fn create_router(state: AppState) -> Router {
    create_router_with_rate_limit(state, RateLimitState::new(60))
}

/// Create the API router with custom rate limiting.
pub fn create_router_with_rate_limit(state: AppState, rate_limit: RateLimitState) -> Router {
    // Handshake endpoints (rate limited)
    let registration = Router::new()
        .route(
            "/app/register",
            get(handlers::register).post(handlers::register),
        )
        .route("/app/register/confirm", post(handlers::confirm))
        .layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ));

    // Endpoints for registered shops (signature required)
    let authenticated = Router::new()
        .route("/app/shop", get(handlers::shop_status))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            shop_auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(registration)
        .merge(authenticated)
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
