//! HTTP request handlers.

use super::types::{HealthResponse, ShopStatusResponse};
use super::AppState;
use crate::auth::{InboundRequest, APP_SIGNATURE_HEADER};
use crate::error::RegistrationError;
use crate::shop::Shop;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use tracing::debug;

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Register phase. Responds with `{proof, confirmation_url, secret}`, signed
/// with the newly issued shop secret.
pub async fn register(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RegistrationError> {
    let request = InboundRequest::new(method, uri, headers, body);
    let response = state.registration.register(&request).await?;

    signed_json(&state, &response, &response.secret)
}

/// Confirm phase. Responds with 204 and no body.
pub async fn confirm(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, RegistrationError> {
    let request = InboundRequest::new(method, uri, headers, body);
    let shop = state.registration.confirm(&request).await?;

    debug!(shop_id = %shop.shop_id(), "Confirmation acknowledged");
    Ok(StatusCode::NO_CONTENT)
}

/// Registration state of the shop that signed the request.
pub async fn shop_status(
    State(state): State<AppState>,
    Extension(shop): Extension<Shop>,
) -> Result<Response, RegistrationError> {
    signed_json(&state, &ShopStatusResponse::from(&shop), shop.shop_secret())
}

/// Serialize `payload` as a 200 JSON response carrying an app signature.
fn signed_json<T: Serialize>(
    state: &AppState,
    payload: &T,
    secret: &str,
) -> Result<Response, RegistrationError> {
    let body = serde_json::to_vec(payload)
        .map_err(|e| RegistrationError::Internal(format!("Failed to encode response: {}", e)))?;

    let signature = state.registration.signer().sign(&body, secret)?;
    let signature = HeaderValue::from_str(&signature)
        .map_err(|_| RegistrationError::Internal("Invalid signature header".to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (HeaderName::from_static(APP_SIGNATURE_HEADER), signature),
        ],
        body,
    )
        .into_response())
}
