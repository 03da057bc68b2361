//! Authentication of requests from already registered shops.

use super::{InboundRequest, RequestVerifier, SignatureKind};
use crate::error::RegistrationError;
use crate::shop::{Shop, ShopStore};
use axum::http::Method;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Resolves the shop a request claims to come from and checks its signature.
#[derive(Clone)]
pub struct ShopResolver {
    store: Arc<dyn ShopStore>,
    verifier: Arc<dyn RequestVerifier>,
}

impl ShopResolver {
    pub fn new(store: Arc<dyn ShopStore>, verifier: Arc<dyn RequestVerifier>) -> Self {
        Self { store, verifier }
    }

    /// Authenticate `request` against the secret of the shop it names.
    ///
    /// GET requests name the shop in the `shop-id` query parameter, all other
    /// methods in the JSON body at `source.shopId`.
    #[instrument(skip_all)]
    pub async fn resolve(&self, request: &InboundRequest) -> Result<Shop, RegistrationError> {
        let shop_id = shop_id_of(request)?;

        let shop = self
            .store
            .find(&shop_id)
            .await?
            .ok_or_else(|| RegistrationError::ShopNotFound(shop_id.clone()))?;

        if !self
            .verifier
            .verify(request, SignatureKind::Shop, shop.shop_secret())?
        {
            warn!(shop_id = %shop_id, "Rejected request with invalid shop signature");
            return Err(RegistrationError::SignatureInvalid);
        }

        Ok(shop)
    }
}

fn shop_id_of(request: &InboundRequest) -> Result<String, RegistrationError> {
    if *request.method() == Method::GET {
        return request
            .query_param("shop-id")
            .ok_or_else(|| RegistrationError::missing("shop-id"));
    }

    serde_json::from_slice::<serde_json::Value>(request.body())
        .ok()
        .and_then(|body| {
            body.pointer("/source/shopId")
                .and_then(|v| v.as_str())
                .filter(|id| !id.is_empty())
                .map(String::from)
        })
        .ok_or_else(|| RegistrationError::missing("source.shopId"))
}
