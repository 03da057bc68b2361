//! API response types.

use crate::shop::{Shop, ShopStatus};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Registration state of the authenticated shop.
#[derive(Debug, Serialize)]
pub struct ShopStatusResponse {
    pub shop_id: String,
    pub shop_url: String,
    pub status: ShopStatus,
    pub active: bool,
}

impl From<&Shop> for ShopStatusResponse {
    fn from(shop: &Shop) -> Self {
        Self {
            shop_id: shop.shop_id().to_string(),
            shop_url: shop.shop_url().to_string(),
            status: shop.status(),
            active: shop.is_active(),
        }
    }
}
