//! In-memory shop store.

use super::{Shop, ShopStore};
use crate::error::RegistrationError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Shop store backed by a map held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryShopStore {
    /// Shop records indexed by shop id
    shops: Arc<RwLock<HashMap<String, Shop>>>,
}

impl MemoryShopStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given shops.
    pub fn with_shops(shops: impl IntoIterator<Item = Shop>) -> Self {
        let shops = shops
            .into_iter()
            .map(|shop| (shop.shop_id().to_string(), shop))
            .collect();

        Self {
            shops: Arc::new(RwLock::new(shops)),
        }
    }

    /// Number of stored shops.
    pub async fn count(&self) -> usize {
        self.shops.read().await.len()
    }
}

#[async_trait]
impl ShopStore for MemoryShopStore {
    async fn find(&self, shop_id: &str) -> Result<Option<Shop>, RegistrationError> {
        Ok(self.shops.read().await.get(shop_id).cloned())
    }

    async fn upsert(&self, shop: Shop) -> Result<(), RegistrationError> {
        debug!(shop_id = %shop.shop_id(), "Memory store: upserting shop");
        self.shops
            .write()
            .await
            .insert(shop.shop_id().to_string(), shop);
        Ok(())
    }

    async fn replace_if_secret(
        &self,
        shop: Shop,
        expected_secret: &str,
    ) -> Result<bool, RegistrationError> {
        let mut shops = self.shops.write().await;

        match shops.get(shop.shop_id()) {
            Some(current) if current.shop_secret() == expected_secret => {
                debug!(shop_id = %shop.shop_id(), "Memory store: replacing shop");
                shops.insert(shop.shop_id().to_string(), shop);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_find() {
        let store = MemoryShopStore::new();
        store
            .upsert(Shop::new("123", "https://my-shop.com", "secret"))
            .await
            .unwrap();

        let shop = store.find("123").await.unwrap().unwrap();
        assert_eq!(shop.shop_url(), "https://my-shop.com");
        assert!(store.find("456").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = MemoryShopStore::with_shops([Shop::new("123", "https://foo.com", "old")]);

        store
            .upsert(Shop::new("123", "https://bar.com", "new"))
            .await
            .unwrap();

        assert_eq!(store.count().await, 1);
        let shop = store.find("123").await.unwrap().unwrap();
        assert_eq!(shop.shop_url(), "https://bar.com");
        assert_eq!(shop.shop_secret(), "new");
    }

    #[tokio::test]
    async fn test_lookup_is_by_id_not_url() {
        let store = MemoryShopStore::with_shops([Shop::new("123", "https://foo.com", "s")]);
        assert!(store.find("https://foo.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_if_secret() {
        let store = MemoryShopStore::with_shops([Shop::new("123", "https://foo.com", "current")]);

        let stale = Shop::new("123", "https://foo.com", "stale").with_active(true);
        assert!(!store.replace_if_secret(stale, "stale").await.unwrap());
        assert!(!store.find("123").await.unwrap().unwrap().is_active());

        let confirmed = Shop::new("123", "https://foo.com", "current")
            .with_api_credentials("1", "2")
            .with_active(true);
        assert!(store
            .replace_if_secret(confirmed.clone(), "current")
            .await
            .unwrap());
        assert_eq!(store.find("123").await.unwrap(), Some(confirmed));
    }

    #[tokio::test]
    async fn test_replace_if_secret_missing_shop() {
        let store = MemoryShopStore::new();
        let shop = Shop::new("123", "https://foo.com", "s");

        assert!(!store.replace_if_secret(shop, "s").await.unwrap());
        assert_eq!(store.count().await, 0);
    }

    #[test]
    fn test_clones_share_state() {
        let store = MemoryShopStore::new();
        let other = store.clone();

        tokio_test::block_on(async {
            other
                .upsert(Shop::new("123", "https://foo.com", "s"))
                .await
                .unwrap();
            assert!(store.find("123").await.unwrap().is_some());
        });
    }
}
