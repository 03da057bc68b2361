//! Encrypted file-backed shop store.

use super::{Shop, ShopStore};
use crate::error::RegistrationError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Domain separator mixed into the key derivation.
const KEY_DERIVATION_PATH: &str = "app-registration/shop-store";

/// Nonce size for AES-GCM (96 bits = 12 bytes).
const NONCE_SIZE: usize = 12;

/// Data version for schema migrations.
const DATA_VERSION: u32 = 1;

/// Persistent snapshot of all shops.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreData {
    version: u32,
    shops: HashMap<String, Shop>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            version: DATA_VERSION,
            shops: HashMap::new(),
        }
    }
}

/// Shop store persisted as a single AES-256-GCM encrypted JSON snapshot.
///
/// File format: [12 bytes nonce][ciphertext with auth tag]
///
/// Every upsert rewrites the snapshot under the write lock and only then
/// commits the change in memory, so readers never observe a record that
/// failed to persist.
pub struct EncryptedShopStore {
    data: RwLock<StoreData>,
    storage_path: PathBuf,
    key: [u8; 32],
}

impl EncryptedShopStore {
    /// Open the store at `storage_path`, loading existing shops if the file exists.
    pub async fn open(
        storage_path: impl Into<PathBuf>,
        key_material: &str,
    ) -> Result<Self, RegistrationError> {
        let storage_path = storage_path.into();
        let key = derive_key(key_material);
        let data = load(&storage_path, &key).await?;

        info!(
            "Opened encrypted shop store with {} shops at {:?}",
            data.shops.len(),
            storage_path
        );

        Ok(Self {
            data: RwLock::new(data),
            storage_path,
            key,
        })
    }

    /// Number of stored shops.
    pub async fn count(&self) -> usize {
        self.data.read().await.shops.len()
    }

    async fn save(&self, data: &StoreData) -> Result<(), RegistrationError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = serde_json::to_vec(data)?;
        let ciphertext = cipher.encrypt(nonce, plaintext.as_ref())?;

        let mut bytes = nonce_bytes.to_vec();
        bytes.extend(ciphertext);

        if let Some(parent) = self.storage_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically using temp file + rename
        let temp_path = self.storage_path.with_extension("tmp");
        fs::write(&temp_path, &bytes).await?;
        fs::rename(&temp_path, &self.storage_path).await?;

        debug!(
            "Saved encrypted shop store ({} bytes) to {:?}",
            bytes.len(),
            self.storage_path
        );
        Ok(())
    }
}

#[async_trait]
impl ShopStore for EncryptedShopStore {
    async fn find(&self, shop_id: &str) -> Result<Option<Shop>, RegistrationError> {
        Ok(self.data.read().await.shops.get(shop_id).cloned())
    }

    async fn upsert(&self, shop: Shop) -> Result<(), RegistrationError> {
        let mut data = self.data.write().await;

        let mut next = data.clone();
        next.shops.insert(shop.shop_id().to_string(), shop);
        self.save(&next).await?;

        *data = next;
        Ok(())
    }

    async fn replace_if_secret(
        &self,
        shop: Shop,
        expected_secret: &str,
    ) -> Result<bool, RegistrationError> {
        let mut data = self.data.write().await;

        let unchanged = data
            .shops
            .get(shop.shop_id())
            .is_some_and(|current| current.shop_secret() == expected_secret);
        if !unchanged {
            return Ok(false);
        }

        let mut next = data.clone();
        next.shops.insert(shop.shop_id().to_string(), shop);
        self.save(&next).await?;

        *data = next;
        Ok(true)
    }
}

/// Derive the 32-byte AES key: SHA256(derivation path || key material).
fn derive_key(key_material: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(KEY_DERIVATION_PATH.as_bytes());
    hasher.update(key_material.as_bytes());
    let hash = hasher.finalize();

    let mut key = [0u8; 32];
    key.copy_from_slice(&hash);
    key
}

/// Load and decrypt the snapshot. A missing file yields an empty store.
async fn load(path: &Path, key: &[u8; 32]) -> Result<StoreData, RegistrationError> {
    if !path.exists() {
        info!("Shop store file not found at {:?}, starting empty", path);
        return Ok(StoreData::default());
    }

    let bytes = fs::read(path).await?;
    if bytes.len() < NONCE_SIZE {
        warn!("Shop store file too short");
        return Err(RegistrationError::Persistence(
            "Shop store file is truncated".to_string(),
        ));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| {
            RegistrationError::Persistence(
                "Failed to decrypt shop store. The encryption key may have changed.".to_string(),
            )
        })?;

    let data: StoreData = serde_json::from_slice(&plaintext)?;
    if data.version != DATA_VERSION {
        warn!(version = data.version, "Unexpected shop store data version");
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_derivation_is_deterministic() {
        assert_eq!(derive_key("material"), derive_key("material"));
        assert_ne!(derive_key("material"), derive_key("other"));
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedShopStore::open(dir.path().join("shops.enc"), "key")
            .await
            .unwrap();

        assert_eq!(store.count().await, 0);
        assert!(store.find("123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_restores_shops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shops.enc");

        let store = EncryptedShopStore::open(&path, "key").await.unwrap();
        let shop = Shop::new("123", "https://my-shop.com", "secret")
            .with_api_credentials("1", "2")
            .with_active(true);
        store.upsert(shop.clone()).await.unwrap();
        drop(store);

        let reopened = EncryptedShopStore::open(&path, "key").await.unwrap();
        assert_eq!(reopened.find("123").await.unwrap(), Some(shop));
    }

    #[tokio::test]
    async fn test_file_does_not_contain_plaintext_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shops.enc");

        let store = EncryptedShopStore::open(&path, "key").await.unwrap();
        store
            .upsert(Shop::new("123", "https://my-shop.com", "plaintext-secret"))
            .await
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let haystack = String::from_utf8_lossy(&bytes);
        assert!(!haystack.contains("plaintext-secret"));
    }

    #[tokio::test]
    async fn test_wrong_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shops.enc");

        let store = EncryptedShopStore::open(&path, "key").await.unwrap();
        store
            .upsert(Shop::new("123", "https://my-shop.com", "secret"))
            .await
            .unwrap();

        let result = EncryptedShopStore::open(&path, "other-key").await;
        assert!(matches!(result, Err(RegistrationError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_tampered_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shops.enc");

        let store = EncryptedShopStore::open(&path, "key").await.unwrap();
        store
            .upsert(Shop::new("123", "https://my-shop.com", "secret"))
            .await
            .unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        if let Some(byte) = bytes.last_mut() {
            *byte ^= 0xFF;
        }
        std::fs::write(&path, bytes).unwrap();

        assert!(EncryptedShopStore::open(&path, "key").await.is_err());
    }

    #[tokio::test]
    async fn test_replace_if_secret_persists_only_on_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shops.enc");

        let store = EncryptedShopStore::open(&path, "key").await.unwrap();
        store
            .upsert(Shop::new("123", "https://foo.com", "rotated"))
            .await
            .unwrap();

        let confirmed = Shop::new("123", "https://foo.com", "old").with_active(true);
        assert!(!store.replace_if_secret(confirmed, "old").await.unwrap());

        let confirmed = Shop::new("123", "https://foo.com", "rotated")
            .with_api_credentials("1", "2")
            .with_active(true);
        assert!(store
            .replace_if_secret(confirmed.clone(), "rotated")
            .await
            .unwrap());
        drop(store);

        let reopened = EncryptedShopStore::open(&path, "key").await.unwrap();
        assert_eq!(reopened.find("123").await.unwrap(), Some(confirmed));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shops.enc");

        let store = EncryptedShopStore::open(&path, "key").await.unwrap();
        store
            .upsert(Shop::new("123", "https://foo.com", "old"))
            .await
            .unwrap();

        // A directory where the temp file should go makes the write fail
        std::fs::create_dir(path.with_extension("tmp")).unwrap();

        let result = store
            .upsert(Shop::new("123", "https://bar.com", "new"))
            .await;
        assert!(matches!(result, Err(RegistrationError::Persistence(_))));

        let shop = store.find("123").await.unwrap().unwrap();
        assert_eq!(shop.shop_url(), "https://foo.com");
        assert_eq!(shop.shop_secret(), "old");
    }
}
