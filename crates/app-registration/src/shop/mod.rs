//! Shop records and the storage contract used by the handshake.

mod encrypted;
mod memory;

pub use encrypted::EncryptedShopStore;
pub use memory::MemoryShopStore;

use crate::error::RegistrationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a shop stands in the registration handshake.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShopStatus {
    /// Secret issued, awaiting confirmation
    Registered,
    /// Credentials exchanged and shop active
    Confirmed,
    /// Credentials exchanged but deactivated by the platform
    Deactivated,
}

/// API credentials issued by the platform during confirmation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// A single installation of the app on one platform instance.
///
/// Immutable: every `with_*` method consumes the shop and returns the updated
/// value, which the caller then hands back to the [`ShopStore`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    shop_id: String,
    shop_url: String,
    shop_secret: String,
    credentials: Option<ApiCredentials>,
    active: bool,
}

impl Shop {
    /// Create a freshly registered, inactive shop without credentials.
    pub fn new(
        shop_id: impl Into<String>,
        shop_url: impl Into<String>,
        shop_secret: impl Into<String>,
    ) -> Self {
        Self {
            shop_id: shop_id.into(),
            shop_url: shop_url.into(),
            shop_secret: shop_secret.into(),
            credentials: None,
            active: false,
        }
    }

    pub fn shop_id(&self) -> &str {
        &self.shop_id
    }

    pub fn shop_url(&self) -> &str {
        &self.shop_url
    }

    pub fn shop_secret(&self) -> &str {
        &self.shop_secret
    }

    pub fn client_id(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.client_id.as_str())
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.client_secret.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn status(&self) -> ShopStatus {
        match (&self.credentials, self.active) {
            (Some(_), true) => ShopStatus::Confirmed,
            (Some(_), false) => ShopStatus::Deactivated,
            (None, _) => ShopStatus::Registered,
        }
    }

    pub fn with_shop_url(self, shop_url: impl Into<String>) -> Self {
        Self {
            shop_url: shop_url.into(),
            ..self
        }
    }

    /// Replace the shop secret for a new registration cycle.
    ///
    /// Credentials were bound to the old secret, so they are dropped and the
    /// shop goes back to inactive.
    pub fn with_rotated_secret(self, shop_secret: impl Into<String>) -> Self {
        Self {
            shop_secret: shop_secret.into(),
            credentials: None,
            active: false,
            ..self
        }
    }

    pub fn with_api_credentials(
        self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            credentials: Some(ApiCredentials {
                client_id: client_id.into(),
                client_secret: client_secret.into(),
            }),
            ..self
        }
    }

    pub fn with_active(self, active: bool) -> Self {
        Self { active, ..self }
    }
}

impl fmt::Debug for Shop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shop")
            .field("shop_id", &self.shop_id)
            .field("shop_url", &self.shop_url)
            .field("shop_secret", &"[REDACTED]")
            .field("client_id", &self.client_id())
            .field("client_secret", &self.credentials.as_ref().map(|_| "[REDACTED]"))
            .field("active", &self.active)
            .finish()
    }
}

/// Keyed access to shop records.
///
/// Implementations must make `upsert` atomic per shop id: a concurrent
/// `find` sees either the previous or the new record, never a mix, and a
/// failed `upsert` leaves the previous record in place.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShopStore: Send + Sync {
    /// Look up a shop by id.
    async fn find(&self, shop_id: &str) -> Result<Option<Shop>, RegistrationError>;

    /// Insert or replace the record stored under the shop's id.
    async fn upsert(&self, shop: Shop) -> Result<(), RegistrationError>;

    /// Replace the stored record only if it still holds `expected_secret`.
    ///
    /// The check and the write happen as one step. Returns `false` and
    /// writes nothing when the shop is gone or its secret has changed.
    async fn replace_if_secret(
        &self,
        shop: Shop,
        expected_secret: &str,
    ) -> Result<bool, RegistrationError>;
}
