//! Registration proof and response signatures.

use super::keyed_mac;
use crate::error::RegistrationError;
use hmac::Mac;

/// Computes the values the app sends back to the platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseSigner;

impl ResponseSigner {
    /// Proof that the app holds `secret`: HMAC-SHA256(shop_id || app_name), hex encoded.
    pub fn compute_proof(
        &self,
        shop_id: &str,
        app_name: &str,
        secret: &str,
    ) -> Result<String, RegistrationError> {
        let mut mac = keyed_mac(secret)?;
        mac.update(shop_id.as_bytes());
        mac.update(app_name.as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Signature header value for a response body.
    pub fn sign(&self, body: &[u8], secret: &str) -> Result<String, RegistrationError> {
        let mut mac = keyed_mac(secret)?;
        mac.update(body);

        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
