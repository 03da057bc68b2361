//! Shop secret generation.

use crate::error::RegistrationError;
use rand::rngs::OsRng;
use rand::RngCore;

/// Random bytes per shop secret (256 bits).
pub const SECRET_BYTES: usize = 32;

/// Source of new shop secrets.
pub trait SecretGenerator: Send + Sync {
    /// Produce a fresh printable secret.
    fn generate(&self) -> Result<String, RegistrationError>;
}

/// Hex-encoded secrets drawn from the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSecretGenerator;

impl SecretGenerator for RandomSecretGenerator {
    fn generate(&self) -> Result<String, RegistrationError> {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| RegistrationError::Internal(format!("Entropy source failure: {}", e)))?;

        Ok(hex::encode(bytes))
    }
}
