//! Two-phase registration handshake: register, then confirm.
//!
//! Per shop the handshake moves through
//! `Unregistered -> Registered(secret, inactive) -> Confirmed(secret, credentials, active)`.
//! Registering again from any state rotates the secret and drops back to
//! `Registered`. All state lives in the [`ShopStore`]; the service itself
//! keeps nothing between calls.

use crate::auth::{
    HmacRequestVerifier, InboundRequest, RandomSecretGenerator, RequestVerifier, ResponseSigner,
    SecretGenerator, SignatureKind,
};
use crate::config::AppIdentity;
use crate::error::RegistrationError;
use crate::events::{EventNotifier, LifecycleEvent, ListenerNotifier};
use crate::shop::{Shop, ShopStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What to do with requests that carry no signature at all.
///
/// A signature that is present but wrong is rejected under either policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// Unsigned requests are rejected
    #[default]
    Required,
    /// Unsigned requests are accepted
    Optional,
}

impl SignaturePolicy {
    pub fn from_enforced(enforce: bool) -> Self {
        if enforce {
            SignaturePolicy::Required
        } else {
            SignaturePolicy::Optional
        }
    }
}

/// Successful register phase result, sent to the platform as JSON.
#[derive(Clone, Serialize)]
pub struct RegisterResponse {
    pub proof: String,
    pub confirmation_url: String,
    pub secret: String,
}

impl fmt::Debug for RegisterResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterResponse")
            .field("proof", &self.proof)
            .field("confirmation_url", &self.confirmation_url)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Body of the confirm phase request.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmRequest {
    shop_id: Option<String>,
    api_key: Option<String>,
    secret_key: Option<String>,
}

/// Orchestrates the registration handshake.
#[derive(Clone)]
pub struct RegistrationService {
    identity: AppIdentity,
    store: Arc<dyn ShopStore>,
    verifier: Arc<dyn RequestVerifier>,
    signer: ResponseSigner,
    secrets: Arc<dyn SecretGenerator>,
    notifier: Arc<dyn EventNotifier>,
    policy: SignaturePolicy,
}

impl RegistrationService {
    /// Create a service with HMAC verification, random secrets, no event
    /// listeners and required signatures.
    pub fn new(identity: AppIdentity, store: Arc<dyn ShopStore>) -> Self {
        Self {
            identity,
            store,
            verifier: Arc::new(HmacRequestVerifier),
            signer: ResponseSigner,
            secrets: Arc::new(RandomSecretGenerator),
            notifier: Arc::new(ListenerNotifier::new()),
            policy: SignaturePolicy::Required,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn RequestVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_secret_generator(mut self, secrets: Arc<dyn SecretGenerator>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_signature_policy(mut self, policy: SignaturePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    pub fn signer(&self) -> &ResponseSigner {
        &self.signer
    }

    /// Register phase: issue a new shop secret and prove possession of it.
    ///
    /// Requires the `shop-id`, `shop-url` and `timestamp` query parameters.
    /// An existing shop is overwritten with the new URL and secret, losing
    /// any credentials from a previous confirmation.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        request: &InboundRequest,
    ) -> Result<RegisterResponse, RegistrationError> {
        let shop_id = required_query_param(request, "shop-id")?;
        let shop_url = required_query_param(request, "shop-url")?;
        let timestamp = required_query_param(request, "timestamp")?;

        info!(
            shop_id = %shop_id,
            shop_url = %shop_url,
            %timestamp,
            "Registration request received"
        );

        self.check_signature(
            request,
            SignatureKind::Registration,
            self.identity.secret(),
            &shop_id,
        )?;

        let secret = self.secrets.generate()?;

        let shop = match self.store.find(&shop_id).await? {
            Some(existing) => {
                info!(shop_id = %shop_id, "Shop already registered, rotating secret");
                existing
                    .with_shop_url(shop_url)
                    .with_rotated_secret(secret.clone())
            }
            None => Shop::new(shop_id.clone(), shop_url, secret.clone()),
        };
        self.store.upsert(shop).await?;

        let proof = self
            .signer
            .compute_proof(&shop_id, &self.identity.name, &secret)?;

        info!(shop_id = %shop_id, "Shop registered, awaiting confirmation");

        Ok(RegisterResponse {
            proof,
            confirmation_url: self.identity.confirmation_url_for(&shop_id),
            secret,
        })
    }

    /// Confirm phase: store the platform's API credentials and activate the shop.
    ///
    /// Publishes `RegistrationBeforeCompleted` then `RegistrationCompleted`
    /// after the update is persisted. A notification failure is returned to
    /// the caller but does not undo the persisted update.
    #[instrument(skip_all)]
    pub async fn confirm(&self, request: &InboundRequest) -> Result<Shop, RegistrationError> {
        let body: ConfirmRequest = serde_json::from_slice(request.body())
            .map_err(|_| RegistrationError::missing("shopId, apiKey, secretKey"))?;

        let shop_id = non_empty(body.shop_id).ok_or_else(|| RegistrationError::missing("shopId"))?;
        let client_id =
            non_empty(body.api_key).ok_or_else(|| RegistrationError::missing("apiKey"))?;
        let client_secret =
            non_empty(body.secret_key).ok_or_else(|| RegistrationError::missing("secretKey"))?;

        info!(shop_id = %shop_id, "Confirmation request received");

        let shop = self
            .store
            .find(&shop_id)
            .await?
            .ok_or_else(|| RegistrationError::ShopNotFound(shop_id.clone()))?;

        let signed_with = shop.shop_secret().to_string();
        self.check_signature(request, SignatureKind::Shop, &signed_with, &shop_id)?;

        let shop = shop
            .with_api_credentials(client_id, client_secret)
            .with_active(true);

        // A re-registration since the lookup rotated the secret this request was signed with
        if !self
            .store
            .replace_if_secret(shop.clone(), &signed_with)
            .await?
        {
            warn!(shop_id = %shop_id, "Shop secret rotated during confirmation");
            return Err(RegistrationError::SignatureInvalid);
        }

        self.notifier
            .publish(LifecycleEvent::RegistrationBeforeCompleted { shop: shop.clone() })
            .await?;
        self.notifier
            .publish(LifecycleEvent::RegistrationCompleted { shop: shop.clone() })
            .await?;

        info!(shop_id = %shop_id, "Registration confirmed, shop active");

        Ok(shop)
    }

    fn check_signature(
        &self,
        request: &InboundRequest,
        kind: SignatureKind,
        secret: &str,
        shop_id: &str,
    ) -> Result<(), RegistrationError> {
        if !kind.is_signed(request) {
            return match self.policy {
                SignaturePolicy::Optional => {
                    debug!(shop_id = %shop_id, ?kind, "Unsigned request accepted");
                    Ok(())
                }
                SignaturePolicy::Required => {
                    warn!(shop_id = %shop_id, ?kind, "Rejected unsigned request");
                    Err(RegistrationError::SignatureInvalid)
                }
            };
        }

        if self.verifier.verify(request, kind, secret)? {
            Ok(())
        } else {
            warn!(shop_id = %shop_id, ?kind, "Rejected request with invalid signature");
            Err(RegistrationError::SignatureInvalid)
        }
    }
}

fn required_query_param(request: &InboundRequest, name: &str) -> Result<String, RegistrationError> {
    request
        .query_param(name)
        .ok_or_else(|| RegistrationError::missing(name))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
