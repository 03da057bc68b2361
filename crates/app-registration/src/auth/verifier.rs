//! Inbound request signature verification.

use super::{keyed_mac, InboundRequest, SignatureKind};
use crate::error::RegistrationError;
use hmac::Mac;
use tracing::debug;

/// Checks request signatures against a secret.
pub trait RequestVerifier: Send + Sync {
    /// Whether the request carries a valid signature of `kind` for `secret`.
    ///
    /// Attacker-controlled input (missing, malformed or wrong signatures)
    /// yields `Ok(false)`. An error means the verifier was called with an
    /// unusable secret.
    fn verify(
        &self,
        request: &InboundRequest,
        kind: SignatureKind,
        secret: &str,
    ) -> Result<bool, RegistrationError>;
}

/// HMAC-SHA256 verifier with constant-time comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacRequestVerifier;

impl RequestVerifier for HmacRequestVerifier {
    fn verify(
        &self,
        request: &InboundRequest,
        kind: SignatureKind,
        secret: &str,
    ) -> Result<bool, RegistrationError> {
        if secret.is_empty() {
            return Err(RegistrationError::Internal(
                "Signature verification requires a non-empty secret".to_string(),
            ));
        }

        let Some(signature) = kind.signature(request) else {
            debug!(?kind, "Request carries no signature");
            return Ok(false);
        };

        let Ok(provided) = hex::decode(signature.trim()) else {
            debug!(?kind, "Signature is not valid hex");
            return Ok(false);
        };

        let mut mac = keyed_mac(secret)?;
        mac.update(&kind.canonical(request));

        // verify_slice compares in constant time
        Ok(mac.verify_slice(&provided).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ResponseSigner, APP_SIGNATURE_HEADER, SHOP_SIGNATURE_HEADER};
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};

    fn post(body: &'static [u8]) -> InboundRequest {
        InboundRequest::new(
            Method::POST,
            "http://localhost/app/register/confirm".parse().unwrap(),
            HeaderMap::new(),
            Bytes::from_static(body),
        )
    }

    fn signed(request: InboundRequest, header: &'static str, signature: &str) -> InboundRequest {
        request.with_header(
            HeaderName::from_static(header),
            HeaderValue::from_str(signature).unwrap(),
        )
    }

    #[test]
    fn test_valid_body_signature() {
        let body = br#"{"shopId":"123","apiKey":"1","secretKey":"2"}"#;
        let signature = ResponseSigner.sign(body, "shop-secret").unwrap();
        let request = signed(post(body), SHOP_SIGNATURE_HEADER, &signature);

        assert!(HmacRequestVerifier
            .verify(&request, SignatureKind::Shop, "shop-secret")
            .unwrap());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let body = br#"{"shopId":"123"}"#;
        let signature = ResponseSigner.sign(body, "old-secret").unwrap();
        let request = signed(post(body), SHOP_SIGNATURE_HEADER, &signature);

        assert!(!HmacRequestVerifier
            .verify(&request, SignatureKind::Shop, "new-secret")
            .unwrap());
    }

    #[test]
    fn test_any_changed_byte_invalidates() {
        let body: &'static [u8] = br#"{"shopId":"123","apiKey":"1","secretKey":"2"}"#;
        let signature = ResponseSigner.sign(body, "shop-secret").unwrap();

        for i in 0..body.len() {
            let mut tampered = body.to_vec();
            tampered[i] ^= 0x01;
            let request = signed(
                InboundRequest::new(
                    Method::POST,
                    "http://localhost/".parse().unwrap(),
                    HeaderMap::new(),
                    tampered,
                ),
                SHOP_SIGNATURE_HEADER,
                &signature,
            );

            assert!(
                !HmacRequestVerifier
                    .verify(&request, SignatureKind::Shop, "shop-secret")
                    .unwrap(),
                "byte {} change was not detected",
                i
            );
        }
    }

    #[test]
    fn test_missing_and_malformed_signatures_return_false() {
        let request = post(b"{}");
        assert!(!HmacRequestVerifier
            .verify(&request, SignatureKind::Shop, "secret")
            .unwrap());

        let request = signed(post(b"{}"), SHOP_SIGNATURE_HEADER, "not-hex!");
        assert!(!HmacRequestVerifier
            .verify(&request, SignatureKind::Shop, "secret")
            .unwrap());

        let request = signed(post(b"{}"), SHOP_SIGNATURE_HEADER, "abcd");
        assert!(!HmacRequestVerifier
            .verify(&request, SignatureKind::Shop, "secret")
            .unwrap());
    }

    #[test]
    fn test_non_ascii_signature_header_returns_false() {
        let request = post(b"{}").with_header(
            HeaderName::from_static(SHOP_SIGNATURE_HEADER),
            HeaderValue::from_bytes(b"\xffforged").unwrap(),
        );

        assert!(!HmacRequestVerifier
            .verify(&request, SignatureKind::Shop, "secret")
            .unwrap());
    }

    #[test]
    fn test_empty_secret_is_misconfiguration() {
        let request = post(b"{}");
        let result = HmacRequestVerifier.verify(&request, SignatureKind::Shop, "");

        assert!(matches!(result, Err(RegistrationError::Internal(_))));
    }

    #[test]
    fn test_registration_signature_over_query() {
        let query = "shop-id=123&shop-url=https://my-shop.com&timestamp=1234567890";
        let signature = ResponseSigner.sign(query.as_bytes(), "app-secret").unwrap();
        let request = signed(
            InboundRequest::new(
                Method::GET,
                format!("http://localhost/app/register?{}", query)
                    .parse()
                    .unwrap(),
                HeaderMap::new(),
                Bytes::new(),
            ),
            APP_SIGNATURE_HEADER,
            &signature,
        );

        let verifier = HmacRequestVerifier;
        assert!(verifier
            .verify(&request, SignatureKind::Registration, "app-secret")
            .unwrap());
        assert!(!verifier
            .verify(&request, SignatureKind::Registration, "other-secret")
            .unwrap());
        // An app signature is not a shop signature
        assert!(!verifier
            .verify(&request, SignatureKind::Shop, "app-secret")
            .unwrap());
    }

    #[test]
    fn test_shop_get_signature_in_query() {
        let signature = ResponseSigner
            .sign(b"shop-id=123&timestamp=1", "shop-secret")
            .unwrap();
        let request = InboundRequest::new(
            Method::GET,
            format!(
                "http://localhost/app/shop?shop-id=123&timestamp=1&shopware-shop-signature={}",
                signature
            )
            .parse()
            .unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        );

        assert!(HmacRequestVerifier
            .verify(&request, SignatureKind::Shop, "shop-secret")
            .unwrap());
    }
}
