//! Request authentication: shop secrets, signature verification and response signing.
//!
//! All signatures are lowercase hex HMAC-SHA256. What gets signed depends on
//! the [`SignatureKind`]:
//!
//! - `Registration`: the raw query string, keyed by the app secret, carried in
//!   the `shopware-app-signature` header.
//! - `Shop` on GET: the raw query string minus the `shopware-shop-signature`
//!   pair, keyed by the shop secret. The signature travels in the header of
//!   the same name or in that query parameter.
//! - `Shop` on any other method: the raw body, keyed by the shop secret.

mod resolver;
mod secret;
mod signer;
mod verifier;

pub use resolver::ShopResolver;
pub use secret::{RandomSecretGenerator, SecretGenerator, SECRET_BYTES};
pub use signer::ResponseSigner;
pub use verifier::{HmacRequestVerifier, RequestVerifier};

use crate::error::RegistrationError;
use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::borrow::Cow;
use std::collections::HashMap;

/// Header carrying the app's signature (registration requests and app responses).
pub const APP_SIGNATURE_HEADER: &str = "shopware-app-signature";

/// Header (or GET query parameter) carrying the shop's signature.
pub const SHOP_SIGNATURE_HEADER: &str = "shopware-shop-signature";

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Keyed HMAC-SHA256 instance.
pub(crate) fn keyed_mac(secret: &str) -> Result<HmacSha256, RegistrationError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| RegistrationError::Internal("HMAC key rejected".to_string()))
}

/// Which secret a request is signed with, and therefore what is signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    /// Registration request, signed with the app secret
    Registration,
    /// Any request from an already registered shop, signed with its shop secret
    Shop,
}

impl SignatureKind {
    pub fn header_name(&self) -> &'static str {
        match self {
            SignatureKind::Registration => APP_SIGNATURE_HEADER,
            SignatureKind::Shop => SHOP_SIGNATURE_HEADER,
        }
    }

    /// Whether the request carries a signature of this kind at all, readable or not.
    pub fn is_signed(&self, request: &InboundRequest) -> bool {
        if request.headers().contains_key(self.header_name()) {
            return true;
        }

        match self {
            SignatureKind::Shop if *request.method() == Method::GET => request
                .query_params()
                .contains_key(SHOP_SIGNATURE_HEADER),
            _ => false,
        }
    }

    /// Signature value carried by the request, if any.
    ///
    /// A header that is present but not visible ASCII yields `None`.
    pub fn signature(&self, request: &InboundRequest) -> Option<String> {
        if let Some(value) = request.headers().get(self.header_name()) {
            return value.to_str().ok().map(String::from);
        }

        match self {
            SignatureKind::Shop if *request.method() == Method::GET => {
                request.query_param(SHOP_SIGNATURE_HEADER)
            }
            _ => None,
        }
    }

    /// Bytes covered by the signature.
    pub fn canonical<'a>(&self, request: &'a InboundRequest) -> Cow<'a, [u8]> {
        match self {
            SignatureKind::Registration => Cow::Borrowed(request.query().as_bytes()),
            SignatureKind::Shop if *request.method() == Method::GET => {
                let query = request
                    .query()
                    .split('&')
                    .filter(|pair| {
                        !pair.is_empty()
                            && pair.split('=').next() != Some(SHOP_SIGNATURE_HEADER)
                    })
                    .collect::<Vec<_>>()
                    .join("&");
                Cow::Owned(query.into_bytes())
            }
            SignatureKind::Shop => Cow::Borrowed(request.body()),
        }
    }
}

/// Transport-neutral view of an inbound HTTP request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl InboundRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            uri,
            headers,
            body: body.into(),
        }
    }

    /// Add a header, replacing any existing value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Raw query string, empty if absent.
    pub fn query(&self) -> &str {
        self.uri.query().unwrap_or_default()
    }

    /// Decoded query parameters. An unparseable query yields no parameters.
    pub fn query_params(&self) -> HashMap<String, String> {
        Query::<HashMap<String, String>>::try_from_uri(&self.uri)
            .map(|Query(params)| params)
            .unwrap_or_default()
    }

    /// A single decoded query parameter, treating empty values as absent.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_params()
            .remove(name)
            .filter(|value| !value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(uri: &str) -> InboundRequest {
        InboundRequest::new(Method::GET, uri.parse().unwrap(), HeaderMap::new(), Bytes::new())
    }

    #[test]
    fn test_query_params() {
        let request = get("http://localhost?shop-id=123&shop-url=https://my-shop.com&timestamp=");

        assert_eq!(request.query_param("shop-id"), Some("123".into()));
        assert_eq!(
            request.query_param("shop-url"),
            Some("https://my-shop.com".into())
        );
        assert_eq!(request.query_param("timestamp"), None);
        assert_eq!(request.query_param("missing"), None);
    }

    #[test]
    fn test_registration_canonical_is_raw_query() {
        let request = get("http://localhost/app/register?shop-id=123&timestamp=1");
        assert_eq!(
            SignatureKind::Registration.canonical(&request).as_ref(),
            b"shop-id=123&timestamp=1"
        );
    }

    #[test]
    fn test_shop_get_canonical_strips_signature_pair() {
        let request =
            get("http://localhost/app/shop?shop-id=123&shopware-shop-signature=abc&timestamp=1");

        assert_eq!(
            SignatureKind::Shop.canonical(&request).as_ref(),
            b"shop-id=123&timestamp=1"
        );
        assert_eq!(
            SignatureKind::Shop.signature(&request),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_shop_post_canonical_is_body() {
        let request = InboundRequest::new(
            Method::POST,
            "http://localhost/app/register/confirm?x=1".parse().unwrap(),
            HeaderMap::new(),
            Bytes::from_static(b"{\"shopId\":\"123\"}"),
        );

        assert_eq!(
            SignatureKind::Shop.canonical(&request).as_ref(),
            b"{\"shopId\":\"123\"}"
        );
        assert_eq!(SignatureKind::Shop.signature(&request), None);
    }

    #[test]
    fn test_unreadable_header_is_signed_without_value() {
        let request = get("http://localhost?shop-id=123").with_header(
            HeaderName::from_static(APP_SIGNATURE_HEADER),
            HeaderValue::from_bytes(b"\xffforged").unwrap(),
        );

        assert!(SignatureKind::Registration.is_signed(&request));
        assert_eq!(SignatureKind::Registration.signature(&request), None);
        assert!(!SignatureKind::Shop.is_signed(&request));
    }

    #[test]
    fn test_empty_query_signature_counts_as_signed() {
        let request = get("http://localhost/app/shop?shop-id=123&shopware-shop-signature=");

        assert!(SignatureKind::Shop.is_signed(&request));
        assert_eq!(SignatureKind::Shop.signature(&request), None);
    }

    #[test]
    fn test_signature_from_header() {
        let request = get("http://localhost?shop-id=123").with_header(
            HeaderName::from_static(APP_SIGNATURE_HEADER),
            HeaderValue::from_static("deadbeef"),
        );

        assert_eq!(
            SignatureKind::Registration.signature(&request),
            Some("deadbeef".to_string())
        );
        assert_eq!(SignatureKind::Shop.signature(&request), None);
    }
}
