//! App registration - signed handshake between a platform and a third-party app.
//!
//! This crate implements the app side of the platform handshake:
//! - Register a shop and issue it a secret, proving possession to the platform
//! - Confirm the registration by storing the platform's API credentials
//! - Authenticate later requests from registered shops with their secret

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod registration;
pub mod shop;

pub use config::{AppIdentity, Config};
pub use error::RegistrationError;
pub use events::{EventNotifier, LifecycleEvent};
pub use registration::{RegisterResponse, RegistrationService, SignaturePolicy};
pub use shop::{Shop, ShopStatus, ShopStore};
