//! Configuration for the registration service.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Placeholder substituted with the shop id in the confirmation URL.
pub const SHOP_ID_PLACEHOLDER: &str = "{shop_id}";

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Application identity (required)
    pub app: AppIdentity,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Shop storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Signature enforcement
    #[serde(default)]
    pub auth: AuthConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

/// Process-wide identity of the app towards the platform.
///
/// Loaded once at startup and never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct AppIdentity {
    /// Application name as registered with the platform
    pub name: String,

    /// Application-level shared secret, used for registration requests
    pub secret: SecretString,

    /// Confirmation callback URL, optionally containing `{shop_id}`
    pub confirmation_url: String,
}

impl AppIdentity {
    pub fn new(
        name: impl Into<String>,
        secret: impl Into<String>,
        confirmation_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            secret: SecretString::new(secret.into()),
            confirmation_url: confirmation_url.into(),
        }
    }

    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }

    /// Confirmation URL handed to the platform for the given shop.
    pub fn confirmation_url_for(&self, shop_id: &str) -> String {
        self.confirmation_url
            .replace(SHOP_ID_PLACEHOLDER, &urlencoding::encode(shop_id))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Persist shops to an encrypted file (if false, shops live in memory only)
    #[serde(default)]
    pub persist: bool,

    /// Path to the encrypted shop file
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// Key material for the encrypted store; required when `persist` is set
    #[serde(default)]
    pub encryption_key: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Reject requests that carry no signature
    #[serde(default = "default_true")]
    pub enforce_signatures: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Global requests per minute on the registration routes
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl ServerConfig {
    /// Address to bind. An unparseable listen address is an error.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid SERVER__LISTEN_ADDR: {:?}", self.listen_addr))?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persist: false,
            path: default_storage_path(),
            encryption_key: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enforce_signatures: true,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("/data/shops.enc")
}

fn default_true() -> bool {
    true
}

fn default_per_minute() -> u32 {
    60
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
