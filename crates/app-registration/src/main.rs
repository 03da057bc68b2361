//! App registration service - Entry point.

use app_registration::{
    api::{create_router_with_rate_limit, AppState, RateLimitState},
    auth::{HmacRequestVerifier, ShopResolver},
    config::{Config, LogConfig, StorageConfig},
    events::{ListenerNotifier, LoggingListener},
    registration::{RegistrationService, SignaturePolicy},
    shop::{EncryptedShopStore, MemoryShopStore, ShopStore},
};
use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log);

    if let Err(e) = run(config).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);

    if log.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn open_store(storage: &StorageConfig) -> Result<Arc<dyn ShopStore>> {
    if !storage.persist {
        warn!("Persistence disabled, using in-memory shop store (data will be lost on restart)");
        return Ok(Arc::new(MemoryShopStore::new()));
    }

    let key = storage
        .encryption_key
        .as_ref()
        .context("STORAGE__ENCRYPTION_KEY is required when STORAGE__PERSIST is set")?;

    let store = EncryptedShopStore::open(storage.path.clone(), key.expose_secret())
        .await
        .context("Failed to open encrypted shop store")?;

    Ok(Arc::new(store))
}

async fn run(config: Config) -> Result<()> {
    info!(app = %config.app.name, "Starting app registration service");

    let store = open_store(&config.storage).await?;
    let verifier = Arc::new(HmacRequestVerifier);

    let policy = SignaturePolicy::from_enforced(config.auth.enforce_signatures);
    if policy == SignaturePolicy::Optional {
        warn!("Signature enforcement disabled, unsigned requests will be accepted");
    }

    let notifier = ListenerNotifier::new().with_listener(Arc::new(LoggingListener));

    let registration = RegistrationService::new(config.app.clone(), store.clone())
        .with_verifier(verifier.clone())
        .with_notifier(Arc::new(notifier))
        .with_signature_policy(policy);
    let resolver = ShopResolver::new(store, verifier);

    let state = AppState::new(registration, resolver);
    let rate_limit = RateLimitState::new(config.rate_limit.per_minute);
    let app = create_router_with_rate_limit(state, rate_limit);

    let addr = config.server.socket_addr()?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")
}
