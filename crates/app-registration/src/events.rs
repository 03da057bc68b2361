//! Lifecycle events emitted by the registration handshake.

use crate::error::RegistrationError;
use crate::shop::Shop;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// A registration lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Confirmation persisted; emitted before `RegistrationCompleted`
    RegistrationBeforeCompleted { shop: Shop },
    /// Registration fully completed
    RegistrationCompleted { shop: Shop },
}

impl LifecycleEvent {
    pub fn shop(&self) -> &Shop {
        match self {
            LifecycleEvent::RegistrationBeforeCompleted { shop }
            | LifecycleEvent::RegistrationCompleted { shop } => shop,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::RegistrationBeforeCompleted { .. } => "registration.before_completed",
            LifecycleEvent::RegistrationCompleted { .. } => "registration.completed",
        }
    }
}

/// Delivers lifecycle events to interested parties.
///
/// Events published in sequence must be observed in that sequence.
#[async_trait]
pub trait EventNotifier: Send + Sync {
    async fn publish(&self, event: LifecycleEvent) -> Result<(), RegistrationError>;
}

/// Receives events from a [`ListenerNotifier`].
#[async_trait]
pub trait LifecycleListener: Send + Sync {
    async fn on_event(&self, event: &LifecycleEvent) -> Result<(), RegistrationError>;
}

/// Calls each listener in registration order and waits for it to finish.
///
/// The first listener error stops delivery and is returned to the publisher.
#[derive(Clone, Default)]
pub struct ListenerNotifier {
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl ListenerNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[async_trait]
impl EventNotifier for ListenerNotifier {
    async fn publish(&self, event: LifecycleEvent) -> Result<(), RegistrationError> {
        for listener in &self.listeners {
            listener.on_event(&event).await?;
        }
        Ok(())
    }
}

/// Fans events out over a tokio broadcast channel.
///
/// Publishing never waits for subscribers. With no subscribers the event is
/// dropped.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventNotifier for BroadcastNotifier {
    async fn publish(&self, event: LifecycleEvent) -> Result<(), RegistrationError> {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => debug!(event = name, receivers, "Broadcast lifecycle event"),
            Err(_) => debug!(event = name, "No subscribers for lifecycle event"),
        }
        Ok(())
    }
}

/// Logs every lifecycle event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

#[async_trait]
impl LifecycleListener for LoggingListener {
    async fn on_event(&self, event: &LifecycleEvent) -> Result<(), RegistrationError> {
        info!(
            event = event.name(),
            shop_id = %event.shop().shop_id(),
            shop_url = %event.shop().shop_url(),
            "Lifecycle event"
        );
        Ok(())
    }
}
