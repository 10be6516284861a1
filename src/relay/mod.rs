//! Subscription registration and broadcast.
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────── PushRelay ────────────┐
//! register ────> │ Registrar ──probe──┐              │
//!                │     │              ↓              │
//!                │     │        DeliveryProvider ────┼──> push services
//!                │     ↓              ↑              │
//!                │  Registry <──── Broadcaster <─────┼──── broadcast
//!                └───────────────────────────────────┘
//! ```
//!
//! The provider and registry are built once and shared by both halves;
//! there is no global client state.

pub mod broadcast;
pub mod registration;
pub mod reply;

use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::notifications::{DeliveryProvider, NotificationPayload, SubscriptionRecord, WebPushProvider};
use crate::registry::{FileRegistry, Registry, RegistryError};

pub use broadcast::{BroadcastError, BroadcastOutcome, BroadcastSummary, Broadcaster};
pub use registration::{RegisterError, Registrar};
pub use reply::Reply;

/// Registration and broadcast over one registry and one provider.
pub struct PushRelay {
    registrar: Registrar,
    broadcaster: Broadcaster,
    registry: Arc<dyn Registry>,
}

impl std::fmt::Debug for PushRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRelay")
            .field("registrar", &self.registrar)
            .field("broadcaster", &self.broadcaster)
            .finish_non_exhaustive()
    }
}

impl PushRelay {
    /// Wire a relay from explicit parts.
    pub fn new(
        registry: Arc<dyn Registry>,
        provider: Arc<dyn DeliveryProvider>,
        probe: NotificationPayload,
        default_icon: Option<String>,
    ) -> Self {
        Self {
            registrar: Registrar::new(Arc::clone(&registry), Arc::clone(&provider), probe),
            broadcaster: Broadcaster::new(Arc::clone(&registry), provider, default_icon),
            registry,
        }
    }

    /// Build the production relay: encrypted file registry + web push provider.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = Arc::new(FileRegistry::open(config.store_path()?)?);
        let provider = Arc::new(WebPushProvider::new(
            config.vapid_keys()?,
            config.vapid_subject.clone(),
            config.ttl_secs,
            config.request_timeout(),
        )?);

        Ok(Self::new(
            registry,
            provider,
            config.probe_payload()?,
            config.broadcast_icon(),
        ))
    }

    /// Verify and store a new subscription from raw JSON.
    pub async fn register_json(&self, raw: &str) -> Result<(), RegisterError> {
        self.registrar.register_json(raw).await
    }

    /// Verify and store a new subscription.
    pub async fn register(&self, record: SubscriptionRecord) -> Result<(), RegisterError> {
        self.registrar.register(record).await
    }

    /// Broadcast a notification to every stored subscription.
    pub async fn broadcast(
        &self,
        title: &str,
        message: &str,
        icon: Option<String>,
    ) -> Result<BroadcastOutcome, BroadcastError> {
        self.broadcaster.broadcast_message(title, message, icon).await
    }

    /// Every stored subscription.
    pub async fn subscriptions(&self) -> Result<Vec<SubscriptionRecord>, RegistryError> {
        self.registry.list_all().await
    }
}
