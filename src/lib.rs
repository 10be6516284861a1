//! Push Relay - verified web push subscriptions with broadcast fan-out.
//!
//! Browsers register their push subscriptions; each one is confirmed with a
//! probe notification before it is stored. A broadcast sends one payload to
//! every stored subscription concurrently and prunes the ones the push
//! service reports as gone.
//!
//! # Modules
//!
//! - [`notifications`] - payloads, subscription records, VAPID keys, delivery providers
//! - [`registry`] - subscription storage (in-memory, encrypted file)
//! - [`relay`] - registration, broadcast, caller replies
//! - [`config`] - configuration loading/saving
//! - [`commands`] - CLI subcommand bodies

pub mod commands;
pub mod config;
pub mod crypto;
pub mod notifications;
pub mod registry;
pub mod relay;

// Re-export commonly used types
pub use config::Config;
pub use notifications::{DeliveryFailure, DeliveryProvider, NotificationPayload, SubscriptionRecord};
pub use registry::{Registry, RegistryError};
pub use relay::{BroadcastOutcome, BroadcastSummary, PushRelay, RegisterError, Reply};
