//! Web push notification building blocks.
//!
//! # Architecture
//!
//! ```text
//! NotificationPayload ──serialize once──┐
//!                                       ↓
//! SubscriptionRecord ──> DeliveryProvider::send ──> browser push service
//!                                       │
//!                                       └── Ok / DeliveryFailure { terminal_gone, status }
//! ```
//!
//! # VAPID Keys
//!
//! The relay signs every push request with one P-256 VAPID keypair. The
//! public half is what browsers pass as `applicationServerKey` when they
//! subscribe; subscriptions made against a different key are rejected by
//! the push service.

pub mod payload;
pub mod provider;
pub mod subscription;
pub mod vapid;

pub use payload::NotificationPayload;
pub use provider::{DeliveryFailure, DeliveryProvider, WebPushProvider};
pub use subscription::{SubscriptionKeys, SubscriptionRecord};
pub use vapid::VapidKeys;
