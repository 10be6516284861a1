//! CLI subcommand implementations for push-relay.
//!
//! - [`subscriptions`] - register, broadcast, list
//! - [`keys`] - VAPID key generation
//!
//! # Usage
//!
//! ```ignore
//! use push_relay::{commands, Config, PushRelay};
//!
//! let relay = PushRelay::from_config(&Config::load()?)?;
//! let reply = commands::broadcast(&relay, "Hi", "Test", None).await;
//! println!("{}", reply.to_json());
//! ```

pub mod keys;
pub mod subscriptions;

#[doc(inline)]
pub use keys::generate as generate_vapid_keys;
#[doc(inline)]
pub use subscriptions::{broadcast, list, register};
