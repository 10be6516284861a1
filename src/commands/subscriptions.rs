//! Subscription commands: register, broadcast, list.
//!
//! ```bash
//! # Register a subscription posted by a browser
//! push-relay register --file subscription.json
//! cat subscription.json | push-relay register
//!
//! # Send to everyone
//! push-relay broadcast --title "Hi" --message "Test"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use crate::notifications::subscription::endpoint_tail;
use crate::registry::Registry;
use crate::relay::{PushRelay, Reply};

/// Register the subscription JSON in `file`, or on stdin when `None`.
///
/// Only failing to read the input is an error; registration outcomes are
/// reported in the reply.
pub async fn register(relay: &PushRelay, file: Option<&Path>) -> Result<Reply> {
    let raw = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read subscription from stdin")?;
            raw
        }
    };

    Ok(Reply::from_register(&relay.register_json(&raw).await))
}

/// Broadcast a notification and summarize the result.
pub async fn broadcast(
    relay: &PushRelay,
    title: &str,
    message: &str,
    icon: Option<String>,
) -> Reply {
    let result = relay.broadcast(title, message, icon).await;
    if let Err(e) = &result {
        log::error!("[Broadcast] {e}");
    }
    Reply::from_broadcast(&result)
}

/// Print how many subscriptions are stored, and each endpoint tail.
pub async fn list(registry: &dyn Registry) -> Result<()> {
    let subscriptions = registry.list_all().await?;
    println!("{} subscription(s)", subscriptions.len());
    for sub in &subscriptions {
        println!("  ...{}", endpoint_tail(&sub.endpoint));
    }
    Ok(())
}
