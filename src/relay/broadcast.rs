//! Broadcast fan-out with dead-endpoint pruning.
//!
//! One payload is serialized once and sent to every stored subscription at
//! the same time. Each send settles independently; the call returns after
//! all of them (and any prune they trigger) have finished.
//!
//! | Provider result        | Counted as | Registry              |
//! |------------------------|------------|-----------------------|
//! | success                | succeeded  | untouched             |
//! | gone (404 / 410)       | failed     | record deleted        |
//! | anything else          | failed     | untouched             |

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;

use crate::notifications::{DeliveryProvider, NotificationPayload, SubscriptionRecord};
use crate::registry::Registry;

/// Why a broadcast could not run.
///
/// Per-recipient failures never end up here; they are counted in
/// [`BroadcastSummary`].
#[derive(Debug)]
pub enum BroadcastError {
    /// Title or message missing. The registry was not read.
    InvalidPayload(String),
    /// Reading the registry (or serializing the payload) failed.
    Unexpected(anyhow::Error),
}

impl BroadcastError {
    /// Status code for the inbound operation surface.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidPayload(_) => 400,
            Self::Unexpected(_) => 500,
        }
    }
}

impl std::fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPayload(msg) => write!(f, "{msg}"),
            Self::Unexpected(e) => write!(f, "Broadcast failed: {e:#}"),
        }
    }
}

impl std::error::Error for BroadcastError {}

/// Aggregate counts for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastSummary {
    /// Number of recipients a send was issued to.
    pub attempted: usize,
    /// Sends the push service accepted.
    pub succeeded: usize,
    /// `attempted - succeeded`.
    pub failed: usize,
    /// Dead subscriptions removed from the registry.
    pub pruned: usize,
}

impl BroadcastSummary {
    fn from_outcomes(outcomes: &[RecipientOutcome]) -> Self {
        let attempted = outcomes.len();
        let succeeded = outcomes
            .iter()
            .filter(|o| matches!(o, RecipientOutcome::Delivered))
            .count();
        let pruned = outcomes
            .iter()
            .filter(|o| matches!(o, RecipientOutcome::Pruned))
            .count();

        Self {
            attempted,
            succeeded,
            failed: attempted - succeeded,
            pruned,
        }
    }
}

/// Result of a broadcast that ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// The registry is empty; nothing was sent.
    NoRecipients,
    /// Every recipient has settled.
    Delivered(BroadcastSummary),
}

/// How one recipient's delivery settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecipientOutcome {
    Delivered,
    /// Endpoint gone and its record deleted.
    Pruned,
    /// Endpoint gone but the delete failed; retried on the next broadcast.
    PruneFailed,
    /// Transient or unclassified failure; record kept.
    Failed,
}

/// Sends notifications to every registered subscription.
pub struct Broadcaster {
    registry: Arc<dyn Registry>,
    provider: Arc<dyn DeliveryProvider>,
    default_icon: Option<String>,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("default_icon", &self.default_icon)
            .finish_non_exhaustive()
    }
}

impl Broadcaster {
    /// Create a broadcaster. `default_icon` fills payloads sent without one.
    pub fn new(
        registry: Arc<dyn Registry>,
        provider: Arc<dyn DeliveryProvider>,
        default_icon: Option<String>,
    ) -> Self {
        Self {
            registry,
            provider,
            default_icon,
        }
    }

    /// Validate the fields and broadcast.
    pub async fn broadcast_message(
        &self,
        title: &str,
        message: &str,
        icon: Option<String>,
    ) -> Result<BroadcastOutcome, BroadcastError> {
        let payload =
            NotificationPayload::new(title, message, icon).map_err(BroadcastError::InvalidPayload)?;
        self.broadcast(payload).await
    }

    /// Send `payload` to every stored subscription.
    ///
    /// Partial or total delivery failure is reported in the summary, not as an
    /// error. Only a failure to read the registry fails the call.
    pub async fn broadcast(
        &self,
        payload: NotificationPayload,
    ) -> Result<BroadcastOutcome, BroadcastError> {
        let payload = match &self.default_icon {
            Some(icon) => payload.with_default_icon(icon),
            None => payload,
        };

        let recipients = self
            .registry
            .list_all()
            .await
            .map_err(|e| BroadcastError::Unexpected(e.into()))?;
        if recipients.is_empty() {
            log::info!("[Broadcast] No subscriptions found");
            return Ok(BroadcastOutcome::NoRecipients);
        }

        let body = payload.to_bytes().map_err(BroadcastError::Unexpected)?;

        log::info!(
            "[Broadcast] Attempting to send notification to {} subscriber(s)...",
            recipients.len()
        );

        let outcomes = join_all(recipients.iter().map(|r| self.deliver(r, &body))).await;
        let summary = BroadcastSummary::from_outcomes(&outcomes);

        log::info!(
            "[Broadcast] Finished sending: {} succeeded, {} failed ({} pruned)",
            summary.succeeded,
            summary.failed,
            summary.pruned
        );
        Ok(BroadcastOutcome::Delivered(summary))
    }

    async fn deliver(&self, recipient: &SubscriptionRecord, body: &[u8]) -> RecipientOutcome {
        let failure = match self.provider.send(recipient, body).await {
            Ok(()) => return RecipientOutcome::Delivered,
            Err(failure) => failure,
        };

        let tail = recipient.endpoint_tail();
        log::warn!("[Broadcast] Failed to send to ...{tail}: {failure}");

        if !failure.terminal_gone {
            return RecipientOutcome::Failed;
        }

        match self.registry.delete_by_endpoint(&recipient.endpoint).await {
            Ok(()) => {
                log::info!("[Broadcast] Removed expired subscription ...{tail}");
                RecipientOutcome::Pruned
            }
            Err(e) => {
                log::error!("[Broadcast] Error removing subscription ...{tail}: {e}");
                RecipientOutcome::PruneFailed
            }
        }
    }
}
