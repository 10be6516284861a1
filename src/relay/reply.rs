//! Caller-facing replies.
//!
//! Translates registration and broadcast results into a status code and a
//! JSON body, the shape an HTTP front end or the CLI hands back:
//!
//! ```json
//! { "success": true, "message": "Notifications sent (attempted: 3, successful: 2, failed: 1)",
//!   "attempted": 3, "succeeded": 2, "failed": 1, "pruned": 1 }
//! ```

use serde::Serialize;

use super::broadcast::{BroadcastError, BroadcastOutcome, BroadcastSummary};
use super::registration::RegisterError;

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    /// HTTP-style status code.
    #[serde(skip)]
    pub status: u16,
    /// Whether the operation did what was asked.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Broadcast counts, when a broadcast ran.
    #[serde(flatten)]
    pub summary: Option<BroadcastSummary>,
}

impl Reply {
    fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            success: (200..300).contains(&status),
            message: message.into(),
            summary: None,
        }
    }

    /// Reply for a registration attempt.
    pub fn from_register(result: &Result<(), RegisterError>) -> Self {
        match result {
            Ok(()) => Self::new(201, "Subscription saved and verified"),
            Err(e) => Self::new(e.status_code(), e.to_string()),
        }
    }

    /// Reply for a broadcast.
    pub fn from_broadcast(result: &Result<BroadcastOutcome, BroadcastError>) -> Self {
        match result {
            Ok(BroadcastOutcome::NoRecipients) => Self::new(404, "No subscriptions found"),
            Ok(BroadcastOutcome::Delivered(summary)) => Self {
                summary: Some(*summary),
                ..Self::new(
                    200,
                    format!(
                        "Notifications sent (attempted: {}, successful: {}, failed: {})",
                        summary.attempted, summary.succeeded, summary.failed
                    ),
                )
            },
            Err(e) => Self::new(e.status_code(), e.to_string()),
        }
    }

    /// Body as JSON text.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|_| format!("{{\"success\":{},\"message\":\"\"}}", self.success))
    }
}
