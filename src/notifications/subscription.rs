//! Browser push subscription records.
//!
//! The record shape mirrors what a browser's `PushSubscription.toJSON()`
//! produces, so a subscription can be posted to us unchanged:
//!
//! ```json
//! {
//!   "endpoint": "https://fcm.googleapis.com/fcm/send/...",
//!   "expirationTime": null,
//!   "keys": { "p256dh": "...", "auth": "..." }
//! }
//! ```
//!
//! Fields we don't interpret (`expirationTime`, vendor extras) are kept in
//! flattened maps and written back exactly as received.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of trailing endpoint characters shown in logs.
const ENDPOINT_LOG_CHARS: usize = 10;

/// Key material the push service needs to encrypt a payload for this browser.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Browser's P-256 ECDH public key (base64url).
    #[serde(default)]
    pub p256dh: String,
    /// Shared auth secret (base64url).
    #[serde(default)]
    pub auth: String,
    /// Any other members of the `keys` object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A verified delivery endpoint.
///
/// `endpoint` is the natural key: registries hold at most one record per
/// endpoint URL.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Push service endpoint URL.
    #[serde(default)]
    pub endpoint: String,
    /// Encryption keys supplied by the browser.
    #[serde(default)]
    pub keys: SubscriptionKeys,
    /// Provider-specific metadata, passed through opaquely.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SubscriptionRecord {
    /// Build a record with no extra metadata.
    pub fn new(
        endpoint: impl Into<String>,
        p256dh: impl Into<String>,
        auth: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            keys: SubscriptionKeys {
                p256dh: p256dh.into(),
                auth: auth.into(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Parse a caller-submitted descriptor and check it structurally.
    ///
    /// Returns a human-readable reason on failure. No I/O happens here.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let record: Self = serde_json::from_str(raw)
            .map_err(|e| format!("Invalid subscription format: {e}"))?;
        record.validate().map_err(|field| format!("Invalid subscription format: missing {field}"))?;
        Ok(record)
    }

    /// Check that `endpoint`, `keys.auth` and `keys.p256dh` are all present.
    ///
    /// On failure, names the first missing field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.endpoint.trim().is_empty() {
            return Err("endpoint");
        }
        if self.keys.auth.trim().is_empty() {
            return Err("keys.auth");
        }
        if self.keys.p256dh.trim().is_empty() {
            return Err("keys.p256dh");
        }
        Ok(())
    }

    /// Trailing part of the endpoint, safe to put in logs.
    pub fn endpoint_tail(&self) -> &str {
        endpoint_tail(&self.endpoint)
    }
}

/// Last few characters of an endpoint URL.
///
/// Full endpoints act as bearer capabilities for the push service, so only
/// the tail is ever logged.
pub fn endpoint_tail(endpoint: &str) -> &str {
    endpoint
        .char_indices()
        .rev()
        .nth(ENDPOINT_LOG_CHARS - 1)
        .map_or(endpoint, |(idx, _)| &endpoint[idx..])
}
