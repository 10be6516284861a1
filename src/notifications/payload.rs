//! Notification payloads sent to service workers.
//!
//! The service worker receives the decrypted payload as JSON:
//!
//! ```json
//! { "title": "Hi", "message": "Test", "icon": "/pwa-512x512.png" }
//! ```

use serde::{Deserialize, Serialize};

/// A notification to deliver. Immutable once built.
///
/// Deserializing goes through [`NotificationPayload::new`], so an empty
/// title or message is rejected there too.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPayload")]
pub struct NotificationPayload {
    title: String,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    icon: Option<String>,
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    icon: Option<String>,
}

impl TryFrom<RawPayload> for NotificationPayload {
    type Error = String;

    fn try_from(raw: RawPayload) -> Result<Self, Self::Error> {
        Self::new(raw.title, raw.message, raw.icon)
    }
}

impl NotificationPayload {
    /// Build a payload, rejecting an empty title or message.
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        icon: Option<String>,
    ) -> Result<Self, String> {
        let title = title.into();
        let message = message.into();

        if title.trim().is_empty() || message.trim().is_empty() {
            return Err("Title and message are required".to_string());
        }

        Ok(Self {
            title,
            message,
            icon: icon.filter(|i| !i.is_empty()),
        })
    }

    /// Fill in `icon` if the caller didn't supply one.
    pub fn with_default_icon(mut self, icon: &str) -> Self {
        if self.icon.is_none() && !icon.is_empty() {
            self.icon = Some(icon.to_string());
        }
        self
    }

    /// Notification title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Notification body text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Icon reference, if any.
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Serialize to the bytes handed to the provider.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
