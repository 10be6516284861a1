//! Push delivery providers.
//!
//! A [`DeliveryProvider`] takes one subscription and one serialized payload
//! and reports whether the push service accepted it. Failures are classified
//! so callers can tell a permanently dead endpoint (404 / 410) from anything
//! that might succeed later.

use std::time::Duration;

use async_trait::async_trait;
use anyhow::{Context, Result};

use super::subscription::SubscriptionRecord;
use super::vapid::VapidKeys;

/// Why a single delivery failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// HTTP status from the push service, if a response was received.
    pub status: Option<u16>,
    /// The push service says this endpoint will never accept deliveries again.
    pub terminal_gone: bool,
    /// Response body or transport error text.
    pub detail: String,
}

impl DeliveryFailure {
    /// Build a failure from a push service response status.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            terminal_gone: is_terminal_status(status),
            detail: detail.into(),
        }
    }

    /// Failure with no HTTP response (timeout, DNS, bad keys, ...).
    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            status: None,
            terminal_gone: false,
            detail: detail.into(),
        }
    }

    /// Endpoint is permanently gone (410).
    pub fn gone() -> Self {
        Self::from_status(410, "push subscription has unsubscribed or expired")
    }
}

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) if self.terminal_gone => {
                write!(f, "Endpoint gone (HTTP {status}): {}", self.detail)
            }
            Some(status) => write!(f, "Push send failed (HTTP {status}): {}", self.detail),
            None => write!(f, "Push send failed: {}", self.detail),
        }
    }
}

impl std::error::Error for DeliveryFailure {}

/// 404 and 410 mean the subscription is expired or was revoked.
pub fn is_terminal_status(status: u16) -> bool {
    matches!(status, 404 | 410)
}

/// Boundary to the push transport.
///
/// Implementations must be safe to call concurrently: a broadcast issues
/// one `send` per recipient at the same time.
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    /// Deliver `payload` to one subscription.
    async fn send(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<(), DeliveryFailure>;
}

/// Sends real web push messages (RFC 8030) with VAPID authentication.
///
/// Uses the `web-push` crate for RFC 8291 payload encryption and VAPID
/// signing, then posts the request through a shared `reqwest::Client` so
/// connections are pooled across a broadcast.
#[derive(Debug)]
pub struct WebPushProvider {
    client: reqwest::Client,
    vapid: VapidKeys,
    subject: String,
    ttl_secs: u32,
}

impl WebPushProvider {
    /// Build a provider.
    ///
    /// `subject` is the VAPID `sub` claim (a `mailto:` or `https:` contact).
    pub fn new(
        vapid: VapidKeys,
        subject: impl Into<String>,
        ttl_secs: u32,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            vapid,
            subject: subject.into(),
            ttl_secs,
        })
    }

    fn build_message(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<web_push::WebPushMessage> {
        use web_push::{ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder};

        let sub_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut sig_builder =
            VapidSignatureBuilder::from_base64(self.vapid.private_key_base64url(), &sub_info)
                .context("Failed to build VAPID signature")?;
        sig_builder.add_claim("sub", self.subject.as_str());
        let sig = sig_builder.build().context("Failed to sign VAPID JWT")?;

        let mut builder = WebPushMessageBuilder::new(&sub_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(sig);
        builder.set_ttl(self.ttl_secs);

        builder.build().context("Failed to build web push message")
    }
}

#[async_trait]
impl DeliveryProvider for WebPushProvider {
    async fn send(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<(), DeliveryFailure> {
        let message = self
            .build_message(subscription, payload)
            .map_err(|e| DeliveryFailure::transport(format!("{e:#}")))?;

        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(urgency) = message.urgency {
            request = request.header("Urgency", urgency.to_string());
        }

        if let Some(topic) = message.topic {
            request = request.header("Topic", topic);
        }

        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryFailure::transport(format!("Web push HTTP request failed: {e}")))?;
        let status = response.status().as_u16();

        if (200..300).contains(&status) {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let failure = DeliveryFailure::from_status(status, body);
        if failure.terminal_gone {
            log::info!(
                "[WebPush] Subscription {} expired (HTTP {status})",
                subscription.endpoint_tail()
            );
        } else if status == 429 {
            log::warn!("[WebPush] Rate limited (429) for {}", subscription.endpoint_tail());
        }
        Err(failure)
    }
}
