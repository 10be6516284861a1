//! Integration tests for the web push provider and the full relay.
//!
//! A wiremock server stands in for the browser vendor's push service.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::elliptic_curve::rand_core::{OsRng, RngCore};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use push_relay::notifications::{VapidKeys, WebPushProvider};
use push_relay::registry::FileRegistry;
use push_relay::{
    BroadcastOutcome, DeliveryProvider, NotificationPayload, PushRelay, RegisterError, Reply,
    SubscriptionRecord,
};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Subscription with real browser-style key material, pointing at `server`.
fn browser_subscription(server: &MockServer, id: &str) -> SubscriptionRecord {
    let secret = p256::SecretKey::random(&mut OsRng);
    let public = secret.public_key().to_encoded_point(false);

    let mut auth = [0u8; 16];
    OsRng.fill_bytes(&mut auth);

    SubscriptionRecord::new(
        format!("{}/push/{id}", server.uri()),
        BASE64URL.encode(public.as_bytes()),
        BASE64URL.encode(auth),
    )
}

fn provider() -> Arc<WebPushProvider> {
    Arc::new(
        WebPushProvider::new(
            VapidKeys::generate(),
            "mailto:test@example.com",
            60,
            Duration::from_secs(5),
        )
        .unwrap(),
    )
}

async fn push_service_answering(id: &str, status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/push/{id}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

mod provider_tests {
    use super::*;

    #[tokio::test]
    async fn sends_encrypted_vapid_signed_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push/a"))
            .and(header("content-encoding", "aes128gcm"))
            .and(header("ttl", "60"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let sub = browser_subscription(&server, "a");
        provider().send(&sub, br#"{"title":"Hi"}"#).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        // Payload is encrypted, never sent in the clear.
        assert!(!String::from_utf8_lossy(&requests[0].body).contains("Hi"));
    }

    #[tokio::test]
    async fn gone_and_not_found_are_terminal() {
        for status in [404, 410] {
            let server = push_service_answering("a", status).await;
            let sub = browser_subscription(&server, "a");

            let failure = provider().send(&sub, b"{}").await.unwrap_err();
            assert!(failure.terminal_gone, "{status} should be terminal");
            assert_eq!(failure.status, Some(status));
        }
    }

    #[tokio::test]
    async fn rate_limit_and_server_errors_are_not_terminal() {
        for status in [400, 413, 429, 500, 503] {
            let server = push_service_answering("a", status).await;
            let sub = browser_subscription(&server, "a");

            let failure = provider().send(&sub, b"{}").await.unwrap_err();
            assert!(!failure.terminal_gone, "{status} should not be terminal");
            assert_eq!(failure.status, Some(status));
        }
    }

    #[tokio::test]
    async fn unreachable_push_service_is_not_terminal() {
        // Non-pooled server: a pooled one keeps listening after drop.
        let server = MockServer::builder().start().await;
        let sub = browser_subscription(&server, "a");
        drop(server);

        let failure = provider().send(&sub, b"{}").await.unwrap_err();
        assert!(!failure.terminal_gone);
        assert_eq!(failure.status, None);
    }
}

mod relay_tests {
    use super::*;

    fn relay(dir: &tempfile::TempDir) -> PushRelay {
        let registry = FileRegistry::open(dir.path().join("subscriptions.enc")).unwrap();
        let probe = NotificationPayload::new("Notifications enabled", "Welcome", None).unwrap();
        PushRelay::new(
            Arc::new(registry),
            provider(),
            probe,
            Some("/pwa-512x512.png".to_string()),
        )
    }

    #[tokio::test]
    async fn register_then_duplicate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push/a"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let relay = relay(&dir);
        let sub = browser_subscription(&server, "a");

        let first = relay.register(sub.clone()).await;
        assert_eq!(Reply::from_register(&first).status, 201);

        let second = relay.register(sub).await;
        assert!(matches!(second, Err(RegisterError::Duplicate(_))));
        assert_eq!(Reply::from_register(&second).status, 400);

        assert_eq!(relay.subscriptions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn register_expired_subscription_is_refused() {
        let server = push_service_answering("dead", 410).await;
        let dir = tempfile::tempdir().unwrap();
        let relay = relay(&dir);

        let result = relay.register(browser_subscription(&server, "dead")).await;
        assert!(matches!(result, Err(RegisterError::Unreachable(_))));
        assert_eq!(
            Reply::from_register(&result).message,
            "Subscription is expired or invalid"
        );
        assert!(relay.subscriptions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_json_round_trips_extra_fields() {
        let server = push_service_answering("a", 201).await;
        let dir = tempfile::tempdir().unwrap();
        let relay = relay(&dir);

        let sub = browser_subscription(&server, "a");
        let mut raw = serde_json::to_value(&sub).unwrap();
        raw["expirationTime"] = serde_json::Value::Null;
        raw["keys"]["extra"] = serde_json::json!("kept");

        relay.register_json(&raw.to_string()).await.unwrap();

        let stored = relay.subscriptions().await.unwrap();
        assert_eq!(serde_json::to_value(&stored[0]).unwrap(), raw);
    }

    #[tokio::test]
    async fn broadcast_prunes_gone_subscriptions() {
        let server = MockServer::start().await;
        for id in ["a", "c"] {
            Mock::given(method("POST"))
                .and(path(format!("/push/{id}")))
                .respond_with(ResponseTemplate::new(201))
                .mount(&server)
                .await;
        }
        // Accepts the probe, then reports the subscription gone.
        Mock::given(method("POST"))
            .and(path("/push/b"))
            .respond_with(ResponseTemplate::new(201))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/push/b"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let relay = relay(&dir);
        for id in ["a", "b", "c"] {
            relay.register(browser_subscription(&server, id)).await.unwrap();
        }

        let outcome = relay.broadcast("Hi", "Test", None).await.unwrap();
        let reply = Reply::from_broadcast(&Ok(outcome));
        assert_eq!(reply.status, 200);
        assert_eq!(
            reply.message,
            "Notifications sent (attempted: 3, successful: 2, failed: 1)"
        );

        let remaining: Vec<String> = relay
            .subscriptions()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.endpoint)
            .collect();
        assert_eq!(
            remaining,
            [format!("{}/push/a", server.uri()), format!("{}/push/c", server.uri())]
        );
    }

    #[tokio::test]
    async fn broadcast_with_no_subscriptions_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let relay = relay(&dir);

        let result = relay.broadcast("Hi", "Test", None).await;
        assert_eq!(result.as_ref().unwrap(), &BroadcastOutcome::NoRecipients);
        assert_eq!(Reply::from_broadcast(&result).status, 404);
    }

    #[tokio::test]
    async fn broadcast_without_title_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let relay = relay(&dir);

        let result = relay.broadcast("", "Test", None).await;
        let reply = Reply::from_broadcast(&result);
        assert_eq!(reply.status, 400);
        assert_eq!(reply.message, "Title and message are required");
    }
}
