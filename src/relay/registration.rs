//! Subscription registration.
//!
//! A subscription is only stored after a probe notification to it has been
//! accepted by the push service:
//!
//! ```text
//! descriptor ─> validate ─> duplicate lookup ─> probe send ─> insert_unique
//!                  │               │                │               │
//!            InvalidFormat     Duplicate      Unreachable /     Duplicate
//!                                              Unexpected      (lost race)
//! ```

use std::sync::Arc;

use crate::notifications::{DeliveryProvider, NotificationPayload, SubscriptionRecord};
use crate::registry::{Registry, RegistryError};

/// Why a registration was refused.
#[derive(Debug)]
pub enum RegisterError {
    /// Descriptor is malformed or missing required fields. No I/O was done.
    InvalidFormat(String),
    /// The endpoint is already registered.
    Duplicate(String),
    /// The push service reports the endpoint as expired or revoked.
    Unreachable(String),
    /// Storage or transport failure not attributable to the caller.
    Unexpected(anyhow::Error),
}

impl RegisterError {
    /// Status code for the inbound operation surface.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidFormat(_) | Self::Duplicate(_) | Self::Unreachable(_) => 400,
            Self::Unexpected(_) => 500,
        }
    }
}

impl std::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat(msg) => write!(f, "{msg}"),
            Self::Duplicate(_) => write!(f, "Subscription already exists"),
            Self::Unreachable(_) => write!(f, "Subscription is expired or invalid"),
            Self::Unexpected(e) => write!(f, "Registration failed: {e:#}"),
        }
    }
}

impl std::error::Error for RegisterError {}

/// Verifies new subscriptions and stores the ones that are live.
pub struct Registrar {
    registry: Arc<dyn Registry>,
    provider: Arc<dyn DeliveryProvider>,
    probe: NotificationPayload,
}

impl std::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrar")
            .field("probe", &self.probe)
            .finish_non_exhaustive()
    }
}

impl Registrar {
    /// Create a registrar that confirms subscriptions with `probe`.
    pub fn new(
        registry: Arc<dyn Registry>,
        provider: Arc<dyn DeliveryProvider>,
        probe: NotificationPayload,
    ) -> Self {
        Self {
            registry,
            provider,
            probe,
        }
    }

    /// Parse a raw JSON descriptor and register it.
    pub async fn register_json(&self, raw: &str) -> Result<(), RegisterError> {
        let record = SubscriptionRecord::from_json(raw).map_err(RegisterError::InvalidFormat)?;
        self.register(record).await
    }

    /// Register a subscription.
    ///
    /// Sends exactly one probe notification when the descriptor is well formed
    /// and not already known, and writes the record only if the probe succeeds.
    pub async fn register(&self, record: SubscriptionRecord) -> Result<(), RegisterError> {
        record.validate().map_err(|field| {
            RegisterError::InvalidFormat(format!("Invalid subscription format: missing {field}"))
        })?;

        let existing = self
            .registry
            .find_by_endpoint(&record.endpoint)
            .await
            .map_err(|e| RegisterError::Unexpected(e.into()))?;
        if existing.is_some() {
            log::info!("[Register] Rejected duplicate ...{}", record.endpoint_tail());
            return Err(RegisterError::Duplicate(record.endpoint));
        }

        let probe = self
            .probe
            .to_bytes()
            .map_err(RegisterError::Unexpected)?;

        if let Err(failure) = self.provider.send(&record, &probe).await {
            log::warn!(
                "[Register] Probe to ...{} failed: {failure}",
                record.endpoint_tail()
            );
            if failure.terminal_gone {
                return Err(RegisterError::Unreachable(record.endpoint));
            }
            return Err(RegisterError::Unexpected(failure.into()));
        }

        let tail = record.endpoint_tail().to_string();
        match self.registry.insert_unique(record).await {
            Ok(()) => {
                log::info!("[Register] Saved verified subscription ...{tail}");
                Ok(())
            }
            Err(RegistryError::Conflict(endpoint)) => {
                log::info!("[Register] Lost insert race for ...{tail}");
                Err(RegisterError::Duplicate(endpoint))
            }
            Err(e) => Err(RegisterError::Unexpected(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::DeliveryFailure;
    use crate::registry::MemoryRegistry;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Provider that answers every send with a fixed result.
    struct FixedProvider {
        result: Result<(), DeliveryFailure>,
        sent: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl FixedProvider {
        fn new(result: Result<(), DeliveryFailure>) -> Arc<Self> {
            Arc::new(Self {
                result,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sends(&self) -> usize {
            self.sent.lock().expect("lock").len()
        }
    }

    #[async_trait]
    impl DeliveryProvider for FixedProvider {
        async fn send(
            &self,
            subscription: &SubscriptionRecord,
            payload: &[u8],
        ) -> Result<(), DeliveryFailure> {
            self.sent
                .lock()
                .expect("lock")
                .push((subscription.endpoint.clone(), payload.to_vec()));
            self.result.clone()
        }
    }

    /// Registry whose lookup never sees the record but whose insert conflicts,
    /// as when another registration wins the race between the two calls.
    struct RacingRegistry;

    #[async_trait]
    impl Registry for RacingRegistry {
        async fn find_by_endpoint(
            &self,
            _endpoint: &str,
        ) -> Result<Option<SubscriptionRecord>, RegistryError> {
            Ok(None)
        }

        async fn insert_unique(&self, record: SubscriptionRecord) -> Result<(), RegistryError> {
            Err(RegistryError::Conflict(record.endpoint))
        }

        async fn list_all(&self) -> Result<Vec<SubscriptionRecord>, RegistryError> {
            Ok(Vec::new())
        }

        async fn delete_by_endpoint(&self, endpoint: &str) -> Result<(), RegistryError> {
            Err(RegistryError::NotFound(endpoint.to_string()))
        }
    }

    fn probe() -> NotificationPayload {
        NotificationPayload::new("Notifications enabled", "Notifications enabled successfully!", None)
            .expect("valid probe")
    }

    fn record() -> SubscriptionRecord {
        SubscriptionRecord::new("https://push.example.com/abc", "key", "auth")
    }

    #[tokio::test]
    async fn test_register_success_stores_record_after_one_probe() {
        let registry = Arc::new(MemoryRegistry::new());
        let provider = FixedProvider::new(Ok(()));
        let registrar = Registrar::new(registry.clone(), provider.clone(), probe());

        registrar.register(record()).await.expect("registered");

        assert_eq!(provider.sends(), 1);
        let sent = provider.sent.lock().expect("lock");
        let body: serde_json::Value = serde_json::from_slice(&sent[0].1).expect("json");
        assert_eq!(body["title"], "Notifications enabled");
        drop(sent);
        assert_eq!(registry.list_all().await.expect("list"), vec![record()]);
    }

    #[tokio::test]
    async fn test_invalid_format_does_no_io() {
        let registry = Arc::new(MemoryRegistry::new());
        let provider = FixedProvider::new(Ok(()));
        let registrar = Registrar::new(registry.clone(), provider.clone(), probe());

        let mut bad = record();
        bad.keys.p256dh.clear();
        let err = registrar.register(bad).await.expect_err("invalid");
        assert!(matches!(err, RegisterError::InvalidFormat(_)));
        assert_eq!(err.status_code(), 400);

        let err = registrar.register_json("{\"endpoint\": 1}").await.expect_err("invalid");
        assert!(matches!(err, RegisterError::InvalidFormat(_)));

        assert_eq!(provider.sends(), 0);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_rejected_before_probe() {
        let registry = Arc::new(MemoryRegistry::with_records([record()]));
        let provider = FixedProvider::new(Ok(()));
        let registrar = Registrar::new(registry.clone(), provider.clone(), probe());

        let err = registrar.register(record()).await.expect_err("duplicate");
        assert!(matches!(err, RegisterError::Duplicate(_)));
        assert_eq!(err.to_string(), "Subscription already exists");
        assert_eq!(provider.sends(), 0);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_gone_probe_is_unreachable() {
        for status in [404, 410] {
            let registry = Arc::new(MemoryRegistry::new());
            let provider = FixedProvider::new(Err(DeliveryFailure::from_status(status, "gone")));
            let registrar = Registrar::new(registry.clone(), provider.clone(), probe());

            let err = registrar.register(record()).await.expect_err("unreachable");
            assert!(matches!(err, RegisterError::Unreachable(_)), "{status}");
            assert_eq!(err.to_string(), "Subscription is expired or invalid");
            assert!(registry.is_empty().await);
        }
    }

    #[tokio::test]
    async fn test_other_probe_failure_is_surfaced() {
        let registry = Arc::new(MemoryRegistry::new());
        let provider = FixedProvider::new(Err(DeliveryFailure::from_status(500, "boom")));
        let registrar = Registrar::new(registry.clone(), provider.clone(), probe());

        let err = registrar.register(record()).await.expect_err("unexpected");
        assert!(matches!(err, RegisterError::Unexpected(_)));
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("HTTP 500"));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_insert_conflict_maps_to_duplicate() {
        let provider = FixedProvider::new(Ok(()));
        let registrar = Registrar::new(Arc::new(RacingRegistry), provider.clone(), probe());

        let err = registrar.register(record()).await.expect_err("conflict");
        assert!(matches!(err, RegisterError::Duplicate(_)));
        assert_eq!(provider.sends(), 1);
    }
}
