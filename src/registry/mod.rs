//! Subscription registries.
//!
//! A registry stores verified [`SubscriptionRecord`]s keyed by endpoint URL.
//! Uniqueness is enforced here, at the storage boundary: `insert_unique`
//! is the authoritative duplicate check, whatever lookups callers did first.
//!
//! - [`MemoryRegistry`] - in-process map, lost on exit
//! - [`FileRegistry`] - encrypted JSON document on disk

pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::notifications::SubscriptionRecord;

pub use file::FileRegistry;
pub use memory::MemoryRegistry;

/// Errors returned by registry operations.
#[derive(Debug)]
pub enum RegistryError {
    /// A record with this endpoint already exists.
    Conflict(String),
    /// No record with this endpoint exists.
    NotFound(String),
    /// The underlying store failed.
    Storage(anyhow::Error),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::notifications::subscription::endpoint_tail;

        match self {
            Self::Conflict(endpoint) => {
                write!(f, "Subscription already exists: ...{}", endpoint_tail(endpoint))
            }
            Self::NotFound(endpoint) => {
                write!(f, "Subscription not found: ...{}", endpoint_tail(endpoint))
            }
            Self::Storage(e) => write!(f, "Subscription store error: {e:#}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<anyhow::Error> for RegistryError {
    fn from(e: anyhow::Error) -> Self {
        Self::Storage(e)
    }
}

/// Storage for verified subscriptions.
///
/// Implementations must tolerate concurrent calls: a broadcast may delete
/// several different endpoints at once.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Look up a record by endpoint.
    async fn find_by_endpoint(
        &self,
        endpoint: &str,
    ) -> Result<Option<SubscriptionRecord>, RegistryError>;

    /// Insert a record, failing with [`RegistryError::Conflict`] if the
    /// endpoint is already present.
    async fn insert_unique(&self, record: SubscriptionRecord) -> Result<(), RegistryError>;

    /// Snapshot of every stored record.
    async fn list_all(&self) -> Result<Vec<SubscriptionRecord>, RegistryError>;

    /// Remove a record, failing with [`RegistryError::NotFound`] if absent.
    async fn delete_by_endpoint(&self, endpoint: &str) -> Result<(), RegistryError>;
}
