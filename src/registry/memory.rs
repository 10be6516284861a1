//! In-memory subscription registry.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Registry, RegistryError};
use crate::notifications::SubscriptionRecord;

/// Registry backed by a `HashMap` behind an async `RwLock`.
///
/// Nothing is persisted; useful for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: RwLock<HashMap<String, SubscriptionRecord>>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with records.
    ///
    /// Later records win if two share an endpoint.
    pub fn with_records(records: impl IntoIterator<Item = SubscriptionRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.endpoint.clone(), r))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn find_by_endpoint(
        &self,
        endpoint: &str,
    ) -> Result<Option<SubscriptionRecord>, RegistryError> {
        Ok(self.records.read().await.get(endpoint).cloned())
    }

    async fn insert_unique(&self, record: SubscriptionRecord) -> Result<(), RegistryError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.endpoint) {
            return Err(RegistryError::Conflict(record.endpoint));
        }
        records.insert(record.endpoint.clone(), record);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<SubscriptionRecord>, RegistryError> {
        let mut all: Vec<_> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        Ok(all)
    }

    async fn delete_by_endpoint(&self, endpoint: &str) -> Result<(), RegistryError> {
        match self.records.write().await.remove(endpoint) {
            Some(_) => Ok(()),
            None => Err(RegistryError::NotFound(endpoint.to_string())),
        }
    }
}
