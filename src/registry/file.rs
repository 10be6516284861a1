//! Durable subscription registry on the local filesystem.
//!
//! # Layout
//!
//! ```text
//! <config_dir>/
//!     subscriptions.enc    # AES-256-GCM envelope around {"records": [...]}
//!     subscriptions.key    # base64 store key (0600)
//! ```
//!
//! The whole document is held in memory behind one async mutex. Every
//! mutation rewrites the file (temp file + rename) before the lock is
//! released, so a crash leaves either the old or the new document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{Registry, RegistryError};
use crate::crypto::{self, EncryptedData, KEY_SIZE};
use crate::notifications::SubscriptionRecord;

/// Plaintext format version inside the envelope.
const STORE_VERSION: u8 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    records: Vec<SubscriptionRecord>,
}

/// Registry persisted as an encrypted JSON document.
pub struct FileRegistry {
    path: PathBuf,
    key: [u8; KEY_SIZE],
    records: Mutex<BTreeMap<String, SubscriptionRecord>>,
}

impl std::fmt::Debug for FileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRegistry")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileRegistry {
    /// Open (or create) the store at `path`.
    ///
    /// The store key is read from `path` with a `.key` extension and
    /// generated on first use. A key is never generated for a store that
    /// already exists, since it could not decrypt it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let key_path = Self::key_path(&path);
        anyhow::ensure!(
            key_path != path,
            "Subscription store {} would share its path with the store key",
            path.display()
        );
        anyhow::ensure!(
            !path.exists() || key_path.exists(),
            "Store key {} is missing for existing subscription store {}",
            key_path.display(),
            path.display()
        );
        let key = crypto::load_or_create_key(&key_path)?;
        let records = Self::load(&path, &key)?;

        log::info!(
            "[Registry] Loaded {} subscription(s) from {}",
            records.len(),
            path.display()
        );

        Ok(Self {
            path,
            key,
            records: Mutex::new(records),
        })
    }

    /// Location of the key file for a store at `path`.
    pub fn key_path(path: &Path) -> PathBuf {
        path.with_extension("key")
    }

    fn load(path: &Path, key: &[u8; KEY_SIZE]) -> Result<BTreeMap<String, SubscriptionRecord>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read subscription store {}", path.display()))?;
        let encrypted: EncryptedData =
            serde_json::from_str(&content).context("Failed to parse subscription store")?;
        anyhow::ensure!(
            encrypted.version == STORE_VERSION,
            "Unsupported subscription store version {}",
            encrypted.version
        );
        let plaintext = crypto::decrypt(key, &encrypted)?;
        let document: StoreDocument = serde_json::from_slice(&plaintext)
            .context("Failed to deserialize subscription store")?;

        Ok(document
            .records
            .into_iter()
            .map(|r| (r.endpoint.clone(), r))
            .collect())
    }

    async fn persist(&self, records: &BTreeMap<String, SubscriptionRecord>) -> Result<()> {
        let document = StoreDocument {
            records: records.values().cloned().collect(),
        };
        let plaintext =
            serde_json::to_vec(&document).context("Failed to serialize subscriptions")?;
        let encrypted = crypto::encrypt(&self.key, &plaintext, STORE_VERSION)?;
        let content = serde_json::to_string_pretty(&encrypted)
            .context("Failed to serialize encrypted subscriptions")?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = self.path.with_extension("enc.tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .context("Failed to write subscription store")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .context("Failed to set subscription store permissions")?;
        }

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .context("Failed to replace subscription store")?;

        log::debug!(
            "[Registry] Saved {} subscription(s) to {:?}",
            records.len(),
            self.path
        );
        Ok(())
    }
}

#[async_trait]
impl Registry for FileRegistry {
    async fn find_by_endpoint(
        &self,
        endpoint: &str,
    ) -> Result<Option<SubscriptionRecord>, RegistryError> {
        Ok(self.records.lock().await.get(endpoint).cloned())
    }

    async fn insert_unique(&self, record: SubscriptionRecord) -> Result<(), RegistryError> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.endpoint) {
            return Err(RegistryError::Conflict(record.endpoint));
        }

        let endpoint = record.endpoint.clone();
        records.insert(endpoint.clone(), record);

        if let Err(e) = self.persist(&records).await {
            records.remove(&endpoint);
            return Err(RegistryError::Storage(e));
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<SubscriptionRecord>, RegistryError> {
        Ok(self.records.lock().await.values().cloned().collect())
    }

    async fn delete_by_endpoint(&self, endpoint: &str) -> Result<(), RegistryError> {
        let mut records = self.records.lock().await;
        let Some(removed) = records.remove(endpoint) else {
            return Err(RegistryError::NotFound(endpoint.to_string()));
        };

        if let Err(e) = self.persist(&records).await {
            records.insert(endpoint.to_string(), removed);
            return Err(RegistryError::Storage(e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: u32) -> SubscriptionRecord {
        SubscriptionRecord::new(format!("https://push.example.com/{n}"), "key", "auth")
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("subscriptions.enc");

        let registry = FileRegistry::open(&path).expect("open");
        registry.insert_unique(record(1)).await.expect("insert");
        registry.insert_unique(record(2)).await.expect("insert");
        registry
            .delete_by_endpoint("https://push.example.com/1")
            .await
            .expect("delete");
        drop(registry);

        let reopened = FileRegistry::open(&path).expect("reopen");
        assert_eq!(reopened.list_all().await.expect("list"), vec![record(2)]);
    }

    #[tokio::test]
    async fn test_store_is_not_plaintext() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("subscriptions.enc");

        let registry = FileRegistry::open(&path).expect("open");
        registry.insert_unique(record(7)).await.expect("insert");

        let content = std::fs::read_to_string(&path).expect("read");
        assert!(!content.contains("push.example.com"));
        assert!(FileRegistry::key_path(&path).exists());
    }

    #[tokio::test]
    async fn test_conflict_and_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = FileRegistry::open(dir.path().join("s.enc")).expect("open");

        registry.insert_unique(record(1)).await.expect("insert");
        assert!(matches!(
            registry.insert_unique(record(1)).await,
            Err(RegistryError::Conflict(_))
        ));
        assert!(matches!(
            registry.delete_by_endpoint("https://push.example.com/9").await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_open_with_wrong_key_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("subscriptions.enc");

        let registry = FileRegistry::open(&path).expect("open");
        registry.insert_unique(record(1)).await.expect("insert");
        drop(registry);

        std::fs::remove_file(FileRegistry::key_path(&path)).expect("remove key");
        assert!(FileRegistry::open(&path).is_err());
        // No replacement key is written, so restoring the old one still works.
        assert!(!FileRegistry::key_path(&path).exists());
    }

    #[tokio::test]
    async fn test_missing_key_is_not_regenerated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("subscriptions.enc");
        let key_path = FileRegistry::key_path(&path);

        let registry = FileRegistry::open(&path).expect("open");
        registry.insert_unique(record(1)).await.expect("insert");
        drop(registry);

        let saved_key = std::fs::read(&key_path).expect("read key");
        std::fs::remove_file(&key_path).expect("remove key");

        let err = FileRegistry::open(&path).expect_err("store without key");
        assert!(err.to_string().contains("missing"), "{err}");
        assert!(FileRegistry::open(&path).is_err());

        std::fs::write(&key_path, saved_key).expect("restore key");
        let reopened = FileRegistry::open(&path).expect("reopen");
        assert_eq!(reopened.list_all().await.expect("list"), vec![record(1)]);
    }

    #[test]
    fn test_store_path_cannot_be_key_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("subscriptions.key");

        assert!(FileRegistry::open(&path).is_err());
        assert!(!path.exists());
    }
}
