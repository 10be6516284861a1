//! Configuration loading and persistence.
//!
//! Settings come from `config.json` in the config directory, then
//! `PUSH_RELAY_*` environment variables override individual fields. The
//! VAPID private key is never written back to disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::notifications::{NotificationPayload, VapidKeys};

/// Configuration for the push relay.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Subscription store location. Defaults to `subscriptions.enc` in the config dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    /// Raw 32-byte VAPID private key (base64url). Not serialized to disk.
    #[serde(skip_serializing)]
    pub vapid_private_key: Option<String>,
    /// VAPID `sub` claim: a `mailto:` or `https:` contact for the push service.
    pub vapid_subject: String,
    /// How long push services should hold undelivered messages, in seconds.
    pub ttl_secs: u32,
    /// Per-request timeout for push service calls, in seconds.
    pub request_timeout_secs: u64,
    /// Icon used when a broadcast doesn't name one.
    pub default_icon: String,
    /// Title of the confirmation sent to new subscriptions.
    pub probe_title: String,
    /// Body of the confirmation sent to new subscriptions.
    pub probe_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            vapid_private_key: None,
            vapid_subject: "mailto:admin@example.com".to_string(),
            ttl_secs: 86400,
            request_timeout_secs: 30,
            default_icon: "/pwa-512x512.png".to_string(),
            probe_title: "Notifications enabled".to_string(),
            probe_message: "Notifications enabled successfully!".to_string(),
        }
    }
}

impl Config {
    /// Returns the configuration directory, creating it if necessary.
    ///
    /// `PUSH_RELAY_CONFIG_DIR` overrides the platform config directory.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("PUSH_RELAY_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("push-relay")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Location of `config.json`.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Reads `config_path` without environment overrides.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("PUSH_RELAY_STORE_PATH") {
            self.store_path = Some(PathBuf::from(path));
        }

        if let Ok(key) = std::env::var("PUSH_RELAY_VAPID_PRIVATE_KEY") {
            self.vapid_private_key = Some(key);
        }

        if let Ok(subject) = std::env::var("PUSH_RELAY_VAPID_SUBJECT") {
            self.vapid_subject = subject;
        }

        if let Ok(ttl) = std::env::var("PUSH_RELAY_TTL") {
            if let Ok(ttl) = ttl.parse::<u32>() {
                self.ttl_secs = ttl;
            }
        }

        if let Ok(timeout) = std::env::var("PUSH_RELAY_REQUEST_TIMEOUT") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.request_timeout_secs = timeout;
            }
        }

        if let Ok(icon) = std::env::var("PUSH_RELAY_DEFAULT_ICON") {
            self.default_icon = icon;
        }
    }

    /// Persists the configuration (without the private key) to disk.
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Writes the configuration to `config_path` with 0600 permissions.
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        fs::write(config_path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        #[cfg(unix)]
        fs::set_permissions(config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Effective subscription store path.
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("subscriptions.enc")),
        }
    }

    /// VAPID keys from `vapid_private_key`.
    pub fn vapid_keys(&self) -> Result<VapidKeys> {
        let key = self
            .vapid_private_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .context("No VAPID private key configured (set PUSH_RELAY_VAPID_PRIVATE_KEY)")?;
        VapidKeys::from_private_key(key)
    }

    /// Per-request timeout for push service calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Confirmation notification sent to new subscriptions.
    pub fn probe_payload(&self) -> Result<NotificationPayload> {
        NotificationPayload::new(&self.probe_title, &self.probe_message, None)
            .map(|p| p.with_default_icon(&self.default_icon))
            .map_err(|e| anyhow::anyhow!("Invalid probe notification in config: {e}"))
    }

    /// Default icon, unless configured empty.
    pub fn broadcast_icon(&self) -> Option<String> {
        Some(self.default_icon.clone()).filter(|i| !i.is_empty())
    }
}
