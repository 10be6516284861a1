//! AES-256-GCM encryption for the subscription store.
//!
//! Subscription records carry each browser's auth secret, so the store is
//! never written in plaintext. Each store file is a JSON envelope:
//!
//! ```json
//! { "nonce": "<base64>", "ciphertext": "<base64>", "version": 1 }
//! ```
//!
//! The 32-byte key lives in its own file next to the store.

use std::fs;
use std::path::Path;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Nonce size for AES-GCM (96 bits).
const NONCE_SIZE: usize = 12;
/// AES-256 key size.
pub const KEY_SIZE: usize = 32;

/// Encrypted envelope stored on disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptedData {
    /// Base64-encoded nonce.
    pub nonce: String,
    /// Base64-encoded ciphertext with GCM tag.
    pub ciphertext: String,
    /// Format version of the plaintext.
    pub version: u8,
}

fn cipher(key: &[u8; KEY_SIZE]) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|e| anyhow::anyhow!("Invalid AES key: {e}"))
}

/// Encrypt `plaintext` under a fresh random nonce.
pub fn encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8], version: u8) -> Result<EncryptedData> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher(key)?
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| anyhow::anyhow!("Encryption failed: {e}"))?;

    Ok(EncryptedData {
        nonce: BASE64.encode(nonce_bytes),
        ciphertext: BASE64.encode(ciphertext),
        version,
    })
}

/// Decrypt an envelope produced by [`encrypt`].
pub fn decrypt(key: &[u8; KEY_SIZE], encrypted: &EncryptedData) -> Result<Vec<u8>> {
    let nonce_bytes = BASE64
        .decode(&encrypted.nonce)
        .context("Invalid nonce encoding")?;
    anyhow::ensure!(nonce_bytes.len() == NONCE_SIZE, "Invalid nonce length");

    let ciphertext = BASE64
        .decode(&encrypted.ciphertext)
        .context("Invalid ciphertext encoding")?;

    cipher(key)?
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|e| anyhow::anyhow!("Decryption failed: {e}"))
}

/// Read the key at `path`, generating and saving a new one if absent.
pub fn load_or_create_key(path: &Path) -> Result<[u8; KEY_SIZE]> {
    if path.exists() {
        let encoded = fs::read_to_string(path)
            .with_context(|| format!("Failed to read store key {}", path.display()))?;
        let bytes = BASE64
            .decode(encoded.trim())
            .context("Store key is not valid base64")?;
        return bytes
            .try_into()
            .map_err(|b: Vec<u8>| anyhow::anyhow!("Store key must be 32 bytes, got {}", b.len()));
    }

    let mut key = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut key);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, BASE64.encode(key))
        .with_context(|| format!("Failed to write store key {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .context("Failed to set store key permissions")?;
    }

    log::info!("[Registry] Generated new store key at {}", path.display());
    Ok(key)
}
