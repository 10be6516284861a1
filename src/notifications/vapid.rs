//! VAPID application server keys (RFC 8292).
//!
//! Push services only accept messages signed by the key whose public half
//! the browser subscribed with (`applicationServerKey`). We keep the private
//! key as the raw 32-byte P-256 scalar in base64url, because that is the
//! format `web_push::VapidSignatureBuilder::from_base64()` expects.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::rand_core::OsRng;

/// Length of the raw private scalar.
const PRIVATE_KEY_LEN: usize = 32;

/// VAPID keypair used to sign outgoing push requests.
#[derive(Clone, Debug)]
pub struct VapidKeys {
    private_key_b64: String,
    public_key_b64: String,
}

impl VapidKeys {
    /// Generate a fresh keypair.
    pub fn generate() -> Self {
        Self::from_signing_key(&SigningKey::random(&mut OsRng))
    }

    /// Rebuild the keypair from the private scalar alone.
    ///
    /// The configuration only carries the private key; the public key is
    /// derived so it can be shown to operators.
    pub fn from_private_key(private_key_b64: &str) -> Result<Self> {
        let priv_bytes = BASE64URL
            .decode(private_key_b64.trim())
            .context("Invalid base64url for VAPID private key")?;
        anyhow::ensure!(
            priv_bytes.len() == PRIVATE_KEY_LEN,
            "VAPID private key must be 32-byte P-256 scalar, got {} bytes",
            priv_bytes.len()
        );
        let signing_key = SigningKey::from_bytes(priv_bytes.as_slice().into())
            .context("VAPID private key is not a valid P-256 scalar")?;

        Ok(Self::from_signing_key(&signing_key))
    }

    fn from_signing_key(signing_key: &SigningKey) -> Self {
        let public_point = signing_key.verifying_key().to_encoded_point(false);
        Self {
            private_key_b64: BASE64URL.encode(signing_key.to_bytes().as_slice()),
            public_key_b64: BASE64URL.encode(public_point.as_bytes()),
        }
    }

    /// Public key for the browser's `applicationServerKey`.
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key_b64
    }

    /// Raw private scalar, base64url.
    pub fn private_key_base64url(&self) -> &str {
        &self.private_key_b64
    }
}
