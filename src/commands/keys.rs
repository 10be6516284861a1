//! VAPID key generation.

use serde_json::json;

use crate::notifications::VapidKeys;

/// Generate a keypair and print it as JSON.
///
/// The public key goes to browsers as `applicationServerKey`; the private
/// key goes in `PUSH_RELAY_VAPID_PRIVATE_KEY`.
pub fn generate() -> anyhow::Result<()> {
    let keys = VapidKeys::generate();
    let out = json!({
        "public_key": keys.public_key_base64url(),
        "private_key": keys.private_key_base64url(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
