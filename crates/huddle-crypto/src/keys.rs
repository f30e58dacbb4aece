use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha2::{Digest, Sha256};

/// Derive the AES-256 key from the opaque room key string.
///
/// The backend hands out the key as text with no stated format; hashing it
/// accepts any length while keeping equal strings mapping to equal keys.
pub fn room_key_bytes(key: &str) -> [u8; 32] {
    let digest = Sha256::digest(key.as_bytes());
    digest.into()
}

/// Generate a fresh random room key string, used when creating a room before
/// the backend has issued one.
pub fn generate_key() -> String {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    BASE64.encode(key)
}
