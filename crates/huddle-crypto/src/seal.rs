use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use tracing::{debug, warn};

use crate::keys::room_key_bytes;

/// Prefix marking a sealed message body. Bodies without it are treated as
/// plaintext and passed through untouched.
pub const CIPHERTEXT_MARKER: &str = "huddle:v1:";

const NONCE_LEN: usize = 12;

/// Result of opening a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opened {
    /// The body was plaintext already, or decrypted cleanly.
    Plaintext(String),
    /// The body carries the ciphertext marker but could not be decrypted
    /// (wrong key, truncation, tampering). Holds the original body so the
    /// caller can still show something.
    Undecryptable(String),
}

impl Opened {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plaintext(s) | Self::Undecryptable(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Self::Plaintext(s) | Self::Undecryptable(s) => s,
        }
    }

    pub fn is_undecryptable(&self) -> bool {
        matches!(self, Self::Undecryptable(_))
    }
}

/// Seal a message body with the room key.
///
/// Empty plaintext or key pass through unchanged. An internal failure is
/// logged and the plaintext returned as-is; delivery wins over secrecy here.
pub fn seal(plaintext: &str, key: &str) -> String {
    if plaintext.is_empty() || key.is_empty() {
        return plaintext.to_string();
    }

    match try_seal(plaintext, key) {
        Ok(sealed) => sealed,
        Err(e) => {
            warn!("seal failed, sending plaintext: {}", e);
            plaintext.to_string()
        }
    }
}

fn try_seal(plaintext: &str, key: &str) -> Result<String> {
    let key_bytes = room_key_bytes(key);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| anyhow!("encryption failed: {}", e))?;

    let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    framed.extend_from_slice(&nonce_bytes);
    framed.extend_from_slice(&ciphertext);

    Ok(format!("{}{}", CIPHERTEXT_MARKER, BASE64.encode(framed)))
}

/// Open a message body with the room key. Never errors and never panics.
///
/// A body without the ciphertext marker is already plaintext and is returned
/// unchanged, as is anything opened with an empty key.
pub fn open(body: &str, key: &str) -> Opened {
    if body.is_empty() || key.is_empty() {
        return Opened::Plaintext(body.to_string());
    }

    let Some(encoded) = body.strip_prefix(CIPHERTEXT_MARKER) else {
        return Opened::Plaintext(body.to_string());
    };

    match try_open(encoded, key) {
        Ok(plaintext) => Opened::Plaintext(plaintext),
        Err(e) => {
            debug!("open failed, keeping ciphertext: {}", e);
            Opened::Undecryptable(body.to_string())
        }
    }
}

fn try_open(encoded: &str, key: &str) -> Result<String> {
    let framed = BASE64.decode(encoded)?;
    if framed.len() <= NONCE_LEN {
        return Err(anyhow!("ciphertext too short: {} bytes", framed.len()));
    }
    let (nonce_bytes, ciphertext) = framed.split_at(NONCE_LEN);

    let key_bytes = room_key_bytes(key);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow!("decryption failed: {}", e))?;

    Ok(String::from_utf8(plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let sealed = seal("hello", "k1");
        assert!(sealed.starts_with(CIPHERTEXT_MARKER));
        assert_ne!(sealed, "hello");
        assert_eq!(open(&sealed, "k1"), Opened::Plaintext("hello".into()));
    }

    #[test]
    fn roundtrip_handles_multibyte_text() {
        let text = "점심 먹었어요? 🍜";
        let sealed = seal(text, "room-key");
        assert_eq!(open(&sealed, "room-key"), Opened::Plaintext(text.into()));
    }

    #[test]
    fn unmarked_body_passes_through() {
        assert_eq!(open("just text", "k1"), Opened::Plaintext("just text".into()));
    }

    #[test]
    fn empty_inputs_pass_through() {
        assert_eq!(seal("", "k1"), "");
        assert_eq!(seal("hi", ""), "hi");
        assert_eq!(open("", "k1"), Opened::Plaintext("".into()));
        let sealed = seal("hi", "k1");
        assert_eq!(open(&sealed, ""), Opened::Plaintext(sealed.clone()));
    }

    #[test]
    fn wrong_key_reports_undecryptable_with_original_body() {
        let sealed = seal("secret", "k1");
        match open(&sealed, "k2") {
            Opened::Undecryptable(raw) => assert_eq!(raw, sealed),
            other => panic!("expected undecryptable, got {:?}", other),
        }
    }

    #[test]
    fn truncated_body_reports_undecryptable() {
        let sealed = seal("secret", "k1");
        let mut truncated = sealed.clone();
        truncated.truncate(sealed.len() - 4);
        assert!(open(&truncated, "k1").is_undecryptable());
    }

    #[test]
    fn garbage_after_marker_reports_undecryptable() {
        let body = format!("{}not-base64!!", CIPHERTEXT_MARKER);
        assert!(open(&body, "k1").is_undecryptable());
    }
}
