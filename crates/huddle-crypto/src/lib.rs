/// Huddle message-body cipher.
///
/// All members of a room share one opaque key string issued by the backend at
/// room-open time. Message bodies are sealed with AES-256-GCM under a digest
/// of that string and carried as marker-prefixed base64 text.
///
/// The cipher is deliberately fail-open: a seal or open failure must never
/// block message delivery or rendering. Sealing falls back to the plaintext;
/// opening reports failure through a typed result so callers choose the
/// display treatment instead of trusting a silent fallback.
pub mod keys;
pub mod seal;

pub use keys::{generate_key, room_key_bytes};
pub use seal::{CIPHERTEXT_MARKER, Opened, open, seal};
