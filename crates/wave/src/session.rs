//! Wave session: the derived key, tickets, and expiry for one handshake.
//!
//! A session is created once per successful handshake and never mutated
//! afterwards; when it expires the caller runs a fresh key exchange and
//! replaces the session wholesale. All fields are read-only, so a session
//! can be shared across concurrent request/response pairs without
//! locking (per-message nonces are generated inside the envelope codec).

use serde::{Deserialize, Serialize};

use crate::envelope::{self, Envelope, KEY_LEN};
use crate::error::Result;

/// A live encryption session established by one handshake.
///
/// Serializes to JSON with base64 key material so the credential store
/// can cache it across process restarts.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Derived 32-byte ChaCha20 key.
    #[serde(with = "key_b64")]
    pub key: [u8; KEY_LEN],
    /// Short-lived session ticket. Server-opaque; passed back verbatim
    /// on every encrypted request, never parsed.
    pub ticket: String,
    /// Long-lived session ticket. Equally opaque.
    pub ticket_long: String,
    /// Server-reported short ticket lifetime in seconds.
    pub ticket_exp: u64,
    /// Server-reported long ticket lifetime in seconds.
    pub ticket_long_exp: u64,
    /// Negotiated cipher suite id.
    pub cipher_suite: u16,
    /// Absolute unix timestamp (seconds) after which this session must
    /// not be used. Includes the refresh margin.
    pub expires_at: u64,
}

impl Session {
    /// Whether the session is still usable at `now` (unix seconds).
    pub fn is_valid(&self, now: u64) -> bool {
        now < self.expires_at
    }

    /// Seals a request payload under this session's key with a fresh
    /// nonce.
    pub fn encrypt_request(&self, payload: &[u8]) -> Result<Envelope> {
        envelope::seal(&self.key, payload)
    }

    /// Decrypts a response body sealed by the peer under this session's
    /// key.
    pub fn decrypt_response(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        envelope::open(&self.key, nonce, ciphertext)
    }

    /// Decrypts a received envelope (digest already verified by
    /// [`Envelope::decode`] on the binary path).
    pub fn open_envelope(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        self.decrypt_response(&envelope.nonce, &envelope.ciphertext)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &"[REDACTED]")
            .field("ticket", &self.ticket)
            .field("cipher_suite", &self.cipher_suite)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Serde support for the session key (serializes as base64).
mod key_b64 {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::envelope::KEY_LEN;

    pub fn serialize<S>(key: &[u8; KEY_LEN], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        BASE64.encode(key).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; KEY_LEN], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = BASE64.decode(&encoded).map_err(serde::de::Error::custom)?;
        bytes.try_into().map_err(|v: Vec<u8>| {
            serde::de::Error::custom(format!(
                "invalid session key length: expected {}, got {}",
                KEY_LEN,
                v.len()
            ))
        })
    }
}
