//! Error types for the wave protocol crate.

use thiserror::Error;

/// Wave protocol error type covering all possible failure modes.
#[derive(Debug, Error)]
pub enum WaveError {
    // Crypto errors
    /// Encryption key has the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength {
        /// Expected key length.
        expected: usize,
        /// Actual key length provided.
        got: usize,
    },

    /// Message nonce has the wrong length.
    #[error("invalid nonce length: expected {expected} bytes, got {got}")]
    InvalidNonceLength {
        /// Expected nonce length.
        expected: usize,
        /// Actual nonce length provided.
        got: usize,
    },

    /// Recomputed content digest does not match the transmitted one.
    ///
    /// The stream cipher carries no authentication tag, so a digest
    /// mismatch is the only tampering signal the protocol offers. It is
    /// a hard integrity failure, never retried.
    #[error("content digest mismatch: expected {expected}, got {got}")]
    DigestMismatch {
        /// Digest carried alongside the ciphertext.
        expected: String,
        /// Digest recomputed over the received ciphertext.
        got: String,
    },

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    // Handshake errors
    /// The server chose a cipher suite the client never offered.
    #[error("unsupported cipher suite: offered {offered}, server chose {chosen}")]
    UnsupportedCipherSuite {
        /// Suite id the client offered.
        offered: u16,
        /// Suite id the server chose.
        chosen: u16,
    },

    /// The server's key share could not be parsed as a curve point.
    #[error("invalid server public key: {0}")]
    InvalidServerKey(String),

    // Protocol errors
    /// An envelope or frame could not be decoded.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Failed to serialize data.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Failed to deserialize data.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

/// Result type alias for wave protocol operations.
pub type Result<T> = std::result::Result<T, WaveError>;

// Conversions from underlying crate errors

impl From<serde_json::Error> for WaveError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_eof() || err.is_syntax() {
            WaveError::Deserialization(err.to_string())
        } else {
            WaveError::Serialization(err.to_string())
        }
    }
}

impl From<prost::DecodeError> for WaveError {
    fn from(err: prost::DecodeError) -> Self {
        WaveError::Deserialization(err.to_string())
    }
}

impl From<base64::DecodeError> for WaveError {
    fn from(err: base64::DecodeError) -> Self {
        WaveError::Deserialization(format!("invalid base64: {}", err))
    }
}
