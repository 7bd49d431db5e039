//! Error types for the ASR client crate.

use thiserror::Error;
use wave::WaveError;

/// Client error type covering all possible failure modes.
///
/// Failures inside a running event stream are surfaced as terminal
/// [`wave::ResponseEvent::Error`] events rather than raised, so a
/// streaming consumer always observes an error event before the
/// sequence ends abnormally. This type covers everything that fails
/// before a stream exists, plus the collapsed form of a terminal event.
#[derive(Debug, Error)]
pub enum AsrError {
    /// The handshake endpoint could not be reached or rejected the
    /// signed request.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A wave protocol-layer failure: bad key material, digest
    /// mismatch, malformed envelope, or serialization.
    #[error("protocol error: {0}")]
    Wave(#[from] WaveError),

    /// The server reported an error on the streaming channel.
    #[error("server error {status_code}: {message}")]
    Server {
        /// Status code from the error event.
        status_code: i32,
        /// Status message from the error event.
        message: String,
    },

    /// The session ticket expired and could not be refreshed.
    #[error("session expired")]
    SessionExpired,

    /// The underlying transport failed.
    #[error("transport failed: {0}")]
    Transport(String),

    /// An operation exceeded its deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Device registration failed or no registrar was configured.
    #[error("device registration failed: {0}")]
    Registration(String),

    /// The credential store failed to load or save.
    #[error("credential store failed: {0}")]
    CredentialStore(String),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, AsrError>;

impl From<tokio_tungstenite::tungstenite::Error> for AsrError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AsrError::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for AsrError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AsrError::Timeout(err.to_string())
        } else {
            AsrError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = AsrError::Server {
            status_code: 1005,
            message: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "server error 1005: quota exceeded");
    }

    #[test]
    fn test_wave_error_passthrough() {
        let err: AsrError = WaveError::InvalidKeyLength {
            expected: 32,
            got: 0,
        }
        .into();
        assert!(matches!(err, AsrError::Wave(_)));
        assert!(err.to_string().starts_with("protocol error:"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AsrError>();
    }
}
