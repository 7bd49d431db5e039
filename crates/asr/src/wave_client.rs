//! HTTP-side Wave client: runs the signed handshake against the
//! handshake endpoint, caches the resulting [`Session`], and assembles
//! the encryption headers for encrypted requests.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use wave::handshake::{HandshakeAttempt, HandshakeResponse};
use wave::Session;

use crate::error::{AsrError, Result};

/// Header carrying the base64 DER ECDSA signature over the handshake
/// body.
pub const HEADER_SIGNATURE: &str = "x-tt-s-sign";

/// Header marking a request body as encrypted.
pub const HEADER_ENCRYPTED: &str = "x-tt-e-b";

/// Header carrying the session ticket.
pub const HEADER_TICKET: &str = "x-tt-e-t";

/// Header carrying the base64 per-message nonce.
pub const HEADER_NONCE: &str = "x-tt-e-p";

/// Header carrying the uppercase hex MD5 digest of the ciphertext.
pub const HEADER_STUB: &str = "x-ss-stub";

/// Callback invoked with every freshly established session, so callers
/// can persist it.
pub type SessionUpdateHook = Box<dyn Fn(&Session) + Send + Sync>;

/// Supplies a valid session on demand.
///
/// This trait abstracts session acquisition, allowing for different
/// implementations (the live handshake client, fixtures for testing).
pub trait SessionProvider: Send + Sync {
    /// Returns a currently valid session, running a handshake if the
    /// cached one is absent or expired.
    fn ensure_session(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Arc<Session>>> + Send + '_>>;

    /// Drops the cached session so the next call re-handshakes.
    fn invalidate(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>>;
}

/// Handshake client with a cached session.
///
/// The cache is guarded by an async mutex so concurrent callers never
/// race two handshakes for the same device.
pub struct WaveClient {
    http: reqwest::Client,
    handshake_url: String,
    device_id: String,
    app_id: String,
    user_agent: String,
    session: Mutex<Option<Arc<Session>>>,
    on_session_update: Option<SessionUpdateHook>,
}

impl WaveClient {
    /// Creates a client for one device identity.
    pub fn new(
        handshake_url: impl Into<String>,
        device_id: impl Into<String>,
        app_id: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AsrError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            handshake_url: handshake_url.into(),
            device_id: device_id.into(),
            app_id: app_id.into(),
            user_agent: user_agent.into(),
            session: Mutex::new(None),
            on_session_update: None,
        })
    }

    /// Seeds the cache with a previously persisted session. Expiry is
    /// still checked on use.
    pub fn with_session(self, session: Option<Session>) -> Self {
        Self {
            session: Mutex::new(session.map(Arc::new)),
            ..self
        }
    }

    /// Registers a hook called with every freshly established session.
    pub fn with_session_update(mut self, hook: SessionUpdateHook) -> Self {
        self.on_session_update = Some(hook);
        self
    }

    /// Returns the cached session without checking validity.
    pub async fn current_session(&self) -> Option<Arc<Session>> {
        self.session.lock().await.clone()
    }

    /// Returns a valid session, running the handshake if needed.
    pub async fn session(&self) -> Result<Arc<Session>> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            if session.is_valid(unix_now()) {
                return Ok(session.clone());
            }
            debug!(expires_at = session.expires_at, "cached session expired");
        }

        let session = Arc::new(self.handshake().await?);
        if let Some(hook) = &self.on_session_update {
            hook(&session);
        }
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Runs one signed handshake round trip.
    async fn handshake(&self) -> Result<Session> {
        let attempt = HandshakeAttempt::new(&self.device_id, &self.app_id)?;
        debug!(url = %self.handshake_url, "starting key exchange");

        let response = self
            .http
            .post(&self.handshake_url)
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.user_agent)
            .header(HEADER_SIGNATURE, attempt.signature_b64())
            .body(attempt.body().to_string())
            .send()
            .await
            .map_err(|e| AsrError::Handshake(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "handshake endpoint rejected request");
            return Err(AsrError::Handshake(format!(
                "endpoint returned {status}: {body}"
            )));
        }

        let parsed: HandshakeResponse = response
            .json()
            .await
            .map_err(|e| AsrError::Handshake(format!("malformed response: {e}")))?;

        let session = attempt.complete(&parsed, unix_now())?;
        info!(
            cipher_suite = session.cipher_suite,
            expires_at = session.expires_at,
            "session established"
        );
        Ok(session)
    }

    /// Encrypts a request body and assembles the encryption headers the
    /// endpoint expects alongside it.
    pub async fn seal_request(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<(String, String)>)> {
        let session = self.session().await?;
        let envelope = session.encrypt_request(plaintext)?;

        let headers = vec![
            (HEADER_ENCRYPTED.to_string(), "1".to_string()),
            (HEADER_TICKET.to_string(), session.ticket.clone()),
            (HEADER_NONCE.to_string(), BASE64.encode(envelope.nonce)),
            (HEADER_STUB.to_string(), envelope.digest.clone()),
        ];

        Ok((envelope.ciphertext, headers))
    }

    /// Decrypts a response body using the nonce echoed in the response
    /// headers. Verifies the content digest when the endpoint sent one.
    pub async fn open_response(
        &self,
        body: &[u8],
        nonce_b64: &str,
        digest: Option<&str>,
    ) -> Result<Vec<u8>> {
        let session = self
            .current_session()
            .await
            .ok_or(AsrError::SessionExpired)?;

        if let Some(digest) = digest {
            wave::verify_digest(body, digest)?;
        }

        let nonce = BASE64
            .decode(nonce_b64)
            .map_err(|e| AsrError::Wave(e.into()))?;
        Ok(session.decrypt_response(&nonce, body)?)
    }
}

impl SessionProvider for WaveClient {
    fn ensure_session(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Arc<Session>>> + Send + '_>>
    {
        Box::pin(self.session())
    }

    fn invalidate(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async {
            *self.session.lock().await = None;
        })
    }
}

impl std::fmt::Debug for WaveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveClient")
            .field("handshake_url", &self.handshake_url)
            .field("device_id", &self.device_id)
            .field("app_id", &self.app_id)
            .finish()
    }
}

/// Current unix timestamp in seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_session() -> Session {
        Session {
            key: [9u8; 32],
            ticket: "opaque-ticket".to_string(),
            ticket_long: "opaque-ticket-long".to_string(),
            ticket_exp: 3600,
            ticket_long_exp: 86400,
            cipher_suite: 4097,
            expires_at: u64::MAX,
        }
    }

    fn client_with(session: Session) -> WaveClient {
        WaveClient::new("https://invalid.test/handshake", "dev-1", "401734", "ua")
            .unwrap()
            .with_session(Some(session))
    }

    #[tokio::test]
    async fn test_cached_valid_session_is_reused() {
        let client = client_with(live_session());
        let session = client.session().await.unwrap();
        assert_eq!(session.ticket, "opaque-ticket");
    }

    #[tokio::test]
    async fn test_expired_session_is_never_reused() {
        let expired = Session {
            expires_at: 0,
            ..live_session()
        };
        let client = client_with(expired);

        // The only way to satisfy the call is a fresh handshake, and the
        // endpoint here is unreachable; an expired cached session must
        // not be handed out instead.
        let result = client.session().await;
        assert!(matches!(result, Err(AsrError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_seal_request_headers() {
        let client = client_with(live_session());
        let (ciphertext, headers) = client.seal_request(b"hello").await.unwrap();
        assert!(!ciphertext.is_empty());

        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get(HEADER_ENCRYPTED).unwrap(), "1");
        assert_eq!(get(HEADER_TICKET).unwrap(), "opaque-ticket");
        // Nonce is 12 bytes of base64; stub is the uppercase hex digest
        // of the ciphertext.
        let nonce = BASE64.decode(get(HEADER_NONCE).unwrap()).unwrap();
        assert_eq!(nonce.len(), wave::NONCE_LEN);
        assert_eq!(get(HEADER_STUB).unwrap(), wave::content_digest(&ciphertext));
    }

    #[tokio::test]
    async fn test_seal_then_open_roundtrip() {
        let client = client_with(live_session());
        let (ciphertext, headers) = client.seal_request(b"request body").await.unwrap();

        let nonce_b64 = headers
            .iter()
            .find(|(k, _)| k == HEADER_NONCE)
            .map(|(_, v)| v.clone())
            .unwrap();
        let digest = headers
            .iter()
            .find(|(k, _)| k == HEADER_STUB)
            .map(|(_, v)| v.clone())
            .unwrap();

        let plaintext = client
            .open_response(&ciphertext, &nonce_b64, Some(&digest))
            .await
            .unwrap();
        assert_eq!(plaintext, b"request body");
    }

    #[tokio::test]
    async fn test_open_response_rejects_bad_digest() {
        let client = client_with(live_session());
        let (ciphertext, headers) = client.seal_request(b"x").await.unwrap();
        let nonce_b64 = headers
            .iter()
            .find(|(k, _)| k == HEADER_NONCE)
            .map(|(_, v)| v.clone())
            .unwrap();

        let result = client
            .open_response(&ciphertext, &nonce_b64, Some("00000000000000000000000000000000"))
            .await;
        assert!(matches!(result, Err(AsrError::Wave(_))));
    }

    #[tokio::test]
    async fn test_open_response_without_session_is_expired() {
        let client = WaveClient::new("https://invalid.test/handshake", "dev-1", "401734", "ua")
            .unwrap();
        let result = client.open_response(b"body", "AAAAAAAAAAAAAAAA", None).await;
        assert!(matches!(result, Err(AsrError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_invalidate_clears_cache() {
        let client = client_with(live_session());
        SessionProvider::invalidate(&client).await;
        assert!(client.current_session().await.is_none());
    }

    #[tokio::test]
    async fn test_session_update_hook_not_called_for_cached_session() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let client = client_with(live_session()).with_session_update(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        client.session().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
