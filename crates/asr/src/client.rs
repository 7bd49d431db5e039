//! Public client facade.
//!
//! [`DoubaoAsr`] resolves credentials (explicit config, then the
//! credential store, then the device registrar), establishes the
//! encryption session lazily, and exposes utterance transcription both
//! as a typed event stream and as a collected final transcript.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wave::{is_session_expired, EventMeta, ResponseEvent};

use crate::config::AsrConfig;
use crate::credentials::{Credential, CredentialStore, MemoryCredentialStore};
use crate::driver::{run_utterance, DriverOptions, Utterance, UtteranceOutcome};
use crate::error::{AsrError, Result};
use crate::registrar::{DeviceParams, DeviceRegistrar};
use crate::transport::WsTransport;
use crate::wave_client::{SessionProvider, WaveClient};

/// Streaming speech-recognition client.
pub struct DoubaoAsr {
    config: AsrConfig,
    store: Arc<dyn CredentialStore>,
    registrar: Option<Arc<dyn DeviceRegistrar>>,
    credential: OnceCell<Credential>,
    wave: OnceCell<Arc<WaveClient>>,
}

impl DoubaoAsr {
    /// Creates a client. Credentials not present in the config are
    /// resolved from the store (in-memory by default) and, failing
    /// that, the registrar.
    pub fn new(config: AsrConfig) -> Self {
        Self {
            config,
            store: Arc::new(MemoryCredentialStore::new()),
            registrar: None,
            credential: OnceCell::new(),
            wave: OnceCell::new(),
        }
    }

    /// Replaces the credential store.
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the device registrar used when no credentials are stored.
    pub fn with_registrar(mut self, registrar: Arc<dyn DeviceRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Resolves and caches the device credential.
    ///
    /// Priority: explicit config values, then the store, then the
    /// registrar. A freshly registered identity is written back to the
    /// store.
    async fn credential(&self) -> Result<Credential> {
        self.credential
            .get_or_try_init(|| async {
                let mut credential = self.store.load()?.unwrap_or(Credential {
                    device_id: String::new(),
                    token: String::new(),
                    session: None,
                });

                if !self.config.device_id.is_empty() {
                    if credential.device_id != self.config.device_id {
                        // A different device invalidates any cached session.
                        credential.session = None;
                    }
                    credential.device_id = self.config.device_id.clone();
                }
                if !self.config.token.is_empty() {
                    credential.token = self.config.token.clone();
                }

                if credential.device_id.is_empty() || credential.token.is_empty() {
                    let registrar = self.registrar.as_ref().ok_or_else(|| {
                        AsrError::Registration(
                            "no credentials available and no registrar configured".to_string(),
                        )
                    })?;

                    info!("registering new device identity");
                    let device = registrar.register(&DeviceParams::default()).await?;
                    if credential.device_id.is_empty() {
                        credential.device_id = device.device_id;
                    }
                    if credential.token.is_empty() {
                        credential.token = device.token;
                    }
                    credential.session = None;
                    self.store.save(&credential)?;
                }

                Ok(credential)
            })
            .await
            .cloned()
    }

    /// Builds (once) the handshake client, seeded from any persisted
    /// session and wired to persist fresh ones.
    async fn wave_client(&self) -> Result<Arc<WaveClient>> {
        let credential = self.credential().await?;
        self.wave
            .get_or_try_init(|| async {
                let store = self.store.clone();
                let persisted = credential.clone();

                let client = WaveClient::new(
                    &self.config.handshake_url,
                    &credential.device_id,
                    &self.config.app_id,
                    &self.config.user_agent,
                )?
                .with_session(credential.session.clone())
                .with_session_update(Box::new(move |session| {
                    let mut updated = persisted.clone();
                    updated.session = Some(session.clone());
                    if let Err(e) = store.save(&updated) {
                        warn!(error = %e, "failed to persist refreshed session");
                    }
                }));

                Ok(Arc::new(client))
            })
            .await
            .cloned()
    }

    /// Streams one utterance and returns its typed event sequence.
    ///
    /// The returned stream always ends with `SessionFinished` or an
    /// `Error` event; failures after setup are delivered in-band, never
    /// lost. Dropping the stream cancels the utterance.
    pub async fn transcribe_stream(&self, chunks: Vec<Vec<u8>>) -> Result<EventStream> {
        let credential = self.credential().await?;
        let wave = self.wave_client().await?;
        let config = self.config.clone();

        let (tx, rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            if let Err(e) = stream_utterance(config, credential, wave, chunks, &tx, &task_cancel).await
            {
                warn!(error = %e, "utterance failed");
                let _ = tx
                    .send(ResponseEvent::Error(EventMeta {
                        status_message: e.to_string(),
                        ..Default::default()
                    }))
                    .await;
            }
        });

        Ok(EventStream { rx, cancel })
    }

    /// Transcribes one utterance and returns the final transcript.
    pub async fn transcribe(&self, chunks: Vec<Vec<u8>>) -> Result<String> {
        self.transcribe_with_interim(chunks, |_| {}).await
    }

    /// Like [`DoubaoAsr::transcribe`], invoking `on_interim` with each
    /// partial transcript as it arrives.
    pub async fn transcribe_with_interim(
        &self,
        chunks: Vec<Vec<u8>>,
        mut on_interim: impl FnMut(&str),
    ) -> Result<String> {
        let mut stream = self.transcribe_stream(chunks).await?;
        let mut transcript = String::new();

        while let Some(event) = stream.next().await {
            match event {
                ResponseEvent::InterimResult { result, .. } => on_interim(&result.text),
                ResponseEvent::FinalResult { result, .. } => transcript = result.text,
                ResponseEvent::Error(meta) => {
                    if is_session_expired(meta.status_code) {
                        return Err(AsrError::SessionExpired);
                    }
                    return Err(AsrError::Server {
                        status_code: meta.status_code,
                        message: meta.status_message,
                    });
                }
                _ => {}
            }
        }

        Ok(transcript)
    }
}

impl std::fmt::Debug for DoubaoAsr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoubaoAsr")
            .field("config", &self.config)
            .finish()
    }
}

/// Runs one utterance end to end, retrying once after an expired
/// session ticket.
async fn stream_utterance(
    config: AsrConfig,
    credential: Credential,
    wave: Arc<WaveClient>,
    chunks: Vec<Vec<u8>>,
    events: &mpsc::Sender<ResponseEvent>,
    cancel: &CancellationToken,
) -> Result<()> {
    let session_config = config.session_config_json(&credential.device_id)?;

    for attempt in 0..2 {
        // A restarted utterance begins again from its first frame under
        // a fresh correlation id.
        let utterance = Utterance::new(&credential.token, session_config.clone(), chunks.clone());

        let options = DriverOptions {
            realtime: config.realtime,
            frame_duration: config.frame_duration,
            recv_timeout: config.recv_timeout,
            swallow_expired: attempt == 0,
        };

        let (sink, stream) = WsTransport::connect(
            &config.ws_url(&credential.device_id),
            &config.ws_headers(),
            config.connect_timeout,
        )
        .await?;

        let outcome = run_utterance(
            wave.as_ref(),
            Box::new(sink),
            Box::new(stream),
            utterance,
            &options,
            events,
            cancel,
        )
        .await?;

        match outcome {
            UtteranceOutcome::Failed {
                session_expired: true,
            } if attempt == 0 => {
                info!("session ticket expired, re-handshaking and restarting utterance");
                SessionProvider::invalidate(wave.as_ref()).await;
            }
            _ => return Ok(()),
        }
    }

    Ok(())
}

/// Ordered event sequence for one utterance.
///
/// Ends with `SessionFinished` or an `Error` event. Dropping the stream
/// cancels the utterance.
pub struct EventStream {
    rx: mpsc::Receiver<ResponseEvent>,
    cancel: CancellationToken,
}

impl EventStream {
    /// Receives the next event; `None` after the terminal event.
    pub async fn next(&mut self) -> Option<ResponseEvent> {
        self.rx.recv().await
    }

    /// Cancels the utterance. Already-delivered events stay delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl futures_util::Stream for EventStream {
    type Item = ResponseEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
