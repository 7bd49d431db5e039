//! # Doubao ASR Client
//!
//! Streaming speech-recognition client for the Wave-encrypted ASR
//! service. The pure protocol layer (key exchange, envelope encryption,
//! wire schema, event classification) lives in the [`wave`] crate; this
//! crate drives it over HTTPS and WebSocket.
//!
//! ## Flow
//!
//! ```text
//! credentials ──► handshake (HTTPS, signed) ──► session key
//!                                                  │
//! audio chunks ──► FIRST/MIDDLE/LAST frames ──► encrypted duplex
//!                                                  │  WebSocket
//! typed events ◄── classifier ◄── envelopes ◄──────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use doubao_asr::{AsrConfig, DoubaoAsr};
//!
//! # async fn run(chunks: Vec<Vec<u8>>) -> anyhow::Result<()> {
//! let mut config = AsrConfig::default();
//! config.device_id = "1234567890123456".to_string();
//! config.token = "token".to_string();
//!
//! let client = DoubaoAsr::new(config);
//! let transcript = client.transcribe(chunks).await?;
//! println!("{transcript}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod credentials;
pub mod driver;
pub mod error;
pub mod registrar;
pub mod transport;
pub mod wave_client;

pub use client::{DoubaoAsr, EventStream};
pub use config::{AsrConfig, AudioInfo, SessionConfig, SessionExtra};
pub use credentials::{Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use driver::{run_utterance, DriverOptions, DriverState, Utterance, UtteranceOutcome};
pub use error::{AsrError, Result};
pub use registrar::{DeviceParams, DeviceRegistrar, RegisteredDevice};
pub use transport::{TransportSink, TransportStream, WsTransport};
pub use wave_client::{SessionProvider, WaveClient};

pub use wave;
pub use wave::{ResponseEvent, TranscriptResult};
