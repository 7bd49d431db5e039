//! # Wave Protocol Library
//!
//! Pure protocol layer for the reverse-engineered Wave encryption scheme
//! and the ASR streaming wire format it protects. This crate does no
//! I/O; the companion client crate drives it over HTTPS and WebSocket.
//!
//! ## Overview
//!
//! - **Key Exchange**: ephemeral P-256 ECDH handshake, ECDSA-signed
//!   canonical request, HKDF-SHA256 session key derivation
//! - **Envelope Codec**: ChaCha20 keystream encryption with an
//!   unauthenticated MD5 content digest (the protocol has no AEAD tag)
//! - **Session**: derived key + opaque tickets + expiry
//! - **Wire Schema**: protobuf streaming messages for the ASR duplex
//!   channel
//! - **Stream Framer**: FIRST/MIDDLE/LAST tagging of outbound audio
//! - **Response Classifier**: total mapping of inbound messages onto
//!   typed events
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Typed events / audio frames      │  classify, framer
//! ├─────────────────────────────────────────┤
//! │        Streaming wire messages          │  protobuf
//! ├─────────────────────────────────────────┤
//! │          Envelope encryption            │  ChaCha20 + MD5 digest
//! ├─────────────────────────────────────────┤
//! │      Session (handshake-derived key)    │  ECDH + HKDF-SHA256
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`handshake`]: key exchange and session key derivation
//! - [`envelope`]: per-message encryption unit
//! - [`session`]: live key + ticket + expiry
//! - [`wire`]: streaming binary message schema
//! - [`framer`]: audio frame position tagging
//! - [`classify`]: inbound event classification
//! - [`error`]: error types

pub mod classify;
pub mod envelope;
pub mod error;
pub mod framer;
pub mod handshake;
pub mod session;
pub mod wire;

pub use classify::{
    classify, classify_raw, is_session_expired, EventMeta, ResponseEvent, TranscriptResult,
    STATUS_OK, STATUS_TICKET_EXPIRED,
};
pub use envelope::{
    content_digest, open, seal, verify_digest, Envelope, DIGEST_LEN, ENVELOPE_HEADER_SIZE, KEY_LEN,
    NONCE_LEN,
};
pub use error::{Result, WaveError};
pub use framer::{tag_chunks, AudioFrame, FrameTagger};
pub use handshake::{
    derive_session_key, HandshakeAttempt, HandshakeRequest, HandshakeResponse, KeyShare,
    CIPHER_SUITE_CHACHA20, EXPIRY_MARGIN_SECS, HANDSHAKE_VERSION, HKDF_INFO, RANDOM_LEN,
};
pub use session::Session;
pub use wire::{AsrRequest, AsrResponse, FrameState, SERVICE_ASR};
