//! Streaming binary message schema for the ASR duplex channel.
//!
//! Messages are protobuf-encoded. The field numbers below were recovered
//! from the reverse-engineered wire captures; they are load-bearing and
//! must not be renumbered.

use prost::Message;

use crate::error::Result;

/// Service name carried on every request.
pub const SERVICE_ASR: &str = "ASR";

/// Position of an audio frame within one utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FrameState {
    /// No position marker (non-audio messages).
    Unspecified = 0,
    /// First frame of the utterance.
    First = 1,
    /// Any frame between the first and the last.
    Middle = 2,
    /// Final frame; marks end of utterance.
    Last = 3,
}

/// One outbound streaming message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AsrRequest {
    /// Bearer token.
    #[prost(string, tag = "1")]
    pub token: String,
    /// Service name, always `ASR`.
    #[prost(string, tag = "2")]
    pub service_name: String,
    /// Method name: `StartTask`, `StartSession`, `TaskRequest`, or
    /// `FinishSession`.
    #[prost(string, tag = "3")]
    pub method_name: String,
    /// JSON string payload (session config or per-frame metadata).
    #[prost(string, tag = "4")]
    pub payload: String,
    /// Raw audio bytes (already transport-encoded).
    #[prost(bytes = "vec", tag = "5")]
    pub audio_data: Vec<u8>,
    /// Correlation id, stable for one utterance.
    #[prost(string, tag = "6")]
    pub request_id: String,
    /// Frame position marker.
    #[prost(enumeration = "FrameState", tag = "7")]
    pub frame_state: i32,
}

/// One inbound streaming message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AsrResponse {
    /// Correlation id echoed from the request.
    #[prost(string, tag = "1")]
    pub request_id: String,
    /// Server-assigned task id.
    #[prost(string, tag = "2")]
    pub task_id: String,
    /// Service name.
    #[prost(string, tag = "3")]
    pub service_name: String,
    /// Message type discriminator string.
    #[prost(string, tag = "4")]
    pub message_type: String,
    /// Status code; 0 means success.
    #[prost(int32, tag = "5")]
    pub status_code: i32,
    /// Human-readable status message.
    #[prost(string, tag = "6")]
    pub status_message: String,
    /// JSON string result payload.
    #[prost(string, tag = "7")]
    pub result_json: String,
    /// Numeric field of unconfirmed meaning. Preserved opaquely on
    /// round-trip, never interpreted.
    #[prost(int64, tag = "8")]
    pub opaque: i64,
}

impl AsrRequest {
    /// Encodes this message to its wire bytes.
    pub fn encode_to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decodes an outbound message from its wire bytes, as a server or
    /// test fixture would.
    pub fn decode_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self::decode(data)?)
    }
}

impl AsrResponse {
    /// Encodes this message to its wire bytes, as a server or test
    /// fixture would.
    pub fn encode_to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decodes an inbound message from its wire bytes.
    pub fn decode_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self::decode(data)?)
    }
}

/// Builds a `StartTask` message opening the logical task.
pub fn start_task(request_id: &str, token: &str) -> AsrRequest {
    AsrRequest {
        token: token.to_string(),
        service_name: SERVICE_ASR.to_string(),
        method_name: "StartTask".to_string(),
        request_id: request_id.to_string(),
        ..Default::default()
    }
}

/// Builds a `StartSession` message carrying the JSON session config.
pub fn start_session(request_id: &str, token: &str, config_json: String) -> AsrRequest {
    AsrRequest {
        token: token.to_string(),
        service_name: SERVICE_ASR.to_string(),
        method_name: "StartSession".to_string(),
        payload: config_json,
        request_id: request_id.to_string(),
        ..Default::default()
    }
}

/// Builds a `TaskRequest` message carrying one audio frame.
pub fn task_request(
    request_id: &str,
    audio_data: Vec<u8>,
    frame_state: FrameState,
    timestamp_ms: u64,
) -> AsrRequest {
    let metadata = serde_json::json!({ "extra": {}, "timestamp_ms": timestamp_ms });
    AsrRequest {
        service_name: SERVICE_ASR.to_string(),
        method_name: "TaskRequest".to_string(),
        payload: metadata.to_string(),
        audio_data,
        request_id: request_id.to_string(),
        frame_state: frame_state as i32,
        ..Default::default()
    }
}

/// Builds a `FinishSession` message closing the utterance.
pub fn finish_session(request_id: &str, token: &str) -> AsrRequest {
    AsrRequest {
        token: token.to_string(),
        service_name: SERVICE_ASR.to_string(),
        method_name: "FinishSession".to_string(),
        request_id: request_id.to_string(),
        ..Default::default()
    }
}
