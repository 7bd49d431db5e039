//! Response classifier: maps inbound wire messages onto the closed set
//! of typed streaming events.
//!
//! Classification is a total function over (message type, status code):
//! a non-zero status code always yields [`ResponseEvent::Error`]
//! regardless of message type; a zero status code maps the message type
//! through an explicit lookup table; anything outside the table is a
//! protocol violation that classifies as an error event with a
//! synthesized message. Malformed input never panics the caller.

use serde::Deserialize;

use crate::wire::AsrResponse;

/// Status code meaning success.
pub const STATUS_OK: i32 = 0;

/// Status code the server uses to signal an expired session ticket.
///
/// The driver treats this as recoverable by exactly one re-handshake.
pub const STATUS_TICKET_EXPIRED: i32 = 4001;

/// Whether a status code signals ticket/session expiry.
pub fn is_session_expired(status_code: i32) -> bool {
    status_code == STATUS_TICKET_EXPIRED
}

/// Correlation and status fields shared by every event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventMeta {
    /// Correlation id echoed from the request.
    pub request_id: String,
    /// Server-assigned task id.
    pub task_id: String,
    /// Raw status code from the wire message.
    pub status_code: i32,
    /// Status message; synthesized for protocol violations.
    pub status_message: String,
}

/// Decoded transcript payload carried by interim and final results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranscriptResult {
    /// Recognized text.
    pub text: String,
    /// Whether the server considers voice activity finished.
    pub is_vad_finished: bool,
    /// The full decoded result payload, for metadata this client does
    /// not interpret.
    pub raw: serde_json::Value,
}

/// One classified inbound protocol event.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    /// The logical task was accepted.
    TaskStarted(EventMeta),
    /// The utterance session was opened.
    SessionStarted(EventMeta),
    /// The server detected the start of voice activity.
    VadStart(EventMeta),
    /// A partial transcript; later results supersede it.
    InterimResult {
        /// Correlation and status fields.
        meta: EventMeta,
        /// Decoded transcript payload.
        result: TranscriptResult,
    },
    /// The final transcript for the utterance.
    FinalResult {
        /// Correlation and status fields.
        meta: EventMeta,
        /// Decoded transcript payload.
        result: TranscriptResult,
    },
    /// The utterance session closed normally.
    SessionFinished(EventMeta),
    /// A failure: non-zero status, unrecognized message type, or a
    /// malformed frame.
    Error(EventMeta),
}

impl ResponseEvent {
    /// The shared correlation and status fields.
    pub fn meta(&self) -> &EventMeta {
        match self {
            ResponseEvent::TaskStarted(meta)
            | ResponseEvent::SessionStarted(meta)
            | ResponseEvent::VadStart(meta)
            | ResponseEvent::SessionFinished(meta)
            | ResponseEvent::Error(meta) => meta,
            ResponseEvent::InterimResult { meta, .. } | ResponseEvent::FinalResult { meta, .. } => {
                meta
            }
        }
    }

    /// Whether this event ends the utterance.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResponseEvent::SessionFinished(_) | ResponseEvent::Error(_)
        )
    }

    /// Whether this is an error event.
    pub fn is_error(&self) -> bool {
        matches!(self, ResponseEvent::Error(_))
    }
}

/// Classifies a decoded wire message.
pub fn classify(response: &AsrResponse) -> ResponseEvent {
    let mut meta = EventMeta {
        request_id: response.request_id.clone(),
        task_id: response.task_id.clone(),
        status_code: response.status_code,
        status_message: response.status_message.clone(),
    };

    if response.status_code != STATUS_OK {
        if meta.status_message.is_empty() {
            meta.status_message = format!("server returned status {}", response.status_code);
        }
        return ResponseEvent::Error(meta);
    }

    match response.message_type.as_str() {
        "TaskStarted" => ResponseEvent::TaskStarted(meta),
        "SessionStarted" => ResponseEvent::SessionStarted(meta),
        "VadStart" => ResponseEvent::VadStart(meta),
        "InterimResult" => ResponseEvent::InterimResult {
            meta,
            result: decode_result(&response.result_json),
        },
        "FinalResult" => ResponseEvent::FinalResult {
            meta,
            result: decode_result(&response.result_json),
        },
        "SessionFinished" => ResponseEvent::SessionFinished(meta),
        other => {
            meta.status_message = format!("unrecognized message type: {:?}", other);
            ResponseEvent::Error(meta)
        }
    }
}

/// Classifies a raw inbound message, absorbing decode failures.
///
/// A frame that cannot be decoded classifies as an error event rather
/// than an `Err`, so one malformed message never tears down the caller's
/// event loop by panic.
pub fn classify_raw(data: &[u8]) -> ResponseEvent {
    match AsrResponse::decode_bytes(data) {
        Ok(response) => classify(&response),
        Err(err) => ResponseEvent::Error(EventMeta {
            status_message: format!("malformed frame: {}", err),
            ..Default::default()
        }),
    }
}

/// Shape of the JSON result payload, as far as this client interprets
/// it.
#[derive(Debug, Deserialize)]
struct ResultPayload {
    #[serde(default)]
    results: Vec<ResultEntry>,
}

#[derive(Debug, Deserialize)]
struct ResultEntry {
    #[serde(default)]
    text: String,
    #[serde(default)]
    is_vad_finished: bool,
}

/// Decodes the transcript payload, tolerating absent or malformed JSON.
fn decode_result(result_json: &str) -> TranscriptResult {
    if result_json.is_empty() {
        return TranscriptResult::default();
    }

    let raw: serde_json::Value = match serde_json::from_str(result_json) {
        Ok(value) => value,
        Err(_) => return TranscriptResult::default(),
    };

    let payload: ResultPayload =
        serde_json::from_value(raw.clone()).unwrap_or(ResultPayload { results: vec![] });

    let mut text = String::new();
    let mut is_vad_finished = false;
    for entry in payload.results {
        if !entry.text.is_empty() {
            text = entry.text;
        }
        if entry.is_vad_finished {
            is_vad_finished = true;
        }
    }

    TranscriptResult {
        text,
        is_vad_finished,
        raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(message_type: &str, status_code: i32) -> AsrResponse {
        AsrResponse {
            request_id: "req-1".to_string(),
            task_id: "task-1".to_string(),
            service_name: "ASR".to_string(),
            message_type: message_type.to_string(),
            status_code,
            status_message: String::new(),
            result_json: String::new(),
            opaque: 0,
        }
    }

    #[test]
    fn test_lifecycle_types_map_to_their_variants() {
        assert!(matches!(
            classify(&response("TaskStarted", 0)),
            ResponseEvent::TaskStarted(_)
        ));
        assert!(matches!(
            classify(&response("SessionStarted", 0)),
            ResponseEvent::SessionStarted(_)
        ));
        assert!(matches!(
            classify(&response("VadStart", 0)),
            ResponseEvent::VadStart(_)
        ));
        assert!(matches!(
            classify(&response("SessionFinished", 0)),
            ResponseEvent::SessionFinished(_)
        ));
    }

    #[test]
    fn test_nonzero_status_short_circuits_to_error() {
        // Even a well-known message type must classify as an error when
        // the status code is non-zero.
        let mut resp = response("FinalResult", 1005);
        resp.status_message = "quota exceeded".to_string();

        let event = classify(&resp);
        assert!(event.is_error());
        assert_eq!(event.meta().status_code, 1005);
        assert_eq!(event.meta().status_message, "quota exceeded");
    }

    #[test]
    fn test_nonzero_status_with_empty_message_is_synthesized() {
        let event = classify(&response("TaskStarted", 500));
        assert_eq!(event.meta().status_message, "server returned status 500");
    }

    #[test]
    fn test_unrecognized_type_classifies_as_error() {
        let event = classify(&response("Heartbeat", 0));
        assert!(event.is_error());
        assert!(event
            .meta()
            .status_message
            .contains("unrecognized message type"));
    }

    #[test]
    fn test_interim_result_decodes_text() {
        let mut resp = response("InterimResult", 0);
        resp.result_json = r#"{"results":[{"text":"你好","is_interim":true}]}"#.to_string();

        match classify(&resp) {
            ResponseEvent::InterimResult { result, .. } => {
                assert_eq!(result.text, "你好");
                assert!(!result.is_vad_finished);
            }
            other => panic!("expected interim result, got {:?}", other),
        }
    }

    #[test]
    fn test_final_result_decodes_vad_flag_and_keeps_raw() {
        let mut resp = response("FinalResult", 0);
        resp.result_json =
            r#"{"results":[{"text":"你好世界","is_vad_finished":true}],"extra":{"x":1}}"#
                .to_string();

        match classify(&resp) {
            ResponseEvent::FinalResult { result, meta } => {
                assert_eq!(result.text, "你好世界");
                assert!(result.is_vad_finished);
                assert_eq!(result.raw["extra"]["x"], 1);
                assert_eq!(meta.request_id, "req-1");
            }
            other => panic!("expected final result, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_result_json_does_not_panic() {
        let mut resp = response("FinalResult", 0);
        resp.result_json = "{not json".to_string();

        match classify(&resp) {
            ResponseEvent::FinalResult { result, .. } => {
                assert!(result.text.is_empty());
            }
            other => panic!("expected final result, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_raw_malformed_frame_is_error_event() {
        let event = classify_raw(&[0x0c]);
        assert!(event.is_error());
        assert!(event.meta().status_message.contains("malformed frame"));
    }

    #[test]
    fn test_classifier_is_total() {
        // Every (message_type, status_code) pair maps to exactly one
        // variant; spot-check a grid including unknown types.
        for message_type in ["TaskStarted", "InterimResult", "Bogus", ""] {
            for status_code in [0, 1, -1, i32::MAX] {
                let _ = classify(&response(message_type, status_code));
            }
        }
    }

    #[test]
    fn test_terminality() {
        assert!(classify(&response("SessionFinished", 0)).is_terminal());
        assert!(classify(&response("TaskStarted", 7)).is_terminal());
        assert!(!classify(&response("TaskStarted", 0)).is_terminal());
    }

    #[test]
    fn test_session_expired_code() {
        assert!(is_session_expired(STATUS_TICKET_EXPIRED));
        assert!(!is_session_expired(0));
        assert!(!is_session_expired(1));
    }
}
