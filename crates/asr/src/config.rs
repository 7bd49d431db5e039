//! Client configuration: endpoints, identity, audio parameters, and the
//! session config JSON sent on `StartSession`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AsrError, Result};

/// Device registration endpoint.
pub const REGISTER_URL: &str = "https://log.snssdk.com/service/2/device_register/";

/// Settings endpoint used to fetch the bearer token.
pub const SETTINGS_URL: &str = "https://is.snssdk.com/service/settings/v3/";

/// Wave handshake endpoint.
pub const HANDSHAKE_URL: &str = "https://security-wave.snssdk.com/wave/v2/handshake";

/// ASR duplex WebSocket endpoint.
pub const WEBSOCKET_URL: &str = "wss://frontier-audio-ime-ws.doubao.com/ocean/api/v1/ws";

/// Application id the upstream client identifies as.
pub const APP_ID: &str = "401734";

/// User agent string matching the upstream client build.
pub const USER_AGENT: &str = "com.bytedance.android.doubaoime/100102018 (Linux; U; Android 16; en_US; Pixel 7 Pro; Build/BP2A.250605.031.A2; Cronet/TTNetVersion:94cf429a 2025-11-17 QuicVersion:1f89f732 2025-05-08)";

/// Client configuration.
///
/// `device_id` and `token` may be left empty; the client then falls back
/// to the credential store and, failing that, the device registrar.
#[derive(Debug, Clone)]
pub struct AsrConfig {
    /// WebSocket endpoint (without query parameters).
    pub url: String,
    /// Handshake endpoint.
    pub handshake_url: String,
    /// Application id.
    pub app_id: String,
    /// User agent for HTTP and WebSocket requests.
    pub user_agent: String,

    /// Device identifier; empty means resolve via store/registrar.
    pub device_id: String,
    /// Bearer token; empty means resolve via store/registrar.
    pub token: String,

    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Audio channel count.
    pub channels: u32,
    /// Nominal duration of one audio frame, used for realtime pacing.
    pub frame_duration: Duration,

    /// Ask the server to punctuate transcripts.
    pub enable_punctuation: bool,
    /// Ask the server to reject non-speech audio.
    pub enable_speech_rejection: bool,
    /// Server-side two-pass recognition.
    pub enable_asr_twopass: bool,
    /// Server-side three-pass recognition.
    pub enable_asr_threepass: bool,
    /// Foreground application name reported in the session config. The
    /// server may tune recognition to the reported app.
    pub app_name: String,

    /// Pace outbound frames at `frame_duration` intervals instead of
    /// sending as fast as the transport accepts.
    pub realtime: bool,

    /// Deadline for establishing the WebSocket connection.
    pub connect_timeout: Duration,
    /// Deadline for each inbound message while a stream is open.
    pub recv_timeout: Duration,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            url: WEBSOCKET_URL.to_string(),
            handshake_url: HANDSHAKE_URL.to_string(),
            app_id: APP_ID.to_string(),
            user_agent: USER_AGENT.to_string(),
            device_id: String::new(),
            token: String::new(),
            sample_rate: 16_000,
            channels: 1,
            frame_duration: Duration::from_millis(20),
            enable_punctuation: true,
            enable_speech_rejection: false,
            enable_asr_twopass: true,
            enable_asr_threepass: true,
            app_name: "com.android.chrome".to_string(),
            realtime: false,
            connect_timeout: Duration::from_secs(10),
            recv_timeout: Duration::from_secs(10),
        }
    }
}

impl AsrConfig {
    /// The full WebSocket URL including app and device query parameters.
    pub fn ws_url(&self, device_id: &str) -> String {
        format!(
            "{}?aid={}&device_id={}",
            self.url, self.app_id, device_id
        )
    }

    /// Headers sent on the WebSocket upgrade request.
    pub fn ws_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("User-Agent", self.user_agent.clone()),
            ("proto-version", "v2".to_string()),
            ("x-custom-keepalive", "true".to_string()),
        ]
    }

    /// Builds the session config sent on `StartSession`.
    pub fn session_config(&self, device_id: &str) -> SessionConfig {
        SessionConfig {
            audio_info: AudioInfo {
                channel: self.channels,
                format: "speech_opus".to_string(),
                sample_rate: self.sample_rate,
            },
            enable_punctuation: self.enable_punctuation,
            enable_speech_rejection: self.enable_speech_rejection,
            extra: SessionExtra {
                app_name: self.app_name.clone(),
                cell_compress_rate: 8,
                did: device_id.to_string(),
                enable_asr_threepass: self.enable_asr_threepass,
                enable_asr_twopass: self.enable_asr_twopass,
                input_mode: "tool".to_string(),
            },
        }
    }

    /// Serializes the session config to the JSON string the wire message
    /// carries.
    pub fn session_config_json(&self, device_id: &str) -> Result<String> {
        serde_json::to_string(&self.session_config(device_id))
            .map_err(|e| AsrError::Wave(e.into()))
    }
}

/// Audio stream parameters inside the session config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Channel count.
    pub channel: u32,
    /// Codec name; the service expects Opus packets.
    pub format: String,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

/// Extra session parameters the upstream client always sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionExtra {
    /// Foreground application name.
    pub app_name: String,
    /// Compression rate hint.
    pub cell_compress_rate: u32,
    /// Device id, repeated inside the payload.
    pub did: String,
    /// Server-side three-pass recognition.
    pub enable_asr_threepass: bool,
    /// Server-side two-pass recognition.
    pub enable_asr_twopass: bool,
    /// Input mode discriminator.
    pub input_mode: String,
}

/// JSON payload of the `StartSession` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Audio stream parameters.
    pub audio_info: AudioInfo,
    /// Ask the server to punctuate transcripts.
    pub enable_punctuation: bool,
    /// Ask the server to reject non-speech audio.
    pub enable_speech_rejection: bool,
    /// Extra parameters.
    pub extra: SessionExtra,
}
