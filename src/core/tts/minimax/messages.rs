//! Wire messages for the MiniMax T2A v2 API.
//!
//! - **Outgoing**
//!   - [`T2ARequest`]: HTTP streaming request body
//!   - [`TaskStartMessage`], [`TaskContinueMessage`], [`TaskFinishMessage`]:
//!     socket control frames
//!   - [`KEEPALIVE_FRAME`]: empty object sent on idle sockets
//! - **Incoming**
//!   - [`ServerMessage`]: every HTTP `data:` block and socket frame

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Socket event confirming the connection.
pub const EVENT_CONNECTED: &str = "connected_success";
/// Socket event confirming the task start.
pub const EVENT_TASK_STARTED: &str = "task_started";
/// Socket event reporting a failed task.
pub const EVENT_TASK_FAILED: &str = "task_failed";

/// Keepalive payload.
pub const KEEPALIVE_FRAME: &str = "{}";

// =============================================================================
// Settings Blocks
// =============================================================================

/// `voice_setting` block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceSetting {
    pub voice_id: String,
    pub speed: f32,
    pub vol: f32,
    pub pitch: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}

/// `audio_setting` block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioSetting {
    pub sample_rate: u32,
    pub bitrate: u32,
    pub format: &'static str,
    pub channel: u16,
}

/// Settings shared by the HTTP body and the socket `task_start` frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSettings {
    pub voice_setting: VoiceSetting,
    pub audio_setting: AudioSetting,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_boost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub english_normalization: Option<bool>,
}

// =============================================================================
// Outgoing Messages
// =============================================================================

/// HTTP streaming request body.
#[derive(Debug, Clone, Serialize)]
pub struct T2ARequest<'a> {
    pub stream: bool,
    #[serde(flatten)]
    pub settings: SessionSettings,
    pub model: &'a str,
    pub text: &'a str,
}

/// `task_start` frame.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStartMessage<'a> {
    pub event: &'static str,
    pub model: &'a str,
    #[serde(flatten)]
    pub settings: SessionSettings,
}

impl<'a> TaskStartMessage<'a> {
    pub fn new(model: &'a str, settings: SessionSettings) -> Self {
        Self {
            event: "task_start",
            model,
            settings,
        }
    }
}

/// `task_continue` frame carrying one utterance.
#[derive(Debug, Clone, Serialize)]
pub struct TaskContinueMessage<'a> {
    pub event: &'static str,
    pub text: &'a str,
}

impl<'a> TaskContinueMessage<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            event: "task_continue",
            text,
        }
    }
}

/// `task_finish` frame.
#[derive(Debug, Clone, Serialize)]
pub struct TaskFinishMessage {
    pub event: &'static str,
}

impl Default for TaskFinishMessage {
    fn default() -> Self {
        Self {
            event: "task_finish",
        }
    }
}

// =============================================================================
// Incoming Messages
// =============================================================================

/// Status block attached to most server payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct BaseResp {
    #[serde(default)]
    pub status_code: i64,
    #[serde(default)]
    pub status_msg: String,
}

/// Audio block of a server payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AudioPayload {
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
}

/// Any payload received from the server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerMessage {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub data: Option<AudioPayload>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub extra_info: Option<Value>,
    #[serde(default)]
    pub base_resp: Option<BaseResp>,
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn parse_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    #[inline]
    pub fn is_event(&self, event: &str) -> bool {
        self.event.as_deref() == Some(event)
    }

    /// Trailing metadata block (HTTP).
    #[inline]
    pub fn is_metadata(&self) -> bool {
        self.extra_info.is_some()
    }

    /// Non-empty hex audio carried by this payload.
    pub fn audio_hex(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.audio.as_deref())
            .filter(|a| !a.is_empty())
    }

    /// Error reported by the server, if any.
    pub fn upstream_error(&self) -> Option<String> {
        let failed_event = self.is_event(EVENT_TASK_FAILED);
        match &self.base_resp {
            Some(resp) if resp.status_code != 0 => {
                Some(format!("{} (code {})", resp.status_msg, resp.status_code))
            }
            Some(resp) if failed_event => Some(resp.status_msg.clone()),
            None if failed_event => Some("task failed".to_string()),
            _ => None,
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match (&self.event, &self.base_resp) {
            (Some(event), Some(resp)) => format!(
                "event={} status={} {}",
                event, resp.status_code, resp.status_msg
            ),
            (Some(event), None) => format!("event={event}"),
            (None, Some(resp)) => format!("status={} {}", resp.status_code, resp.status_msg),
            (None, None) => "no event".to_string(),
        }
    }
}
