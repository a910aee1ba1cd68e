//! Base traits and types for streaming TTS clients.
//!
//! Every client turns one utterance into a lazy stream of [`TTSEvent`]s:
//!
//! ```text
//! Started ─▶ Audio* ─▶ Stopped | Error
//! ```
//!
//! A call that fails before any audio could be requested (bad HTTP status,
//! rejected handshake) yields a single `Error` and nothing else.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

use crate::utils::audio::resample_pcm16;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while synthesizing speech.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TTSError {
    /// Transport opened but the connection confirmation was missing or wrong
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The server rejected the task-start settings
    #[error("Task start failed: {0}")]
    TaskStartFailed(String),

    /// Send or receive failed mid-stream
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Malformed hex or JSON fragment
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Non-200 response or explicit error event from the server
    #[error("Upstream error: {0}")]
    UpstreamError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl TTSError {
    /// Returns true for errors that are handled locally without ending the call.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DecodeError(_))
    }
}

/// Result type for TTS operations.
pub type TTSResult<T> = Result<T, TTSError>;

// =============================================================================
// Audio and Events
// =============================================================================

/// One block of decoded PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Raw PCM16 little-endian bytes
    pub data: Bytes,
    /// Sample rate of `data` in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
}

impl AudioChunk {
    pub fn new(data: impl Into<Bytes>, sample_rate: u32, channels: u16) -> Self {
        Self {
            data: data.into(),
            sample_rate,
            channels,
        }
    }

    /// Duration of the chunk in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        let bytes_per_second = self.sample_rate as f64 * self.channels.max(1) as f64 * 2.0;
        if bytes_per_second == 0.0 {
            return 0.0;
        }
        self.data.len() as f64 * 1000.0 / bytes_per_second
    }

    /// Converts mono audio to `target_rate`.
    ///
    /// Multi-channel audio and failed conversions are returned unchanged.
    pub fn resampled(self, target_rate: u32) -> Self {
        if target_rate == self.sample_rate || self.channels != 1 {
            return self;
        }
        match resample_pcm16(&self.data, self.sample_rate, target_rate) {
            Ok(data) => Self::new(data, target_rate, self.channels),
            Err(e) => {
                warn!("Keeping audio at {} Hz: {}", self.sample_rate, e);
                self
            }
        }
    }
}

/// Event emitted by a synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub enum TTSEvent {
    /// Synthesis began; always the first event of a call that reached the server
    Started,
    /// A block of audio in transport order
    Audio(AudioChunk),
    /// Synthesis ended normally
    Stopped,
    /// Synthesis ended with an error
    Error(TTSError),
}

impl TTSEvent {
    /// Returns true for `Stopped` and `Error`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Error(_))
    }
}

/// Lazy, single-use stream of events for one utterance.
pub type TTSEventStream = Pin<Box<dyn Stream<Item = TTSEvent> + Send>>;

// =============================================================================
// Notifications
// =============================================================================

/// Side-channel notifications emitted alongside the audio stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TTSNotification {
    /// An inline `[tag]` switched the emotion for the current utterance
    EmotionChanged(String),
    /// Settings changed for the current utterance
    SettingsUpdated(Value),
}

impl TTSNotification {
    /// Builds the pair of notifications sent when an utterance carries an emotion tag.
    pub fn for_emotion(emotion: &str) -> [Self; 2] {
        [
            Self::EmotionChanged(emotion.to_string()),
            Self::SettingsUpdated(json!({ "emotion": [emotion] })),
        ]
    }

    /// Renders the notification as a client transport message.
    pub fn to_transport_message(&self) -> Value {
        match self {
            Self::EmotionChanged(emotion) => json!({
                "label": "rtvi-ai",
                "type": "server-message",
                "data": { "emotion": emotion },
            }),
            Self::SettingsUpdated(settings) => json!({
                "label": "rtvi-ai",
                "type": "tts-update-settings",
                "data": settings,
            }),
        }
    }
}

/// Sender half for [`TTSNotification`]s.
pub type NotificationSender = tokio::sync::mpsc::UnboundedSender<TTSNotification>;

pub(crate) fn notify_emotion(sender: Option<&NotificationSender>, emotion: &str) {
    let Some(sender) = sender else {
        return;
    };
    for notification in TTSNotification::for_emotion(emotion) {
        if sender.send(notification).is_err() {
            warn!("Notification receiver dropped");
            return;
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle of a persistent synthesis session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingHandshake,
    Ready,
    Synthesizing,
    Disconnecting,
}

// =============================================================================
// Capability Interface
// =============================================================================

/// Common interface of the synthesis transports.
#[async_trait]
pub trait StreamingTTS: Send + Sync {
    /// Synthesizes `text`, returning a lazy event stream.
    ///
    /// Nothing is sent until the stream is polled.
    fn synthesize(&self, text: &str) -> TTSEventStream;

    /// Prepares the transport ahead of the first utterance.
    async fn start(&self) -> TTSResult<()>;

    /// Gracefully ends the session.
    async fn stop(&self) -> TTSResult<()>;

    /// Aborts the session.
    async fn cancel(&self) -> TTSResult<()>;

    /// Provider name used in logs.
    fn provider_name(&self) -> &'static str;
}
