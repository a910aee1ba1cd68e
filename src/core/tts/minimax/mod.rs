//! MiniMax T2A v2 text-to-speech.
//!
//! Two transports share the same settings and event model:
//!
//! ```text
//! HttpStreamingClient                 SocketStreamingClient
//!     │                                   │
//!     └── POST per utterance              ├── persistent session (reused while
//!         "data:" blocks ─▶ hex ─▶ PCM    │   model/voice/rate/settings match)
//!                                         ├── keepalive every 10s
//!                                         └── request-id fencing for barge-in
//! ```
//!
//! The module is organized into:
//! - **config**: [`MiniMaxConnection`], [`SynthesisSettings`], language boost map
//! - **messages**: request bodies, socket frames, [`ServerMessage`]
//! - **provider**: [`HttpStreamingClient`] and the `data:` block splitter
//! - **client**: [`SocketStreamingClient`]
//!
//! Both clients strip a leading `[emotion]` tag from the text and apply it
//! for that utterance only.

mod client;
mod config;
mod messages;
mod provider;


pub use client::SocketStreamingClient;
pub use config::{
    DEFAULT_BITRATE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_MODEL,
    DEFAULT_RECEIVE_TIMEOUT, DEFAULT_SAMPLE_RATE, DEFAULT_SPEED, DEFAULT_VOICE, FALLBACK_EMOTION,
    MINIMAX_TTS_URL, MINIMAX_TTS_WS_URL, MiniMaxConnection, SUPPORTED_SAMPLE_RATES,
    SettingsFingerprint, SynthesisSettings, language_boost_for,
};
pub use messages::{
    AudioSetting, BaseResp, EVENT_CONNECTED, EVENT_TASK_FAILED, EVENT_TASK_STARTED,
    KEEPALIVE_FRAME, ServerMessage, SessionSettings, T2ARequest, TaskContinueMessage,
    TaskFinishMessage, TaskStartMessage, VoiceSetting,
};
pub use provider::{DataBlockSplitter, HttpStreamingClient};
