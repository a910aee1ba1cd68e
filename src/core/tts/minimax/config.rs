//! Configuration types for the MiniMax T2A v2 API.
//!
//! This module contains:
//! - Endpoint constants and protocol defaults
//! - [`MiniMaxConnection`]: credentials, endpoints and timeouts
//! - [`SynthesisSettings`]: voice/audio parameters sent with every request
//! - Language boost mapping
//!
//! # Example
//!
//! ```rust
//! use streaming_tts::core::tts::minimax::SynthesisSettings;
//!
//! let settings = SynthesisSettings::new("speech-02-turbo", "Calm_Woman")
//!     .with_sample_rate(24000)
//!     .with_emotion("happy")
//!     .with_language("en-US");
//!
//! assert!(settings.validate().is_ok());
//! assert_eq!(settings.language_boost.as_deref(), Some("English"));
//! ```

use std::fmt;
use std::time::Duration;

use tracing::warn;

use super::messages::{AudioSetting, SessionSettings, VoiceSetting};
use crate::core::emotion::Emotion;
use crate::core::tts::base::{TTSError, TTSResult};

// =============================================================================
// Constants
// =============================================================================

/// MiniMax T2A v2 HTTP streaming endpoint.
pub const MINIMAX_TTS_URL: &str = "https://api.minimax.chat/v1/t2a_v2";

/// MiniMax T2A v2 WebSocket endpoint.
pub const MINIMAX_TTS_WS_URL: &str = "wss://api.minimaxi.com/ws/v1/t2a_v2";

/// Default speech model.
pub const DEFAULT_MODEL: &str = "speech-02-turbo";

/// Default voice.
pub const DEFAULT_VOICE: &str = "Calm_Woman";

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 32000;

/// Default encoder bitrate.
pub const DEFAULT_BITRATE: u32 = 128_000;

/// Default speaking speed.
pub const DEFAULT_SPEED: f32 = 1.1;

/// Sample rates accepted by the API.
pub const SUPPORTED_SAMPLE_RATES: [u32; 6] = [8000, 16000, 22050, 24000, 32000, 44100];

/// Emotion sent on the socket when none is configured.
pub const FALLBACK_EMOTION: &str = "neutral";

/// Interval between keepalive frames on an idle socket.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Per-message receive timeout.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Connect and handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Connection
// =============================================================================

/// Credentials, endpoints and timeouts shared by both transports.
#[derive(Clone)]
pub struct MiniMaxConnection {
    /// API key sent as a bearer token
    pub api_key: String,
    /// Group id appended to the HTTP endpoint
    pub group_id: String,
    /// HTTP streaming endpoint
    pub http_url: String,
    /// WebSocket endpoint
    pub ws_url: String,
    /// Bound on connect plus handshake
    pub connect_timeout: Duration,
    /// Bound on each read; `None` waits forever
    pub receive_timeout: Option<Duration>,
    /// Interval between keepalive frames
    pub keepalive_interval: Duration,
}

impl MiniMaxConnection {
    pub fn new(api_key: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            group_id: group_id.into(),
            ..Default::default()
        }
    }

    pub fn with_http_url(mut self, url: impl Into<String>) -> Self {
        self.http_url = url.into();
        self
    }

    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Validates credentials and timeouts.
    pub fn validate(&self) -> TTSResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "MiniMax API key is required".to_string(),
            ));
        }
        if self.keepalive_interval.is_zero() {
            return Err(TTSError::InvalidConfiguration(
                "Keepalive interval must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(TTSError::InvalidConfiguration(
                "Connect timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MiniMaxConnection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            group_id: String::new(),
            http_url: MINIMAX_TTS_URL.to_string(),
            ws_url: MINIMAX_TTS_WS_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            receive_timeout: Some(DEFAULT_RECEIVE_TIMEOUT),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

impl fmt::Debug for MiniMaxConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniMaxConnection")
            .field("api_key", &"<redacted>")
            .field("group_id", &self.group_id)
            .field("http_url", &self.http_url)
            .field("ws_url", &self.ws_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("receive_timeout", &self.receive_timeout)
            .field("keepalive_interval", &self.keepalive_interval)
            .finish()
    }
}

// =============================================================================
// Synthesis Settings
// =============================================================================

/// Voice and audio parameters for synthesis.
///
/// Output format is always raw PCM16.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisSettings {
    /// Speech model, e.g. `speech-02-turbo`
    pub model: String,
    /// Voice identifier
    pub voice_id: String,
    /// Speaking speed (0.5 to 2.0)
    pub speed: f32,
    /// Volume (0 exclusive to 10)
    pub volume: f32,
    /// Pitch shift in semitones (-12 to 12)
    pub pitch: i32,
    /// Default emotion; an inline `[tag]` overrides it for one utterance
    pub emotion: Option<String>,
    /// MiniMax language name, e.g. `Chinese` or `English`
    pub language_boost: Option<String>,
    /// English text normalization
    pub english_normalization: Option<bool>,
    /// Synthesis sample rate in Hz
    pub sample_rate: u32,
    /// Channel count (1 or 2)
    pub channels: u16,
    /// Encoder bitrate
    pub bitrate: u32,
    /// Resample decoded audio to this rate before emitting it
    pub output_sample_rate: Option<u32>,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            voice_id: DEFAULT_VOICE.to_string(),
            speed: DEFAULT_SPEED,
            volume: 1.0,
            pitch: 0,
            emotion: None,
            language_boost: None,
            english_normalization: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            bitrate: DEFAULT_BITRATE,
            output_sample_rate: None,
        }
    }
}

impl SynthesisSettings {
    pub fn new(model: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            voice_id: voice_id.into(),
            ..Default::default()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_pitch(mut self, pitch: i32) -> Self {
        self.pitch = pitch;
        self
    }

    /// Sets the default emotion.
    ///
    /// Unsupported values are dropped with a warning and the server default
    /// is used instead.
    pub fn with_emotion(mut self, emotion: &str) -> Self {
        match emotion.parse::<Emotion>() {
            Ok(e) => self.emotion = Some(e.as_str().to_string()),
            Err(_) => {
                warn!("Unsupported emotion: {}. Using default.", emotion);
                self.emotion = None;
            }
        }
        self
    }

    /// Sets the language boost from a language code such as `zh` or `es-ES`.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language_boost = language_boost_for(language).map(str::to_string);
        if self.language_boost.is_none() {
            warn!("No MiniMax language boost for '{}'", language);
        }
        self
    }

    pub fn with_english_normalization(mut self, enabled: bool) -> Self {
        self.english_normalization = Some(enabled);
        self
    }

    pub fn with_output_sample_rate(mut self, rate: Option<u32>) -> Self {
        self.output_sample_rate = rate;
        self
    }

    /// Validates parameter ranges.
    pub fn validate(&self) -> TTSResult<()> {
        if self.model.trim().is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Model name is required".to_string(),
            ));
        }
        if self.voice_id.trim().is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Voice id is required".to_string(),
            ));
        }
        if !(0.5..=2.0).contains(&self.speed) {
            return Err(TTSError::InvalidConfiguration(format!(
                "Speed must be between 0.5 and 2.0, got {}",
                self.speed
            )));
        }
        if !(self.volume > 0.0 && self.volume <= 10.0) {
            return Err(TTSError::InvalidConfiguration(format!(
                "Volume must be in (0, 10], got {}",
                self.volume
            )));
        }
        if !(-12..=12).contains(&self.pitch) {
            return Err(TTSError::InvalidConfiguration(format!(
                "Pitch must be between -12 and 12, got {}",
                self.pitch
            )));
        }
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(TTSError::InvalidConfiguration(format!(
                "Unsupported sample rate: {}. Supported rates: {:?}",
                self.sample_rate, SUPPORTED_SAMPLE_RATES
            )));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(TTSError::InvalidConfiguration(format!(
                "Channel count must be 1 or 2, got {}",
                self.channels
            )));
        }
        if self.output_sample_rate == Some(0) {
            return Err(TTSError::InvalidConfiguration(
                "Output sample rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Rate at which emitted chunks are delivered.
    #[inline]
    pub fn delivery_sample_rate(&self) -> u32 {
        self.output_sample_rate.unwrap_or(self.sample_rate)
    }

    pub(crate) fn voice_setting(&self) -> VoiceSetting {
        VoiceSetting {
            voice_id: self.voice_id.clone(),
            speed: self.speed,
            vol: self.volume,
            pitch: self.pitch,
            emotion: self.emotion.clone(),
        }
    }

    pub(crate) fn audio_setting(&self) -> AudioSetting {
        AudioSetting {
            sample_rate: self.sample_rate,
            bitrate: self.bitrate,
            format: "pcm",
            channel: self.channels,
        }
    }

    pub(crate) fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            voice_setting: self.voice_setting(),
            audio_setting: self.audio_setting(),
            language_boost: self.language_boost.clone(),
            english_normalization: self.english_normalization,
        }
    }

    /// Identity of a socket session; a change forces a reconnect.
    pub fn fingerprint(&self) -> SettingsFingerprint {
        SettingsFingerprint {
            model: self.model.clone(),
            voice_id: self.voice_id.clone(),
            sample_rate: self.sample_rate,
            serialized: serde_json::to_string(&self.session_settings()).unwrap_or_default(),
        }
    }
}

/// (model, voice, sample rate, serialized settings) recorded when a session
/// becomes ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFingerprint {
    pub model: String,
    pub voice_id: String,
    pub sample_rate: u32,
    pub serialized: String,
}

// =============================================================================
// Language Boost
// =============================================================================

const LANGUAGE_BOOSTS: &[(&str, &str)] = &[
    ("ar", "Arabic"),
    ("cs", "Czech"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("hi", "Hindi"),
    ("id", "Indonesian"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("nl", "Dutch"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("th", "Thai"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("vi", "Vietnamese"),
    ("yue", "Chinese,Yue"),
    ("zh", "Chinese"),
];

/// Maps a language code to the MiniMax `language_boost` name.
///
/// Regional variants fall back to their base code (`es-ES` → `Spanish`).
pub fn language_boost_for(code: &str) -> Option<&'static str> {
    let code = code.trim().to_ascii_lowercase().replace('_', "-");
    let lookup = |key: &str| {
        LANGUAGE_BOOSTS
            .iter()
            .find(|(c, _)| *c == key)
            .map(|(_, name)| *name)
    };
    lookup(&code).or_else(|| code.split('-').next().and_then(lookup))
}
