//! Configuration module for the streaming TTS client
//!
//! Configuration comes from .env files, environment variables and an optional
//! YAML file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `env`: Environment variable loading
//! - `yaml`: YAML configuration file loading
//!
//! # Example
//! ```rust,no_run
//! use streaming_tts::config::ClientConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variable fallbacks
//! let config = ClientConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! let settings = config.to_settings();
//! println!("Using voice {}", settings.voice_id);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod yaml;

pub use yaml::{MiniMaxYaml, SessionYaml, SynthesisYaml, YamlConfig};

use crate::core::tts::BackendKind;
use crate::core::tts::minimax::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_MODEL, DEFAULT_RECEIVE_TIMEOUT,
    DEFAULT_SAMPLE_RATE, DEFAULT_SPEED, DEFAULT_VOICE, MINIMAX_TTS_URL, MINIMAX_TTS_WS_URL,
    MiniMaxConnection, SynthesisSettings,
};

/// Client configuration
///
/// Contains everything needed to build a synthesis backend:
/// - MiniMax credentials and endpoints
/// - Voice and audio settings
/// - Session timing (keepalive, timeouts)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // MiniMax credentials
    pub api_key: String,
    pub group_id: String,
    pub http_url: String,
    pub ws_url: String,

    // Synthesis settings
    pub backend: BackendKind,
    pub model: String,
    pub voice_id: String,
    pub sample_rate: u32,
    /// Resample emitted audio to this rate
    pub output_sample_rate: Option<u32>,
    pub speed: f32,
    pub volume: f32,
    pub pitch: i32,
    /// Default emotion; unsupported values are dropped with a warning
    pub emotion: Option<String>,
    /// Language code such as `zh` or `en-US`
    pub language: Option<String>,
    pub english_normalization: Option<bool>,

    // Session timing
    pub keepalive_seconds: u64,
    /// Per-message receive timeout; `None` waits forever
    pub receive_timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            group_id: String::new(),
            http_url: MINIMAX_TTS_URL.to_string(),
            ws_url: MINIMAX_TTS_WS_URL.to_string(),
            backend: BackendKind::default(),
            model: DEFAULT_MODEL.to_string(),
            voice_id: DEFAULT_VOICE.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            output_sample_rate: None,
            speed: DEFAULT_SPEED,
            volume: 1.0,
            pitch: 0,
            emotion: None,
            language: None,
            english_normalization: None,
            keepalive_seconds: DEFAULT_KEEPALIVE_INTERVAL.as_secs(),
            receive_timeout_seconds: Some(DEFAULT_RECEIVE_TIMEOUT.as_secs()),
            connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT.as_secs(),
        }
    }
}

/// Zeroize the API key when the configuration is dropped.
impl Drop for ClientConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded in main.rs before this is called.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = env::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file on top of environment variables
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = YamlConfig::from_file(path)?;
        let mut config = env::load_from_env()?;
        config.apply_yaml(yaml_config)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(minimax) = yaml.minimax {
            if let Some(api_key) = minimax.api_key {
                self.api_key = api_key;
            }
            if let Some(group_id) = minimax.group_id {
                self.group_id = group_id;
            }
            if let Some(http_url) = minimax.http_url {
                self.http_url = http_url;
            }
            if let Some(ws_url) = minimax.ws_url {
                self.ws_url = ws_url;
            }
        }

        if let Some(synthesis) = yaml.synthesis {
            if let Some(backend) = synthesis.backend {
                self.backend = backend.parse()?;
            }
            if let Some(model) = synthesis.model {
                self.model = model;
            }
            if let Some(voice_id) = synthesis.voice_id {
                self.voice_id = voice_id;
            }
            if let Some(sample_rate) = synthesis.sample_rate {
                self.sample_rate = sample_rate;
            }
            if synthesis.output_sample_rate.is_some() {
                self.output_sample_rate = synthesis.output_sample_rate;
            }
            if let Some(speed) = synthesis.speed {
                self.speed = speed;
            }
            if let Some(volume) = synthesis.volume {
                self.volume = volume;
            }
            if let Some(pitch) = synthesis.pitch {
                self.pitch = pitch;
            }
            if synthesis.emotion.is_some() {
                self.emotion = synthesis.emotion;
            }
            if synthesis.language.is_some() {
                self.language = synthesis.language;
            }
            if synthesis.english_normalization.is_some() {
                self.english_normalization = synthesis.english_normalization;
            }
        }

        if let Some(session) = yaml.session {
            if let Some(keepalive) = session.keepalive_seconds {
                self.keepalive_seconds = keepalive;
            }
            if let Some(receive_timeout) = session.receive_timeout_seconds {
                self.receive_timeout_seconds = (receive_timeout > 0).then_some(receive_timeout);
            }
            if let Some(connect_timeout) = session.connect_timeout_seconds {
                self.connect_timeout_seconds = connect_timeout;
            }
        }

        Ok(())
    }

    /// Validate the merged configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.api_key.trim().is_empty() {
            return Err("MiniMax API key is required (set MINIMAX_API_KEY)".into());
        }
        if self.backend == BackendKind::Http && self.group_id.trim().is_empty() {
            return Err("MiniMax group id is required for the HTTP backend (set MINIMAX_GROUP_ID)".into());
        }
        self.to_connection().validate()?;
        self.to_settings().validate()?;
        Ok(())
    }

    /// Credentials, endpoints and timeouts for the clients
    pub fn to_connection(&self) -> MiniMaxConnection {
        MiniMaxConnection {
            api_key: self.api_key.clone(),
            group_id: self.group_id.clone(),
            http_url: self.http_url.clone(),
            ws_url: self.ws_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            receive_timeout: self.receive_timeout_seconds.map(Duration::from_secs),
            keepalive_interval: Duration::from_secs(self.keepalive_seconds),
        }
    }

    /// Voice and audio settings for the clients
    pub fn to_settings(&self) -> SynthesisSettings {
        let mut settings = SynthesisSettings::new(&self.model, &self.voice_id)
            .with_sample_rate(self.sample_rate)
            .with_output_sample_rate(self.output_sample_rate)
            .with_speed(self.speed)
            .with_volume(self.volume)
            .with_pitch(self.pitch);
        if let Some(emotion) = &self.emotion {
            settings = settings.with_emotion(emotion);
        }
        if let Some(language) = &self.language {
            settings = settings.with_language(language);
        }
        if let Some(enabled) = self.english_normalization {
            settings = settings.with_english_normalization(enabled);
        }
        settings
    }
}
