use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// minimax:
///   api_key: "your-api-key"
///   group_id: "your-group-id"
///   http_url: "https://api.minimax.chat/v1/t2a_v2"
///   ws_url: "wss://api.minimaxi.com/ws/v1/t2a_v2"
///
/// synthesis:
///   backend: "socket"
///   model: "speech-02-turbo"
///   voice_id: "Calm_Woman"
///   sample_rate: 24000
///   output_sample_rate: 16000
///   speed: 1.1
///   volume: 1.0
///   pitch: 0
///   emotion: "neutral"
///   language: "zh"
///   english_normalization: false
///
/// session:
///   keepalive_seconds: 10
///   receive_timeout_seconds: 60
///   connect_timeout_seconds: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub minimax: Option<MiniMaxYaml>,
    pub synthesis: Option<SynthesisYaml>,
    pub session: Option<SessionYaml>,
}

/// MiniMax credentials and endpoints from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MiniMaxYaml {
    pub api_key: Option<String>,
    pub group_id: Option<String>,
    pub http_url: Option<String>,
    pub ws_url: Option<String>,
}

/// Voice and audio settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SynthesisYaml {
    /// `http` or `socket`
    pub backend: Option<String>,
    pub model: Option<String>,
    pub voice_id: Option<String>,
    pub sample_rate: Option<u32>,
    pub output_sample_rate: Option<u32>,
    pub speed: Option<f32>,
    pub volume: Option<f32>,
    pub pitch: Option<i32>,
    pub emotion: Option<String>,
    pub language: Option<String>,
    pub english_normalization: Option<bool>,
}

/// Session timing from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub keepalive_seconds: Option<u64>,
    /// 0 disables the receive timeout
    pub receive_timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
