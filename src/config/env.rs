use std::env;
use std::str::FromStr;

use super::ClientConfig;

/// Reads an optional environment variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parses an optional environment variable.
fn parse_env<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: '{value}' ({e})").into()),
        None => Ok(None),
    }
}

/// Builds a configuration from defaults and environment variables.
pub(super) fn load_from_env() -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = ClientConfig::default();

    if let Some(api_key) = env_var("MINIMAX_API_KEY") {
        config.api_key = api_key;
    }
    if let Some(group_id) = env_var("MINIMAX_GROUP_ID") {
        config.group_id = group_id;
    }
    if let Some(http_url) = env_var("MINIMAX_HTTP_URL") {
        config.http_url = http_url;
    }
    if let Some(ws_url) = env_var("MINIMAX_WS_URL") {
        config.ws_url = ws_url;
    }

    if let Some(backend) = env_var("TTS_BACKEND") {
        config.backend = backend.parse()?;
    }
    if let Some(model) = env_var("TTS_MODEL") {
        config.model = model;
    }
    if let Some(voice_id) = env_var("TTS_VOICE_ID") {
        config.voice_id = voice_id;
    }
    if let Some(sample_rate) = parse_env("TTS_SAMPLE_RATE")? {
        config.sample_rate = sample_rate;
    }
    if let Some(rate) = parse_env("TTS_OUTPUT_SAMPLE_RATE")? {
        config.output_sample_rate = Some(rate);
    }
    if let Some(speed) = parse_env("TTS_SPEED")? {
        config.speed = speed;
    }
    if let Some(volume) = parse_env("TTS_VOLUME")? {
        config.volume = volume;
    }
    if let Some(pitch) = parse_env("TTS_PITCH")? {
        config.pitch = pitch;
    }
    config.emotion = env_var("TTS_EMOTION");
    config.language = env_var("TTS_LANGUAGE");
    config.english_normalization = parse_env("TTS_ENGLISH_NORMALIZATION")?;

    if let Some(keepalive) = parse_env("TTS_KEEPALIVE_SECONDS")? {
        config.keepalive_seconds = keepalive;
    }
    // 0 disables the receive timeout
    if let Some(timeout) = parse_env::<u64>("TTS_RECEIVE_TIMEOUT_SECONDS")? {
        config.receive_timeout_seconds = (timeout > 0).then_some(timeout);
    }
    if let Some(timeout) = parse_env("TTS_CONNECT_TIMEOUT_SECONDS")? {
        config.connect_timeout_seconds = timeout;
    }

    Ok(config)
}
