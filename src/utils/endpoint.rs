//! Endpoint URL validation
//!
//! Checks configured MiniMax endpoints before any request is made:
//! - URL must parse
//! - Scheme must match the transport (`http`/`https` or `ws`/`wss`)
//! - URL must have a host

use thiserror::Error;
use url::Url;

use crate::core::tts::TTSError;

/// Errors that can occur during endpoint validation
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("Unsupported URL scheme '{found}', expected one of {expected:?}")]
    UnsupportedScheme {
        found: String,
        expected: &'static [&'static str],
    },

    #[error("URL must have a host")]
    MissingHost,
}

impl From<EndpointError> for TTSError {
    fn from(err: EndpointError) -> Self {
        TTSError::InvalidConfiguration(err.to_string())
    }
}

const HTTP_SCHEMES: &[&str] = &["https", "http"];
const WS_SCHEMES: &[&str] = &["wss", "ws"];

fn validate(url: &str, schemes: &'static [&'static str]) -> Result<Url, EndpointError> {
    let parsed = Url::parse(url)?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(EndpointError::UnsupportedScheme {
            found: parsed.scheme().to_string(),
            expected: schemes,
        });
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(EndpointError::MissingHost);
    }
    Ok(parsed)
}

/// Validates an HTTP(S) endpoint.
pub fn validate_http_endpoint(url: &str) -> Result<Url, EndpointError> {
    validate(url, HTTP_SCHEMES)
}

/// Validates a WebSocket endpoint.
pub fn validate_ws_endpoint(url: &str) -> Result<Url, EndpointError> {
    validate(url, WS_SCHEMES)
}

/// Builds the HTTP streaming URL with the `GroupId` query parameter.
///
/// An empty group id leaves the URL untouched.
pub fn http_url_with_group(base: &str, group_id: &str) -> Result<Url, EndpointError> {
    let mut url = validate_http_endpoint(base)?;
    if !group_id.is_empty() {
        url.query_pairs_mut().append_pair("GroupId", group_id);
    }
    Ok(url)
}
