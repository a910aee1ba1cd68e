mod base;
pub mod minimax;

pub use base::{
    AudioChunk, ConnectionState, NotificationSender, StreamingTTS, TTSError, TTSEvent,
    TTSEventStream, TTSNotification, TTSResult,
};
pub use minimax::{
    HttpStreamingClient, MINIMAX_TTS_URL, MINIMAX_TTS_WS_URL, MiniMaxConnection,
    SocketStreamingClient, SynthesisSettings,
};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

/// Transport used to reach MiniMax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// One streaming POST per utterance
    Http,
    /// Persistent WebSocket session
    #[default]
    Socket,
}

impl BackendKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Http => "http",
            BackendKind::Socket => "socket",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = TTSError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" | "https" | "rest" => Ok(BackendKind::Http),
            "socket" | "websocket" | "ws" | "wss" => Ok(BackendKind::Socket),
            _ => Err(TTSError::InvalidConfiguration(format!(
                "Unsupported TTS backend: {s}. Supported backends: http, socket"
            ))),
        }
    }
}

/// Either transport behind one [`StreamingTTS`] value.
pub enum SynthesisBackend {
    Http(HttpStreamingClient),
    Socket(SocketStreamingClient),
}

impl SynthesisBackend {
    pub fn new(
        kind: BackendKind,
        connection: MiniMaxConnection,
        settings: SynthesisSettings,
    ) -> TTSResult<Self> {
        Ok(match kind {
            BackendKind::Http => Self::Http(HttpStreamingClient::new(connection, settings)?),
            BackendKind::Socket => Self::Socket(SocketStreamingClient::new(connection, settings)?),
        })
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Http(_) => BackendKind::Http,
            Self::Socket(_) => BackendKind::Socket,
        }
    }

    /// Routes emotion notifications to `sender`.
    pub fn with_notifications(self, sender: NotificationSender) -> Self {
        match self {
            Self::Http(client) => Self::Http(client.with_notifications(sender)),
            Self::Socket(client) => Self::Socket(client.with_notifications(sender)),
        }
    }

    /// Silences the in-flight utterance. No-op over HTTP, where dropping
    /// the stream aborts the request.
    pub fn interrupt(&self) {
        if let Self::Socket(client) = self {
            client.interrupt();
        }
    }

    /// Time to first audio of the most recent call.
    pub fn last_ttfb(&self) -> Option<std::time::Duration> {
        match self {
            Self::Http(client) => client.last_ttfb(),
            Self::Socket(client) => client.last_ttfb(),
        }
    }
}

#[async_trait]
impl StreamingTTS for SynthesisBackend {
    fn synthesize(&self, text: &str) -> TTSEventStream {
        match self {
            Self::Http(client) => client.synthesize(text),
            Self::Socket(client) => client.synthesize(text),
        }
    }

    async fn start(&self) -> TTSResult<()> {
        match self {
            Self::Http(client) => client.start().await,
            Self::Socket(client) => client.start().await,
        }
    }

    async fn stop(&self) -> TTSResult<()> {
        match self {
            Self::Http(client) => client.stop().await,
            Self::Socket(client) => client.stop().await,
        }
    }

    async fn cancel(&self) -> TTSResult<()> {
        match self {
            Self::Http(client) => client.cancel().await,
            Self::Socket(client) => client.cancel().await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            Self::Http(client) => client.provider_name(),
            Self::Socket(client) => client.provider_name(),
        }
    }
}

/// Factory function to create a synthesis backend.
///
/// # Supported Backends
///
/// - `"http"`, `"https"` or `"rest"` - streaming POST per utterance
/// - `"socket"`, `"websocket"`, `"ws"` or `"wss"` - persistent WebSocket session
///
/// # Example
///
/// ```rust
/// use streaming_tts::core::tts::{create_tts_backend, MiniMaxConnection, SynthesisSettings};
///
/// let backend = create_tts_backend(
///     "socket",
///     MiniMaxConnection::new("api-key", "group-id"),
///     SynthesisSettings::default(),
/// )?;
/// # Ok::<(), streaming_tts::core::tts::TTSError>(())
/// ```
pub fn create_tts_backend(
    backend_type: &str,
    connection: MiniMaxConnection,
    settings: SynthesisSettings,
) -> TTSResult<SynthesisBackend> {
    SynthesisBackend::new(backend_type.parse()?, connection, settings)
}

/// Returns a map of backend names to their default endpoint URLs.
pub fn get_tts_backend_urls() -> HashMap<String, String> {
    let mut urls = HashMap::new();
    urls.insert("http".to_string(), MINIMAX_TTS_URL.to_string());
    urls.insert("socket".to_string(), MINIMAX_TTS_WS_URL.to_string());
    urls
}
