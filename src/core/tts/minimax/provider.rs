//! MiniMax HTTP streaming provider.
//!
//! Each utterance is one `POST /v1/t2a_v2?GroupId=...` with `stream: true`.
//! The response body is a sequence of `data:`-prefixed JSON blocks that may
//! be split arbitrarily across network chunks:
//!
//! ```text
//! data: {"data":{"audio":"<hex>","status":1},"base_resp":{...}}
//! data: {"data":{"audio":"<hex>","status":1},...}
//! data: {"extra_info":{...},...}
//! ```
//!
//! No connection state is kept between utterances.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::stream;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use reqwest::StatusCode;
use tracing::{debug, error, info, warn};

use super::config::{FALLBACK_EMOTION, MiniMaxConnection, SynthesisSettings};
use super::messages::{ServerMessage, T2ARequest};
use crate::core::emotion::{Emotion, extract_emotion_tag};
use crate::core::tts::base::{
    AudioChunk, NotificationSender, StreamingTTS, TTSError, TTSEvent, TTSEventStream, TTSResult,
    notify_emotion,
};
use crate::utils::audio::{HEX_WINDOW, decode_hex_windows};
use crate::utils::endpoint::http_url_with_group;
use crate::utils::next_within;

const DATA_MARKER: &[u8] = b"data:";

// =============================================================================
// Block Framing
// =============================================================================

/// Reassembles `data:`-delimited blocks from arbitrary byte chunks.
///
/// A block is complete once the following `data:` marker arrives; the last
/// block is released by [`DataBlockSplitter::finish`].
#[derive(Debug, Default)]
pub struct DataBlockSplitter {
    buffer: BytesMut,
}

impl DataBlockSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every block completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);

        let mut blocks = Vec::new();
        while let Some(start) = find(&self.buffer, DATA_MARKER, 0) {
            let Some(next) = find(&self.buffer, DATA_MARKER, start + DATA_MARKER.len()) else {
                if start > 0 {
                    let _ = self.buffer.split_to(start);
                }
                break;
            };
            let mut block = self.buffer.split_to(next);
            let _ = block.split_to(start + DATA_MARKER.len());
            blocks.push(block.freeze());
        }
        blocks
    }

    /// Releases the final buffered block, if it has content.
    pub fn finish(&mut self) -> Option<Bytes> {
        let mut rest = std::mem::take(&mut self.buffer);
        let start = find(&rest, DATA_MARKER, 0)?;
        let _ = rest.split_to(start + DATA_MARKER.len());
        if rest.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(rest.freeze())
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

/// What a single `data:` block carries.
#[derive(Debug, PartialEq)]
enum Block {
    Audio(String),
    Metadata,
    Failed(String),
    Empty,
}

fn classify_block(block: &[u8]) -> TTSResult<Block> {
    let message = ServerMessage::parse_slice(block)
        .map_err(|e| TTSError::DecodeError(format!("invalid JSON block: {e}")))?;

    if let Some(reason) = message.upstream_error() {
        return Ok(Block::Failed(reason));
    }
    if message.is_metadata() {
        return Ok(Block::Metadata);
    }
    Ok(match message.audio_hex() {
        Some(hex) => Block::Audio(hex.to_string()),
        None => Block::Empty,
    })
}

// =============================================================================
// HTTP Streaming Client
// =============================================================================

/// Stateless HTTP streaming synthesis.
///
/// # Example
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use streaming_tts::core::tts::minimax::{HttpStreamingClient, MiniMaxConnection, SynthesisSettings};
/// use streaming_tts::core::tts::{StreamingTTS, TTSEvent};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpStreamingClient::new(
///     MiniMaxConnection::new("api-key", "group-id"),
///     SynthesisSettings::default(),
/// )?;
///
/// let mut events = client.synthesize("[happy] Hello there");
/// while let Some(event) = events.next().await {
///     if let TTSEvent::Audio(chunk) = event {
///         println!("{} bytes", chunk.data.len());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct HttpStreamingClient {
    connection: MiniMaxConnection,
    settings: SynthesisSettings,
    endpoint: String,
    client: reqwest::Client,
    notifications: Option<NotificationSender>,
    last_ttfb: Arc<Mutex<Option<Duration>>>,
}

impl HttpStreamingClient {
    /// Creates a client with its own connection pool.
    pub fn new(connection: MiniMaxConnection, settings: SynthesisSettings) -> TTSResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connection.connect_timeout)
            .build()
            .map_err(|e| TTSError::InvalidConfiguration(format!("HTTP client: {e}")))?;
        Self::with_client(connection, settings, client)
    }

    /// Creates a client on a caller-owned `reqwest::Client`.
    pub fn with_client(
        connection: MiniMaxConnection,
        settings: SynthesisSettings,
        client: reqwest::Client,
    ) -> TTSResult<Self> {
        connection.validate()?;
        settings.validate()?;
        let endpoint = http_url_with_group(&connection.http_url, &connection.group_id)?.to_string();

        info!(
            "Created MiniMax HTTP client: model={}, voice={}, sample_rate={}",
            settings.model, settings.voice_id, settings.sample_rate
        );

        Ok(Self {
            connection,
            settings,
            endpoint,
            client,
            notifications: None,
            last_ttfb: Arc::new(Mutex::new(None)),
        })
    }

    /// Routes emotion notifications to `sender`.
    pub fn with_notifications(mut self, sender: NotificationSender) -> Self {
        self.notifications = Some(sender);
        self
    }

    pub fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    /// Full request URL including the group id.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Time to first audio of the most recent call.
    pub fn last_ttfb(&self) -> Option<Duration> {
        *self.last_ttfb.lock()
    }

    fn build_request(&self, settings: &SynthesisSettings, text: &str) -> reqwest::RequestBuilder {
        let body = T2ARequest {
            stream: true,
            settings: settings.session_settings(),
            model: &settings.model,
            text,
        };

        self.client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.connection.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
    }
}

#[async_trait]
impl StreamingTTS for HttpStreamingClient {
    fn synthesize(&self, text: &str) -> TTSEventStream {
        let (tag, clean_text) = extract_emotion_tag(text);

        // Overrides live on this call's copy only.
        let mut settings = self.settings.clone();
        settings.emotion = Some(
            tag.clone()
                .or_else(|| self.settings.emotion.clone())
                .unwrap_or_else(|| FALLBACK_EMOTION.to_string()),
        );

        let request = self.build_request(&settings, &clean_text);
        let notifications = self.notifications.clone();
        let last_ttfb = self.last_ttfb.clone();
        let receive_timeout = self.connection.receive_timeout;
        let sample_rate = settings.sample_rate;
        let channels = settings.channels;
        let output_rate = settings.output_sample_rate;

        Box::pin(stream! {
            if let Some(emotion) = &tag {
                info!("Emotion tag for utterance: {}", emotion);
                if !Emotion::is_supported(emotion) {
                    debug!("Passing through unknown emotion tag: {}", emotion);
                }
                notify_emotion(notifications.as_ref(), emotion);
            }
            debug!("MiniMax HTTP request: {} chars", clean_text.len());

            let sent_at = Instant::now();
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    error!("MiniMax HTTP request failed: {}", e);
                    yield TTSEvent::Error(TTSError::TransportError(e.to_string()));
                    return;
                }
            };

            let status = response.status();
            if status != StatusCode::OK {
                let body = response.text().await.unwrap_or_default();
                error!("MiniMax HTTP error {}: {}", status, body);
                yield TTSEvent::Error(TTSError::UpstreamError(format!("HTTP {status}: {body}")));
                return;
            }

            yield TTSEvent::Started;

            let mut body = Box::pin(response.bytes_stream());
            let mut splitter = DataBlockSplitter::new();
            let mut first_audio = true;

            loop {
                let (blocks, done) = match next_within(&mut body, receive_timeout).await {
                    Ok(Some(Ok(bytes))) => (splitter.push(&bytes), false),
                    Ok(Some(Err(e))) => {
                        error!("MiniMax HTTP stream error: {}", e);
                        yield TTSEvent::Error(TTSError::TransportError(e.to_string()));
                        return;
                    }
                    Ok(None) => (splitter.finish().into_iter().collect(), true),
                    Err(_) => {
                        error!("No data from MiniMax within {:?}", receive_timeout);
                        yield TTSEvent::Error(TTSError::TransportError(
                            "timed out waiting for audio".to_string(),
                        ));
                        return;
                    }
                };

                for block in blocks {
                    let hex_audio = match classify_block(&block) {
                        Ok(Block::Audio(hex_audio)) => hex_audio,
                        Ok(Block::Metadata) => {
                            debug!("MiniMax metadata block received");
                            continue;
                        }
                        Ok(Block::Empty) => continue,
                        Ok(Block::Failed(reason)) => {
                            error!("MiniMax reported an error: {}", reason);
                            yield TTSEvent::Error(TTSError::UpstreamError(reason));
                            return;
                        }
                        Err(e) => {
                            warn!("Skipping block: {}", e);
                            continue;
                        }
                    };

                    for window in decode_hex_windows(&hex_audio, HEX_WINDOW) {
                        let pcm = match window {
                            Ok(pcm) if !pcm.is_empty() => pcm,
                            Ok(_) => continue,
                            Err(e) => {
                                warn!("Skipping audio window: {}", e);
                                continue;
                            }
                        };
                        if first_audio {
                            first_audio = false;
                            let ttfb = sent_at.elapsed();
                            *last_ttfb.lock() = Some(ttfb);
                            debug!("MiniMax HTTP TTFB: {:?}", ttfb);
                        }
                        let chunk = AudioChunk::new(pcm, sample_rate, channels);
                        yield TTSEvent::Audio(match output_rate {
                            Some(rate) => chunk.resampled(rate),
                            None => chunk,
                        });
                    }
                }

                if done {
                    break;
                }
            }

            debug!("MiniMax HTTP synthesis complete");
            yield TTSEvent::Stopped;
        })
    }

    async fn start(&self) -> TTSResult<()> {
        Ok(())
    }

    async fn stop(&self) -> TTSResult<()> {
        Ok(())
    }

    async fn cancel(&self) -> TTSResult<()> {
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "minimax-http"
    }
}
