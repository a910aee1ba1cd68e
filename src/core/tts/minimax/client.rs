//! MiniMax WebSocket streaming client.
//!
//! One socket carries a single long-lived synthesis task:
//!
//! ```text
//! connect ─▶ connected_success ─▶ task_start ─▶ task_started
//!                                                   │
//!                 ┌─────────────────────────────────┘
//!                 ▼
//!          task_continue(text) ─▶ audio frames ... is_final   (repeat)
//!                 │
//!                 ▼
//!            task_finish ─▶ close
//! ```
//!
//! The session is reused while `(model, voice, sample rate, settings)` stay
//! the same; any change tears it down and runs the handshake again. Utterances
//! are serialized on the session lock, and a monotonically increasing request
//! id lets a newer call (or [`SocketStreamingClient::interrupt`]) silence an
//! older one without closing the socket.

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_stream::stream;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, StreamExt};
use http::{HeaderValue, header::AUTHORIZATION};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::config::{
    FALLBACK_EMOTION, MiniMaxConnection, SUPPORTED_SAMPLE_RATES, SettingsFingerprint,
    SynthesisSettings,
};
use super::messages::{
    EVENT_CONNECTED, EVENT_TASK_STARTED, KEEPALIVE_FRAME, ServerMessage, TaskContinueMessage,
    TaskFinishMessage, TaskStartMessage,
};
use crate::core::emotion::{Emotion, extract_emotion_tag};
use crate::core::tts::base::{
    AudioChunk, ConnectionState, NotificationSender, StreamingTTS, TTSError, TTSEvent,
    TTSEventStream, TTSResult, notify_emotion,
};
use crate::utils::audio::decode_hex;
use crate::utils::endpoint::validate_ws_endpoint;
use crate::utils::next_within;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

// =============================================================================
// Keepalive
// =============================================================================

/// Sends [`KEEPALIVE_FRAME`] every `interval` until `token` is cancelled.
///
/// A failed send marks the transport closed and ends the loop.
pub(crate) async fn keepalive_loop<S>(
    sink: Arc<AsyncMutex<S>>,
    interval: Duration,
    closed: Arc<AtomicBool>,
    token: CancellationToken,
) where
    S: Sink<Message> + Unpin + Send,
    S::Error: Display,
{
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let result = sink
            .lock()
            .await
            .send(Message::Text(KEEPALIVE_FRAME.to_string().into()))
            .await;
        if let Err(e) = result {
            warn!("MiniMax keepalive failed: {}", e);
            closed.store(true, Ordering::SeqCst);
            break;
        }
        trace!("MiniMax keepalive sent");
    }
    debug!("MiniMax keepalive stopped");
}

struct Keepalive {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

// =============================================================================
// Session
// =============================================================================

/// An open socket with a started task.
struct Session {
    sink: Arc<AsyncMutex<WsSink>>,
    source: WsSource,
    fingerprint: SettingsFingerprint,
    session_id: Option<String>,
    closed: Arc<AtomicBool>,
    keepalive: Option<Keepalive>,
    /// An utterance was sent and its `is_final` frame has not been read yet
    pending_final: bool,
}

impl Session {
    /// Connects, waits for the confirmation and starts the task.
    async fn open(
        connection: &MiniMaxConnection,
        settings: &SynthesisSettings,
        state: &RwLock<ConnectionState>,
    ) -> TTSResult<Self> {
        *state.write() = ConnectionState::Connecting;

        let mut request = connection
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| TTSError::ConnectionFailed(format!("invalid socket request: {e}")))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", connection.api_key))
            .map_err(|e| TTSError::InvalidConfiguration(format!("invalid API key: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (ws_stream, _response) = timeout(connection.connect_timeout, connect_async(request))
            .await
            .map_err(|_| {
                TTSError::ConnectionFailed(format!(
                    "connect timed out after {:?}",
                    connection.connect_timeout
                ))
            })?
            .map_err(|e| TTSError::ConnectionFailed(format!("failed to connect to MiniMax: {e}")))?;

        info!("Connected to MiniMax TTS WebSocket");
        *state.write() = ConnectionState::AwaitingHandshake;

        let (sink, source) = ws_stream.split();
        let mut session = Session {
            sink: Arc::new(AsyncMutex::new(sink)),
            source,
            fingerprint: settings.fingerprint(),
            session_id: None,
            closed: Arc::new(AtomicBool::new(false)),
            keepalive: None,
            pending_final: false,
        };

        if let Err(e) = session.handshake(connection, settings).await {
            session.abort().await;
            return Err(e);
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(keepalive_loop(
            session.sink.clone(),
            connection.keepalive_interval,
            session.closed.clone(),
            token.clone(),
        ));
        session.keepalive = Some(Keepalive { token, handle });

        Ok(session)
    }

    async fn handshake(
        &mut self,
        connection: &MiniMaxConnection,
        settings: &SynthesisSettings,
    ) -> TTSResult<()> {
        let limit = Some(connection.connect_timeout);

        let confirmation = self
            .recv(limit)
            .await
            .map_err(|e| TTSError::ConnectionFailed(format!("no connection confirmation: {e}")))?;
        if !confirmation.is_event(EVENT_CONNECTED) {
            return Err(TTSError::ConnectionFailed(format!(
                "unexpected handshake reply: {}",
                confirmation.describe()
            )));
        }
        self.session_id = confirmation.session_id;
        debug!("MiniMax session id: {:?}", self.session_id);

        let start = TaskStartMessage::new(&settings.model, settings.session_settings());
        self.send_json(&start)
            .await
            .map_err(|e| TTSError::TaskStartFailed(e.to_string()))?;

        let reply = self
            .recv(limit)
            .await
            .map_err(|e| TTSError::TaskStartFailed(e.to_string()))?;
        if !reply.is_event(EVENT_TASK_STARTED) {
            let reason = reply.upstream_error().unwrap_or_else(|| reply.describe());
            return Err(TTSError::TaskStartFailed(reason));
        }

        info!(
            "MiniMax task started: model={}, voice={}, sample_rate={}",
            settings.model, settings.voice_id, settings.sample_rate
        );
        Ok(())
    }

    #[inline]
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn is_reusable(&self, fingerprint: &SettingsFingerprint) -> bool {
        !self.is_closed() && self.fingerprint == *fingerprint
    }

    async fn send_json<T: Serialize>(&self, message: &T) -> TTSResult<()> {
        let json = serde_json::to_string(message)
            .map_err(|e| TTSError::TransportError(format!("failed to serialize frame: {e}")))?;
        let result = self.sink.lock().await.send(Message::Text(json.into())).await;
        result.map_err(|e| {
            self.closed.store(true, Ordering::SeqCst);
            TTSError::TransportError(format!("send failed: {e}"))
        })
    }

    /// Reads the next text frame.
    ///
    /// Malformed JSON is reported as a recoverable `DecodeError`; a closed
    /// or silent socket is a `TransportError` and marks the session closed.
    async fn recv(&mut self, limit: Option<Duration>) -> TTSResult<ServerMessage> {
        loop {
            let next = match next_within(&mut self.source, limit).await {
                Ok(next) => next,
                Err(_) => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(TTSError::TransportError(format!(
                        "no message within {limit:?}"
                    )));
                }
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    return ServerMessage::parse(text.as_str())
                        .map_err(|e| TTSError::DecodeError(format!("invalid frame: {e}")));
                }
                Some(Ok(Message::Close(frame))) => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(TTSError::TransportError(format!(
                        "closed by server: {frame:?}"
                    )));
                }
                Some(Ok(_)) => trace!("Ignoring non-text frame"),
                Some(Err(e)) => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(TTSError::TransportError(e.to_string()));
                }
                None => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(TTSError::TransportError("socket closed".to_string()));
                }
            }
        }
    }

    /// Discards frames left over from an earlier utterance.
    async fn drain_pending(&mut self, limit: Option<Duration>) -> TTSResult<()> {
        let mut discarded = 0usize;
        while self.pending_final {
            let message = match self.recv(limit).await {
                Ok(message) => message,
                Err(e) if e.is_recoverable() => continue,
                Err(e) => return Err(e),
            };
            discarded += 1;
            if message.is_final || message.upstream_error().is_some() {
                self.pending_final = false;
            }
        }
        if discarded > 0 {
            debug!("Discarded {} stale MiniMax frames", discarded);
        }
        Ok(())
    }

    async fn stop_keepalive(&mut self) {
        if let Some(keepalive) = self.keepalive.take() {
            keepalive.token.cancel();
            let _ = keepalive.handle.await;
        }
    }

    /// Sends `task_finish` if the socket is still open, then closes it.
    async fn close(mut self) {
        self.stop_keepalive().await;
        if !self.is_closed() {
            if let Err(e) = self.send_json(&TaskFinishMessage::default()).await {
                debug!("task_finish not delivered: {}", e);
            }
        }
        let _ = self.sink.lock().await.close().await;
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Closes the socket without ending the task.
    async fn abort(mut self) {
        self.stop_keepalive().await;
        let _ = self.sink.lock().await.close().await;
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(keepalive) = self.keepalive.take() {
            keepalive.token.cancel();
        }
    }
}

// =============================================================================
// Shared State
// =============================================================================

/// Settings plus the live session; guarded by the session lock.
struct SessionSlot {
    settings: SynthesisSettings,
    session: Option<Session>,
}

#[derive(Clone)]
struct Shared {
    connection: Arc<MiniMaxConnection>,
    state: Arc<RwLock<ConnectionState>>,
    session_id: Arc<RwLock<Option<String>>>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Reuses the current session or opens a new one for `slot.settings`.
    async fn ensure_session(&self, slot: &mut SessionSlot) -> TTSResult<()> {
        let fingerprint = slot.settings.fingerprint();
        match &slot.session {
            Some(session) if session.is_reusable(&fingerprint) => return Ok(()),
            Some(session) if session.is_closed() => info!("MiniMax socket closed, reconnecting"),
            Some(_) => info!("MiniMax settings changed, reconnecting"),
            None => debug!("Opening MiniMax socket"),
        }

        self.teardown(slot, true).await;

        match Session::open(&self.connection, &slot.settings, &self.state).await {
            Ok(session) => {
                *self.session_id.write() = session.session_id.clone();
                slot.session = Some(session);
                self.set_state(ConnectionState::Ready);
                Ok(())
            }
            Err(e) => {
                error!("MiniMax session setup failed: {}", e);
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn teardown(&self, slot: &mut SessionSlot, graceful: bool) {
        if let Some(session) = slot.session.take() {
            self.set_state(ConnectionState::Disconnecting);
            if graceful {
                session.close().await;
            } else {
                session.abort().await;
            }
            *self.session_id.write() = None;
            debug!("MiniMax socket closed");
        }
        self.set_state(ConnectionState::Disconnected);
    }
}

// =============================================================================
// Socket Streaming Client
// =============================================================================

/// Persistent WebSocket synthesis with session reuse and barge-in.
///
/// # Example
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use streaming_tts::core::tts::minimax::{MiniMaxConnection, SocketStreamingClient, SynthesisSettings};
/// use streaming_tts::core::tts::{StreamingTTS, TTSEvent};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SocketStreamingClient::new(
///     MiniMaxConnection::new("api-key", "group-id"),
///     SynthesisSettings::default().with_sample_rate(24000),
/// )?;
/// client.start().await?;
///
/// let mut events = client.synthesize("[sad] I miss you");
/// while let Some(event) = events.next().await {
///     if let TTSEvent::Audio(chunk) = event {
///         println!("{} bytes", chunk.data.len());
///     }
/// }
///
/// // Barge-in: silence whatever is still playing.
/// client.interrupt();
/// client.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct SocketStreamingClient {
    shared: Shared,
    slot: Arc<AsyncMutex<SessionSlot>>,
    request_id: Arc<AtomicU64>,
    default_emotion: String,
    notifications: Option<NotificationSender>,
    last_ttfb: Arc<Mutex<Option<Duration>>>,
}

impl SocketStreamingClient {
    pub fn new(connection: MiniMaxConnection, settings: SynthesisSettings) -> TTSResult<Self> {
        connection.validate()?;
        settings.validate()?;
        validate_ws_endpoint(&connection.ws_url)?;

        let default_emotion = settings
            .emotion
            .clone()
            .unwrap_or_else(|| FALLBACK_EMOTION.to_string());

        info!(
            "Created MiniMax socket client: model={}, voice={}, sample_rate={}",
            settings.model, settings.voice_id, settings.sample_rate
        );

        Ok(Self {
            shared: Shared {
                connection: Arc::new(connection),
                state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
                session_id: Arc::new(RwLock::new(None)),
            },
            slot: Arc::new(AsyncMutex::new(SessionSlot {
                settings,
                session: None,
            })),
            request_id: Arc::new(AtomicU64::new(0)),
            default_emotion,
            notifications: None,
            last_ttfb: Arc::new(Mutex::new(None)),
        })
    }

    /// Routes emotion notifications to `sender`.
    pub fn with_notifications(mut self, sender: NotificationSender) -> Self {
        self.notifications = Some(sender);
        self
    }

    /// Current lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Session id reported by the server for the open socket.
    pub fn session_id(&self) -> Option<String> {
        self.shared.session_id.read().clone()
    }

    /// Time to first audio of the most recent call.
    pub fn last_ttfb(&self) -> Option<Duration> {
        *self.last_ttfb.lock()
    }

    /// Silences the in-flight utterance; the socket stays open.
    pub fn interrupt(&self) {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("MiniMax interrupt, request id now {}", id);
    }

    /// Snapshot of the current settings.
    pub async fn settings(&self) -> SynthesisSettings {
        self.slot.lock().await.settings.clone()
    }

    /// Changes the voice; the next utterance reconnects.
    pub async fn set_voice(&self, voice_id: impl Into<String>) -> TTSResult<()> {
        let voice_id = voice_id.into();
        if voice_id.trim().is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Voice id is required".to_string(),
            ));
        }
        info!("Switching MiniMax voice to: [{}]", voice_id);
        self.slot.lock().await.settings.voice_id = voice_id;
        Ok(())
    }

    /// Changes the model; the next utterance reconnects.
    pub async fn set_model(&self, model: impl Into<String>) -> TTSResult<()> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Model name is required".to_string(),
            ));
        }
        info!("Switching MiniMax model to: [{}]", model);
        self.slot.lock().await.settings.model = model;
        Ok(())
    }

    /// Changes the synthesis sample rate; the next utterance reconnects.
    pub async fn set_sample_rate(&self, sample_rate: u32) -> TTSResult<()> {
        if !SUPPORTED_SAMPLE_RATES.contains(&sample_rate) {
            return Err(TTSError::InvalidConfiguration(format!(
                "Unsupported sample rate: {}. Supported rates: {:?}",
                sample_rate, SUPPORTED_SAMPLE_RATES
            )));
        }
        self.slot.lock().await.settings.sample_rate = sample_rate;
        Ok(())
    }

    async fn shutdown(&self, graceful: bool) {
        self.interrupt();
        let mut slot = self.slot.lock().await;
        self.shared.teardown(&mut slot, graceful).await;
    }
}

#[async_trait]
impl StreamingTTS for SocketStreamingClient {
    fn synthesize(&self, text: &str) -> TTSEventStream {
        // Claimed before the lock so that a newer call fences older ones at once.
        let request_id = self.request_id.fetch_add(1, Ordering::SeqCst) + 1;

        let text = text.to_string();
        let shared = self.shared.clone();
        let slot = self.slot.clone();
        let counter = self.request_id.clone();
        let default_emotion = self.default_emotion.clone();
        let notifications = self.notifications.clone();
        let last_ttfb = self.last_ttfb.clone();

        Box::pin(stream! {
            let mut slot = slot.lock_owned().await;

            if counter.load(Ordering::SeqCst) != request_id {
                debug!("Request {} superseded before sending", request_id);
                yield TTSEvent::Started;
                yield TTSEvent::Stopped;
                return;
            }

            let (tag, text) = extract_emotion_tag(&text);
            match tag {
                Some(emotion) => {
                    info!("Emotion tag for utterance: {}", emotion);
                    if !Emotion::is_supported(&emotion) {
                        debug!("Passing through unknown emotion tag: {}", emotion);
                    }
                    notify_emotion(notifications.as_ref(), &emotion);
                    slot.settings.emotion = Some(emotion);
                }
                None => slot.settings.emotion = Some(default_emotion),
            }

            if let Err(e) = shared.ensure_session(&mut slot).await {
                yield TTSEvent::Error(e);
                return;
            }

            let receive_timeout = shared.connection.receive_timeout;
            let drained = match slot.session.as_mut() {
                Some(session) => session.drain_pending(receive_timeout).await,
                None => Ok(()),
            };
            if let Err(e) = drained {
                warn!("Replacing MiniMax session after failed drain: {}", e);
                shared.teardown(&mut slot, false).await;
                if let Err(e) = shared.ensure_session(&mut slot).await {
                    yield TTSEvent::Error(e);
                    return;
                }
            }

            let sample_rate = slot.settings.sample_rate;
            let channels = slot.settings.channels;
            let output_rate = slot.settings.output_sample_rate;

            shared.set_state(ConnectionState::Synthesizing);
            yield TTSEvent::Started;

            let sent_at = Instant::now();
            let mut first_audio = true;

            let result: TTSResult<()> = 'receive: {
                let Some(session) = slot.session.as_mut() else {
                    break 'receive Err(TTSError::ConnectionFailed("no active session".to_string()));
                };
                if let Err(e) = session.send_json(&TaskContinueMessage::new(&text)).await {
                    break 'receive Err(e);
                }
                session.pending_final = true;

                loop {
                    let message = match session.recv(receive_timeout).await {
                        Ok(message) => message,
                        Err(e) if e.is_recoverable() => {
                            warn!("Skipping MiniMax frame: {}", e);
                            continue;
                        }
                        Err(e) => break 'receive Err(e),
                    };

                    if let Some(reason) = message.upstream_error() {
                        session.pending_final = false;
                        break 'receive Err(TTSError::UpstreamError(reason));
                    }

                    if counter.load(Ordering::SeqCst) != request_id {
                        debug!("Request {} superseded, discarding remaining audio", request_id);
                        if message.is_final {
                            session.pending_final = false;
                        }
                        break 'receive Ok(());
                    }

                    if let Some(hex_audio) = message.audio_hex() {
                        match decode_hex(hex_audio) {
                            Ok(pcm) if !pcm.is_empty() => {
                                if first_audio {
                                    first_audio = false;
                                    let ttfb = sent_at.elapsed();
                                    *last_ttfb.lock() = Some(ttfb);
                                    debug!("MiniMax socket TTFB: {:?}", ttfb);
                                }
                                let chunk = AudioChunk::new(pcm, sample_rate, channels);
                                yield TTSEvent::Audio(match output_rate {
                                    Some(rate) => chunk.resampled(rate),
                                    None => chunk,
                                });
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Skipping audio frame: {}", e),
                        }
                    }

                    if message.is_final {
                        session.pending_final = false;
                        break 'receive Ok(());
                    }
                }
            };

            match result {
                Ok(()) => {
                    shared.set_state(ConnectionState::Ready);
                    yield TTSEvent::Stopped;
                }
                Err(e) => {
                    error!("MiniMax synthesis failed: {}", e);
                    let graceful = matches!(e, TTSError::UpstreamError(_));
                    shared.teardown(&mut slot, graceful).await;
                    yield TTSEvent::Error(e);
                }
            }
        })
    }

    async fn start(&self) -> TTSResult<()> {
        let mut slot = self.slot.lock().await;
        slot.settings.emotion = Some(self.default_emotion.clone());
        self.shared.ensure_session(&mut slot).await
    }

    async fn stop(&self) -> TTSResult<()> {
        self.shutdown(true).await;
        info!("MiniMax socket client stopped");
        Ok(())
    }

    async fn cancel(&self) -> TTSResult<()> {
        self.shutdown(true).await;
        info!("MiniMax socket client cancelled");
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "minimax-socket"
    }
}
