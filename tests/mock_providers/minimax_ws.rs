//! WebSocket Mock Server for the MiniMax T2A v2 socket protocol
//!
//! Each connection:
//! 1. Sends `connected_success` with a per-connection session id
//! 2. Answers `task_start` with `task_started` (or `task_failed`)
//! 3. Answers every `task_continue` with N audio frames and a final frame
//! 4. Counts `{}` keepalives and `task_finish`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// Scripted server behavior
#[derive(Clone, Debug)]
pub struct MockBehavior {
    /// Audio frames sent per utterance
    pub frames_per_utterance: usize,
    /// Delay before each audio frame
    pub frame_delay: Duration,
    /// Reply to the connection with an unexpected event
    pub reject_handshake: bool,
    /// Reply to `task_start` with `task_failed`
    pub fail_task_start: bool,
    /// Reply to `task_continue` with `task_failed`
    pub fail_utterance: bool,
    /// Drop the first connection after this many audio frames
    pub drop_first_connection_after: Option<usize>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            frames_per_utterance: 3,
            frame_delay: Duration::from_millis(5),
            reject_handshake: false,
            fail_task_start: false,
            fail_utterance: false,
            drop_first_connection_after: None,
        }
    }
}

/// Everything the mock observed
#[derive(Default)]
pub struct MockState {
    pub connections: AtomicU64,
    pub keepalives: AtomicU64,
    pub finishes: AtomicU64,
    pub task_starts: Mutex<Vec<Value>>,
    pub utterances: Mutex<Vec<String>>,
    pub auth_headers: Mutex<Vec<String>>,
}

impl MockState {
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn keepalives(&self) -> u64 {
        self.keepalives.load(Ordering::SeqCst)
    }

    pub fn finishes(&self) -> u64 {
        self.finishes.load(Ordering::SeqCst)
    }

    pub fn task_starts(&self) -> Vec<Value> {
        self.task_starts.lock().unwrap().clone()
    }

    pub fn utterances(&self) -> Vec<String> {
        self.utterances.lock().unwrap().clone()
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.auth_headers.lock().unwrap().clone()
    }
}

/// PCM payload of every frame for the `n`-th utterance (1-based)
pub fn utterance_pcm(n: usize) -> Vec<u8> {
    vec![n as u8; 4]
}

async fn send_json<S>(write: &mut S, value: Value) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    write.send(Message::Text(value.to_string().into())).await?;
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockState>,
    behavior: MockBehavior,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let header_state = state.clone();
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let auth = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        header_state.auth_headers.lock().unwrap().push(auth);
        Ok(resp)
    };

    let ws_stream = accept_hdr_async(stream, callback).await?;
    let (mut write, mut read) = ws_stream.split();

    let conn_id = state.connections.fetch_add(1, Ordering::SeqCst) + 1;

    if behavior.reject_handshake {
        send_json(&mut write, json!({"event": "unexpected", "base_resp": {"status_code": 0}})).await?;
        return Ok(());
    }

    send_json(
        &mut write,
        json!({
            "event": "connected_success",
            "session_id": format!("mock-session-{conn_id}"),
            "base_resp": {"status_code": 0, "status_msg": "success"}
        }),
    )
    .await?;

    let mut frames_sent = 0usize;

    while let Some(message) = read.next().await {
        let text = match message? {
            Message::Text(text) => text.as_str().to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        let value: Value = serde_json::from_str(&text)?;

        match value.get("event").and_then(Value::as_str) {
            Some("task_start") => {
                state.task_starts.lock().unwrap().push(value.clone());
                if behavior.fail_task_start {
                    send_json(
                        &mut write,
                        json!({
                            "event": "task_failed",
                            "base_resp": {"status_code": 2013, "status_msg": "invalid params"}
                        }),
                    )
                    .await?;
                } else {
                    send_json(
                        &mut write,
                        json!({"event": "task_started", "base_resp": {"status_code": 0}}),
                    )
                    .await?;
                }
            }
            Some("task_continue") => {
                let utterance = value["text"].as_str().unwrap_or_default().to_string();
                let n = {
                    let mut utterances = state.utterances.lock().unwrap();
                    utterances.push(utterance);
                    utterances.len()
                };

                if behavior.fail_utterance {
                    send_json(
                        &mut write,
                        json!({
                            "event": "task_failed",
                            "base_resp": {"status_code": 1013, "status_msg": "bad text"}
                        }),
                    )
                    .await?;
                    continue;
                }

                let audio = hex::encode(utterance_pcm(n));
                for _ in 0..behavior.frames_per_utterance {
                    tokio::time::sleep(behavior.frame_delay).await;
                    if conn_id == 1 && behavior.drop_first_connection_after == Some(frames_sent) {
                        return Ok(());
                    }
                    send_json(
                        &mut write,
                        json!({"data": {"audio": audio}, "is_final": false}),
                    )
                    .await?;
                    frames_sent += 1;
                }
                send_json(
                    &mut write,
                    json!({
                        "data": {"audio": ""},
                        "is_final": true,
                        "extra_info": {"audio_length": 100},
                        "base_resp": {"status_code": 0}
                    }),
                )
                .await?;
            }
            Some("task_finish") => {
                state.finishes.fetch_add(1, Ordering::SeqCst);
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            _ => {
                state.keepalives.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    Ok(())
}

/// Starts a mock on an ephemeral port and returns its `ws://` URL
pub async fn spawn_minimax_mock(behavior: MockBehavior) -> (String, Arc<MockState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(MockState::default());

    let server_state = state.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let state = server_state.clone();
            let behavior = behavior.clone();
            tokio::spawn(async move {
                let _ = handle_connection(stream, state, behavior).await;
            });
        }
    });

    (format!("ws://{addr}"), state)
}

/// Polls `condition` until it holds or `limit` elapses
pub async fn wait_for(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
