//! HTTP Streaming Tests
//!
//! Serves canned `data:` bodies with wiremock and checks the events produced by
//! `HttpStreamingClient`.

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio::time::timeout;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use streaming_tts::core::tts::minimax::{HttpStreamingClient, MiniMaxConnection, SynthesisSettings};
use streaming_tts::core::tts::{StreamingTTS, TTSError, TTSEvent, TTSNotification};

fn audio_block(pcm: &[u8]) -> String {
    format!(
        "data: {}\n\n",
        json!({
            "data": {"audio": hex::encode(pcm), "status": 1},
            "base_resp": {"status_code": 0, "status_msg": ""}
        })
    )
}

fn metadata_block() -> String {
    format!(
        "data: {}\n\n",
        json!({
            "data": {"audio": "", "status": 2},
            "extra_info": {"audio_length": 1200, "audio_sample_rate": 32000},
            "base_resp": {"status_code": 0, "status_msg": "success"}
        })
    )
}

async fn client_for(server: &MockServer, settings: SynthesisSettings) -> HttpStreamingClient {
    let connection = MiniMaxConnection::new("test-key", "test-group")
        .with_http_url(format!("{}/v1/t2a_v2", server.uri()));
    HttpStreamingClient::new(connection, settings).unwrap()
}

async fn mount_body(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/v1/t2a_v2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn collect(client: &HttpStreamingClient, text: &str) -> Vec<TTSEvent> {
    timeout(Duration::from_secs(10), client.synthesize(text).collect::<Vec<_>>())
        .await
        .expect("stream did not finish")
}

fn audio_payloads(events: &[TTSEvent]) -> Vec<Vec<u8>> {
    events
        .iter()
        .filter_map(|e| match e {
            TTSEvent::Audio(chunk) => Some(chunk.data.to_vec()),
            _ => None,
        })
        .collect()
}

fn request_json(request: &Request) -> serde_json::Value {
    serde_json::from_slice(&request.body).unwrap()
}

#[tokio::test]
async fn test_streamed_audio_blocks() {
    let server = MockServer::start().await;
    let body = format!(
        "{}{}{}",
        audio_block(&[1, 0, 2, 0]),
        audio_block(&[3, 0, 4, 0]),
        metadata_block()
    );
    Mock::given(method("POST"))
        .and(path("/v1/t2a_v2"))
        .and(query_param("GroupId", "test-group"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, SynthesisSettings::default().with_sample_rate(24000)).await;
    let events = collect(&client, "Hello").await;

    assert_eq!(events.first(), Some(&TTSEvent::Started));
    assert_eq!(events.last(), Some(&TTSEvent::Stopped));
    assert_eq!(
        audio_payloads(&events),
        vec![vec![1, 0, 2, 0], vec![3, 0, 4, 0]]
    );
    for event in &events {
        if let TTSEvent::Audio(chunk) = event {
            assert_eq!(chunk.sample_rate, 24000);
            assert_eq!(chunk.channels, 1);
        }
    }
    assert!(client.last_ttfb().is_some());

    let requests = server.received_requests().await.unwrap();
    let sent = request_json(&requests[0]);
    assert_eq!(sent["stream"], json!(true));
    assert_eq!(sent["text"], json!("Hello"));
    assert_eq!(sent["model"], json!("speech-02-turbo"));
    assert_eq!(sent["audio_setting"]["sample_rate"], json!(24000));
    assert_eq!(sent["audio_setting"]["format"], json!("pcm"));
}

#[tokio::test]
async fn test_tail_block_without_trailing_marker_is_flushed() {
    let server = MockServer::start().await;
    let tail = format!(
        "data: {}",
        json!({"data": {"audio": hex::encode([9u8, 9])}, "base_resp": {"status_code": 0}})
    );
    mount_body(&server, format!("{}{}", audio_block(&[1, 1]), tail)).await;

    let client = client_for(&server, SynthesisSettings::default()).await;
    let events = collect(&client, "Hello").await;

    assert_eq!(audio_payloads(&events), vec![vec![1, 1], vec![9, 9]]);
    assert_eq!(events.last(), Some(&TTSEvent::Stopped));
}

#[tokio::test]
async fn test_emotion_tag_applies_to_single_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "text": "I miss you",
            "voice_setting": {"emotion": "sad"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(audio_block(&[5, 5])))
        .expect(1)
        .mount(&server)
        .await;
    mount_body(&server, audio_block(&[6, 6])).await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let client = client_for(&server, SynthesisSettings::default().with_emotion("happy"))
        .await
        .with_notifications(tx);

    let sad = collect(&client, "[sad] I miss you").await;
    assert_eq!(audio_payloads(&sad), vec![vec![5, 5]]);

    let plain = collect(&client, "Hello").await;
    assert_eq!(audio_payloads(&plain), vec![vec![6, 6]]);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(request_json(&requests[1])["voice_setting"]["emotion"], json!("happy"));
    assert_eq!(client.settings().emotion.as_deref(), Some("happy"));

    assert_eq!(
        rx.try_recv().unwrap(),
        TTSNotification::EmotionChanged("sad".into())
    );
    assert!(matches!(
        rx.try_recv().unwrap(),
        TTSNotification::SettingsUpdated(_)
    ));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_non_200_yields_lone_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = client_for(&server, SynthesisSettings::default()).await;
    let events = collect(&client, "Hello").await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        TTSEvent::Error(TTSError::UpstreamError(message)) => {
            assert!(message.contains("401"));
            assert!(message.contains("invalid api key"));
        }
        other => panic!("Expected UpstreamError, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_error_block_ends_call() {
    let server = MockServer::start().await;
    let failure = format!(
        "data: {}\n\n",
        json!({"base_resp": {"status_code": 1002, "status_msg": "rate limited"}})
    );
    mount_body(
        &server,
        format!("{}{}{}", audio_block(&[1, 2]), failure, audio_block(&[3, 4])),
    )
    .await;

    let client = client_for(&server, SynthesisSettings::default()).await;
    let events = collect(&client, "Hello").await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], TTSEvent::Started);
    assert_eq!(audio_payloads(&events), vec![vec![1, 2]]);
    match &events[2] {
        TTSEvent::Error(TTSError::UpstreamError(reason)) => assert!(reason.contains("rate limited")),
        other => panic!("Expected UpstreamError, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_blocks_are_skipped() {
    let server = MockServer::start().await;
    let body = format!(
        "{}data: {{not json\n\n{}{}",
        audio_block(&[1, 1]),
        audio_block(&[2, 2]),
        metadata_block()
    );
    mount_body(&server, body).await;

    let client = client_for(&server, SynthesisSettings::default()).await;
    let events = collect(&client, "Hello").await;

    assert_eq!(audio_payloads(&events), vec![vec![1, 1], vec![2, 2]]);
    assert_eq!(events.last(), Some(&TTSEvent::Stopped));
}

#[tokio::test]
async fn test_corrupt_hex_window_is_skipped() {
    let server = MockServer::start().await;
    let corrupt = format!(
        "data: {}\n\n",
        json!({"data": {"audio": "zz"}, "base_resp": {"status_code": 0}})
    );
    mount_body(&server, format!("{}{}", corrupt, audio_block(&[7, 7]))).await;

    let client = client_for(&server, SynthesisSettings::default()).await;
    let events = collect(&client, "Hello").await;

    assert_eq!(audio_payloads(&events), vec![vec![7, 7]]);
    assert_eq!(events.last(), Some(&TTSEvent::Stopped));
}

#[tokio::test]
async fn test_large_payload_split_into_windows() {
    let server = MockServer::start().await;
    let pcm: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
    mount_body(&server, format!("{}{}", audio_block(&pcm), metadata_block())).await;

    let client = client_for(&server, SynthesisSettings::default()).await;
    let events = collect(&client, "Hello").await;

    let payloads = audio_payloads(&events);
    let sizes: Vec<usize> = payloads.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![1024, 1024, 952]);
    assert_eq!(payloads.concat(), pcm);
    assert_eq!(events.last(), Some(&TTSEvent::Stopped));
}

#[tokio::test]
async fn test_output_sample_rate_resamples_audio() {
    let server = MockServer::start().await;
    // 3200 samples of a constant level: six full windows plus a 128-sample tail
    let level = 8000i16;
    let pcm: Vec<u8> = (0..3200).flat_map(|_| level.to_le_bytes()).collect();
    mount_body(&server, audio_block(&pcm)).await;

    let settings = SynthesisSettings::default()
        .with_sample_rate(16000)
        .with_output_sample_rate(Some(8000));
    let client = client_for(&server, settings).await;
    let events = collect(&client, "Hello").await;

    let chunks: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TTSEvent::Audio(chunk) => Some(chunk),
            _ => None,
        })
        .collect();
    assert_eq!(chunks.len(), 7);

    let mut total = 0;
    for chunk in chunks {
        assert_eq!(chunk.sample_rate, 8000);
        let samples: Vec<i16> = chunk
            .data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        total += samples.len();

        let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64;
        assert!(mean > level as f64 * 0.8, "chunk mean {mean}");
        assert!(samples[0] > level / 4, "chunk starts with {:?}", &samples[..4]);
    }
    assert_eq!(total, 1600);
}

#[tokio::test]
async fn test_untagged_call_falls_back_to_neutral() {
    let server = MockServer::start().await;
    mount_body(&server, audio_block(&[1, 1])).await;

    let client = client_for(&server, SynthesisSettings::default()).await;
    assert!(client.settings().emotion.is_none());

    let sad = collect(&client, "[sad] I miss you").await;
    assert_eq!(sad.last(), Some(&TTSEvent::Stopped));
    let plain = collect(&client, "Hello").await;
    assert_eq!(plain.last(), Some(&TTSEvent::Stopped));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(request_json(&requests[0])["voice_setting"]["emotion"], json!("sad"));
    assert_eq!(request_json(&requests[1])["voice_setting"]["emotion"], json!("neutral"));
    assert_eq!(request_json(&requests[1])["text"], json!("Hello"));
}

#[tokio::test]
async fn test_unreachable_server_yields_transport_error() {
    let connection = MiniMaxConnection::new("test-key", "test-group")
        .with_http_url("http://127.0.0.1:1/v1/t2a_v2");
    let client = HttpStreamingClient::new(connection, SynthesisSettings::default()).unwrap();

    let events = collect(&client, "Hello").await;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        TTSEvent::Error(TTSError::TransportError(_))
    ));
}

#[tokio::test]
async fn test_nothing_sent_until_polled() {
    let server = MockServer::start().await;
    mount_body(&server, audio_block(&[1, 1])).await;

    let client = client_for(&server, SynthesisSettings::default()).await;
    let stream = client.synthesize("Hello");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.received_requests().await.unwrap().is_empty());
    drop(stream);
}
