//! Mock provider servers for integration tests
//!
//! - WebSocket: MiniMax T2A v2 socket protocol (`minimax_ws`)
//! - HTTP: served by `wiremock` directly in the HTTP tests

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod minimax_ws;

pub use minimax_ws::{MockBehavior, MockState, spawn_minimax_mock, utterance_pcm, wait_for};
