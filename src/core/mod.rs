pub mod emotion;
pub mod tts;

pub use emotion::{Emotion, extract_emotion_tag};

pub use tts::{
    AudioChunk, BackendKind, ConnectionState, HttpStreamingClient, MiniMaxConnection,
    SocketStreamingClient, StreamingTTS, SynthesisBackend, SynthesisSettings, TTSError, TTSEvent,
    TTSEventStream, TTSNotification, TTSResult, create_tts_backend,
};
