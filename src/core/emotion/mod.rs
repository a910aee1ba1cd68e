//! Emotion handling for synthesis requests.
//!
//! Two pieces:
//!
//! - [`extract_emotion_tag`] pulls a leading `[tag]` out of utterance text so
//!   that a language model can steer delivery inline.
//! - [`Emotion`] lists the values the MiniMax voice settings accept; it is
//!   used to validate the configured default emotion.
//!
//! ```rust
//! use streaming_tts::core::emotion::{Emotion, extract_emotion_tag};
//!
//! let (tag, text) = extract_emotion_tag("[sad] I miss you");
//! assert_eq!(tag.as_deref(), Some("sad"));
//! assert_eq!(text, "I miss you");
//! assert!(Emotion::is_supported("sad"));
//! ```

mod tag;
mod types;

pub use tag::extract_emotion_tag;
pub use types::Emotion;
