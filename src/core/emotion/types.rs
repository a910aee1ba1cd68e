//! Emotions accepted by the MiniMax `voice_setting.emotion` field.

use std::fmt;
use std::str::FromStr;

/// Emotions supported by MiniMax speech models.
///
/// # Example
///
/// ```rust
/// use streaming_tts::core::emotion::Emotion;
///
/// let emotion: Emotion = "Happy".parse().unwrap();
/// assert_eq!(emotion.as_str(), "happy");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Emotion {
    /// Neutral, default emotional state
    #[default]
    Neutral,
    /// Happy, joyful, positive
    Happy,
    /// Sad, melancholic, sorrowful
    Sad,
    /// Angry, frustrated, annoyed
    Angry,
    /// Fearful, scared, anxious
    Fearful,
    /// Disgusted, repulsed
    Disgusted,
    /// Surprised, shocked, astonished
    Surprised,
}

impl Emotion {
    /// Returns all supported emotions.
    #[inline]
    pub const fn all() -> &'static [Emotion] {
        &[
            Emotion::Neutral,
            Emotion::Happy,
            Emotion::Sad,
            Emotion::Angry,
            Emotion::Fearful,
            Emotion::Disgusted,
            Emotion::Surprised,
        ]
    }

    /// Returns the wire value.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fearful => "fearful",
            Emotion::Disgusted => "disgusted",
            Emotion::Surprised => "surprised",
        }
    }

    /// Returns true if `value` names a supported emotion (case-insensitive).
    pub fn is_supported(value: &str) -> bool {
        value.parse::<Emotion>().is_ok()
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Emotion::all()
            .iter()
            .copied()
            .find(|e| e.as_str() == lower)
            .ok_or_else(|| format!("unsupported emotion: {s}"))
    }
}
