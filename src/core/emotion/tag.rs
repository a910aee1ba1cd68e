//! Leading `[emotion]` tag extraction.
//!
//! Upstream text generators prefix utterances with a bracketed marker such
//! as `[sad] I miss you`. Only a marker at the very start of the text is
//! recognized.

use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A\s*\[([A-Za-z:]+)\]\s*(.*)\z").expect("emotion tag pattern is valid")
});

/// Splits a leading `[tag]` off `text`.
///
/// Returns the lowercased tag and the remaining text. Without a leading tag
/// the input comes back unchanged.
///
/// # Example
///
/// ```rust
/// use streaming_tts::core::emotion::extract_emotion_tag;
///
/// assert_eq!(
///     extract_emotion_tag("[Happy] hello"),
///     (Some("happy".to_string()), "hello".to_string())
/// );
/// assert_eq!(extract_emotion_tag("hello"), (None, "hello".to_string()));
/// ```
pub fn extract_emotion_tag(text: &str) -> (Option<String>, String) {
    match LEADING_TAG.captures(text) {
        Some(caps) => {
            let tag = caps.get(1).map(|m| m.as_str().to_lowercase());
            let rest = caps.get(2).map_or("", |m| m.as_str());
            (tag, rest.to_string())
        }
        None => (None, text.to_string()),
    }
}
