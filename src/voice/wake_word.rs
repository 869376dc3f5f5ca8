//! Wake word and phrase matching on transcripts
//!
//! Matching is a case-insensitive substring test against normalized
//! phrases, applied after STT.

use crate::{Error, Result};

/// A set of normalized phrases matched by substring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseSet {
    phrases: Vec<String>,
}

impl PhraseSet {
    /// Build a phrase set, normalizing to trimmed lower-case and dropping blanks
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Self { phrases }
    }

    /// First phrase contained in `text`, if any
    #[must_use]
    pub fn find(&self, text: &str) -> Option<&str> {
        let normalized = text.to_lowercase();
        self.phrases
            .iter()
            .find(|p| normalized.contains(p.as_str()))
            .map(String::as_str)
    }

    /// Whether any phrase is contained in `text`
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    /// The normalized phrases
    #[must_use]
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Whether the set has no phrases
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

/// Detects the trigger phrase in transcripts
#[derive(Debug, Clone)]
pub struct WakeWordDetector {
    wake_words: PhraseSet,
}

impl WakeWordDetector {
    /// Create a new wake word detector
    ///
    /// # Arguments
    ///
    /// * `wake_words` - List of wake words to detect (e.g., "nova")
    ///
    /// # Errors
    ///
    /// Returns error if no usable wake word is given
    pub fn new(wake_words: Vec<String>) -> Result<Self> {
        let wake_words = PhraseSet::new(wake_words);
        if wake_words.is_empty() {
            return Err(Error::Config("at least one wake word is required".to_string()));
        }

        tracing::debug!(wake_words = ?wake_words.phrases(), "wake word detector initialized");

        Ok(Self { wake_words })
    }

    /// Check if transcribed text contains a wake word
    ///
    /// Returns the matched wake word.
    #[must_use]
    pub fn check_wake_word(&self, transcript: &str) -> Option<&str> {
        let found = self.wake_words.find(transcript);
        if let Some(wake_word) = found {
            tracing::info!(wake_word, transcript, "wake word detected");
        }
        found
    }

    /// Get the configured wake words
    #[must_use]
    pub fn wake_words(&self) -> &[String] {
        self.wake_words.phrases()
    }

    /// Primary wake word, used in status messages
    #[must_use]
    pub fn primary(&self) -> &str {
        self.wake_words.phrases().first().map_or("", String::as_str)
    }
}

/// Extract the text spoken after the wake word
#[must_use]
pub fn extract_command(transcript: &str, wake_word: &str) -> String {
    let lower = transcript.to_lowercase();
    let wake_lower = wake_word.to_lowercase();

    lower.find(&wake_lower).map_or_else(
        || transcript.to_string(),
        |pos| {
            lower[pos + wake_lower.len()..]
                .trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == '.')
                .to_string()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wake_word_detection() {
        let detector = WakeWordDetector::new(vec!["nova".to_string()]).unwrap();

        assert!(detector.check_wake_word("hello world").is_none());
        assert_eq!(detector.check_wake_word("Hey NOVA, are you there?"), Some("nova"));
    }

    #[test]
    fn test_blank_wake_words_rejected() {
        assert!(WakeWordDetector::new(vec!["  ".to_string()]).is_err());
        assert!(WakeWordDetector::new(Vec::new()).is_err());
    }

    #[test]
    fn test_phrase_set_normalizes() {
        let set = PhraseSet::new(["  GoodBye ", "bye", ""]);
        assert_eq!(set.phrases(), &["goodbye", "bye"]);
        assert_eq!(set.find("OK, Goodbye then"), Some("goodbye"));
        assert!(set.matches("bye"));
        assert!(!set.matches("hello"));
    }

    #[test]
    fn test_extract_command() {
        assert_eq!(
            extract_command("Nova, what is the capital of France?", "nova"),
            "what is the capital of france?"
        );
        assert_eq!(extract_command("Nova", "nova"), "");
        assert_eq!(extract_command("play music", "nova"), "play music");
    }
}
