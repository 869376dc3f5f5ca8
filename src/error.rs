//! Error types for the Nova assistant

use thiserror::Error;

/// Result type alias for Nova operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Nova assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error (capture or playback)
    #[error("audio error: {0}")]
    Audio(String),

    /// Captured audio contained no recognizable speech
    #[error("no speech recognized")]
    Unintelligible,

    /// Speech-to-text service unavailable or failed
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Translation service error
    #[error("translation error: {0}")]
    Translation(String),

    /// Chat-completion service error
    #[error("answer error: {0}")]
    Answer(String),

    /// Command could not be carried out
    #[error("command error: {0}")]
    Command(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error came from transcription and the loop should just move on
    #[must_use]
    pub const fn is_transcription(&self) -> bool {
        matches!(self, Self::Unintelligible | Self::Stt(_))
    }

    /// Whether the audio device has to be re-acquired
    #[must_use]
    pub const fn is_device(&self) -> bool {
        matches!(self, Self::Audio(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::Unintelligible.is_transcription());
        assert!(Error::Stt("503".to_string()).is_transcription());
        assert!(!Error::Audio("gone".to_string()).is_transcription());

        assert!(Error::Audio("gone".to_string()).is_device());
        assert!(!Error::Command("bad".to_string()).is_device());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Error::Unintelligible.to_string(), "no speech recognized");
        assert_eq!(
            Error::Answer("timeout".to_string()).to_string(),
            "answer error: timeout"
        );
    }
}
