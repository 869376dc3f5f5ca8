//! Process-wide speech handle

use std::sync::{LazyLock, Mutex};

use async_trait::async_trait;
use regex::Regex;

use super::{AudioPlayback, Speech, TextToSpeech};
use crate::{Error, Result};

/// URLs, line breaks and citation markers are not worth reading aloud
static SPEECH_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"http\S+|www\.\S+|\n|Source:").expect("valid regex"));

/// Strip text that should not be spoken
#[must_use]
pub fn clean_for_speech(text: &str) -> String {
    let stripped = SPEECH_NOISE.replace_all(text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Speaks through a TTS provider and the default output device
///
/// Construct once and share by `Arc`. Concurrent calls are not serialized,
/// so overlapping replies may play over each other.
pub struct Speaker {
    tts: TextToSpeech,
    playback: Mutex<Option<AudioPlayback>>,
}

impl Speaker {
    /// Create a speaker; the output device is opened on first use
    #[must_use]
    pub const fn new(tts: TextToSpeech) -> Self {
        Self {
            tts,
            playback: Mutex::new(None),
        }
    }

    fn playback(&self) -> Result<AudioPlayback> {
        let mut guard = self
            .playback
            .lock()
            .map_err(|_| Error::Audio("playback lock poisoned".to_string()))?;

        if let Some(playback) = guard.as_ref() {
            return Ok(playback.clone());
        }

        let playback = AudioPlayback::new()?;
        *guard = Some(playback.clone());
        Ok(playback)
    }

    /// Forget the output device so the next utterance re-opens it
    fn reset(&self) {
        if let Ok(mut guard) = self.playback.lock() {
            *guard = None;
        }
        tracing::debug!("speech output reset");
    }

    async fn try_speak(&self, text: &str) -> Result<()> {
        let audio = self.tts.synthesize(text).await?;
        let playback = self.playback()?;

        tokio::task::spawn_blocking(move || playback.play_mp3_blocking(&audio))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }
}

#[async_trait]
impl Speech for Speaker {
    async fn speak(&self, text: &str) {
        let text = clean_for_speech(text);
        if text.is_empty() {
            return;
        }

        tracing::debug!(text, "speaking");
        if let Err(e) = self.try_speak(&text).await {
            tracing::warn!(error = %e, "speech synthesis error");
            self.reset();
        }
    }
}

/// Speech handle that stays quiet
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSpeech;

#[async_trait]
impl Speech for SilentSpeech {
    async fn speak(&self, text: &str) {
        tracing::trace!(text, "speech disabled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_urls_and_markers() {
        assert_eq!(
            clean_for_speech("Paris. Source: https://example.com/paris"),
            "Paris."
        );
        assert_eq!(
            clean_for_speech("See www.example.org\nfor more"),
            "See for more"
        );
        assert_eq!(clean_for_speech("Plain text."), "Plain text.");
        assert_eq!(clean_for_speech("http://only.url"), "");
    }
}
