//! Voice processing module
//!
//! Handles audio capture, utterance segmentation, wake word matching,
//! transcription, speech synthesis and playback. The assistant loops only
//! see the [`AudioSource`], [`Transcriber`] and [`Speech`] traits.

mod capture;
mod microphone;
mod playback;
mod segmenter;
mod speech;
mod stt;
mod tts;
mod wake_word;

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use microphone::Microphone;
pub use playback::{AudioPlayback, DecodedAudio, PLAYBACK_SAMPLE_RATE, decode_mp3};
pub use segmenter::{SegmentState, UtteranceSegmenter, calculate_energy};
pub use speech::{SilentSpeech, Speaker, clean_for_speech};
pub use stt::{SpeechToText, SttProvider};
pub use tts::{TextToSpeech, TtsProvider};
pub use wake_word::{PhraseSet, WakeWordDetector, extract_command};

/// Source of captured utterances
///
/// Implementations may hold non-`Send` device handles, so the listener
/// drives them from a single thread.
#[async_trait(?Send)]
pub trait AudioSource {
    /// Acquire the input stream
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if the device cannot be opened
    async fn open(&mut self) -> Result<()>;

    /// Sample ambient noise for `duration` and adjust the speech threshold
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if the device fails while sampling
    async fn calibrate(&mut self, duration: Duration) -> Result<()>;

    /// Wait for the next utterance, at most `phrase_limit` long
    ///
    /// There is no timeout on waiting for speech to start.
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if the device fails
    async fn listen(&mut self, phrase_limit: Duration) -> Result<Vec<f32>>;

    /// Drop audio captured so far, such as the assistant's own voice
    fn flush(&mut self);

    /// Release the input stream
    fn close(&mut self);
}

/// Converts captured audio to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe 16 kHz mono samples
    ///
    /// # Errors
    ///
    /// Returns `Error::Unintelligible` when no speech was recognized and
    /// `Error::Stt` when the service is unavailable
    async fn transcribe(&self, samples: &[f32]) -> Result<String>;
}

/// Speaks text aloud
///
/// Speaking never fails from the caller's point of view; implementations
/// log and recover internally.
#[async_trait]
pub trait Speech: Send + Sync {
    /// Speak `text`, returning when playback has finished
    async fn speak(&self, text: &str);
}
