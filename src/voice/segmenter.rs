//! Energy-based utterance segmentation
//!
//! Splits a continuous sample stream into single utterances. The speech
//! threshold is derived from an ambient-noise calibration pass, so quiet and
//! noisy rooms both work without tuning.

use std::time::Duration;

use super::SAMPLE_RATE;

/// Lowest threshold a calibration can produce
const MIN_THRESHOLD: f32 = 0.01;

/// Threshold used before any calibration
const DEFAULT_THRESHOLD: f32 = 0.03;

/// Speech must be this many times louder than the ambient floor
const DYNAMIC_FACTOR: f32 = 1.5;

/// Minimum duration of speech to keep (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Waiting for speech onset
    Waiting,
    /// Accumulating an utterance
    Speaking,
}

/// Cuts a sample stream into utterances
#[derive(Debug)]
pub struct UtteranceSegmenter {
    threshold: f32,
    state: SegmentState,
    buffer: Vec<f32>,
    silence_counter: usize,
    pause_samples: usize,
    phrase_limit_samples: usize,
}

impl UtteranceSegmenter {
    /// Create a segmenter ending utterances after `pause` of silence
    /// and cutting them at `phrase_limit`
    #[must_use]
    pub fn new(pause: Duration, phrase_limit: Duration) -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            state: SegmentState::Waiting,
            buffer: Vec::new(),
            silence_counter: 0,
            pause_samples: duration_to_samples(pause),
            phrase_limit_samples: duration_to_samples(phrase_limit),
        }
    }

    /// Derive the speech threshold from a stretch of ambient audio
    ///
    /// Returns the new threshold.
    pub fn calibrate(&mut self, ambient: &[f32]) -> f32 {
        let floor = calculate_energy(ambient);
        self.threshold = (floor * DYNAMIC_FACTOR).max(MIN_THRESHOLD);
        tracing::debug!(floor, threshold = self.threshold, "ambient noise calibrated");
        self.threshold
    }

    /// Change the per-utterance cap
    pub fn set_phrase_limit(&mut self, phrase_limit: Duration) {
        self.phrase_limit_samples = duration_to_samples(phrase_limit);
    }

    /// Feed samples; returns a finished utterance when one is complete
    pub fn push(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        let energy = calculate_energy(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            SegmentState::Waiting => {
                if is_speech {
                    self.state = SegmentState::Speaking;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech onset");
                }
            }
            SegmentState::Speaking => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.phrase_limit_samples > 0 && self.buffer.len() >= self.phrase_limit_samples
                {
                    tracing::debug!(samples = self.buffer.len(), "phrase limit reached");
                    return Some(self.finish());
                }

                let speech_len = self.buffer.len().saturating_sub(self.silence_counter);
                if self.silence_counter > self.pause_samples {
                    if speech_len > MIN_SPEECH_SAMPLES {
                        tracing::debug!(samples = self.buffer.len(), "utterance complete");
                        return Some(self.finish());
                    }

                    // Too short to be speech, likely a click or a cough
                    tracing::trace!("discarding short noise burst");
                    self.reset();
                }
            }
        }

        None
    }

    /// Current speech threshold
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SegmentState {
        self.state
    }

    /// Drop any partial utterance
    pub fn reset(&mut self) {
        self.state = SegmentState::Waiting;
        self.buffer.clear();
        self.silence_counter = 0;
    }

    fn finish(&mut self) -> Vec<f32> {
        let utterance = std::mem::take(&mut self.buffer);
        self.reset();
        utterance
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn duration_to_samples(duration: Duration) -> usize {
    (duration.as_secs_f64() * f64::from(SAMPLE_RATE)) as usize
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
