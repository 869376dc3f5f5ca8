//! Microphone-backed [`AudioSource`]

use std::time::Duration;

use async_trait::async_trait;

use super::{AudioCapture, AudioSource, UtteranceSegmenter};
use crate::{Error, Result};

/// How often the capture buffer is drained
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Silence that ends an utterance
const PAUSE: Duration = Duration::from_millis(800);

/// Default input device with energy-based segmentation
pub struct Microphone {
    capture: Option<AudioCapture>,
    segmenter: UtteranceSegmenter,
}

impl Microphone {
    /// Create an unopened microphone
    #[must_use]
    pub fn new() -> Self {
        Self {
            capture: None,
            segmenter: UtteranceSegmenter::new(PAUSE, Duration::from_secs(8)),
        }
    }

    fn capture(&self) -> Result<&AudioCapture> {
        let capture = self
            .capture
            .as_ref()
            .ok_or_else(|| Error::Audio("microphone not open".to_string()))?;
        capture.check_health()?;
        Ok(capture)
    }
}

impl Default for Microphone {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl AudioSource for Microphone {
    async fn open(&mut self) -> Result<()> {
        self.close();

        let mut capture = AudioCapture::new()?;
        capture.start()?;
        self.capture = Some(capture);
        self.segmenter.reset();

        tracing::debug!("microphone opened");
        Ok(())
    }

    async fn calibrate(&mut self, duration: Duration) -> Result<()> {
        self.capture()?.discard();
        tokio::time::sleep(duration).await;

        let ambient = self.capture()?.drain();
        self.segmenter.calibrate(&ambient);
        self.segmenter.reset();
        Ok(())
    }

    async fn listen(&mut self, phrase_limit: Duration) -> Result<Vec<f32>> {
        self.segmenter.set_phrase_limit(phrase_limit);

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let samples = self.capture()?.drain();
            if samples.is_empty() {
                continue;
            }

            if let Some(utterance) = self.segmenter.push(&samples) {
                return Ok(utterance);
            }
        }
    }

    fn flush(&mut self) {
        if let Some(capture) = &self.capture {
            capture.discard();
        }
        self.segmenter.reset();
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
            tracing::debug!("microphone closed");
        }
    }
}
