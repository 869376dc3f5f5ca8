//! Wake-word listener
//!
//! Holds the audio stream for as long as it stays healthy, waits for the
//! trigger phrase and hands the stream to a [`Session`] when it hears it.
//! A failed device is closed and re-acquired after a pause.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::session::{Session, SessionOutcome};
use super::state::{SessionState, Transition};
use super::{Services, messages};
use crate::config::ListenerConfig;
use crate::events::Event;
use crate::voice::{AudioSource, PhraseSet, Transcriber, WakeWordDetector, extract_command};
use crate::{Config, Error, Result};

/// Why the utterance loop returned
enum StreamEnd {
    Cancelled,
    DeviceLost(Error),
    /// The device failed mid-conversation and the session told the user
    LostInSession,
}

/// The always-on listening loop
pub struct Listener {
    source: Box<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    detector: WakeWordDetector,
    exit_phrases: PhraseSet,
    timings: ListenerConfig,
    name: String,
    services: Services,
    cancel: CancellationToken,
    state: SessionState,
}

impl Listener {
    /// Create a listener
    ///
    /// # Errors
    ///
    /// Returns error if no usable wake word is configured
    pub fn new(
        source: Box<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        services: Services,
        config: &Config,
        cancel: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            source,
            transcriber,
            detector: WakeWordDetector::new(config.assistant.wake_words.clone())?,
            exit_phrases: PhraseSet::new(&config.assistant.exit_phrases),
            timings: config.listener.clone(),
            name: config.assistant.name.clone(),
            services,
            cancel,
            state: SessionState::Idle,
        })
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    fn advance(&mut self, transition: Transition) {
        match self.state.transition(transition) {
            Some(next) => {
                tracing::debug!(from = %self.state, to = %next, "listener state");
                self.state = next;
            }
            None => {
                tracing::warn!(state = %self.state, ?transition, "ignoring illegal transition");
            }
        }
    }

    /// Listen until cancelled
    #[allow(clippy::future_not_send)]
    pub async fn run(mut self) {
        tracing::info!(wake_words = ?self.detector.wake_words(), "listener started");

        while !self.cancel.is_cancelled() {
            match self.serve_stream().await {
                StreamEnd::Cancelled => break,
                StreamEnd::DeviceLost(e) => {
                    tracing::warn!(error = %e, "microphone error");
                    self.services.sink.emit(Event::notice(messages::MIC_REINIT));
                }
                StreamEnd::LostInSession => {}
            }

            self.source.close();
            self.advance(Transition::DeviceLost);
            if !self.pause(self.timings.device_retry).await {
                break;
            }
        }

        self.source.close();
        tracing::info!("listener stopped");
    }

    /// Acquire the stream and process utterances until it fails
    #[allow(clippy::future_not_send)]
    async fn serve_stream(&mut self) -> StreamEnd {
        if let Err(e) = self.source.open().await {
            return StreamEnd::DeviceLost(e);
        }
        self.services
            .sink
            .emit(Event::status(messages::listening_for(
                &self.detector.primary().to_uppercase(),
            )));

        if let Err(e) = self.source.calibrate(self.timings.calibration).await {
            return StreamEnd::DeviceLost(e);
        }
        self.advance(Transition::Armed);

        loop {
            let captured = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return StreamEnd::Cancelled,
                captured = self.source.listen(self.timings.wake_phrase_limit) => captured,
            };

            let samples = match captured {
                Ok(samples) => samples,
                Err(e) if e.is_device() => return StreamEnd::DeviceLost(e),
                Err(e) => {
                    if !self.pause_after(&e).await {
                        return StreamEnd::Cancelled;
                    }
                    continue;
                }
            };

            let transcript = match self.transcriber.transcribe(&samples).await {
                Ok(text) => text.to_lowercase(),
                Err(Error::Unintelligible) => continue,
                Err(e @ Error::Stt(_)) => {
                    tracing::warn!(error = %e, "could not request transcription");
                    self.services.sink.emit(Event::notice(messages::NETWORK_RETRY));
                    if !self.pause(self.timings.stt_backoff).await {
                        return StreamEnd::Cancelled;
                    }
                    continue;
                }
                Err(e) if e.is_device() => return StreamEnd::DeviceLost(e),
                Err(e) => {
                    if !self.pause_after(&e).await {
                        return StreamEnd::Cancelled;
                    }
                    continue;
                }
            };
            tracing::debug!(heard = %transcript, "utterance");

            let Some(wake_word) = self.detector.check_wake_word(&transcript) else {
                continue;
            };
            let opening = extract_command(&transcript, wake_word);
            let opening = (!opening.trim().is_empty()).then_some(opening);

            match self.converse(opening).await {
                SessionOutcome::Cancelled => return StreamEnd::Cancelled,
                SessionOutcome::DeviceLost => return StreamEnd::LostInSession,
                SessionOutcome::Farewell | SessionOutcome::Aborted => {}
            }
        }
    }

    /// Acknowledge the trigger and run a session on the held stream
    #[allow(clippy::future_not_send)]
    async fn converse(&mut self, opening: Option<String>) -> SessionOutcome {
        self.advance(Transition::Triggered);

        self.services.sink.emit(Event::user(self.name.as_str()));
        self.services.say(messages::ACKNOWLEDGE).await;
        self.source.flush();

        let outcome = Session::new(
            self.source.as_mut(),
            self.transcriber.as_ref(),
            &self.services,
            &self.exit_phrases,
            &self.timings,
            &self.cancel,
        )
        .run(opening)
        .await;

        match outcome {
            // Back to idle through the device-loss path in `run`
            SessionOutcome::DeviceLost => {}
            SessionOutcome::Cancelled => self.advance(Transition::Ended),
            // The session recalibrated the stream, so it is armed again
            SessionOutcome::Farewell | SessionOutcome::Aborted => {
                self.advance(Transition::Ended);
                self.source.flush();
                self.advance(Transition::Armed);
            }
        }
        outcome
    }

    #[allow(clippy::future_not_send)]
    async fn pause_after(&self, error: &Error) -> bool {
        tracing::warn!(error = %error, "error in listening loop");
        self.pause(self.timings.error_pause).await
    }

    /// Sleep unless cancelled first; `false` means stop
    #[allow(clippy::future_not_send)]
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }
}
