//! Conversation session
//!
//! Runs after the trigger phrase until the user says goodbye, a handler
//! fails, or the assistant shuts down.

use tokio_util::sync::CancellationToken;

use super::{Services, messages};
use crate::config::ListenerConfig;
use crate::events::Event;
use crate::voice::{AudioSource, PhraseSet, Transcriber};
use crate::{Error, Result};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The user said goodbye
    Farewell,
    /// A handler error ended the session early
    Aborted,
    /// The input device failed; the stream must be re-acquired
    DeviceLost,
    /// The assistant is shutting down
    Cancelled,
}

/// One conversation, borrowing the listener's stream and collaborators
pub struct Session<'a> {
    source: &'a mut dyn AudioSource,
    transcriber: &'a dyn Transcriber,
    services: &'a Services,
    exit_phrases: &'a PhraseSet,
    timings: &'a ListenerConfig,
    cancel: &'a CancellationToken,
}

impl<'a> Session<'a> {
    #[must_use]
    pub fn new(
        source: &'a mut dyn AudioSource,
        transcriber: &'a dyn Transcriber,
        services: &'a Services,
        exit_phrases: &'a PhraseSet,
        timings: &'a ListenerConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            source,
            transcriber,
            services,
            exit_phrases,
            timings,
            cancel,
        }
    }

    /// Converse until the session ends
    ///
    /// `opening` is text the user already said after the trigger phrase;
    /// it is handled before listening for more.
    #[allow(clippy::future_not_send)]
    pub async fn run(self, opening: Option<String>) -> SessionOutcome {
        let outcome = self.converse(opening).await;
        tracing::info!(?outcome, "conversation ended");
        outcome
    }

    #[allow(clippy::future_not_send)]
    async fn converse(mut self, opening: Option<String>) -> SessionOutcome {
        self.services.say(messages::LISTENING).await;

        if let Err(e) = self.source.calibrate(self.timings.calibration).await {
            return self.abort(&e);
        }

        if let Some(opening) = opening {
            match self.handle(&opening).await {
                Ok(Some(outcome)) => return outcome,
                Ok(None) => self.source.flush(),
                Err(e) => return self.abort(&e),
            }
        }

        loop {
            if self.cancel.is_cancelled() {
                return SessionOutcome::Cancelled;
            }

            let captured = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return SessionOutcome::Cancelled,
                captured = self.source.listen(self.timings.conversation_phrase_limit) => captured,
            };

            let samples = match captured {
                Ok(samples) => samples,
                Err(e) => return self.abort(&e),
            };

            let utterance = match self.transcriber.transcribe(&samples).await {
                Ok(text) => text,
                Err(e) if e.is_transcription() => {
                    tracing::debug!(error = %e, "nothing usable heard");
                    continue;
                }
                Err(e) => return self.abort(&e),
            };

            match self.handle(&utterance).await {
                Ok(Some(outcome)) => return outcome,
                // Whatever was heard while replying is our own voice
                Ok(None) => self.source.flush(),
                Err(e) => return self.abort(&e),
            }
        }
    }

    /// Route one utterance; `Some` ends the session
    async fn handle(&self, utterance: &str) -> Result<Option<SessionOutcome>> {
        let utterance = utterance.trim().to_lowercase();
        if utterance.is_empty() {
            return Ok(None);
        }
        tracing::info!(heard = %utterance, "utterance");

        if self.exit_phrases.matches(&utterance) {
            self.services.sink.emit(Event::user(utterance));
            self.services.say(messages::FAREWELL).await;
            return Ok(Some(SessionOutcome::Farewell));
        }

        if let Some(command) = self.services.commands.route(&utterance) {
            tracing::info!(command = command.name(), "detected command");
            command
                .handle(&utterance, &self.services.command_context())
                .await?;
            return Ok(None);
        }

        tracing::debug!("processing as a question");
        self.services.sink.emit(Event::user(utterance.as_str()));
        let translated = self.services.translator.translate(&utterance).await;
        let reply = self.services.answers.answer(&translated).await;
        self.services.say(&reply).await;
        Ok(None)
    }

    fn abort(&self, error: &Error) -> SessionOutcome {
        if error.is_device() {
            tracing::warn!(error = %error, "microphone error in conversation");
            self.services.sink.emit(Event::notice(messages::MIC_RETRY));
            return SessionOutcome::DeviceLost;
        }

        tracing::error!(error = %error, "error in conversation");
        self.services.sink.emit(Event::notice(messages::SESSION_ABORTED));
        SessionOutcome::Aborted
    }
}
