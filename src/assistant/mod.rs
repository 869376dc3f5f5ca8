//! The assistant runtime
//!
//! [`Assistant`] owns the shared collaborators and runs two surfaces:
//!
//! - the [`Listener`] on a dedicated thread with its own single-threaded
//!   runtime, since audio input streams cannot move between threads
//! - typed questions from stdin, each answered by a background worker
//!
//! Shutdown cancels one [`CancellationToken`] seen by both.

mod listener;
mod session;
mod state;

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;

use crate::answer::AnswerService;
use crate::commands::{CommandContext, CommandRouter};
use crate::events::{ConsoleSink, Event, PresentationSink};
use crate::translate::{CachedTranslator, Translator};
use crate::voice::{
    Microphone, SilentSpeech, Speaker, Speech, SpeechToText, TextToSpeech, Transcriber,
    WakeWordDetector,
};
use crate::workers::{QuestionWorker, TaskRegistry};
use crate::{Config, Error, Result};

pub use listener::Listener;
pub use session::{Session, SessionOutcome};
pub use state::{SessionState, Transition};

/// Fixed lines the assistant shows and speaks
pub mod messages {
    pub const ACKNOWLEDGE: &str = "Yes, boss? Take your time with your question.";
    pub const LISTENING: &str = "I'm listening...";
    pub const FAREWELL: &str = "Goodbye! Call me if you need anything.";
    pub const NETWORK_RETRY: &str = "⚠️ Network error. Retrying...";
    pub const MIC_REINIT: &str = "⚠️ Microphone error. Reinitializing...";
    pub const MIC_RETRY: &str = "⚠️ Microphone error. Please try again.";
    pub const SESSION_ABORTED: &str = "⚠️ Something went wrong. Going back to listening.";

    /// Status shown whenever the microphone is (re)acquired
    #[must_use]
    pub fn listening_for(name: &str) -> String {
        format!("🎤 Microphone is active and listening for '{name}'...")
    }
}

/// Collaborators shared by the listener, sessions and workers
#[derive(Clone)]
pub struct Services {
    pub sink: Arc<dyn PresentationSink>,
    pub speech: Arc<dyn Speech>,
    pub translator: Arc<dyn Translator>,
    pub answers: Arc<AnswerService>,
    pub commands: Arc<CommandRouter>,
    pub tasks: Arc<TaskRegistry>,
}

impl Services {
    /// Show an assistant reply and speak it
    pub async fn say(&self, text: &str) {
        self.sink.emit(Event::reply(text));
        self.speech.speak(text).await;
    }

    /// Handles given to voice commands
    #[must_use]
    pub fn command_context(&self) -> CommandContext {
        CommandContext::new(
            Arc::clone(&self.sink),
            Arc::clone(&self.speech),
            Arc::clone(&self.tasks),
        )
    }

    /// Worker for typed questions
    #[must_use]
    pub fn question_worker(&self) -> QuestionWorker {
        QuestionWorker::new(
            Arc::clone(&self.sink),
            Arc::clone(&self.speech),
            Arc::clone(&self.translator),
            Arc::clone(&self.answers),
        )
    }
}

/// Build the speech handle; output falls back to silence if TTS is unusable
#[must_use]
pub fn speech_from_config(config: &Config) -> Arc<dyn Speech> {
    if !config.voice.enabled {
        tracing::info!("voice output disabled");
        return Arc::new(SilentSpeech);
    }

    match TextToSpeech::from_config(config) {
        Ok(tts) => Arc::new(Speaker::new(tts)),
        Err(e) => {
            tracing::warn!(error = %e, "speech output unavailable, replies will be text only");
            Arc::new(SilentSpeech)
        }
    }
}

/// The running assistant
pub struct Assistant {
    config: Config,
    services: Services,
    cancel: CancellationToken,
}

impl Assistant {
    /// Assemble an assistant from explicit collaborators
    #[must_use]
    pub fn new(config: Config, services: Services) -> Self {
        Self {
            config,
            services,
            cancel: CancellationToken::new(),
        }
    }

    /// Build the production collaborators on the current runtime
    ///
    /// # Errors
    ///
    /// Returns error if the chat-completion key is missing
    pub fn from_config(config: Config) -> Result<Self> {
        let translator: Arc<CachedTranslator> =
            Arc::new(CachedTranslator::from_config(&config.translation));

        let services = Services {
            sink: Arc::new(ConsoleSink::new(config.assistant.name.clone())),
            speech: speech_from_config(&config),
            translator,
            answers: Arc::new(AnswerService::from_config(&config)?),
            commands: Arc::new(CommandRouter::from_config(&config)),
            tasks: Arc::new(TaskRegistry::current(config.workers.max_concurrent)),
        };

        Ok(Self::new(config, services))
    }

    /// Shared collaborators
    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Token that stops both surfaces when cancelled
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Answer a typed question in the background
    pub fn submit(&self, question: &str) -> Option<String> {
        self.services
            .question_worker()
            .submit(&self.services.tasks, question)
    }

    /// Start the microphone loop on its own thread
    ///
    /// # Errors
    ///
    /// Returns error if the wake words or STT provider are misconfigured,
    /// or the thread cannot be started
    pub fn spawn_listener(&self, transcriber: Arc<dyn Transcriber>) -> Result<JoinHandle<()>> {
        // Fail here rather than inside the thread
        WakeWordDetector::new(self.config.assistant.wake_words.clone())?;

        let config = self.config.clone();
        let services = self.services.clone();
        let cancel = self.cancel.clone();

        let handle = std::thread::Builder::new()
            .name("nova-listener".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to start listener runtime");
                        return;
                    }
                };

                let listener = match Listener::new(
                    Box::new(Microphone::new()),
                    transcriber,
                    services,
                    &config,
                    cancel,
                ) {
                    Ok(listener) => listener,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to start listener");
                        return;
                    }
                };

                runtime.block_on(listener.run());
            })?;

        Ok(handle)
    }

    /// Run until Ctrl-C, or until stdin closes in text-only mode
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot be started
    pub async fn run(self, listen: bool) -> Result<()> {
        let listener = if listen {
            let transcriber: Arc<dyn Transcriber> = Arc::new(SpeechToText::from_config(&self.config)?);
            Some(self.spawn_listener(transcriber)?)
        } else {
            None
        };

        tracing::info!(
            name = %self.config.assistant.name,
            listen,
            "assistant ready, type a question and press enter"
        );

        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "failed to listen for ctrl-c");
                    }
                    tracing::info!("shutdown requested");
                    break;
                }
                () = self.cancel.cancelled() => break,
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => {
                        self.submit(&line);
                    }
                    Ok(None) => {
                        stdin_open = false;
                        if listener.is_none() {
                            // Let typed questions finish before exiting
                            self.services.tasks.drain().await;
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read stdin");
                        stdin_open = false;
                    }
                },
            }
        }

        self.shutdown(listener).await
    }

    async fn shutdown(&self, listener: Option<JoinHandle<()>>) -> Result<()> {
        self.cancel.cancel();

        if let Some(handle) = listener {
            let joined = tokio::task::spawn_blocking(move || handle.join())
                .await
                .map_err(|e| Error::Audio(format!("listener join failed: {e}")))?;
            if joined.is_err() {
                tracing::error!("listener thread panicked");
            }
        }

        self.services.tasks.shutdown().await;
        tracing::info!("assistant stopped");
        Ok(())
    }
}
