//! Shared test utilities
//!
//! Scripted stand-ins for the microphone, transcription, speech and chat
//! services, so the assistant loops run without hardware or network.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use nova_assistant::answer::{ChatCompletion, ChatRequest};
use nova_assistant::assistant::Services;
use nova_assistant::commands::{CommandRouter, Launcher, TimerCommand};
use nova_assistant::voice::{AudioSource, Speech, Transcriber};
use nova_assistant::{
    AnswerService, Config, Error, Event, Listener, MemorySink, Result, TaskRegistry, Translator,
};

/// One thing the scripted microphone "hears"
#[derive(Debug, Clone)]
pub enum Heard {
    /// Speech transcribed as this text
    Text(String),
    /// Audio with no recognizable speech
    Nothing,
    /// Transcription service unreachable
    SttDown,
    /// The input device fails
    DeviceFailure,
}

/// Shorthand for `Heard::Text`
pub fn say(text: &str) -> Heard {
    Heard::Text(text.to_string())
}

/// Calls made on the scripted source
#[derive(Debug, Default, Clone)]
pub struct SourceLog {
    pub opens: usize,
    pub closes: usize,
    pub calibrations: usize,
    pub flushes: usize,
    /// Flush count seen by each `listen` call
    pub flushes_at_listen: Vec<usize>,
    pub phrase_limits: Vec<Duration>,
}

/// Script shared by the scripted source and transcriber
///
/// When the script runs out the `done` token is cancelled, which stops
/// the listener.
pub struct Script {
    steps: Mutex<VecDeque<Heard>>,
    captured: Mutex<VecDeque<Heard>>,
    log: Mutex<SourceLog>,
    done: CancellationToken,
}

impl Script {
    pub fn new(steps: Vec<Heard>, done: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            captured: Mutex::new(VecDeque::new()),
            log: Mutex::new(SourceLog::default()),
            done,
        })
    }

    pub fn log(&self) -> SourceLog {
        self.log.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().unwrap().len()
    }
}

/// Audio source replaying a script
pub struct ScriptedSource(pub Arc<Script>);

#[async_trait(?Send)]
impl AudioSource for ScriptedSource {
    async fn open(&mut self) -> Result<()> {
        self.0.log.lock().unwrap().opens += 1;
        Ok(())
    }

    async fn calibrate(&mut self, duration: Duration) -> Result<()> {
        self.0.log.lock().unwrap().calibrations += 1;
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn listen(&mut self, phrase_limit: Duration) -> Result<Vec<f32>> {
        {
            let mut log = self.0.log.lock().unwrap();
            log.phrase_limits.push(phrase_limit);
            let flushes = log.flushes;
            log.flushes_at_listen.push(flushes);
        }

        let next = self.0.steps.lock().unwrap().pop_front();
        match next {
            None => {
                self.0.done.cancel();
                std::future::pending().await
            }
            Some(Heard::DeviceFailure) => Err(Error::Audio("device unplugged".to_string())),
            Some(heard) => {
                self.0.captured.lock().unwrap().push_back(heard);
                Ok(vec![0.1; 1600])
            }
        }
    }

    fn flush(&mut self) {
        self.0.log.lock().unwrap().flushes += 1;
    }

    fn close(&mut self) {
        self.0.log.lock().unwrap().closes += 1;
    }
}

/// Transcriber returning whatever the source captured
pub struct ScriptedTranscriber(pub Arc<Script>);

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _samples: &[f32]) -> Result<String> {
        let heard = self.0.captured.lock().unwrap().pop_front();
        match heard {
            Some(Heard::Text(text)) => Ok(text),
            Some(Heard::SttDown) => Err(Error::Stt("503 Service Unavailable".to_string())),
            _ => Err(Error::Unintelligible),
        }
    }
}

/// Speech handle recording what it was asked to say
#[derive(Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl Speech for RecordingSpeech {
    async fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }
}

/// Translator that returns its input and counts calls
#[derive(Default)]
pub struct EchoTranslator {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl Translator for EchoTranslator {
    async fn translate(&self, text: &str) -> String {
        *self.calls.lock().unwrap() += 1;
        text.to_string()
    }
}

/// Chat backend with a fixed outcome
pub struct ScriptedChat {
    reply: std::result::Result<String, String>,
    pub requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedChat {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            requests: Arc::default(),
        }
    }
}

#[async_trait]
impl ChatCompletion for ScriptedChat {
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply
            .clone()
            .map(Some)
            .map_err(Error::Answer)
    }
}

/// Launcher recording what it opened
#[derive(Clone, Default)]
pub struct RecordingLauncher {
    pub opened: Arc<Mutex<Vec<String>>>,
}

impl Launcher for RecordingLauncher {
    fn open(&self, target: &str) -> Result<()> {
        self.opened.lock().unwrap().push(target.to_string());
        Ok(())
    }
}

/// A listener wired to scripted collaborators
pub struct Harness {
    pub script: Arc<Script>,
    pub sink: Arc<MemorySink>,
    pub speech: Arc<RecordingSpeech>,
    pub requests: Arc<Mutex<Vec<ChatRequest>>>,
    pub services: Services,
    pub config: Config,
    pub cancel: CancellationToken,
}

impl Harness {
    /// Harness whose chat backend always answers "Paris"
    pub fn new(steps: Vec<Heard>) -> Self {
        Self::build(
            steps,
            ScriptedChat::replying("Paris"),
            CommandRouter::new().with(TimerCommand),
        )
    }

    pub fn with_chat(steps: Vec<Heard>, chat: ScriptedChat) -> Self {
        Self::build(steps, chat, CommandRouter::new().with(TimerCommand))
    }

    pub fn with_commands(steps: Vec<Heard>, commands: CommandRouter) -> Self {
        Self::build(steps, ScriptedChat::replying("Paris"), commands)
    }

    fn build(steps: Vec<Heard>, chat: ScriptedChat, commands: CommandRouter) -> Self {
        let config = Config::default();
        let cancel = CancellationToken::new();
        let script = Script::new(steps, cancel.clone());
        let sink = Arc::new(MemorySink::new());
        let speech = Arc::new(RecordingSpeech::default());
        let requests = Arc::clone(&chat.requests);

        let services = Services {
            sink: sink.clone(),
            speech: speech.clone(),
            translator: Arc::new(EchoTranslator::default()),
            answers: Arc::new(AnswerService::new(Box::new(chat), &config.llm)),
            commands: Arc::new(commands),
            tasks: Arc::new(TaskRegistry::current(config.workers.max_concurrent)),
        };

        Self {
            script,
            sink,
            speech,
            requests,
            services,
            config,
            cancel,
        }
    }

    /// Run the listener until the script is exhausted
    pub async fn run_listener(&self) {
        let listener = Listener::new(
            Box::new(ScriptedSource(Arc::clone(&self.script))),
            Arc::new(ScriptedTranscriber(Arc::clone(&self.script))),
            self.services.clone(),
            &self.config,
            self.cancel.clone(),
        )
        .expect("listener");

        listener.run().await;
    }

    pub fn events(&self) -> Vec<Event> {
        self.sink.events()
    }

    /// Number of events equal to `event`
    pub fn count(&self, event: &Event) -> usize {
        self.sink.count(|e| e == event)
    }

    pub fn replies(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Reply(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Notice(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn chat_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}
