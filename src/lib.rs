//! Nova - a voice assistant for the terminal
//!
//! This library provides the core functionality of the assistant:
//! - Wake-word listening and conversation sessions
//! - Voice commands (timers, music, weather)
//! - Question answering through a chat-completion model with translation
//! - Speech synthesis and playback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Surfaces                          │
//! │   Microphone (listener thread)  │  Typed questions  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Assistant                           │
//! │   Listener  │  Session  │  Commands  │  Workers     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               External services                      │
//! │   STT  │  Translation  │  Chat completion  │  TTS   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod answer;
pub mod assistant;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod setup;
pub mod translate;
pub mod voice;
pub mod workers;

pub use answer::{AnswerService, ChatCompletion, MistralClient, PromptTemplate};
pub use assistant::{Assistant, Listener, Services, Session, SessionOutcome, SessionState};
pub use commands::{Command, CommandContext, CommandRouter};
pub use config::Config;
pub use error::{Error, Result};
pub use events::{ConsoleSink, Event, MemorySink, PresentationSink};
pub use translate::{CachedTranslator, GoogleTranslator, Translator};
pub use workers::{QuestionWorker, TaskRegistry};
