//! Voice command handlers
//!
//! Inside a conversation every utterance is offered to the
//! [`CommandRouter`]; the first [`Command`] whose trigger matches handles
//! it. Anything unmatched is treated as a question by the session.

mod music;
mod timer;
mod weather;

use std::sync::Arc;

use async_trait::async_trait;

use crate::events::{Event, PresentationSink};
use crate::voice::Speech;
use crate::workers::TaskRegistry;
use crate::{Config, Result};

pub use music::{Launcher, MusicCommand, SystemLauncher};
pub use timer::{TimerCommand, parse_duration};
pub use weather::{WeatherCommand, WeatherReport};

/// Shared handles a command may use
#[derive(Clone)]
pub struct CommandContext {
    pub sink: Arc<dyn PresentationSink>,
    pub speech: Arc<dyn Speech>,
    pub tasks: Arc<TaskRegistry>,
}

impl CommandContext {
    #[must_use]
    pub fn new(
        sink: Arc<dyn PresentationSink>,
        speech: Arc<dyn Speech>,
        tasks: Arc<TaskRegistry>,
    ) -> Self {
        Self { sink, speech, tasks }
    }

    /// Show a notice and speak its spoken form
    pub async fn announce(&self, shown: &str, spoken: &str) {
        self.sink.emit(Event::notice(shown));
        self.speech.speak(spoken).await;
    }
}

/// A voice command
#[async_trait]
pub trait Command: Send + Sync {
    /// Command name for logging
    fn name(&self) -> &'static str;

    /// Whether this command handles the lower-cased `utterance`
    fn matches(&self, utterance: &str) -> bool;

    /// Carry out the command
    ///
    /// # Errors
    ///
    /// Returns error if the command fails in a way the conversation cannot
    /// recover from
    async fn handle(&self, utterance: &str, ctx: &CommandContext) -> Result<()>;
}

/// Ordered dispatch table of commands
#[derive(Default)]
pub struct CommandRouter {
    commands: Vec<Box<dyn Command>>,
}

impl CommandRouter {
    /// Create an empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with the built-in commands in priority order
    ///
    /// The weather command is only registered when weather is configured.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut router = Self::new()
            .with(TimerCommand)
            .with(MusicCommand::from_config(
                &config.music,
                Box::new(SystemLauncher),
            ));

        if let Some(weather) = &config.weather {
            router.push(Box::new(WeatherCommand::new(weather)));
        }

        router
    }

    /// Append a command, builder style
    #[must_use]
    pub fn with(mut self, command: impl Command + 'static) -> Self {
        self.push(Box::new(command));
        self
    }

    /// Append a command with the lowest priority so far
    pub fn push(&mut self, command: Box<dyn Command>) {
        self.commands.push(command);
    }

    /// First command matching `utterance`
    #[must_use]
    pub fn route(&self, utterance: &str) -> Option<&dyn Command> {
        self.commands
            .iter()
            .find(|c| c.matches(utterance))
            .map(|c| c.as_ref())
    }

    /// Registered command names in priority order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.commands.iter().map(|c| c.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeatherConfig;

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl Command for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn matches(&self, utterance: &str) -> bool {
            utterance.contains(self.1)
        }

        async fn handle(&self, _: &str, _: &CommandContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_first_match_wins() {
        let router = CommandRouter::new()
            .with(Named("first", "play"))
            .with(Named("second", "play music"));

        assert_eq!(router.route("play music").map(|c| c.name()), Some("first"));
        assert!(router.route("what time is it").is_none());
    }

    #[test]
    fn test_builtin_order() {
        let mut config = Config::default();
        assert_eq!(CommandRouter::from_config(&config).names(), ["timer", "music"]);

        config.weather = Some(WeatherConfig {
            api_key: "key".to_string(),
            city: "Paris".to_string(),
        });
        let router = CommandRouter::from_config(&config);
        assert_eq!(router.names(), ["timer", "music", "weather"]);
        assert_eq!(
            router.route("set timer for 5 seconds").map(|c| c.name()),
            Some("timer")
        );
        assert_eq!(
            router.route("how is the weather").map(|c| c.name()),
            Some("weather")
        );
    }
}
