//! Presentation events
//!
//! The listener, session, commands and question workers report everything
//! they show the user as [`Event`]s pushed into a [`PresentationSink`].
//! Emitting is fire-and-forget: sinks never fail back into the caller.

use std::fmt;
use std::io::Write as _;
use std::sync::Mutex;

use tokio::sync::mpsc;

/// Marker prefix for lines spoken by the user
pub const USER_MARKER: &str = "You:";

/// One thing to show the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Listener/microphone status
    Status(String),
    /// Something the user said or typed
    User(String),
    /// A reply from the assistant
    Reply(String),
    /// Command output or warning, shown outside the dialogue
    Notice(String),
}

impl Event {
    /// Create a status event
    pub fn status(text: impl Into<String>) -> Self {
        Self::Status(text.into())
    }

    /// Create a user dialogue event
    pub fn user(text: impl Into<String>) -> Self {
        Self::User(text.into())
    }

    /// Create an assistant reply event
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }

    /// Create a notice event
    pub fn notice(text: impl Into<String>) -> Self {
        Self::Notice(text.into())
    }

    /// Raw text carried by the event
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Status(t) | Self::User(t) | Self::Reply(t) | Self::Notice(t) => t,
        }
    }

    /// Whether this is a dialogue line (user or assistant)
    #[must_use]
    pub const fn is_dialogue(&self) -> bool {
        matches!(self, Self::User(_) | Self::Reply(_))
    }

    /// Whether this status means the microphone is actively listening
    #[must_use]
    pub fn is_listening_status(&self) -> bool {
        matches!(self, Self::Status(t) if t.to_lowercase().contains("listening"))
    }

    /// Render the event as a transcript line
    ///
    /// Dialogue lines carry the literal `You:` / `<NAME>:` markers.
    #[must_use]
    pub fn render(&self, assistant_name: &str) -> String {
        match self {
            Self::User(t) => format!("👤 {USER_MARKER} {t}"),
            Self::Reply(t) => format!("🤖 {assistant_name}: {t}"),
            Self::Status(t) | Self::Notice(t) => t.clone(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(crate::config::DEFAULT_NAME))
    }
}

/// Receives events for display
pub trait PresentationSink: Send + Sync {
    /// Display one event
    fn emit(&self, event: Event);
}

/// Writes the transcript to stdout
pub struct ConsoleSink {
    assistant_name: String,
}

impl ConsoleSink {
    /// Create a console sink using `assistant_name` as the reply marker
    #[must_use]
    pub fn new(assistant_name: impl Into<String>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
        }
    }
}

impl PresentationSink for ConsoleSink {
    fn emit(&self, event: Event) {
        let line = event.render(&self.assistant_name);
        let mut out = std::io::stdout().lock();

        let result = if event.is_dialogue() {
            let timestamp = chrono::Local::now().format("%H:%M");
            writeln!(out, "[{timestamp}] {line}")
        } else {
            writeln!(out, "{line}")
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to write transcript line");
        }
    }
}

/// Forwards events into an async channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PresentationSink for ChannelSink {
    fn emit(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}

/// Keeps every emitted event in order
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of emitted events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|&e| predicate(e)).count())
            .unwrap_or_default()
    }
}

impl PresentationSink for MemorySink {
    fn emit(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_markers() {
        assert_eq!(Event::user("hello").render("NOVA"), "👤 You: hello");
        assert_eq!(Event::reply("Paris.").render("NOVA"), "🤖 NOVA: Paris.");
        assert_eq!(Event::notice("⏰ Time's up!").render("NOVA"), "⏰ Time's up!");
        assert!(Event::reply("x").render("ATLAS").contains("ATLAS:"));
    }

    #[test]
    fn test_listening_status() {
        assert!(Event::status("🎤 Microphone is active and listening for 'NOVA'...").is_listening_status());
        assert!(!Event::reply("I'm listening...").is_listening_status());
        assert!(!Event::status("⚠️ Network error. Retrying...").is_listening_status());
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit(Event::user("one"));
        sink.emit(Event::reply("two"));

        assert_eq!(sink.events(), vec![Event::user("one"), Event::reply("two")]);
        assert_eq!(sink.count(Event::is_dialogue), 2);
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(Event::status("listening"));

        assert_eq!(rx.recv().await, Some(Event::status("listening")));

        drop(rx);
        // Dropped receiver must not panic the emitter
        sink.emit(Event::status("ignored"));
    }
}
