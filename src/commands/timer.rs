//! Countdown timers

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use super::{Command, CommandContext};
use crate::{Error, Result};

/// First count of seconds in the utterance
static SECONDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*seconds?").expect("valid regex"));

/// Parse a timer duration such as "10 seconds" or "1second"
///
/// # Errors
///
/// Returns `Error::Command` if no count of seconds is present
pub fn parse_duration(utterance: &str) -> Result<Duration> {
    let secs = SECONDS
        .captures(utterance)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .ok_or_else(|| Error::Command(format!("no timer duration in {utterance:?}")))?;

    Ok(Duration::from_secs(secs))
}

/// "set timer ... N seconds"
pub struct TimerCommand;

#[async_trait]
impl Command for TimerCommand {
    fn name(&self) -> &'static str {
        "timer"
    }

    fn matches(&self, utterance: &str) -> bool {
        utterance.contains("set timer")
    }

    async fn handle(&self, utterance: &str, ctx: &CommandContext) -> Result<()> {
        let duration = match parse_duration(utterance) {
            Ok(duration) => duration,
            Err(e) => {
                tracing::debug!(error = %e, "timer not set");
                ctx.announce(
                    "⚠️ I couldn't understand the timer duration.",
                    "I couldn't understand the timer duration.",
                )
                .await;
                return Ok(());
            }
        };

        let secs = duration.as_secs();
        ctx.announce(
            &format!("⏰ Timer set for {secs} seconds."),
            &format!("Timer set for {secs} seconds."),
        )
        .await;

        let fire = ctx.clone();
        let label = ctx.tasks.spawn_timer(async move {
            tokio::time::sleep(duration).await;
            fire.announce("⏰ Time's up!", "Time's up!").await;
            Ok(())
        });
        tracing::info!(task = %label, secs, "timer scheduled");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            parse_duration("set timer for 10 seconds").unwrap(),
            Duration::from_secs(10)
        );
        assert_eq!(
            parse_duration("set timer 1second").unwrap(),
            Duration::from_secs(1)
        );
        assert_eq!(
            parse_duration("set timer for 5 seconds and 20 seconds").unwrap(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_parse_duration_requires_seconds() {
        assert!(parse_duration("set timer please").is_err());
        assert!(parse_duration("set timer for 5 minutes").is_err());
    }
}
