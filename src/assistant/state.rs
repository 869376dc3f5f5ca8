//! Listener state machine

use std::fmt;

/// Where the listener is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No audio stream held
    #[default]
    Idle,
    /// Stream acquired and calibrated, waiting for the trigger phrase
    WakeWordArmed,
    /// A conversation is running
    InConversation,
}

/// What moved the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Stream opened and calibrated
    Armed,
    /// Trigger phrase heard
    Triggered,
    /// Conversation ended (farewell or abort)
    Ended,
    /// Audio device failed
    DeviceLost,
}

impl SessionState {
    /// Next state for `transition`, or `None` if it is not allowed here
    #[must_use]
    pub const fn transition(self, transition: Transition) -> Option<Self> {
        match (self, transition) {
            (Self::Idle, Transition::Armed) => Some(Self::WakeWordArmed),
            (Self::WakeWordArmed, Transition::Triggered) => Some(Self::InConversation),
            (Self::InConversation, Transition::Ended) => Some(Self::Idle),
            (_, Transition::DeviceLost) => Some(Self::Idle),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::WakeWordArmed => "wake-word-armed",
            Self::InConversation => "in-conversation",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = SessionState::Idle;
        let state = state.transition(Transition::Armed).unwrap();
        assert_eq!(state, SessionState::WakeWordArmed);
        let state = state.transition(Transition::Triggered).unwrap();
        assert_eq!(state, SessionState::InConversation);
        let state = state.transition(Transition::Ended).unwrap();
        assert_eq!(state, SessionState::Idle);
    }

    #[test]
    fn test_device_loss_from_anywhere() {
        for state in [
            SessionState::Idle,
            SessionState::WakeWordArmed,
            SessionState::InConversation,
        ] {
            assert_eq!(
                state.transition(Transition::DeviceLost),
                Some(SessionState::Idle)
            );
        }
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        assert_eq!(SessionState::Idle.transition(Transition::Triggered), None);
        assert_eq!(SessionState::Idle.transition(Transition::Ended), None);
        assert_eq!(
            SessionState::InConversation.transition(Transition::Armed),
            None
        );
        assert_eq!(
            SessionState::WakeWordArmed.transition(Transition::Ended),
            None
        );
    }
}
