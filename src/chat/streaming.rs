// Reply phase state machine for the chat thread
//
// Tracks where the assistant's reply to the in-flight message is, so the
// composer can be disabled and the typing indicator shown at the right time.
//
// State Diagram:
//
//   [Idle] ──submit──▶ [Awaiting] ──first delta──▶ [Receiving]
//     ▲                    │                            │
//     │                    │ completed / failed         │ completed / failed
//     └────────────────────┴────────────────────────────┘
//
// "Awaiting" is the only phase that shows the three-dot indicator; once text
// arrives the growing AI bubble is the indicator.

/// Where the current reply is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyPhase {
    #[default]
    Idle,
    /// Message submitted, no reply text yet
    Awaiting,
    /// Reply text is streaming in
    Receiving,
}

impl ReplyPhase {
    /// A send is in flight
    pub fn is_streaming(self) -> bool {
        self != ReplyPhase::Idle
    }

    /// Show the typing indicator in place of the next AI bubble
    pub fn shows_typing(self) -> bool {
        self == ReplyPhase::Awaiting
    }
}

/// State machine for the reply phase
///
/// Each method is an event that may trigger a transition.
#[derive(Debug, Default, Clone)]
pub struct ReplyStateMachine {
    phase: ReplyPhase,
}

impl ReplyStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ReplyPhase {
        self.phase
    }

    /// User submitted a message
    pub fn on_submit(&mut self) {
        self.phase = ReplyPhase::Awaiting;
    }

    /// Reply text arrived
    ///
    /// Deltas without a submit (a stray event after a reset) are ignored.
    pub fn on_delta(&mut self) {
        if self.phase == ReplyPhase::Awaiting {
            self.phase = ReplyPhase::Receiving;
        }
    }

    /// Reply finished, successfully or not
    pub fn on_finished(&mut self) {
        self.phase = ReplyPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_phase_is_idle() {
        let sm = ReplyStateMachine::new();
        assert_eq!(sm.phase(), ReplyPhase::Idle);
        assert!(!sm.phase().is_streaming());
    }

    #[test]
    fn test_full_reply_flow() {
        let mut sm = ReplyStateMachine::new();
        sm.on_submit();
        assert_eq!(sm.phase(), ReplyPhase::Awaiting);
        assert!(sm.phase().shows_typing());

        sm.on_delta();
        assert_eq!(sm.phase(), ReplyPhase::Receiving);
        assert!(sm.phase().is_streaming());
        assert!(!sm.phase().shows_typing());

        sm.on_delta();
        assert_eq!(sm.phase(), ReplyPhase::Receiving);

        sm.on_finished();
        assert_eq!(sm.phase(), ReplyPhase::Idle);
    }

    #[test]
    fn test_failure_before_any_text() {
        let mut sm = ReplyStateMachine::new();
        sm.on_submit();
        sm.on_finished();
        assert_eq!(sm.phase(), ReplyPhase::Idle);
    }

    #[test]
    fn test_stray_delta_does_not_start_streaming() {
        let mut sm = ReplyStateMachine::new();
        sm.on_delta();
        assert_eq!(sm.phase(), ReplyPhase::Idle);
    }
}
