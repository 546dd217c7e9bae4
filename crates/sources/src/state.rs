//! Receiver lifecycle state machine
//!
//! `NEW → STARTING → RUNNING → STOPPING → STOPPED`, with `DESTROYED` as the
//! absorbing failure state once the restart budget is spent. A receiver that
//! was never started stops cleanly to `STOPPED`, never `DESTROYED`.

use std::fmt;

/// Receiver lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    New,
    Starting,
    Running,
    Stopping,
    Stopped,
    /// Absorbing: entered only when the restart budget is exhausted
    Destroyed,
}

impl ReceiverState {
    /// Whether a transition to `next` is legal
    pub fn can_transition_to(&self, next: ReceiverState) -> bool {
        use ReceiverState::*;
        match (self, next) {
            // Destroyed absorbs everything
            (Destroyed, _) => false,
            (_, Destroyed) => true,
            (New, Starting) | (New, Stopped) => true,
            (Starting, Running) | (Starting, Stopping) | (Starting, Stopped) => true,
            (Running, Stopping) => true,
            (Stopping, Stopped) => true,
            // Restart path
            (Stopped, Starting) => true,
            _ => false,
        }
    }

    /// Whether the receiver is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Destroyed)
    }
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "NEW",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Destroyed => "DESTROYED",
        };
        f.write_str(name)
    }
}
