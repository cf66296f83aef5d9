use serde::{Deserialize, Serialize};

use crate::driver::Interest;

/// Progress of the event-driven exchange on one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProtocolState {
    /// Not running, no interest registered
    #[default]
    Idle,
    /// Waiting for the line to accept the request marker
    AwaitingWriteReady,
    /// Request sent, waiting for the response marker
    AwaitingResponseByte,
    /// Marker matched; `received` payload bytes collected so far (always below 20)
    AwaitingPayload { received: usize },
}

impl ProtocolState {
    /// Check if the machine is parked
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if an exchange cycle is in progress
    pub fn is_running(&self) -> bool {
        !self.is_idle()
    }

    /// Payload bytes collected in the current exchange
    pub fn cursor(&self) -> usize {
        match self {
            Self::AwaitingPayload { received } => *received,
            _ => 0,
        }
    }

    /// Readiness this state is waiting for
    pub fn interest(&self) -> Option<Interest> {
        match self {
            Self::Idle => None,
            Self::AwaitingWriteReady => Some(Interest::Writable),
            Self::AwaitingResponseByte | Self::AwaitingPayload { .. } => Some(Interest::Readable),
        }
    }
}
