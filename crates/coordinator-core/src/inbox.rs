//! Session inbox
//!
//! Adapters never touch session state. They hold a cloneable [`SessionInbox`]
//! and enqueue [`SessionInput`]s from whatever thread their callbacks run on;
//! the controller drains the queue at the start of its next tick.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::trace;

use crate::transport::TransportEvent;
use crate::voice::VoiceInput;

/// Everything that can reach the controller from outside a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    Transport(TransportEvent),
    Voice(VoiceInput),
    /// App focus changed at the given wall-clock time
    Focus { focused: bool, at: DateTime<Utc> },
}

/// Sending half handed to adapters
#[derive(Debug, Clone)]
pub struct SessionInbox {
    sender: mpsc::UnboundedSender<SessionInput>,
}

impl SessionInbox {
    /// Create an inbox and the receiver the controller drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionInput>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Enqueue an input; returns `false` if the session is gone
    pub fn push(&self, input: SessionInput) -> bool {
        trace!(?input, "Session input queued");
        self.sender.send(input).is_ok()
    }

    pub fn transport(&self, event: TransportEvent) -> bool {
        self.push(SessionInput::Transport(event))
    }

    pub fn voice(&self, input: VoiceInput) -> bool {
        self.push(SessionInput::Voice(input))
    }

    /// Report a focus change stamped with the current time
    pub fn focus(&self, focused: bool) -> bool {
        self.push(SessionInput::Focus { focused, at: Utc::now() })
    }

    pub fn focus_at(&self, focused: bool, at: DateTime<Utc>) -> bool {
        self.push(SessionInput::Focus { focused, at })
    }

    /// Whether the controller side has been dropped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
