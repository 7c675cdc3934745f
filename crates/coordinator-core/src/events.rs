//! Lifecycle events published by the session controller
//!
//! Events are fanned out over a tokio broadcast channel. Collaborators (scene
//! loader, popup UI, native shell) either subscribe to the stream directly or
//! implement [`SessionEventHandler`] and let [`spawn_event_dispatcher`] drive
//! them.
//!
//! # Usage Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use tandem_coordinator_core::events::{spawn_event_dispatcher, EventEmitter, SessionEvent, SessionEventHandler};
//!
//! struct PopupUi;
//!
//! #[async_trait::async_trait]
//! impl SessionEventHandler for PopupUi {
//!     async fn on_session_event(&self, event: SessionEvent) {
//!         if let SessionEvent::PartnerLost { seconds_remaining } = event {
//!             println!("YOU WILL LEAVE IN 0:{:02}", seconds_remaining);
//!         }
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let emitter = EventEmitter::default();
//! let handle = spawn_event_dispatcher(&emitter, Arc::new(PopupUi));
//! emitter.emit(SessionEvent::PartnerLost { seconds_remaining: 42 });
//! drop(emitter);
//! handle.await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::types::{DisconnectReason, ParticipantId, Position};
use crate::voice::VoiceEvent;

/// Events emitted by the session controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A connect request went out
    SessionConnecting,

    /// The room was joined and the local player created
    SessionJoined {
        /// Name of the joined room
        room_name: String,
        /// Where the local player was spawned
        spawn: Position,
    },

    /// Both players are in the room
    SessionActive,

    /// The partner showed up for the first time
    PartnerArrived {
        /// Where to move the local player
        goto: Position,
    },

    /// Connection lost or closed
    SessionDisconnected {
        /// Why; terminal reasons mean no automatic recovery follows
        reason: DisconnectReason,
    },

    /// Reconnect window opened
    Reconnecting,

    /// Still waiting for the partner's first arrival
    PartnerWaiting {
        /// Waiting has taken long enough to say so
        long_wait: bool,
    },

    /// Partner gone; leaving when the countdown hits zero
    PartnerLost {
        /// Whole seconds left
        seconds_remaining: u32,
    },

    /// Partner returned before the countdown ran out
    PartnerReturned,

    /// Hub reached without a pending room join
    ConnectFailed,

    /// Room join rejected by the transport
    RoomJoinFailed {
        /// Provider error code
        code: i32,
        /// Provider message
        message: String,
    },

    /// Profiles of everybody in the room, local player first
    RosterUpdated {
        /// Serialized profiles
        profiles: Vec<String>,
    },

    /// Explicit leave finished
    SessionLeft,

    /// A peer asks for the current value of a shared object we own
    SharedStateRequested {
        /// Shared object key
        key: String,
        /// Who is asking
        requester: ParticipantId,
    },

    /// Voice channel notification
    Voice(VoiceEvent),
}

impl SessionEvent {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SessionConnecting => "SessionConnecting",
            SessionEvent::SessionJoined { .. } => "SessionJoined",
            SessionEvent::SessionActive => "SessionActive",
            SessionEvent::PartnerArrived { .. } => "PartnerArrived",
            SessionEvent::SessionDisconnected { .. } => "SessionDisconnected",
            SessionEvent::Reconnecting => "Reconnecting",
            SessionEvent::PartnerWaiting { .. } => "PartnerWaiting",
            SessionEvent::PartnerLost { .. } => "PartnerLost",
            SessionEvent::PartnerReturned => "PartnerReturned",
            SessionEvent::ConnectFailed => "ConnectFailed",
            SessionEvent::RoomJoinFailed { .. } => "RoomJoinFailed",
            SessionEvent::RosterUpdated { .. } => "RosterUpdated",
            SessionEvent::SessionLeft => "SessionLeft",
            SessionEvent::SharedStateRequested { .. } => "SharedStateRequested",
            SessionEvent::Voice(_) => "Voice",
        }
    }
}

/// Event stream type
pub type EventStream = BroadcastStream<SessionEvent>;

/// Broadcast fan-out for session events
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventEmitter {
    /// Create a new event emitter with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event
    pub fn emit(&self, event: SessionEvent) {
        debug!(event = event.name(), "Session event");
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe as a stream
    pub fn subscribe(&self) -> EventStream {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Subscribe as a raw receiver (handy for `try_recv` in tests)
    pub fn subscribe_receiver(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Receiver side for collaborators that prefer callbacks over a stream
#[async_trait::async_trait]
pub trait SessionEventHandler: Send + Sync {
    /// Handle one event
    async fn on_session_event(&self, event: SessionEvent);

    /// The handler fell behind and `skipped` events were dropped
    async fn on_lagged(&self, skipped: u64) {
        warn!(skipped, "Session event handler lagged");
    }
}

/// Forward every event from `emitter` to `handler` until all emitters are dropped
pub fn spawn_event_dispatcher(emitter: &EventEmitter, handler: Arc<dyn SessionEventHandler>) -> JoinHandle<()> {
    let mut stream = emitter.subscribe();
    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => handler.on_session_event(event).await,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => handler.on_lagged(skipped).await,
            }
        }
        debug!("Session event dispatcher finished");
    })
}
