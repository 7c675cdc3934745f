//! # Tandem Coordinator Core
//!
//! Session connectivity and partner-presence coordination for two-party
//! realtime rooms. The crate sits above a room transport (connect, join,
//! leave, disconnect, membership events) and a voice provider, and decides:
//!
//! - who the partner is and which peer is primary, without negotiation
//! - when to reconnect after a drop, and when to give up
//! - how long to wait for the partner, and when an absent partner ends the session
//! - when a backgrounded app has been away too long
//! - how the voice channel follows the session and recovers on its own
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tandem_coordinator_core::prelude::*;
//!
//! async fn run_session<T, V>(transport: T, voice: V) -> Result<(), Box<dyn std::error::Error>>
//! where
//!     T: RoomTransport + 'static,
//!     V: VoiceProvider + 'static,
//! {
//!     let identity = PairingIdentity::new(ParticipantId(123), "123:456");
//!
//!     let mut controller = SessionController::new(SessionConfig::default(), identity, transport, voice)?;
//!     let mut events = controller.subscribe_receiver();
//!     controller.enter()?;
//!
//!     let (handle, shutdown) = SessionRunner::new(controller).spawn();
//!     while let Ok(event) = events.recv().await {
//!         if let SessionEvent::SessionActive = event {
//!             break;
//!         }
//!     }
//!
//!     tokio::time::sleep(Duration::from_secs(30)).await;
//!     shutdown.shutdown();
//!     handle.await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Adapters push [`TransportEvent`]s, [`VoiceInput`]s and focus changes into
//! a [`SessionInbox`]; the [`SessionController`] drains it once per tick and
//! runs its components in a fixed order. Lifecycle notifications go out as
//! [`SessionEvent`]s over a broadcast [`EventEmitter`].

pub mod activity;
pub mod config;
pub mod error;
pub mod events;
pub mod inbox;
pub mod logging;
pub mod pairing;
pub mod persistence;
pub mod presence;
pub mod reconnect;
pub mod session;
pub mod state_sync;
pub mod transport;
pub mod types;
pub mod voice;

// Re-export main types
pub use config::{ReentryPolicy, SessionConfig, VoiceConfig};
pub use error::{SessionError, SessionResult};
pub use events::{spawn_event_dispatcher, EventEmitter, EventStream, SessionEvent, SessionEventHandler};
pub use inbox::{SessionInbox, SessionInput};
pub use pairing::{Pairing, PairingIdentity};
pub use persistence::{JsonFileStore, MemoryStore, PersistedState, SessionStore};
pub use session::{SessionController, SessionRunner, ShutdownHandle};
pub use transport::{ConnectRequest, JoinFailureCode, RoomTarget, RoomTransport, TransportEvent};
pub use types::{ConnectionState, DisconnectCause, DisconnectReason, ParticipantId, Position, Role, RoomMember};
pub use voice::{VoiceChannelCoordinator, VoiceEvent, VoiceInput, VoiceProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::config::{ReentryPolicy, SessionConfig, VoiceConfig};
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::events::{EventEmitter, SessionEvent, SessionEventHandler};
    pub use crate::inbox::{SessionInbox, SessionInput};
    pub use crate::pairing::PairingIdentity;
    pub use crate::session::{SessionController, SessionRunner};
    pub use crate::transport::{RoomTransport, TransportEvent};
    pub use crate::types::{ConnectionState, DisconnectCause, ParticipantId, Position, RoomMember};
    pub use crate::voice::{VoiceInput, VoiceProvider};
}
