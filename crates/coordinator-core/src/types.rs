//! Core type definitions shared across the coordinator

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque participant identifier issued by the party service
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier used by the voice provider; `0` in volume reports means "local user"
pub type VoiceUid = u32;

/// Position of the local player entity in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Connection state of the session
///
/// Exactly one value at a time; the controller is the only writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected and not trying to
    Disconnected,
    /// A transport connect is in flight
    Connecting,
    /// Connection dropped; the reconnect scheduler is running
    Reconnecting,
    /// Hub reached, room join requested
    JoiningRoom,
    /// In the room, player entity created
    Joined,
    /// In the room, partner has not arrived yet
    WaitingForPartner,
    /// In the room with the partner present
    Active,
    /// Partner was here and is gone; countdown running
    PartnerLost,
    /// Explicit leave requested, waiting for the transport to confirm
    LeavingByChoice,
    /// Session finished by choice
    Left,
}

impl ConnectionState {
    /// States in which the local player is inside a room
    pub fn is_in_room(&self) -> bool {
        matches!(
            self,
            ConnectionState::Joined
                | ConnectionState::WaitingForPartner
                | ConnectionState::Active
                | ConnectionState::PartnerLost
        )
    }

    /// States from which no transition leads anywhere without user action
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Left)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Reconnecting => "Reconnecting",
            ConnectionState::JoiningRoom => "JoiningRoom",
            ConnectionState::Joined => "Joined",
            ConnectionState::WaitingForPartner => "WaitingForPartner",
            ConnectionState::Active => "Active",
            ConnectionState::PartnerLost => "PartnerLost",
            ConnectionState::LeavingByChoice => "LeavingByChoice",
            ConnectionState::Left => "Left",
        };
        write!(f, "{}", name)
    }
}

/// Role of the local peer within the pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Creates the room and drives reconnection
    Primary,
    /// Waits for the primary and reconnects passively
    Secondary,
}

/// Why the transport reported a disconnect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectCause {
    /// We asked for it
    ClientRequested,
    /// Server closed the connection
    ServerClosed,
    /// Network dropped or timed out
    NetworkLost,
    /// Initial connect did not succeed
    ConnectFailed,
    /// Anything else the transport reports
    Other(String),
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectCause::ClientRequested => write!(f, "client requested"),
            DisconnectCause::ServerClosed => write!(f, "server closed"),
            DisconnectCause::NetworkLost => write!(f, "network lost"),
            DisconnectCause::ConnectFailed => write!(f, "connect failed"),
            DisconnectCause::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// Why a forced disconnect must not be followed by automatic reconnection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuppressReason {
    /// App stayed in the background too long
    Inactivity,
    /// Partner did not come back in time
    PartnerLoss,
}

/// Reason reported with `SessionEvent::SessionDisconnected`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Transient drop; reconnection follows
    Transport(DisconnectCause),
    /// Reconnect window ran out
    ReconnectExhausted,
    /// Inactivity disconnect
    Inactivity,
    /// Partner loss disconnect
    PartnerLoss,
}

impl DisconnectReason {
    /// Whether the session will not recover on its own
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DisconnectReason::Transport(_))
    }
}

impl From<SuppressReason> for DisconnectReason {
    fn from(reason: SuppressReason) -> Self {
        match reason {
            SuppressReason::Inactivity => DisconnectReason::Inactivity,
            SuppressReason::PartnerLoss => DisconnectReason::PartnerLoss,
        }
    }
}

/// One participant in the transport's membership view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMember {
    pub id: ParticipantId,
    /// Serialized profile the participant published, if any
    pub profile: Option<String>,
}

impl RoomMember {
    pub fn new(id: ParticipantId) -> Self {
        Self { id, profile: None }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }
}
