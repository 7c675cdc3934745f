//! Room transport adapter contract
//!
//! The coordinator does not implement a transport. It drives one through
//! [`RoomTransport`], whose methods only *issue* requests and return at once;
//! their outcomes arrive later as [`TransportEvent`]s pushed into the
//! session inbox by the adapter, from whatever thread it likes.

use serde::{Deserialize, Serialize};

use crate::error::SessionResult;
use crate::types::{DisconnectCause, ParticipantId, RoomMember, Role};

/// Provider error code for "the room you asked to join no longer exists"
pub const ROOM_DOES_NOT_EXIST_CODE: i32 = 32758;

/// Parameters of a connect request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Authenticated user id; `None` in sandbox mode
    pub user_id: Option<ParticipantId>,
    pub game_version: String,
}

/// Fresh pairing request handed to the matchmaking collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchmakingRequest {
    pub self_id: ParticipantId,
    pub partner_id: Option<ParticipantId>,
    pub role: Role,
}

/// Which room to join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomTarget {
    /// Rejoin a known room, recreating it if it emptied out
    JoinOrCreate(String),
    /// Ask matchmaking to pair us
    Matchmaking(MatchmakingRequest),
    /// Fixed sandbox room
    Sandbox(String),
}

/// Why a room join failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinFailureCode {
    RoomDoesNotExist,
    Other(i32),
}

impl JoinFailureCode {
    /// Map a raw provider code
    pub fn from_code(code: i32) -> Self {
        if code == ROOM_DOES_NOT_EXIST_CODE {
            JoinFailureCode::RoomDoesNotExist
        } else {
            JoinFailureCode::Other(code)
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            JoinFailureCode::RoomDoesNotExist => ROOM_DOES_NOT_EXIST_CODE,
            JoinFailureCode::Other(code) => *code,
        }
    }
}

/// Asynchronous notifications from the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportEvent {
    /// Base connectivity established (not yet in a room)
    ConnectedToHub,
    /// Room join succeeded
    JoinedRoom { room_name: String },
    /// Room join failed
    JoinRoomFailed { code: JoinFailureCode, message: String },
    /// Connection lost or closed
    Disconnected { cause: DisconnectCause },
    /// Current room membership, local participant included
    MembershipChanged { members: Vec<RoomMember> },
    /// Matchmaking put us (a secondary) on hold until the primary shows up
    MatchmakingWaiting { waiting: bool },
    /// Another participant asks us for the current value of a shared object
    SharedStateRequested { key: String, requester: ParticipantId },
    /// The owner answered our request for a shared object
    SharedStateReceived { key: String },
}

/// Room transport primitives consumed by the coordinator
///
/// Calls must not block. An `Err` means the request could not even be
/// issued; the controller logs it and treats it like a failed attempt.
pub trait RoomTransport: Send {
    /// Start connecting to the hub
    fn connect(&mut self, request: &ConnectRequest) -> SessionResult<()>;

    /// Request a room join; requires hub connectivity
    fn join_room(&mut self, target: &RoomTarget) -> SessionResult<()>;

    /// Leave the current room but stay connected to the hub
    fn leave_room(&mut self) -> SessionResult<()>;

    /// Close the connection
    fn disconnect(&mut self) -> SessionResult<()>;

    /// Push anything queued for sending out now
    fn flush_outgoing(&mut self) {}

    /// Whether the transport is completely disconnected (no handshake in progress)
    fn is_fully_disconnected(&self) -> bool;

    /// Whether the transport is connected and able to send
    fn is_connected_and_ready(&self) -> bool;

    /// Ask the owner of a shared object to send us its current value
    fn request_shared_state(&mut self, key: &str, requester: ParticipantId) -> SessionResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_failure_code_mapping() {
        assert_eq!(JoinFailureCode::from_code(32758), JoinFailureCode::RoomDoesNotExist);
        assert_eq!(JoinFailureCode::from_code(32765), JoinFailureCode::Other(32765));
        assert_eq!(JoinFailureCode::RoomDoesNotExist.code(), ROOM_DOES_NOT_EXIST_CODE);
    }
}
