//! Voice provider contract and the values crossing it

use serde::{Deserialize, Serialize};

use crate::error::SessionResult;
use crate::types::VoiceUid;

/// Connection state as reported by the voice provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VoiceConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

/// One entry of a volume report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSample {
    /// Speaker; `0` stands for the local user
    pub uid: VoiceUid,
    /// 0-255
    pub volume: u8,
}

impl VolumeSample {
    pub fn new(uid: VoiceUid, volume: u8) -> Self {
        Self { uid, volume }
    }
}

/// Asynchronous notifications from the voice provider
///
/// Silent participants produce no volume sample at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceInput {
    /// Periodic volume report
    VolumeReport(Vec<VolumeSample>),
    /// A remote participant muted or unmuted
    MuteStateChanged { uid: VoiceUid, muted: bool },
    /// The local audio stream started or stopped publishing
    LocalPublishStateChanged { publishing: bool },
    /// Channel join succeeded with the given local uid
    JoinedChannel { channel: String, uid: VoiceUid },
    /// Provider error
    Error { code: i32, message: String },
}

/// Voice notifications surfaced to collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceEvent {
    StartedTalking { uid: VoiceUid },
    StoppedTalking { uid: VoiceUid },
    Muted { uid: VoiceUid },
    Unmuted { uid: VoiceUid },
    JoinedChannel { channel: String, uid: VoiceUid },
    /// Provider reported an error; the coordinator keeps retrying on its own
    ConnectFailed { code: i32, message: String },
}

/// Voice primitives consumed by the coordinator
pub trait VoiceProvider: Send {
    /// Request a channel join; `None` lets the provider pick the uid
    fn join_channel(&mut self, channel: &str, local_id: Option<VoiceUid>) -> SessionResult<()>;

    fn leave_channel(&mut self) -> SessionResult<()>;

    fn connection_state(&self) -> VoiceConnectionState;

    /// Stop or resume publishing the local audio stream
    fn mute_local(&mut self, muted: bool) -> SessionResult<()>;
}
