//! Voice channel coordination
//!
//! - [`provider`]: the voice provider contract and its inputs/outputs
//! - [`talking`]: talking edge synthesis from volume reports
//! - [`coordinator`]: channel lifecycle with its own retry loop

pub mod coordinator;
pub mod provider;
pub mod talking;

pub use coordinator::VoiceChannelCoordinator;
pub use provider::{VoiceConnectionState, VoiceEvent, VoiceInput, VoiceProvider, VolumeSample};
pub use talking::TalkingDetector;
