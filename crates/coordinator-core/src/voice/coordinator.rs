//! Voice channel lifecycle
//!
//! The coordinator keeps a secondary audio connection in step with the
//! session. It owns its own retry loop: once a channel has been connected,
//! a drop is retried every `disconnect_retry_interval` regardless of what the
//! room connection is doing. A channel that never connected is never retried.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::provider::{VoiceConnectionState, VoiceEvent, VoiceInput, VoiceProvider};
use super::talking::TalkingDetector;
use crate::config::VoiceConfig;
use crate::types::VoiceUid;

pub struct VoiceChannelCoordinator<V: VoiceProvider> {
    provider: V,
    retry_interval: Duration,
    /// Uid we ask the provider to join with
    local_uid: VoiceUid,
    /// Let the provider choose the uid on rejoin
    provider_assigned_uid: bool,

    /// Join requested but not executed yet; last request wins
    pending_join: Option<String>,
    target_channel: Option<String>,
    was_connected: bool,
    retry_cooldown: Duration,
    retry_attempts: u32,

    /// Uid the provider confirmed on join
    joined_uid: Option<VoiceUid>,
    muted: bool,
    talking: TalkingDetector,
}

impl<V: VoiceProvider> VoiceChannelCoordinator<V> {
    pub fn new(provider: V, config: &VoiceConfig, local_uid: VoiceUid) -> Self {
        Self {
            provider,
            retry_interval: config.disconnect_retry_interval(),
            local_uid,
            provider_assigned_uid: false,
            pending_join: None,
            target_channel: None,
            was_connected: false,
            retry_cooldown: Duration::ZERO,
            retry_attempts: 0,
            joined_uid: None,
            muted: false,
            talking: TalkingDetector::new(config.talk_volume_threshold, config.assume_not_talking_time()),
        }
    }

    /// Rejoin without a fixed uid; used when the local id is not trustworthy
    /// (sandbox sessions)
    pub fn with_provider_assigned_uid(mut self, enabled: bool) -> Self {
        self.provider_assigned_uid = enabled;
        self
    }

    pub fn provider(&self) -> &V {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut V {
        &mut self.provider
    }

    pub fn target_channel(&self) -> Option<&str> {
        self.target_channel.as_deref()
    }

    pub fn pending_join(&self) -> Option<&str> {
        self.pending_join.as_deref()
    }

    pub fn was_connected(&self) -> bool {
        self.was_connected
    }

    pub fn is_connected(&self) -> bool {
        self.provider.connection_state() == VoiceConnectionState::Connected
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// Uid used for the local participant in reports
    pub fn local_uid(&self) -> VoiceUid {
        self.joined_uid.unwrap_or(self.local_uid)
    }

    /// Queue a join for the next tick
    pub fn join_channel(&mut self, channel: impl Into<String>) {
        let channel = channel.into();
        debug!(%channel, "Voice join queued");
        self.pending_join = Some(channel);
    }

    /// Drop a queued join that has not run yet
    pub fn cancel_pending_join(&mut self) {
        if let Some(channel) = self.pending_join.take() {
            debug!(%channel, "Queued voice join cancelled");
        }
    }

    /// Leave the channel and forget it
    pub fn leave_channel(&mut self) {
        let had_target = self.target_channel.take().is_some();
        self.pending_join = None;
        self.was_connected = false;
        if had_target || self.provider.connection_state() != VoiceConnectionState::Disconnected {
            info!("Leaving voice channel");
            if let Err(e) = self.provider.leave_channel() {
                warn!(error = %e, "Voice leave failed");
            }
        }
        self.joined_uid = None;
        self.talking.reset();
    }

    /// Leave the channel but keep it as the target; no automatic retry
    pub fn disconnect_without_retry(&mut self) {
        self.pending_join = None;
        self.was_connected = false;
        if self.provider.connection_state() != VoiceConnectionState::Disconnected {
            info!("Disconnecting voice without retry");
            if let Err(e) = self.provider.leave_channel() {
                warn!(error = %e, "Voice leave failed");
            }
        }
        self.talking.reset();
    }

    /// Retry on the next tick if the channel is down
    pub fn reconnect_now(&mut self) {
        self.retry_cooldown = Duration::ZERO;
        self.was_connected = true;
    }

    pub fn set_muted(&mut self, muted: bool) {
        if let Err(e) = self.provider.mute_local(muted) {
            warn!(error = %e, muted, "Voice mute failed");
        }
    }

    /// Apply a provider notification
    pub fn handle_input(&mut self, input: VoiceInput) -> Vec<VoiceEvent> {
        match input {
            VoiceInput::VolumeReport(samples) => {
                let local = self.local_uid();
                self.talking.on_report(&samples, local)
            }
            VoiceInput::MuteStateChanged { uid, muted } => {
                vec![if muted {
                    VoiceEvent::Muted { uid }
                } else {
                    VoiceEvent::Unmuted { uid }
                }]
            }
            VoiceInput::LocalPublishStateChanged { publishing } => {
                self.muted = !publishing;
                let uid = self.local_uid();
                vec![if publishing {
                    VoiceEvent::Unmuted { uid }
                } else {
                    VoiceEvent::Muted { uid }
                }]
            }
            VoiceInput::JoinedChannel { channel, uid } => {
                info!(%channel, uid, "Joined voice channel");
                self.joined_uid = Some(uid);
                self.muted = false;
                vec![VoiceEvent::JoinedChannel { channel, uid }]
            }
            VoiceInput::Error { code, message } => {
                warn!(code, %message, "Voice provider error");
                vec![VoiceEvent::ConnectFailed { code, message }]
            }
        }
    }

    /// Run the queued join, the retry check and talker aging
    pub fn tick(&mut self, dt: Duration) -> Vec<VoiceEvent> {
        if let Some(channel) = self.pending_join.take() {
            info!(%channel, uid = self.local_uid, "Joining voice channel");
            self.was_connected = false;
            self.retry_cooldown = Duration::ZERO;
            self.muted = false;
            if let Err(e) = self.provider.join_channel(&channel, Some(self.local_uid)) {
                warn!(error = %e, %channel, "Voice join failed");
            }
            self.target_channel = Some(channel);
        }

        let connected = self.is_connected();
        if connected {
            self.was_connected = true;
        }

        self.retry_cooldown = self.retry_cooldown.saturating_sub(dt);

        if self.was_connected && !connected && self.retry_cooldown.is_zero() {
            if let Some(channel) = self.target_channel.as_deref() {
                self.retry_attempts += 1;
                info!(%channel, attempt = self.retry_attempts, "Voice dropped, rejoining");
                let uid = if self.provider_assigned_uid { None } else { Some(self.local_uid) };
                if let Err(e) = self.provider.join_channel(channel, uid) {
                    warn!(error = %e, %channel, "Voice rejoin failed");
                }
                self.retry_cooldown = self.retry_interval;
            }
        }

        self.talking.tick(dt)
    }
}
