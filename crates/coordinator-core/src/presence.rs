//! Partner presence monitoring
//!
//! Two timed conditions share one presence signal ("is the partner's player
//! entity currently resolvable in the room"):
//!
//! - **First-arrival wait**: until the partner is seen for the first time the
//!   monitor accumulates a wait timer and reports a short or long waiting
//!   notice. Once resolved it stays resolved for the lifetime of the monitor.
//! - **Partner lost**: after the partner has arrived at least once, an absent
//!   partner starts a countdown. Presence returning resets it; running out
//!   asks the controller to force a disconnect.
//!
//! The two are mutually exclusive in time. "Has the partner ever arrived" is
//! tracked as its own flag rather than inferred from the wait state.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{ReentryPolicy, SessionConfig};

/// Snapshot of everything the monitor looks at in one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceInputs {
    /// Partner entity currently resolvable
    pub partner_present: bool,
    /// Local player entity exists in the room
    pub initialized: bool,
    /// Session was force-disconnected (inactivity or partner loss)
    pub suppressed: bool,
    /// Non-primary peer held by matchmaking until the primary arrives
    pub waiting_for_friend: bool,
    /// Transport connected and able to send
    pub connected_and_ready: bool,
}

/// Something the controller must react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceOutcome {
    /// Partner seen for the first time while the first wait was pending
    FirstArrival,
    /// Waiting notice changed
    Waiting { long_wait: bool },
    /// Countdown changed
    Lost { seconds_remaining: u32 },
    /// Partner came back before the countdown ran out
    Returned,
    /// Countdown ran out; disconnect and do not reconnect
    ForceDisconnect,
}

/// Tracks the partner's presence across ticks
#[derive(Debug, Clone)]
pub struct PartnerPresenceMonitor {
    partner_taking_long_time: Duration,
    partner_disconnect_time: Duration,

    first_wait_pending: bool,
    ever_arrived: bool,
    wait_timer: Duration,
    wait_notice: Option<bool>,

    lost_active: bool,
    lost_timer: Duration,
    lost_notice: Option<u32>,

    /// Partner-loss countdown disabled (debugging)
    countdown_disabled: bool,
}

impl PartnerPresenceMonitor {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            partner_taking_long_time: config.partner_taking_long_time(),
            partner_disconnect_time: config.partner_disconnect_time(),
            first_wait_pending: true,
            ever_arrived: false,
            wait_timer: Duration::ZERO,
            wait_notice: None,
            lost_active: false,
            lost_timer: Duration::ZERO,
            lost_notice: None,
            countdown_disabled: config.disable_partner_disconnect,
        }
    }

    /// Whether the one-shot first-arrival wait is still unresolved
    pub fn is_first_wait_pending(&self) -> bool {
        self.first_wait_pending
    }

    pub fn ever_arrived(&self) -> bool {
        self.ever_arrived
    }

    pub fn is_partner_lost(&self) -> bool {
        self.lost_active
    }

    pub fn wait_elapsed(&self) -> Duration {
        self.wait_timer
    }

    pub fn lost_elapsed(&self) -> Duration {
        self.lost_timer
    }

    /// Debug override: resolve the first wait now and never count down
    pub fn skip_partner_wait(&mut self) {
        info!("Partner wait skipped by debug override");
        self.first_wait_pending = false;
        self.countdown_disabled = true;
        self.clear_countdown();
    }

    /// The session was force-disconnected; the first wait must not come back
    /// on its own
    pub fn on_forced_disconnect(&mut self) {
        self.first_wait_pending = false;
        self.clear_countdown();
    }

    /// Prepare for an explicit re-entry after a forced disconnect
    pub fn on_reentry(&mut self, policy: ReentryPolicy) {
        self.clear_countdown();
        match policy {
            ReentryPolicy::SkipPartnerWait => {
                debug!(ever_arrived = self.ever_arrived, "Re-entry keeps earlier arrival");
            }
            ReentryPolicy::RearmPartnerWait => {
                debug!("Re-entry rearms the first-arrival wait");
                self.ever_arrived = false;
                self.first_wait_pending = true;
                self.wait_timer = Duration::ZERO;
                self.wait_notice = None;
            }
        }
    }

    fn clear_countdown(&mut self) {
        self.lost_active = false;
        self.lost_timer = Duration::ZERO;
        self.lost_notice = None;
    }

    /// Advance both conditions by one tick
    pub fn tick(&mut self, inputs: PresenceInputs, dt: Duration) -> Vec<PresenceOutcome> {
        let mut outcomes = Vec::new();

        if inputs.partner_present && !self.ever_arrived && inputs.initialized {
            self.ever_arrived = true;
        }

        self.tick_first_wait(inputs, dt, &mut outcomes);
        self.tick_lost(inputs, dt, &mut outcomes);

        outcomes
    }

    fn tick_first_wait(&mut self, inputs: PresenceInputs, dt: Duration, outcomes: &mut Vec<PresenceOutcome>) {
        let mut show_wait = false;

        if inputs.initialized && !inputs.suppressed && self.first_wait_pending {
            if inputs.partner_present {
                info!(waited = ?self.wait_timer, "Partner arrived");
                self.first_wait_pending = false;
                self.wait_notice = None;
                outcomes.push(PresenceOutcome::FirstArrival);
            } else {
                show_wait = true;
            }
        }

        // Secondary held by matchmaking: nothing in the room yet, still waiting
        if inputs.waiting_for_friend
            && !inputs.suppressed
            && self.first_wait_pending
            && inputs.connected_and_ready
        {
            show_wait = true;
        }

        if !show_wait {
            return;
        }

        self.wait_timer += dt;
        let long_wait = self.wait_timer >= self.partner_taking_long_time;
        if self.wait_notice != Some(long_wait) {
            self.wait_notice = Some(long_wait);
            outcomes.push(PresenceOutcome::Waiting { long_wait });
        }
    }

    fn tick_lost(&mut self, inputs: PresenceInputs, dt: Duration, outcomes: &mut Vec<PresenceOutcome>) {
        if self.ever_arrived && !self.countdown_disabled && !inputs.partner_present {
            // Outside a live room the countdown holds its value
            if !inputs.initialized || inputs.suppressed {
                return;
            }

            if !self.lost_active {
                warn!("Partner lost, starting countdown");
                self.lost_active = true;
            }

            self.lost_timer += dt;
            if self.lost_timer >= self.partner_disconnect_time {
                warn!(elapsed = ?self.lost_timer, "Partner did not return in time");
                self.first_wait_pending = false;
                self.clear_countdown();
                outcomes.push(PresenceOutcome::ForceDisconnect);
                return;
            }

            let seconds_remaining = self
                .partner_disconnect_time
                .saturating_sub(self.lost_timer)
                .as_secs() as u32;
            if self.lost_notice != Some(seconds_remaining) {
                self.lost_notice = Some(seconds_remaining);
                outcomes.push(PresenceOutcome::Lost { seconds_remaining });
            }
        } else if self.lost_active {
            info!(after = ?self.lost_timer, "Partner returned");
            self.clear_countdown();
            outcomes.push(PresenceOutcome::Returned);
        }
    }
}
