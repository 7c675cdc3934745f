//! Session and voice configuration
//!
//! All tuning values are expressed in seconds (or milliseconds where the voice
//! provider thinks in milliseconds) so configuration files stay readable.
//! `Duration` accessors are provided for the code that consumes them.
//!
//! # Usage Examples
//!
//! ```rust
//! use tandem_coordinator_core::config::{ReentryPolicy, SessionConfig};
//!
//! let config = SessionConfig::new()
//!     .with_reconnect_window(65.0, 10.0, 1.0)
//!     .with_partner_disconnect_time(30.0)
//!     .with_reentry_policy(ReentryPolicy::RearmPartnerWait);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.partner_disconnect_time().as_secs(), 30);
//! ```
//!
//! ```rust
//! use tandem_coordinator_core::config::SessionConfig;
//!
//! let config = SessionConfig::from_toml_str(r#"
//!     reconnect_time_secs = 30.0
//!     [voice]
//!     talk_volume_threshold = 40
//! "#).unwrap();
//!
//! assert_eq!(config.reconnect_time_secs, 30.0);
//! assert_eq!(config.voice.talk_volume_threshold, 40);
//! // Unspecified values keep their defaults
//! assert_eq!(config.reconnect_interval_secs, 10.0);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};
use crate::types::Position;

/// How a session re-entered after a partner-loss disconnect treats the
/// first-arrival wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReentryPolicy {
    /// The partner already arrived once; an absent partner after re-entry
    /// starts the partner-lost countdown straight away.
    SkipPartnerWait,
    /// Forget the earlier arrival and run the waiting notices again.
    RearmPartnerWait,
}

impl Default for ReentryPolicy {
    fn default() -> Self {
        ReentryPolicy::SkipPartnerWait
    }
}

/// Top-level coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Client build version passed to the transport on connect
    pub game_version: String,
    /// Room used in sandbox mode instead of matchmaking
    pub sandbox_room_name: String,
    /// Fixed tick rate driving the controller
    pub tick_rate_hz: u32,

    /// Give up reconnecting after this long
    pub reconnect_time_secs: f64,
    /// Time between reconnect attempts
    pub reconnect_interval_secs: f64,
    /// Delay before the first reconnect attempt
    pub initial_reconnect_delay_secs: f64,

    /// Disconnect if the app stayed in the background this long
    pub max_backgrounded_time_secs: f64,
    /// Countdown before leaving because the partner is gone
    pub partner_disconnect_time_secs: f64,
    /// Switch to the long-wait notice after this long
    pub partner_taking_long_time_secs: f64,

    /// Keep playing when the partner disappears (debugging only)
    pub disable_partner_disconnect: bool,
    /// Behavior of the first-arrival wait after re-entry
    pub reentry_policy: ReentryPolicy,

    /// Where the player waits until the partner first arrives
    pub limbo_point: Position,
    /// Spawn point when no earlier position is known
    pub starting_spawn_point: Position,
    /// Where the player is moved once the partner first arrives
    pub partner_arrival_point: Position,

    /// Minimum time between two shared-state requests for the same object
    pub state_request_resend_secs: f64,

    /// Voice channel settings
    pub voice: VoiceConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game_version: "1".to_string(),
            sandbox_room_name: "SANDBOX".to_string(),
            tick_rate_hz: 50,
            reconnect_time_secs: 65.0,
            reconnect_interval_secs: 10.0,
            initial_reconnect_delay_secs: 1.0,
            max_backgrounded_time_secs: 60.0,
            partner_disconnect_time_secs: 60.9,
            partner_taking_long_time_secs: 60.0,
            disable_partner_disconnect: false,
            reentry_policy: ReentryPolicy::default(),
            limbo_point: Position::new(0.0, -100.0, 0.0),
            starting_spawn_point: Position::default(),
            partner_arrival_point: Position::default(),
            state_request_resend_secs: 0.5,
            voice: VoiceConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML; missing keys keep their defaults
    pub fn from_toml_str(input: &str) -> SessionResult<Self> {
        let config: SessionConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_toml_file(path: impl AsRef<Path>) -> SessionResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Set the reconnect window: total time, interval and initial delay (seconds)
    pub fn with_reconnect_window(mut self, total: f64, interval: f64, initial_delay: f64) -> Self {
        self.reconnect_time_secs = total;
        self.reconnect_interval_secs = interval;
        self.initial_reconnect_delay_secs = initial_delay;
        self
    }

    /// Set the background time limit (seconds)
    pub fn with_max_backgrounded_time(mut self, secs: f64) -> Self {
        self.max_backgrounded_time_secs = secs;
        self
    }

    /// Set the partner-lost countdown (seconds)
    pub fn with_partner_disconnect_time(mut self, secs: f64) -> Self {
        self.partner_disconnect_time_secs = secs;
        self
    }

    /// Set the long-wait threshold (seconds)
    pub fn with_partner_taking_long_time(mut self, secs: f64) -> Self {
        self.partner_taking_long_time_secs = secs;
        self
    }

    /// Set the re-entry policy
    pub fn with_reentry_policy(mut self, policy: ReentryPolicy) -> Self {
        self.reentry_policy = policy;
        self
    }

    /// Set the sandbox room name
    pub fn with_sandbox_room(mut self, name: impl Into<String>) -> Self {
        self.sandbox_room_name = name.into();
        self
    }

    /// Set the tick rate
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz;
        self
    }

    /// Replace the voice configuration
    pub fn with_voice(mut self, voice: VoiceConfig) -> Self {
        self.voice = voice;
        self
    }

    pub fn reconnect_time(&self) -> Duration {
        Duration::from_secs_f64(self.reconnect_time_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs_f64(self.reconnect_interval_secs)
    }

    pub fn initial_reconnect_delay(&self) -> Duration {
        Duration::from_secs_f64(self.initial_reconnect_delay_secs)
    }

    pub fn max_backgrounded_time(&self) -> Duration {
        Duration::from_secs_f64(self.max_backgrounded_time_secs)
    }

    pub fn partner_disconnect_time(&self) -> Duration {
        Duration::from_secs_f64(self.partner_disconnect_time_secs)
    }

    pub fn partner_taking_long_time(&self) -> Duration {
        Duration::from_secs_f64(self.partner_taking_long_time_secs)
    }

    pub fn state_request_resend(&self) -> Duration {
        Duration::from_secs_f64(self.state_request_resend_secs)
    }

    /// Length of one controller tick
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> SessionResult<()> {
        let non_negative = [
            ("reconnect_time_secs", self.reconnect_time_secs),
            ("initial_reconnect_delay_secs", self.initial_reconnect_delay_secs),
            ("max_backgrounded_time_secs", self.max_backgrounded_time_secs),
            ("partner_disconnect_time_secs", self.partner_disconnect_time_secs),
            ("partner_taking_long_time_secs", self.partner_taking_long_time_secs),
            ("state_request_resend_secs", self.state_request_resend_secs),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SessionError::config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if !self.reconnect_interval_secs.is_finite() || self.reconnect_interval_secs <= 0.0 {
            return Err(SessionError::config("reconnect_interval_secs must be positive"));
        }

        if self.tick_rate_hz == 0 {
            return Err(SessionError::config("tick_rate_hz must be at least 1"));
        }

        self.voice.validate()
    }
}

/// Voice channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Volume (0-255) at or above which a participant counts as talking
    pub talk_volume_threshold: u8,
    /// Interval the provider is asked to report volumes at
    pub talking_report_interval_ms: u64,
    /// A participant not reported for this long is assumed silent
    pub assume_not_talking_ms: u64,
    /// Cooldown between reconnect attempts after a voice drop
    pub disconnect_retry_interval_secs: f64,
    /// Join a voice channel named after the room once the room is joined
    pub auto_join_on_room_join: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            talk_volume_threshold: 32,
            talking_report_interval_ms: 250,
            assume_not_talking_ms: 300,
            disconnect_retry_interval_secs: 10.0,
            auto_join_on_room_join: true,
        }
    }
}

impl VoiceConfig {
    pub fn assume_not_talking_time(&self) -> Duration {
        Duration::from_millis(self.assume_not_talking_ms)
    }

    pub fn disconnect_retry_interval(&self) -> Duration {
        Duration::from_secs_f64(self.disconnect_retry_interval_secs)
    }

    pub fn talking_report_interval(&self) -> Duration {
        Duration::from_millis(self.talking_report_interval_ms)
    }

    pub fn validate(&self) -> SessionResult<()> {
        if !self.disconnect_retry_interval_secs.is_finite() || self.disconnect_retry_interval_secs < 0.0 {
            return Err(SessionError::config(
                "voice.disconnect_retry_interval_secs must be non-negative",
            ));
        }
        // The silence timeout has to outlast one report interval or every
        // talker flickers between reports.
        if self.assume_not_talking_ms < self.talking_report_interval_ms {
            return Err(SessionError::config(format!(
                "voice.assume_not_talking_ms ({}) must not be shorter than talking_report_interval_ms ({})",
                self.assume_not_talking_ms, self.talking_report_interval_ms
            )));
        }
        Ok(())
    }
}
