//! Foreground/background tracking
//!
//! The monitor never ticks on its own. It only reacts to the two focus
//! transitions, comparing wall-clock timestamps supplied by the caller so a
//! suspended process is measured correctly.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

/// Result of a foreground transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// Nothing to do
    Resume,
    /// Background time exceeded the limit
    InactivityTimeout { backgrounded_for: Duration },
}

#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    max_backgrounded_time: Duration,
    backgrounded_since: Option<DateTime<Utc>>,
}

impl ActivityMonitor {
    pub fn new(max_backgrounded_time: Duration) -> Self {
        Self {
            max_backgrounded_time,
            backgrounded_since: None,
        }
    }

    pub fn is_backgrounded(&self) -> bool {
        self.backgrounded_since.is_some()
    }

    pub fn backgrounded_since(&self) -> Option<DateTime<Utc>> {
        self.backgrounded_since
    }

    /// App moved to the background
    ///
    /// A repeated background notification keeps the earliest timestamp.
    pub fn on_background(&mut self, at: DateTime<Utc>) {
        if self.backgrounded_since.is_none() {
            debug!(%at, "App entered background");
            self.backgrounded_since = Some(at);
        }
    }

    /// App returned to the foreground
    pub fn on_foreground(&mut self, at: DateTime<Utc>) -> ActivityOutcome {
        let Some(since) = self.backgrounded_since.take() else {
            return ActivityOutcome::Resume;
        };

        // Clock stepping backwards counts as no time at all
        let backgrounded_for = (at - since).to_std().unwrap_or(Duration::ZERO);
        debug!(?backgrounded_for, "App entered foreground");

        if backgrounded_for > self.max_backgrounded_time {
            info!(
                ?backgrounded_for,
                limit = ?self.max_backgrounded_time,
                "Backgrounded too long"
            );
            ActivityOutcome::InactivityTimeout { backgrounded_for }
        } else {
            ActivityOutcome::Resume
        }
    }
}
