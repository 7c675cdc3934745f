//! Reconnect scheduling after a dropped connection
//!
//! A reconnect *window* opens when the connection drops. Inside the window
//! the scheduler fires a connect attempt `initial_delay` after the drop and
//! then once every `interval`, until the window reaches `reconnect_time` and
//! the scheduler gives up.
//!
//! Firing is edge triggered: an attempt fires on the tick whose interval
//! bucket `floor((t - initial) / interval)` differs from the bucket of the
//! previous tick. This never fires twice for one boundary and copes with
//! uneven tick lengths. Time is kept as a `Duration` and bucketed in integer
//! nanoseconds so long runs do not drift.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::SessionConfig;

/// What the scheduler decided for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Window closed or paused; nothing to do
    Idle,
    /// Keep waiting
    Wait,
    /// Issue a connect attempt now
    Fire { attempt: u32 },
    /// Window ran out; give up (reported once)
    Exhausted,
}

/// Timing policy of the reconnect window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub reconnect_time: Duration,
    pub interval: Duration,
    pub initial_delay: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            reconnect_time: config.reconnect_time(),
            interval: config.reconnect_interval(),
            initial_delay: config.initial_reconnect_delay(),
        }
    }
}

/// Reconnect window state
#[derive(Debug, Clone)]
pub struct ReconnectScheduler {
    policy: ReconnectPolicy,
    armed: bool,
    elapsed: Duration,
    attempts: u32,
    exhausted: bool,
}

impl ReconnectScheduler {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            armed: false,
            elapsed: Duration::ZERO,
            attempts: 0,
            exhausted: false,
        }
    }

    /// Open a fresh window with the timer at zero
    pub fn arm(&mut self) {
        info!(
            reconnect_time = ?self.policy.reconnect_time,
            interval = ?self.policy.interval,
            "Reconnect window opened"
        );
        self.armed = true;
        self.elapsed = Duration::ZERO;
        self.attempts = 0;
        self.exhausted = false;
    }

    /// Close the window (joined a room, left, or suppressed)
    pub fn disarm(&mut self) {
        if self.armed {
            debug!(elapsed = ?self.elapsed, attempts = self.attempts, "Reconnect window closed");
        }
        self.armed = false;
    }

    /// Restart the timer of an open window
    pub fn reset_timer(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Advance the window by one tick
    pub fn tick(&mut self, dt: Duration) -> ReconnectDecision {
        if !self.armed {
            return ReconnectDecision::Idle;
        }

        self.elapsed += dt;

        if self.elapsed >= self.policy.reconnect_time {
            self.armed = false;
            self.exhausted = true;
            info!(attempts = self.attempts, "Reconnect window exhausted");
            return ReconnectDecision::Exhausted;
        }

        if crossed_boundary(self.elapsed, dt, self.policy.initial_delay, self.policy.interval) {
            self.attempts += 1;
            debug!(attempt = self.attempts, elapsed = ?self.elapsed, "Reconnect attempt due");
            return ReconnectDecision::Fire {
                attempt: self.attempts,
            };
        }

        ReconnectDecision::Wait
    }
}

/// `floor((t - initial) / interval) > floor((t - initial - dt) / interval)`,
/// never before `t` reaches `initial`
fn crossed_boundary(t: Duration, dt: Duration, initial: Duration, interval: Duration) -> bool {
    let interval = interval.as_nanos() as i128;
    if interval == 0 {
        return false;
    }
    let now = t.as_nanos() as i128 - initial.as_nanos() as i128;
    if now < 0 {
        return false;
    }
    let before = now - dt.as_nanos() as i128;
    now.div_euclid(interval) > before.div_euclid(interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(total: u64, interval: u64, initial: u64) -> ReconnectPolicy {
        ReconnectPolicy {
            reconnect_time: Duration::from_secs(total),
            interval: Duration::from_secs(interval),
            initial_delay: Duration::from_secs(initial),
        }
    }

    #[test]
    fn test_idle_until_armed() {
        let mut scheduler = ReconnectScheduler::new(policy(65, 10, 1));
        assert_eq!(scheduler.tick(Duration::from_secs(5)), ReconnectDecision::Idle);
        assert_eq!(scheduler.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_fire_schedule_at_fixed_rate() {
        let mut scheduler = ReconnectScheduler::new(policy(65, 10, 1));
        scheduler.arm();

        let dt = Duration::from_millis(20);
        let mut fire_times = Vec::new();
        let mut exhausted_at = None;
        let mut t = Duration::ZERO;
        while t < Duration::from_secs(66) {
            t += dt;
            match scheduler.tick(dt) {
                ReconnectDecision::Fire { .. } => fire_times.push(t),
                ReconnectDecision::Exhausted => {
                    assert!(exhausted_at.is_none(), "exhaustion reported twice");
                    exhausted_at = Some(t);
                }
                _ => {}
            }
        }

        let expected: Vec<Duration> = [1, 11, 21, 31, 41, 51, 61]
            .iter()
            .map(|s| Duration::from_secs(*s))
            .collect();
        assert_eq!(fire_times, expected);
        assert_eq!(exhausted_at, Some(Duration::from_secs(65)));
        assert_eq!(scheduler.attempts(), 7);
        assert!(scheduler.is_exhausted());
        assert!(!scheduler.is_armed());
    }

    #[test]
    fn test_variable_tick_sizes_fire_once_per_boundary() {
        let mut scheduler = ReconnectScheduler::new(policy(65, 10, 1));
        scheduler.arm();

        // One huge tick across the first boundary, then tiny ones
        assert!(matches!(scheduler.tick(Duration::from_millis(1500)), ReconnectDecision::Fire { attempt: 1 }));
        for _ in 0..100 {
            assert_eq!(scheduler.tick(Duration::from_millis(1)), ReconnectDecision::Wait);
        }
    }

    #[test]
    fn test_rearm_resets_window() {
        let mut scheduler = ReconnectScheduler::new(policy(5, 2, 1));
        scheduler.arm();
        for _ in 0..10 {
            scheduler.tick(Duration::from_secs(1));
        }
        assert!(scheduler.is_exhausted());

        scheduler.arm();
        assert!(!scheduler.is_exhausted());
        assert_eq!(scheduler.attempts(), 0);
        assert!(matches!(scheduler.tick(Duration::from_secs(1)), ReconnectDecision::Fire { attempt: 1 }));
    }

    #[test]
    fn test_zero_initial_delay_waits_one_interval() {
        // The boundary at t=0 is already behind the first tick
        let mut scheduler = ReconnectScheduler::new(policy(30, 10, 0));
        scheduler.arm();
        assert_eq!(scheduler.tick(Duration::from_millis(20)), ReconnectDecision::Wait);
        assert!(matches!(scheduler.tick(Duration::from_millis(9980)), ReconnectDecision::Fire { attempt: 1 }));
    }

    #[test]
    fn test_initial_delay_longer_than_interval() {
        let mut scheduler = ReconnectScheduler::new(policy(65, 10, 15));
        scheduler.arm();

        let dt = Duration::from_millis(20);
        let mut fire_times = Vec::new();
        let mut t = Duration::ZERO;
        while t < Duration::from_secs(40) {
            t += dt;
            if let ReconnectDecision::Fire { .. } = scheduler.tick(dt) {
                fire_times.push(t);
            }
        }
        assert_eq!(fire_times, vec![Duration::from_secs(15), Duration::from_secs(25), Duration::from_secs(35)]);
    }

    #[test]
    fn test_large_tick_before_initial_delay_waits() {
        let mut scheduler = ReconnectScheduler::new(policy(10, 1, 2));
        scheduler.arm();
        assert_eq!(scheduler.tick(Duration::from_millis(1500)), ReconnectDecision::Wait);
        assert!(matches!(scheduler.tick(Duration::from_millis(500)), ReconnectDecision::Fire { attempt: 1 }));
    }

    proptest! {
        #[test]
        fn prop_fire_count_matches_schedule(
            tick_ms in 1u64..200,
            interval_s in 1u64..20,
            initial_s in 0u64..30,
            total_s in 1u64..90,
        ) {
            let mut scheduler = ReconnectScheduler::new(policy(total_s, interval_s, initial_s));
            scheduler.arm();

            let dt = Duration::from_millis(tick_ms);
            let mut fires = 0u64;
            let mut exhausted = 0u32;
            let mut t = Duration::ZERO;
            while t < Duration::from_secs(total_s + 5) {
                t += dt;
                match scheduler.tick(dt) {
                    ReconnectDecision::Fire { .. } => {
                        prop_assert!(t < Duration::from_secs(total_s));
                        fires += 1;
                    }
                    ReconnectDecision::Exhausted => exhausted += 1,
                    _ => {}
                }
            }

            prop_assert_eq!(exhausted, 1);

            // Every positive boundary initial + k * interval fires on the
            // first tick at or after it, unless exhaustion comes first. A
            // boundary at t=0 is already behind the first tick.
            let total_ns = Duration::from_secs(total_s).as_nanos();
            let dt_ns = dt.as_nanos();
            let mut expected = 0u64;
            let mut k = 0u64;
            loop {
                let boundary = Duration::from_secs(initial_s + k * interval_s).as_nanos();
                k += 1;
                if boundary >= total_ns {
                    break;
                }
                if boundary == 0 {
                    continue;
                }
                let first_tick_at_or_after = boundary.div_ceil(dt_ns) * dt_ns;
                if first_tick_at_or_after < total_ns {
                    expected += 1;
                }
            }
            prop_assert_eq!(fires, expected);
        }
    }
}
