//! Pull-style synchronisation of shared objects
//!
//! A peer that does not own a shared object asks the owner for its current
//! value and keeps asking, no more often than the resend interval, until the
//! answer arrives. Each pending request remembers when it was last sent.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRequest {
    last_sent_at: Option<Duration>,
    attempts: u32,
}

#[derive(Debug, Clone)]
pub struct SharedStateSync {
    resend_interval: Duration,
    clock: Duration,
    pending: BTreeMap<String, PendingRequest>,
}

impl SharedStateSync {
    pub fn new(resend_interval: Duration) -> Self {
        Self {
            resend_interval,
            clock: Duration::ZERO,
            pending: BTreeMap::new(),
        }
    }

    /// Start asking for `key`; a key already pending keeps its timestamp
    pub fn want(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.pending.entry(key).or_insert_with_key(|key| {
            debug!(%key, "Shared state wanted");
            PendingRequest {
                last_sent_at: None,
                attempts: 0,
            }
        });
    }

    /// The owner answered; stop asking
    pub fn on_received(&mut self, key: &str) -> bool {
        match self.pending.remove(key) {
            Some(request) => {
                debug!(%key, attempts = request.attempts, "Shared state received");
                true
            }
            None => false,
        }
    }

    /// Connection dropped: requests in flight are lost, send again on the next chance
    pub fn on_connection_lost(&mut self) {
        for request in self.pending.values_mut() {
            request.last_sent_at = None;
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Advance the clock and return the keys to request now
    ///
    /// Nothing is due while `can_send` is false; the clock still advances.
    pub fn tick(&mut self, dt: Duration, can_send: bool) -> Vec<String> {
        self.clock += dt;
        if !can_send {
            return Vec::new();
        }

        let now = self.clock;
        let resend = self.resend_interval;
        let mut due = Vec::new();
        for (key, request) in self.pending.iter_mut() {
            let ready = match request.last_sent_at {
                None => true,
                Some(sent) => now.saturating_sub(sent) >= resend,
            };
            if ready {
                request.last_sent_at = Some(now);
                request.attempts += 1;
                trace!(%key, attempt = request.attempts, "Shared state request due");
                due.push(key.clone());
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: Duration = Duration::from_millis(20);

    #[test]
    fn test_requests_respect_resend_interval() {
        let mut sync = SharedStateSync::new(Duration::from_millis(500));
        sync.want("ball");

        let mut sends = 0;
        for _ in 0..100 {
            sends += sync.tick(DT, true).len();
        }
        // t = 0.02, 0.52, 1.02, 1.52 within two seconds
        assert_eq!(sends, 4);
    }

    #[test]
    fn test_received_stops_requests() {
        let mut sync = SharedStateSync::new(Duration::from_millis(500));
        sync.want("ball");
        assert_eq!(sync.tick(DT, true), vec!["ball".to_string()]);
        assert!(sync.on_received("ball"));
        assert!(!sync.on_received("ball"));

        for _ in 0..100 {
            assert!(sync.tick(DT, true).is_empty());
        }
    }

    #[test]
    fn test_nothing_sent_while_offline() {
        let mut sync = SharedStateSync::new(Duration::from_millis(500));
        sync.want("ball");
        for _ in 0..10 {
            assert!(sync.tick(DT, false).is_empty());
        }
        assert_eq!(sync.tick(DT, true).len(), 1);
    }

    #[test]
    fn test_connection_loss_resends_immediately() {
        let mut sync = SharedStateSync::new(Duration::from_secs(5));
        sync.want("ball");
        assert_eq!(sync.tick(DT, true).len(), 1);
        assert!(sync.tick(DT, true).is_empty());

        sync.on_connection_lost();
        assert_eq!(sync.tick(DT, true).len(), 1);
    }
}
