//! Fixed-rate driver for a [`SessionController`]
//!
//! ```rust,no_run
//! # use tandem_coordinator_core::session::{SessionController, SessionRunner};
//! # use tandem_coordinator_core::transport::RoomTransport;
//! # use tandem_coordinator_core::voice::VoiceProvider;
//! # async fn example<T, V>(controller: SessionController<T, V>)
//! # where T: RoomTransport + 'static, V: VoiceProvider + 'static {
//! let (handle, shutdown) = SessionRunner::new(controller).spawn();
//! // ... later
//! shutdown.shutdown();
//! let controller = handle.await.unwrap();
//! # }
//! ```

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::controller::SessionController;
use crate::transport::RoomTransport;
use crate::types::ConnectionState;
use crate::voice::VoiceProvider;

/// Stops a running [`SessionRunner`]
#[derive(Debug)]
pub struct ShutdownHandle {
    sender: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, receiver)
    }

    pub fn shutdown(&self) {
        let _ = self.sender.send(true);
    }
}

/// Ticks a controller at the configured rate until shutdown or until the
/// session has been left
pub struct SessionRunner<T: RoomTransport, V: VoiceProvider> {
    controller: SessionController<T, V>,
    tick: Duration,
}

impl<T, V> SessionRunner<T, V>
where
    T: RoomTransport + 'static,
    V: VoiceProvider + 'static,
{
    pub fn new(controller: SessionController<T, V>) -> Self {
        let tick = controller.config().tick_interval();
        Self { controller, tick }
    }

    /// Override the tick length
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn controller_mut(&mut self) -> &mut SessionController<T, V> {
        &mut self.controller
    }

    /// Run on the current task; returns the controller when done
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SessionController<T, V> {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(session = %self.controller.id(), tick = ?self.tick, "Session runner started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // Fixed step, the controller never sees wall-clock jitter
                    self.controller.tick(self.tick);
                    if self.controller.state() == ConnectionState::Left {
                        debug!(session = %self.controller.id(), "Session left, runner stopping");
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(session = %self.controller.id(), "Shutdown requested");
                        break;
                    }
                }
            }
        }

        info!(session = %self.controller.id(), state = %self.controller.state(), "Session runner stopped");
        self.controller
    }

    /// Run on a new task
    pub fn spawn(self) -> (JoinHandle<SessionController<T, V>>, ShutdownHandle) {
        let (handle, receiver) = ShutdownHandle::new();
        (tokio::spawn(self.run(receiver)), handle)
    }
}
