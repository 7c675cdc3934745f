//! Two paired sessions on a loopback hub
//!
//! Both peers enter, meet, optionally survive a dropped connection, then the
//! secondary leaves and the primary is disconnected once the partner
//! countdown runs out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use tandem_coordinator_core::prelude::*;
use tandem_coordinator_core::{spawn_event_dispatcher, DisconnectReason, ShutdownHandle};

use crate::loopback::{LoopbackHub, LoopbackTransport, LoopbackVoice};

type LoopbackController = SessionController<LoopbackTransport, LoopbackVoice>;

const PRIMARY: ParticipantId = ParticipantId(123);
const SECONDARY: ParticipantId = ParticipantId(456);
const PARTY: &str = "123:456";

pub struct Scenario {
    pub drop_primary: bool,
    pub secondary_leaves_after: f64,
}

/// Logs every event of one peer
struct EventLog {
    peer: &'static str,
}

#[async_trait]
impl SessionEventHandler for EventLog {
    async fn on_session_event(&self, event: SessionEvent) {
        info!(peer = self.peer, event = event.name(), ?event, "📣 Session event");
    }

    async fn on_lagged(&self, skipped: u64) {
        warn!(peer = self.peer, skipped, "Event log fell behind");
    }
}

struct RunningPeer {
    name: &'static str,
    events: broadcast::Receiver<SessionEvent>,
    handle: JoinHandle<LoopbackController>,
    shutdown: ShutdownHandle,
    dispatcher: JoinHandle<()>,
}

impl RunningPeer {
    fn start(
        name: &'static str,
        id: ParticipantId,
        config: &SessionConfig,
        hub: &LoopbackHub,
    ) -> Result<Self> {
        let identity = PairingIdentity::new(id, PARTY);
        let mut controller = SessionController::new(config.clone(), identity, hub.attach(id), LoopbackVoice::new())?
            .with_local_profile(format!("{{\"id\":{}}}", id));

        hub.register_inbox(id, controller.inbox());
        let inbox = controller.inbox();
        controller.voice_mut().provider_mut().set_inbox(inbox);

        let events = controller.subscribe_receiver();
        let dispatcher = spawn_event_dispatcher(controller.emitter(), Arc::new(EventLog { peer: name }));

        controller.enter()?;
        info!(peer = name, role = ?controller.pairing().role, "🚀 Session entered");

        let (handle, shutdown) = SessionRunner::new(controller).spawn();
        Ok(Self {
            name,
            events,
            handle,
            shutdown,
            dispatcher,
        })
    }

    /// Wait for the first event matching `pred`
    async fn wait_for(
        &mut self,
        what: &str,
        timeout: Duration,
        pred: impl Fn(&SessionEvent) -> bool,
    ) -> Result<SessionEvent> {
        let name = self.name;
        let events = &mut self.events;
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(event) if pred(&event) => return Ok::<_, anyhow::Error>(event),
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => bail!("{} stopped before {}", name, what),
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| anyhow!("{} did not reach {} within {:?}", name, what, timeout))?
    }

    /// Stop the runner and hand back the controller
    async fn stop(self) -> Result<(LoopbackController, JoinHandle<()>)> {
        self.shutdown.shutdown();
        let controller = self.handle.await?;
        Ok((controller, self.dispatcher))
    }

    /// Leave for good and run until the leave has completed
    async fn leave(self) -> Result<(LoopbackController, JoinHandle<()>)> {
        let name = self.name;
        let mut events = self.events.resubscribe();
        let (mut controller, dispatcher) = self.stop().await?;

        controller.request_leave();
        let (handle, _shutdown) = SessionRunner::new(controller).spawn();
        let controller = handle.await?;

        while let Ok(event) = events.try_recv() {
            if event == SessionEvent::SessionLeft {
                info!(peer = name, "👋 Left the session");
            }
        }
        Ok((controller, dispatcher))
    }
}

pub async fn run(config: SessionConfig, scenario: Scenario) -> Result<()> {
    config.validate()?;
    let hub = LoopbackHub::new();
    let settle = Duration::from_secs_f64(config.reconnect_time_secs + 5.0);

    let mut primary = RunningPeer::start("primary", PRIMARY, &config, &hub)?;
    let mut secondary = RunningPeer::start("secondary", SECONDARY, &config, &hub)?;

    let is_active = |e: &SessionEvent| matches!(e, SessionEvent::SessionActive);
    primary.wait_for("an active session", settle, is_active).await?;
    secondary.wait_for("an active session", settle, is_active).await?;
    info!("🤝 Both peers are together");

    if scenario.drop_primary {
        hub.drop_link(PRIMARY);
        primary
            .wait_for("reconnection", settle, |e| matches!(e, SessionEvent::Reconnecting))
            .await?;
        primary.wait_for("an active session", settle, is_active).await?;
        info!("🔁 Primary recovered");
    }

    tokio::time::sleep(Duration::from_secs_f64(scenario.secondary_leaves_after.max(0.0))).await;
    let (secondary_done, secondary_dispatcher) = secondary.leave().await?;

    let countdown = config.partner_disconnect_time() + Duration::from_secs(5);
    primary
        .wait_for("the partner-loss disconnect", countdown, |e| {
            matches!(
                e,
                SessionEvent::SessionDisconnected {
                    reason: DisconnectReason::PartnerLoss
                }
            )
        })
        .await?;
    let (primary_done, primary_dispatcher) = primary.stop().await?;

    println!("\n═══ Simulation Summary ═══");
    for (name, controller) in [("primary", &primary_done), ("secondary", &secondary_done)] {
        println!(
            "{:<10} state={:<18} room={:<16} suppressed={:?}",
            name,
            controller.state().to_string(),
            controller.room_name().unwrap_or("-"),
            controller.suppress_reason(),
        );
    }

    // Dispatchers finish once their controllers are gone
    drop(primary_done);
    drop(secondary_done);
    let _ = tokio::join!(primary_dispatcher, secondary_dispatcher);
    Ok(())
}
