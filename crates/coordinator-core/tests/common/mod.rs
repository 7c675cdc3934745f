//! Scripted transport and voice adapters for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use tandem_coordinator_core::error::{SessionError, SessionResult};
use tandem_coordinator_core::events::SessionEvent;
use tandem_coordinator_core::transport::{ConnectRequest, RoomTarget, RoomTransport, TransportEvent};
use tandem_coordinator_core::types::{DisconnectCause, ParticipantId, RoomMember};
use tandem_coordinator_core::voice::{VoiceConnectionState, VoiceProvider};
use tandem_coordinator_core::{MemoryStore, PairingIdentity, SessionConfig, SessionController, SessionInbox};

pub const DT: Duration = Duration::from_millis(20);
pub const ALICE: ParticipantId = ParticipantId(123);
pub const BOB: ParticipantId = ParticipantId(456);
pub const PARTY: &str = "123:456";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Default)]
pub struct TransportLog {
    pub phase: Phase,
    pub connects: Vec<ConnectRequest>,
    pub joins: Vec<RoomTarget>,
    pub leaves: u32,
    pub disconnects: u32,
    pub flushes: u32,
    pub state_requests: Vec<(String, ParticipantId)>,
    pub fail_connect: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeTransport(pub Arc<Mutex<TransportLog>>);

impl FakeTransport {
    pub fn phase(&self) -> Phase {
        self.0.lock().phase
    }

    pub fn set_phase(&self, phase: Phase) {
        self.0.lock().phase = phase;
    }

    pub fn connect_count(&self) -> usize {
        self.0.lock().connects.len()
    }

    pub fn joins(&self) -> Vec<RoomTarget> {
        self.0.lock().joins.clone()
    }

    pub fn disconnects(&self) -> u32 {
        self.0.lock().disconnects
    }
}

impl RoomTransport for FakeTransport {
    fn connect(&mut self, request: &ConnectRequest) -> SessionResult<()> {
        let mut log = self.0.lock();
        log.connects.push(request.clone());
        if log.fail_connect {
            return Err(SessionError::transport("connect", "no route to host"));
        }
        log.phase = Phase::Connecting;
        Ok(())
    }

    fn join_room(&mut self, target: &RoomTarget) -> SessionResult<()> {
        self.0.lock().joins.push(target.clone());
        Ok(())
    }

    fn leave_room(&mut self) -> SessionResult<()> {
        self.0.lock().leaves += 1;
        Ok(())
    }

    fn disconnect(&mut self) -> SessionResult<()> {
        let mut log = self.0.lock();
        log.disconnects += 1;
        if log.phase != Phase::Disconnected {
            log.phase = Phase::Disconnecting;
        }
        Ok(())
    }

    fn flush_outgoing(&mut self) {
        self.0.lock().flushes += 1;
    }

    fn is_fully_disconnected(&self) -> bool {
        self.0.lock().phase == Phase::Disconnected
    }

    fn is_connected_and_ready(&self) -> bool {
        self.0.lock().phase == Phase::Connected
    }

    fn request_shared_state(&mut self, key: &str, requester: ParticipantId) -> SessionResult<()> {
        self.0.lock().state_requests.push((key.to_string(), requester));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct VoiceLog {
    pub state: Option<VoiceConnectionState>,
    pub joins: Vec<(String, Option<u32>)>,
    pub leaves: u32,
    pub mutes: Vec<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeVoice(pub Arc<Mutex<VoiceLog>>);

impl FakeVoice {
    pub fn set_state(&self, state: VoiceConnectionState) {
        self.0.lock().state = Some(state);
    }

    pub fn join_count(&self) -> usize {
        self.0.lock().joins.len()
    }

    pub fn leaves(&self) -> u32 {
        self.0.lock().leaves
    }
}

impl VoiceProvider for FakeVoice {
    fn join_channel(&mut self, channel: &str, local_id: Option<u32>) -> SessionResult<()> {
        self.0.lock().joins.push((channel.to_string(), local_id));
        Ok(())
    }

    fn leave_channel(&mut self) -> SessionResult<()> {
        let mut log = self.0.lock();
        log.leaves += 1;
        log.state = Some(VoiceConnectionState::Disconnected);
        Ok(())
    }

    fn connection_state(&self) -> VoiceConnectionState {
        self.0.lock().state.unwrap_or(VoiceConnectionState::Disconnected)
    }

    fn mute_local(&mut self, muted: bool) -> SessionResult<()> {
        self.0.lock().mutes.push(muted);
        Ok(())
    }
}

/// Controller plus handles on everything around it
pub struct Harness {
    pub controller: SessionController<FakeTransport, FakeVoice>,
    pub transport: FakeTransport,
    pub voice: FakeVoice,
    pub store: MemoryStore,
    pub inbox: SessionInbox,
    pub events: broadcast::Receiver<SessionEvent>,
}

impl Harness {
    pub fn new(config: SessionConfig, identity: PairingIdentity) -> Self {
        let transport = FakeTransport::default();
        let voice = FakeVoice::default();
        let store = MemoryStore::new();
        let controller = SessionController::new(config, identity, transport.clone(), voice.clone())
            .unwrap()
            .with_store(Box::new(store.clone()))
            .with_local_profile("{\"id\":123}");
        let inbox = controller.inbox();
        let events = controller.subscribe_receiver();
        Self {
            controller,
            transport,
            voice,
            store,
            inbox,
            events,
        }
    }

    /// Primary peer of the standard pair
    pub fn primary(config: SessionConfig) -> Self {
        Self::new(config, PairingIdentity::new(ALICE, PARTY))
    }

    /// Secondary peer of the standard pair
    pub fn secondary(config: SessionConfig) -> Self {
        Self::new(config, PairingIdentity::new(BOB, PARTY))
    }

    pub fn tick(&mut self) {
        self.controller.tick(DT);
    }

    pub fn run_for(&mut self, duration: Duration) {
        for _ in 0..(duration.as_millis() / DT.as_millis()) {
            self.controller.tick(DT);
        }
    }

    /// Events emitted since the last call
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn transport_event(&mut self, event: TransportEvent) {
        if matches!(event, TransportEvent::ConnectedToHub) {
            self.transport.set_phase(Phase::Connected);
        }
        if matches!(event, TransportEvent::Disconnected { .. }) {
            self.transport.set_phase(Phase::Disconnected);
        }
        assert!(self.inbox.transport(event));
    }

    /// Enter, wait for the first connect, reach the hub and join `room`
    pub fn enter_and_join(&mut self, room: &str) {
        self.controller.enter().unwrap();
        self.run_for(Duration::from_secs(1));
        assert_eq!(self.transport.connect_count(), 1, "first attempt after the initial delay");
        self.transport_event(TransportEvent::ConnectedToHub);
        self.tick();
        self.transport_event(TransportEvent::JoinedRoom {
            room_name: room.to_string(),
        });
        self.tick();
    }

    pub fn set_members(&mut self, members: &[ParticipantId]) {
        let members = members
            .iter()
            .map(|id| RoomMember::new(*id).with_profile(format!("{{\"id\":{}}}", id)))
            .collect();
        self.transport_event(TransportEvent::MembershipChanged { members });
    }

    pub fn drop_connection(&mut self, cause: DisconnectCause) {
        self.transport_event(TransportEvent::Disconnected { cause });
    }
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}
