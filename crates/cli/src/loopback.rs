//! In-process hub with transport and voice adapters
//!
//! Every request is answered at once by pushing the outcome into the
//! requesting session's inbox, the way a networked adapter would from its
//! callback thread.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use tandem_coordinator_core::error::SessionResult;
use tandem_coordinator_core::transport::{ConnectRequest, RoomTarget, RoomTransport, TransportEvent};
use tandem_coordinator_core::types::{DisconnectCause, ParticipantId, RoomMember, VoiceUid};
use tandem_coordinator_core::voice::{VoiceConnectionState, VoiceInput, VoiceProvider};
use tandem_coordinator_core::SessionInbox;

#[derive(Default)]
struct Peer {
    inbox: Option<SessionInbox>,
    connected: bool,
    room: Option<String>,
}

impl Peer {
    fn send(&self, event: TransportEvent) {
        if let Some(inbox) = &self.inbox {
            inbox.transport(event);
        }
    }
}

#[derive(Default)]
struct HubState {
    peers: BTreeMap<ParticipantId, Peer>,
}

impl HubState {
    fn publish_membership(&self, room: &str) {
        let members: Vec<RoomMember> = self
            .peers
            .iter()
            .filter(|(_, peer)| peer.room.as_deref() == Some(room))
            .map(|(id, _)| RoomMember::new(*id).with_profile(format!("{{\"id\":{}}}", id)))
            .collect();

        debug!(%room, members = members.len(), "Membership changed");
        for peer in self.peers.values().filter(|peer| peer.room.as_deref() == Some(room)) {
            peer.send(TransportEvent::MembershipChanged {
                members: members.clone(),
            });
        }
    }

    /// Take `id` off the hub and tell it why
    fn disconnect(&mut self, id: ParticipantId, cause: DisconnectCause) {
        let Some(peer) = self.peers.get_mut(&id) else {
            return;
        };
        if !peer.connected {
            return;
        }
        peer.connected = false;
        let room = peer.room.take();
        peer.send(TransportEvent::Disconnected { cause });

        if let Some(room) = room {
            self.publish_membership(&room);
        }
    }
}

/// Shared loopback hub
#[derive(Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport for participant `id`; events flow once an inbox is registered
    pub fn attach(&self, id: ParticipantId) -> LoopbackTransport {
        self.state.lock().peers.entry(id).or_default();
        LoopbackTransport { id, hub: self.clone() }
    }

    pub fn register_inbox(&self, id: ParticipantId, inbox: SessionInbox) {
        self.state.lock().peers.entry(id).or_default().inbox = Some(inbox);
    }

    /// Simulate a network drop for `id`
    pub fn drop_link(&self, id: ParticipantId) {
        info!(%id, "🔌 Dropping connection");
        self.state.lock().disconnect(id, DisconnectCause::NetworkLost);
    }
}

/// Room name matchmaking hands out for a pair
fn pair_room(a: ParticipantId, b: Option<ParticipantId>) -> String {
    match b {
        Some(b) if b != a => format!("pair-{}-{}", a.min(b), a.max(b)),
        _ => format!("solo-{}", a),
    }
}

pub struct LoopbackTransport {
    id: ParticipantId,
    hub: LoopbackHub,
}

impl RoomTransport for LoopbackTransport {
    fn connect(&mut self, request: &ConnectRequest) -> SessionResult<()> {
        debug!(id = %self.id, version = %request.game_version, "Loopback connect");
        let mut state = self.hub.state.lock();
        let peer = state.peers.entry(self.id).or_default();
        peer.connected = true;
        peer.send(TransportEvent::ConnectedToHub);
        Ok(())
    }

    fn join_room(&mut self, target: &RoomTarget) -> SessionResult<()> {
        let room = match target {
            RoomTarget::JoinOrCreate(name) | RoomTarget::Sandbox(name) => name.clone(),
            RoomTarget::Matchmaking(request) => pair_room(request.self_id, request.partner_id),
        };

        let mut state = self.hub.state.lock();
        let peer = state.peers.entry(self.id).or_default();
        peer.room = Some(room.clone());
        peer.send(TransportEvent::JoinedRoom {
            room_name: room.clone(),
        });
        state.publish_membership(&room);
        Ok(())
    }

    fn leave_room(&mut self) -> SessionResult<()> {
        let mut state = self.hub.state.lock();
        let room = state.peers.get_mut(&self.id).and_then(|peer| peer.room.take());
        if let Some(room) = room {
            state.publish_membership(&room);
        }
        Ok(())
    }

    fn disconnect(&mut self) -> SessionResult<()> {
        self.hub
            .state
            .lock()
            .disconnect(self.id, DisconnectCause::ClientRequested);
        Ok(())
    }

    fn is_fully_disconnected(&self) -> bool {
        self.hub
            .state
            .lock()
            .peers
            .get(&self.id)
            .map_or(true, |peer| !peer.connected)
    }

    fn is_connected_and_ready(&self) -> bool {
        self.hub
            .state
            .lock()
            .peers
            .get(&self.id)
            .map_or(false, |peer| peer.connected)
    }

    fn request_shared_state(&mut self, key: &str, requester: ParticipantId) -> SessionResult<()> {
        let state = self.hub.state.lock();
        let Some(room) = state.peers.get(&self.id).and_then(|peer| peer.room.clone()) else {
            return Ok(());
        };

        for (id, peer) in &state.peers {
            if *id != self.id && peer.room.as_deref() == Some(room.as_str()) {
                peer.send(TransportEvent::SharedStateRequested {
                    key: key.to_string(),
                    requester,
                });
            }
        }
        // The owner answers straight away
        if let Some(peer) = state.peers.get(&self.id) {
            peer.send(TransportEvent::SharedStateReceived { key: key.to_string() });
        }
        Ok(())
    }
}

/// Voice provider that connects instantly
#[derive(Default)]
pub struct LoopbackVoice {
    inbox: Option<SessionInbox>,
    state: VoiceConnectionState,
    next_uid: VoiceUid,
}

impl LoopbackVoice {
    pub fn new() -> Self {
        Self {
            next_uid: 1000,
            ..Self::default()
        }
    }

    pub fn set_inbox(&mut self, inbox: SessionInbox) {
        self.inbox = Some(inbox);
    }

    fn send(&self, input: VoiceInput) {
        if let Some(inbox) = &self.inbox {
            inbox.voice(input);
        }
    }
}

impl VoiceProvider for LoopbackVoice {
    fn join_channel(&mut self, channel: &str, local_id: Option<VoiceUid>) -> SessionResult<()> {
        let uid = local_id.unwrap_or_else(|| {
            self.next_uid += 1;
            self.next_uid
        });
        self.state = VoiceConnectionState::Connected;
        self.send(VoiceInput::JoinedChannel {
            channel: channel.to_string(),
            uid,
        });
        Ok(())
    }

    fn leave_channel(&mut self) -> SessionResult<()> {
        self.state = VoiceConnectionState::Disconnected;
        Ok(())
    }

    fn connection_state(&self) -> VoiceConnectionState {
        self.state
    }

    fn mute_local(&mut self, muted: bool) -> SessionResult<()> {
        self.send(VoiceInput::LocalPublishStateChanged { publishing: !muted });
        Ok(())
    }
}
