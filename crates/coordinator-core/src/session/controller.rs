//! Session controller
//!
//! The controller is the only writer of session state. Everything outside it
//! (transport callbacks, voice callbacks, focus changes) arrives through the
//! [`SessionInbox`] and is applied at the start of the next [`tick`].
//!
//! One tick runs these steps in a fixed order:
//!
//! 1. drain the inbox (transport events, then voice input; focus changes are
//!    held for step 5)
//! 2. finish an explicit leave once the transport is fully disconnected
//! 3. reconnect scheduling
//! 4. partner presence
//! 5. activity (focus changes)
//! 6. voice channel
//! 7. shared-state requests
//!
//! so presence and inactivity checks always see this tick's connectivity.
//!
//! [`tick`]: SessionController::tick

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activity::{ActivityMonitor, ActivityOutcome};
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::events::{EventEmitter, EventStream, SessionEvent};
use crate::inbox::{SessionInbox, SessionInput};
use crate::pairing::{Pairing, PairingIdentity};
use crate::persistence::{load_or_default, MemoryStore, PersistedState, SessionStore};
use crate::presence::{PartnerPresenceMonitor, PresenceInputs, PresenceOutcome};
use crate::reconnect::{ReconnectDecision, ReconnectPolicy, ReconnectScheduler};
use crate::state_sync::SharedStateSync;
use crate::transport::{
    ConnectRequest, JoinFailureCode, MatchmakingRequest, RoomTarget, RoomTransport, TransportEvent,
};
use crate::types::{
    ConnectionState, DisconnectCause, DisconnectReason, ParticipantId, Position, RoomMember, SuppressReason,
};
use crate::voice::{VoiceChannelCoordinator, VoiceInput, VoiceProvider};

/// Join failure code used when the request never reached the provider
const REQUEST_NOT_SENT_CODE: i32 = 0;

/// Coordinates one client's session with its partner
pub struct SessionController<T: RoomTransport, V: VoiceProvider> {
    id: Uuid,
    config: SessionConfig,
    pairing: Pairing,
    state: ConnectionState,

    transport: T,
    voice: VoiceChannelCoordinator<V>,
    scheduler: ReconnectScheduler,
    presence: PartnerPresenceMonitor,
    activity: ActivityMonitor,
    state_sync: SharedStateSync,

    store: Box<dyn SessionStore>,
    persisted: PersistedState,

    emitter: EventEmitter,
    inbox: SessionInbox,
    receiver: mpsc::UnboundedReceiver<SessionInput>,

    /// Profile published for the local player, first entry of the roster
    local_profile: Option<String>,
    local_position: Position,

    entered: bool,
    wants_to_leave: bool,
    finalized: bool,
    suppress: Option<SuppressReason>,
    needs_to_join_room: bool,
    /// Local player entity exists in a room
    initialized: bool,
    /// Matchmaking holds us until the primary shows up
    waiting_for_friend: bool,
    current_room: Option<String>,
    roster: Vec<RoomMember>,
    pending_focus: Vec<(bool, DateTime<Utc>)>,
}

impl<T: RoomTransport, V: VoiceProvider> SessionController<T, V> {
    /// Create a controller; pairing is resolved here and never changes
    pub fn new(config: SessionConfig, identity: PairingIdentity, transport: T, voice_provider: V) -> SessionResult<Self> {
        config.validate()?;
        let pairing = identity.resolve()?;

        let local_uid = u32::try_from(pairing.self_id.0).unwrap_or(0);
        let voice = VoiceChannelCoordinator::new(voice_provider, &config.voice, local_uid)
            .with_provider_assigned_uid(pairing.sandbox || local_uid == 0);

        let store: Box<dyn SessionStore> = Box::new(MemoryStore::new());
        let persisted = load_or_default(store.as_ref());
        let (inbox, receiver) = SessionInbox::channel();

        let id = Uuid::new_v4();
        info!(
            session = %id,
            self_id = %pairing.self_id,
            partner = ?pairing.partner_id,
            role = ?pairing.role,
            sandbox = pairing.sandbox,
            test_mode = pairing.test_mode,
            "Session created"
        );

        Ok(Self {
            id,
            scheduler: ReconnectScheduler::new(ReconnectPolicy::from_config(&config)),
            presence: PartnerPresenceMonitor::new(&config),
            activity: ActivityMonitor::new(config.max_backgrounded_time()),
            state_sync: SharedStateSync::new(config.state_request_resend()),
            config,
            pairing,
            state: ConnectionState::Disconnected,
            transport,
            voice,
            store,
            persisted,
            emitter: EventEmitter::default(),
            inbox,
            receiver,
            local_profile: None,
            local_position: Position::default(),
            entered: false,
            wants_to_leave: false,
            finalized: false,
            suppress: None,
            needs_to_join_room: false,
            initialized: false,
            waiting_for_friend: false,
            current_room: None,
            roster: Vec::new(),
            pending_focus: Vec::new(),
        })
    }

    /// Use `store` for persisted state and load it
    pub fn with_store(mut self, store: Box<dyn SessionStore>) -> Self {
        self.persisted = load_or_default(store.as_ref());
        self.store = store;
        self
    }

    /// Publish events through an existing emitter
    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    /// Profile string reported as the first roster entry
    pub fn with_local_profile(mut self, profile: impl Into<String>) -> Self {
        self.local_profile = Some(profile.into());
        self
    }

    // ---- accessors ----

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn pairing(&self) -> &Pairing {
        &self.pairing
    }

    pub fn is_primary(&self) -> bool {
        self.pairing.is_primary()
    }

    pub fn partner_id(&self) -> Option<ParticipantId> {
        self.pairing.partner_id
    }

    /// Remembered room, preferred over matchmaking
    pub fn room_name(&self) -> Option<&str> {
        self.persisted.room_name.as_deref()
    }

    pub fn current_room(&self) -> Option<&str> {
        self.current_room.as_deref()
    }

    pub fn persisted(&self) -> &PersistedState {
        &self.persisted
    }

    pub fn inbox(&self) -> SessionInbox {
        self.inbox.clone()
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    pub fn subscribe(&self) -> EventStream {
        self.emitter.subscribe()
    }

    pub fn subscribe_receiver(&self) -> broadcast::Receiver<SessionEvent> {
        self.emitter.subscribe_receiver()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn voice(&self) -> &VoiceChannelCoordinator<V> {
        &self.voice
    }

    pub fn voice_mut(&mut self) -> &mut VoiceChannelCoordinator<V> {
        &mut self.voice
    }

    pub fn reconnect_scheduler(&self) -> &ReconnectScheduler {
        &self.scheduler
    }

    pub fn presence(&self) -> &PartnerPresenceMonitor {
        &self.presence
    }

    pub fn suppress_reason(&self) -> Option<SuppressReason> {
        self.suppress
    }

    pub fn wants_to_leave(&self) -> bool {
        self.wants_to_leave
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn roster(&self) -> &[RoomMember] {
        &self.roster
    }

    pub fn local_position(&self) -> Position {
        self.local_position
    }

    // ---- lifecycle operations ----

    /// Enter the shared area
    ///
    /// Opens a reconnect window and lets the scheduler make the first
    /// connect attempt after the initial delay. After a forced disconnect
    /// this is the explicit re-entry; the re-entry policy decides whether
    /// the first-arrival wait runs again. Refused once a leave is requested.
    pub fn enter(&mut self) -> SessionResult<()> {
        self.ensure_not_ended()?;
        if self.wants_to_leave {
            return Err(SessionError::invalid_state("cannot enter while leaving"));
        }

        match self.state {
            ConnectionState::Disconnected => {}
            state if self.suppress.is_none() => {
                return Err(SessionError::invalid_state(format!("cannot enter while {}", state)));
            }
            _ => {}
        }

        if let Some(reason) = self.suppress.take() {
            info!(session = %self.id, ?reason, policy = ?self.config.reentry_policy, "Re-entering after forced disconnect");
            self.presence.on_reentry(self.config.reentry_policy);
        } else if self.entered {
            debug!(session = %self.id, "Entering again");
        }

        self.entered = true;
        self.scheduler.arm();
        self.set_state(ConnectionState::Reconnecting);
        self.emitter.emit(SessionEvent::Reconnecting);
        Ok(())
    }

    /// Connect now
    ///
    /// Valid from Disconnected and Reconnecting; a no-op while a connection
    /// is already being made or held, or while leaving. Always restarts the
    /// reconnect window timer.
    pub fn connect(&mut self) -> SessionResult<()> {
        self.ensure_not_ended()?;

        if self.wants_to_leave {
            debug!(session = %self.id, "Connect ignored while leaving");
            return Ok(());
        }
        if let Some(reason) = self.suppress {
            return Err(SessionError::invalid_state(format!(
                "session was disconnected ({:?}); enter again to reconnect",
                reason
            )));
        }

        match self.state {
            ConnectionState::Disconnected | ConnectionState::Reconnecting => {
                if self.scheduler.is_armed() {
                    self.scheduler.reset_timer();
                } else {
                    self.scheduler.arm();
                }
                self.entered = true;
                self.issue_connect();
            }
            state => debug!(session = %self.id, %state, "Connect ignored"),
        }
        Ok(())
    }

    /// Join a room
    ///
    /// Normally triggered by hub connectivity. Rejoins the remembered room,
    /// else the sandbox room in sandbox mode, else asks matchmaking.
    pub fn join_room(&mut self) -> SessionResult<()> {
        self.ensure_not_ended()?;
        if self.wants_to_leave || self.suppress.is_some() {
            return Err(SessionError::invalid_state("cannot join a room while leaving or disconnected"));
        }
        if self.state.is_in_room() {
            return Err(SessionError::invalid_state(format!("already in a room ({})", self.state)));
        }
        if !self.transport.is_connected_and_ready() {
            return Err(SessionError::invalid_state("transport is not connected"));
        }

        self.issue_join();
        Ok(())
    }

    /// Leave for good
    ///
    /// Stops reconnecting, drops a queued voice join and asks the transport
    /// to disconnect. The leave completes on a later tick once the transport
    /// reports it is fully disconnected. Calling it again changes nothing.
    pub fn request_leave(&mut self) {
        if self.wants_to_leave || self.finalized {
            debug!(session = %self.id, "Leave already requested");
            return;
        }

        info!(session = %self.id, state = %self.state, "Leave requested");
        self.wants_to_leave = true;
        self.needs_to_join_room = false;
        self.scheduler.disarm();
        self.voice.cancel_pending_join();
        self.state_sync.clear();
        self.set_state(ConnectionState::LeavingByChoice);

        if let Err(e) = self.transport.disconnect() {
            warn!(session = %self.id, error = %e, "Transport disconnect failed while leaving");
        }
    }

    /// Debug override: stop waiting for the partner and never count down
    pub fn skip_partner_wait(&mut self) {
        self.presence.skip_partner_wait();
        self.emitter.emit(SessionEvent::PartnerArrived {
            goto: self.config.partner_arrival_point,
        });
    }

    /// Report a focus change; applied in the activity step of the next tick
    pub fn on_focus_changed(&mut self, focused: bool, at: DateTime<Utc>) {
        self.pending_focus.push((focused, at));
    }

    /// Latest position of the local player entity
    pub fn set_local_position(&mut self, position: Position) {
        self.local_position = position;
    }

    /// Start asking the owner of `key` for its current value
    pub fn request_shared_state(&mut self, key: impl Into<String>) {
        self.state_sync.want(key);
    }

    pub fn saved_avatar(&self) -> Option<&str> {
        self.persisted.avatar.as_deref()
    }

    /// Store or clear the avatar selection
    pub fn save_avatar(&mut self, avatar: Option<String>) {
        self.persisted.avatar = avatar;
        self.persist();
    }

    pub fn join_voice_channel(&mut self, channel: impl Into<String>) {
        self.voice.join_channel(channel);
    }

    pub fn leave_voice_channel(&mut self) {
        self.voice.leave_channel();
    }

    pub fn set_voice_muted(&mut self, muted: bool) {
        self.voice.set_muted(muted);
    }

    pub fn reconnect_voice_now(&mut self) {
        self.voice.reconnect_now();
    }

    // ---- tick ----

    /// Advance the session by `dt`
    pub fn tick(&mut self, dt: Duration) {
        self.drain_inbox();

        if self.finalized {
            return;
        }

        if self.wants_to_leave && self.transport.is_fully_disconnected() {
            self.finalize_leave();
            return;
        }

        self.tick_reconnect(dt);
        self.tick_presence(dt);
        self.tick_activity();
        self.tick_voice(dt);
        self.tick_state_sync(dt);
    }

    fn drain_inbox(&mut self) {
        let mut transport_events = Vec::new();
        let mut voice_inputs = Vec::new();

        while let Ok(input) = self.receiver.try_recv() {
            match input {
                SessionInput::Transport(event) => transport_events.push(event),
                SessionInput::Voice(input) => voice_inputs.push(input),
                SessionInput::Focus { focused, at } => self.pending_focus.push((focused, at)),
            }
        }

        if self.finalized {
            return;
        }

        for event in transport_events {
            self.handle_transport_event(event);
        }
        for input in voice_inputs {
            self.handle_voice_input(input);
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        debug!(session = %self.id, state = %self.state, ?event, "Transport event");
        match event {
            TransportEvent::ConnectedToHub => self.on_connected_to_hub(),
            TransportEvent::JoinedRoom { room_name } => self.on_joined_room(room_name),
            TransportEvent::JoinRoomFailed { code, message } => self.on_join_room_failed(code, message),
            TransportEvent::Disconnected { cause } => self.on_disconnected(cause),
            TransportEvent::MembershipChanged { members } => {
                self.roster = members;
                if self.initialized {
                    self.emit_roster();
                }
            }
            TransportEvent::MatchmakingWaiting { waiting } => {
                if waiting != self.waiting_for_friend {
                    debug!(session = %self.id, waiting, "Matchmaking waiting for friend");
                }
                self.waiting_for_friend = waiting;
            }
            TransportEvent::SharedStateRequested { key, requester } => {
                self.emitter.emit(SessionEvent::SharedStateRequested { key, requester });
            }
            TransportEvent::SharedStateReceived { key } => {
                self.state_sync.on_received(&key);
            }
        }
    }

    fn handle_voice_input(&mut self, input: VoiceInput) {
        for event in self.voice.handle_input(input) {
            self.emitter.emit(SessionEvent::Voice(event));
        }
    }

    // ---- transport reactions ----

    fn on_connected_to_hub(&mut self) {
        if self.wants_to_leave {
            debug!(session = %self.id, "Hub connection ignored while leaving");
            return;
        }

        if self.needs_to_join_room {
            self.issue_join();
        } else {
            warn!(session = %self.id, state = %self.state, "Connected to hub without a pending room join");
            self.emitter.emit(SessionEvent::ConnectFailed);
            if self.state == ConnectionState::Connecting {
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    fn on_joined_room(&mut self, room_name: String) {
        if self.wants_to_leave || self.suppress.is_some() {
            debug!(session = %self.id, %room_name, "Room joined while leaving or disconnected, dropping it");
            if let Err(e) = self.transport.disconnect() {
                warn!(session = %self.id, error = %e, "Transport disconnect failed");
            }
            return;
        }

        info!(session = %self.id, %room_name, "Joined room");
        self.persisted.room_name = Some(room_name.clone());
        self.persist();
        self.scheduler.disarm();
        self.needs_to_join_room = false;
        self.waiting_for_friend = false;
        self.current_room = Some(room_name.clone());
        self.set_state(ConnectionState::Joined);

        let spawn = self.spawn_point();
        self.local_position = spawn;
        self.initialized = true;
        self.emitter.emit(SessionEvent::SessionJoined {
            room_name: room_name.clone(),
            spawn,
        });
        self.emit_roster();

        if self.config.voice.auto_join_on_room_join {
            self.voice.join_channel(room_name);
        }

        self.refresh_room_state();
    }

    fn on_join_room_failed(&mut self, code: JoinFailureCode, message: String) {
        warn!(session = %self.id, code = code.code(), %message, "Room join failed");

        if code == JoinFailureCode::RoomDoesNotExist && self.persisted.room_name.is_some() {
            info!(session = %self.id, "Remembered room is gone, falling back to matchmaking");
            self.persisted.room_name = None;
            self.persist();
        }

        self.emitter.emit(SessionEvent::RoomJoinFailed {
            code: code.code(),
            message,
        });

        if self.wants_to_leave || self.state.is_in_room() {
            return;
        }
        let next = if self.scheduler.is_armed() {
            ConnectionState::Reconnecting
        } else {
            ConnectionState::Disconnected
        };
        self.set_state(next);
    }

    fn on_disconnected(&mut self, cause: DisconnectCause) {
        info!(session = %self.id, %cause, state = %self.state, "Transport disconnected");

        self.remember_position();
        self.initialized = false;
        self.needs_to_join_room = false;
        self.current_room = None;
        self.roster.clear();
        self.state_sync.on_connection_lost();

        if self.wants_to_leave {
            self.finalize_leave();
            return;
        }

        if self.suppress.is_some() || self.scheduler.is_exhausted() {
            self.set_state(ConnectionState::Disconnected);
            return;
        }

        if !self.scheduler.is_armed() {
            self.emitter.emit(SessionEvent::SessionDisconnected {
                reason: DisconnectReason::Transport(cause),
            });
            self.scheduler.arm();
            self.emitter.emit(SessionEvent::Reconnecting);
        }
        self.set_state(ConnectionState::Reconnecting);
    }

    // ---- tick steps ----

    fn tick_reconnect(&mut self, dt: Duration) {
        // Only the primary drives reconnection while matchmaking holds the pair
        let paused = (self.waiting_for_friend && !self.pairing.is_primary())
            || self.suppress.is_some()
            || self.wants_to_leave;
        if paused {
            return;
        }

        match self.scheduler.tick(dt) {
            ReconnectDecision::Fire { attempt } => match self.state {
                ConnectionState::Disconnected | ConnectionState::Reconnecting => {
                    info!(session = %self.id, attempt, "Reconnect attempt");
                    self.issue_connect();
                }
                state => debug!(session = %self.id, attempt, %state, "Reconnect attempt skipped"),
            },
            ReconnectDecision::Exhausted => self.on_reconnect_exhausted(),
            ReconnectDecision::Idle | ReconnectDecision::Wait => {}
        }
    }

    fn on_reconnect_exhausted(&mut self) {
        warn!(session = %self.id, state = %self.state, "Giving up reconnecting");
        self.needs_to_join_room = false;
        if !self.transport.is_fully_disconnected() {
            if let Err(e) = self.transport.disconnect() {
                warn!(session = %self.id, error = %e, "Transport disconnect failed");
            }
        }
        if !self.state.is_in_room() {
            self.set_state(ConnectionState::Disconnected);
        }
        self.emitter.emit(SessionEvent::SessionDisconnected {
            reason: DisconnectReason::ReconnectExhausted,
        });
    }

    fn tick_presence(&mut self, dt: Duration) {
        if self.wants_to_leave || self.finalized {
            return;
        }

        let inputs = PresenceInputs {
            partner_present: self.partner_present(),
            initialized: self.initialized,
            suppressed: self.suppress.is_some(),
            waiting_for_friend: self.waiting_for_friend && !self.pairing.is_primary(),
            connected_and_ready: self.transport.is_connected_and_ready(),
        };

        for outcome in self.presence.tick(inputs, dt) {
            match outcome {
                PresenceOutcome::FirstArrival => {
                    let goto = self.config.partner_arrival_point;
                    self.local_position = goto;
                    self.emitter.emit(SessionEvent::PartnerArrived { goto });
                }
                PresenceOutcome::Waiting { long_wait } => {
                    self.emitter.emit(SessionEvent::PartnerWaiting { long_wait });
                }
                PresenceOutcome::Lost { seconds_remaining } => {
                    self.emitter.emit(SessionEvent::PartnerLost { seconds_remaining });
                }
                PresenceOutcome::Returned => self.emitter.emit(SessionEvent::PartnerReturned),
                PresenceOutcome::ForceDisconnect => self.force_disconnect(SuppressReason::PartnerLoss),
            }
        }

        self.refresh_room_state();
    }

    fn tick_activity(&mut self) {
        for (focused, at) in std::mem::take(&mut self.pending_focus) {
            if !focused {
                self.activity.on_background(at);
                self.transport.flush_outgoing();
                continue;
            }

            if let ActivityOutcome::InactivityTimeout { backgrounded_for } = self.activity.on_foreground(at) {
                if self.wants_to_leave || self.finalized {
                    continue;
                }
                info!(session = %self.id, ?backgrounded_for, "Disconnecting after inactivity");
                self.force_disconnect(SuppressReason::Inactivity);
            }
        }
    }

    fn tick_voice(&mut self, dt: Duration) {
        for event in self.voice.tick(dt) {
            self.emitter.emit(SessionEvent::Voice(event));
        }
    }

    fn tick_state_sync(&mut self, dt: Duration) {
        let can_send = self.state.is_in_room() && self.transport.is_connected_and_ready();
        for key in self.state_sync.tick(dt, can_send) {
            if let Err(e) = self.transport.request_shared_state(&key, self.pairing.self_id) {
                warn!(session = %self.id, %key, error = %e, "Shared state request failed");
            }
        }
    }

    // ---- helpers ----

    fn ensure_not_ended(&self) -> SessionResult<()> {
        if self.state.is_terminal() || self.finalized {
            Err(SessionError::SessionEnded)
        } else {
            Ok(())
        }
    }

    fn issue_connect(&mut self) {
        let request = ConnectRequest {
            user_id: if self.pairing.sandbox {
                None
            } else {
                Some(self.pairing.self_id)
            },
            game_version: self.config.game_version.clone(),
        };

        self.set_state(ConnectionState::Connecting);
        self.needs_to_join_room = true;
        self.emitter.emit(SessionEvent::SessionConnecting);

        if let Err(e) = self.transport.connect(&request) {
            warn!(session = %self.id, error = %e, "Connect request failed");
            self.on_disconnected(DisconnectCause::ConnectFailed);
        }
    }

    fn issue_join(&mut self) {
        let target = match self.persisted.room_name.as_deref() {
            Some(room) if !room.is_empty() => RoomTarget::JoinOrCreate(room.to_string()),
            _ if self.pairing.sandbox => RoomTarget::Sandbox(self.config.sandbox_room_name.clone()),
            _ => RoomTarget::Matchmaking(MatchmakingRequest {
                self_id: self.pairing.self_id,
                partner_id: self.pairing.partner_id,
                role: self.pairing.role,
            }),
        };

        info!(session = %self.id, ?target, "Joining room");
        self.needs_to_join_room = false;
        self.set_state(ConnectionState::JoiningRoom);

        if let Err(e) = self.transport.join_room(&target) {
            self.on_join_room_failed(JoinFailureCode::Other(REQUEST_NOT_SENT_CODE), e.to_string());
        }
    }

    fn force_disconnect(&mut self, reason: SuppressReason) {
        if self.suppress.is_some() {
            return;
        }

        warn!(session = %self.id, ?reason, state = %self.state, "Forcing disconnect");
        self.remember_position();
        self.suppress = Some(reason);
        self.initialized = false;
        self.needs_to_join_room = false;
        self.scheduler.disarm();
        self.presence.on_forced_disconnect();

        if let Err(e) = self.transport.disconnect() {
            warn!(session = %self.id, error = %e, "Transport disconnect failed");
        }
        self.voice.disconnect_without_retry();

        self.set_state(ConnectionState::Disconnected);
        self.emitter.emit(SessionEvent::SessionDisconnected { reason: reason.into() });
    }

    fn finalize_leave(&mut self) {
        if self.finalized {
            return;
        }
        info!(session = %self.id, "Session left");
        self.finalized = true;
        self.initialized = false;
        self.current_room = None;
        self.voice.leave_channel();
        self.set_state(ConnectionState::Left);
        self.emitter.emit(SessionEvent::SessionLeft);
    }

    /// Sub-state inside a room follows the partner's presence
    fn refresh_room_state(&mut self) {
        if !self.state.is_in_room() || !self.initialized {
            return;
        }

        let next = if self.partner_present() {
            ConnectionState::Active
        } else if self.presence.ever_arrived() {
            ConnectionState::PartnerLost
        } else {
            ConnectionState::WaitingForPartner
        };

        if next != self.state {
            self.set_state(next);
            if next == ConnectionState::Active {
                self.emitter.emit(SessionEvent::SessionActive);
            }
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if next != self.state {
            debug!(session = %self.id, from = %self.state, to = %next, "State changed");
            self.state = next;
        }
    }

    fn partner_present(&self) -> bool {
        if !self.initialized {
            return false;
        }
        match self.pairing.partner_id {
            Some(partner) if partner == self.pairing.self_id => true,
            Some(partner) => self.roster.iter().any(|member| member.id == partner),
            None => false,
        }
    }

    fn spawn_point(&self) -> Position {
        if self.presence.is_first_wait_pending() {
            self.config.limbo_point
        } else {
            self.persisted
                .last_position
                .unwrap_or(self.config.starting_spawn_point)
        }
    }

    fn remember_position(&mut self) {
        if self.initialized {
            self.persisted.last_position = Some(self.local_position);
            self.persist();
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.persisted) {
            warn!(session = %self.id, error = %e, "Failed to persist session state");
        }
    }

    fn emit_roster(&self) {
        let mut profiles = Vec::with_capacity(self.roster.len() + 1);
        if let Some(local) = &self.local_profile {
            profiles.push(local.clone());
        }
        profiles.extend(
            self.roster
                .iter()
                .filter(|member| member.id != self.pairing.self_id)
                .filter_map(|member| member.profile.clone()),
        );
        self.emitter.emit(SessionEvent::RosterUpdated { profiles });
    }
}
