//! Partner presence, inactivity and voice behaviour seen from the controller

mod common;

use std::time::Duration;

use common::*;
use tandem_coordinator_core::transport::TransportEvent;
use tandem_coordinator_core::types::{ConnectionState, DisconnectCause, DisconnectReason, Position, SuppressReason};
use tandem_coordinator_core::voice::{VoiceConnectionState, VoiceEvent, VoiceInput, VolumeSample};
use tandem_coordinator_core::{ReentryPolicy, SessionConfig, SessionError, SessionEvent};

fn active_pair(config: SessionConfig) -> Harness {
    let mut h = Harness::primary(config);
    h.enter_and_join("room-1");
    h.set_members(&[ALICE, BOB]);
    h.tick();
    assert_eq!(h.controller.state(), ConnectionState::Active);
    h.take_events();
    h
}

fn disconnects(events: &[SessionEvent]) -> Vec<DisconnectReason> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::SessionDisconnected { reason } => Some(reason.clone()),
            _ => None,
        })
        .collect()
}

/// Partner leaves and never comes back; returns once the session was forced out
fn lose_partner(h: &mut Harness) {
    h.set_members(&[ALICE]);
    h.run_for(Duration::from_secs(61));
    h.drop_connection(DisconnectCause::ClientRequested);
    h.tick();
}

#[test]
fn test_partner_returning_within_countdown_keeps_session() {
    let mut h = active_pair(SessionConfig::default());

    h.set_members(&[ALICE]);
    h.run_for(Duration::from_secs(30));
    assert_eq!(h.controller.state(), ConnectionState::PartnerLost);

    let events = h.take_events();
    assert!(events.contains(&SessionEvent::PartnerLost { seconds_remaining: 60 }));
    assert!(events.contains(&SessionEvent::PartnerLost { seconds_remaining: 31 }));
    assert!(!events.contains(&SessionEvent::PartnerLost { seconds_remaining: 29 }));

    h.set_members(&[ALICE, BOB]);
    h.tick();
    assert_eq!(h.controller.state(), ConnectionState::Active);
    let events = h.take_events();
    assert!(events.contains(&SessionEvent::PartnerReturned));
    assert!(events.contains(&SessionEvent::SessionActive));
    assert!(disconnects(&events).is_empty());
}

#[test]
fn test_partner_loss_forces_disconnect_without_reconnect() {
    let mut h = active_pair(SessionConfig::default());
    h.voice.set_state(VoiceConnectionState::Connected);
    h.tick();
    h.controller.set_local_position(Position::new(1.0, 2.0, 3.0));

    h.set_members(&[ALICE]);
    h.run_for(Duration::from_secs(61));

    assert_eq!(h.controller.state(), ConnectionState::Disconnected);
    assert_eq!(h.controller.suppress_reason(), Some(SuppressReason::PartnerLoss));
    assert_eq!(disconnects(&h.take_events()), vec![DisconnectReason::PartnerLoss]);
    assert_eq!(h.transport.disconnects(), 1);
    assert_eq!(h.store.snapshot().last_position, Some(Position::new(1.0, 2.0, 3.0)));

    // Voice left without scheduling a retry but keeps its channel
    assert_eq!(h.voice.leaves(), 1);
    assert_eq!(h.controller.voice().target_channel(), Some("room-1"));
    let joins = h.voice.join_count();

    h.drop_connection(DisconnectCause::ClientRequested);
    h.run_for(Duration::from_secs(90));
    assert_eq!(h.controller.state(), ConnectionState::Disconnected);
    assert_eq!(h.transport.connect_count(), 1);
    assert_eq!(h.voice.join_count(), joins);
    assert!(disconnects(&h.take_events()).is_empty());

    assert!(matches!(h.controller.connect(), Err(SessionError::InvalidState { .. })));
}

#[test]
fn test_reentry_skips_partner_wait_by_default() {
    let mut h = active_pair(SessionConfig::default());
    lose_partner(&mut h);
    h.take_events();

    h.controller.enter().unwrap();
    assert_eq!(h.controller.suppress_reason(), None);
    h.run_for(Duration::from_secs(1));
    assert_eq!(h.transport.connect_count(), 2);
    h.transport_event(TransportEvent::ConnectedToHub);
    h.tick();
    h.transport_event(TransportEvent::JoinedRoom {
        room_name: "room-1".into(),
    });
    h.tick();

    // Partner had arrived before: the countdown starts right away
    assert_eq!(h.controller.state(), ConnectionState::PartnerLost);
    let events = h.take_events();
    assert!(events.contains(&SessionEvent::PartnerLost { seconds_remaining: 60 }));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::PartnerWaiting { .. })));
}

#[test]
fn test_reentry_can_rearm_partner_wait() {
    let config = SessionConfig::default().with_reentry_policy(ReentryPolicy::RearmPartnerWait);
    let mut h = active_pair(config.clone());
    lose_partner(&mut h);
    h.take_events();

    h.controller.enter().unwrap();
    h.run_for(Duration::from_secs(1));
    h.transport_event(TransportEvent::ConnectedToHub);
    h.tick();
    h.transport_event(TransportEvent::JoinedRoom {
        room_name: "room-1".into(),
    });
    h.tick();

    assert_eq!(h.controller.state(), ConnectionState::WaitingForPartner);
    let events = h.take_events();
    assert!(events.contains(&SessionEvent::SessionJoined {
        room_name: "room-1".into(),
        spawn: config.limbo_point,
    }));
    assert!(events.contains(&SessionEvent::PartnerWaiting { long_wait: false }));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::PartnerLost { .. })));
}

#[test]
fn test_countdown_disabled_by_debug_override() {
    let mut h = Harness::primary(SessionConfig::default());
    h.controller.skip_partner_wait();
    assert!(h
        .take_events()
        .contains(&SessionEvent::PartnerArrived {
            goto: SessionConfig::default().partner_arrival_point
        }));

    h.enter_and_join("room-1");
    h.run_for(Duration::from_secs(120));
    assert_eq!(h.controller.state(), ConnectionState::WaitingForPartner);
    let events = h.take_events();
    assert!(disconnects(&events).is_empty());
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::PartnerWaiting { .. })));
    assert!(!h.controller.presence().is_partner_lost());
}

#[test]
fn test_long_background_forces_inactivity_disconnect() {
    let mut h = active_pair(SessionConfig::default());

    assert!(h.inbox.focus_at(false, at(0)));
    h.tick();
    assert_eq!(h.transport.0.lock().flushes, 1);

    assert!(h.inbox.focus_at(true, at(61)));
    h.tick();

    assert_eq!(h.controller.state(), ConnectionState::Disconnected);
    assert_eq!(h.controller.suppress_reason(), Some(SuppressReason::Inactivity));
    assert_eq!(disconnects(&h.take_events()), vec![DisconnectReason::Inactivity]);

    h.drop_connection(DisconnectCause::ClientRequested);
    h.run_for(Duration::from_secs(30));
    assert_eq!(h.transport.connect_count(), 1);

    // Explicit re-entry brings the session back
    h.controller.enter().unwrap();
    h.run_for(Duration::from_secs(1));
    assert_eq!(h.transport.connect_count(), 2);
}

#[test]
fn test_short_background_only_flushes() {
    let mut h = active_pair(SessionConfig::default());

    h.controller.on_focus_changed(false, at(0));
    h.controller.on_focus_changed(true, at(30));
    h.tick();

    assert_eq!(h.transport.0.lock().flushes, 1);
    assert_eq!(h.controller.state(), ConnectionState::Active);
    assert!(disconnects(&h.take_events()).is_empty());
}

#[test]
fn test_background_during_leave_never_forces_disconnect() {
    let mut h = active_pair(SessionConfig::default());
    h.controller.request_leave();
    h.inbox.focus_at(false, at(0));
    h.inbox.focus_at(true, at(600));
    h.tick();

    assert_eq!(h.controller.suppress_reason(), None);
    assert_eq!(h.controller.state(), ConnectionState::LeavingByChoice);
}

#[test]
fn test_partner_countdown_stops_once_leaving() {
    let mut h = active_pair(SessionConfig::default());
    h.set_members(&[ALICE]);
    h.run_for(Duration::from_secs(59));
    assert_eq!(h.controller.state(), ConnectionState::PartnerLost);
    h.take_events();

    h.controller.request_leave();
    h.run_for(Duration::from_secs(3));

    assert_eq!(h.controller.state(), ConnectionState::LeavingByChoice);
    assert_eq!(h.controller.suppress_reason(), None);
    let events = h.take_events();
    assert!(disconnects(&events).is_empty());
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::PartnerLost { .. })));

    h.drop_connection(DisconnectCause::ClientRequested);
    h.tick();
    assert_eq!(h.controller.state(), ConnectionState::Left);
    assert!(matches!(h.controller.enter(), Err(SessionError::SessionEnded)));
}

#[test]
fn test_enter_is_rejected_while_leaving_after_forced_disconnect() {
    let mut h = active_pair(SessionConfig::default());
    h.set_members(&[ALICE]);
    h.run_for(Duration::from_secs(61));
    assert_eq!(h.controller.suppress_reason(), Some(SuppressReason::PartnerLoss));

    h.controller.request_leave();
    assert!(matches!(h.controller.enter(), Err(SessionError::InvalidState { .. })));
    assert_eq!(h.controller.state(), ConnectionState::LeavingByChoice);
    assert!(!h.controller.reconnect_scheduler().is_armed());
}

#[test]
fn test_volume_reports_become_talking_edges() {
    let mut h = active_pair(SessionConfig::default());

    h.inbox.voice(VoiceInput::VolumeReport(vec![
        VolumeSample::new(0, 80),
        VolumeSample::new(456, 10),
    ]));
    h.tick();
    assert_eq!(
        h.take_events(),
        vec![
            SessionEvent::Voice(VoiceEvent::StartedTalking { uid: 123 }),
            SessionEvent::Voice(VoiceEvent::StoppedTalking { uid: 456 }),
        ]
    );

    // No further reports: the local talker times out once
    h.run_for(Duration::from_secs(1));
    assert_eq!(
        h.take_events(),
        vec![SessionEvent::Voice(VoiceEvent::StoppedTalking { uid: 123 })]
    );
}

#[test]
fn test_voice_rejoins_after_drop_with_cooldown() {
    let mut h = active_pair(SessionConfig::default());
    assert_eq!(h.voice.join_count(), 1);

    h.voice.set_state(VoiceConnectionState::Connected);
    h.tick();
    h.voice.set_state(VoiceConnectionState::Disconnected);
    h.tick();
    assert_eq!(h.voice.join_count(), 2);
    assert_eq!(h.voice.0.lock().joins[1], ("room-1".to_string(), Some(123)));

    h.run_for(Duration::from_millis(9_900));
    assert_eq!(h.voice.join_count(), 2);
    h.run_for(Duration::from_millis(200));
    assert_eq!(h.voice.join_count(), 3);

    // Skip the rest of the cooldown
    h.controller.reconnect_voice_now();
    h.tick();
    assert_eq!(h.voice.join_count(), 4);
}

#[test]
fn test_voice_errors_surface_as_events() {
    let mut h = active_pair(SessionConfig::default());
    h.inbox.voice(VoiceInput::Error {
        code: 17,
        message: "join rejected".into(),
    });
    h.inbox.voice(VoiceInput::MuteStateChanged { uid: 456, muted: true });
    h.tick();

    assert_eq!(
        h.take_events(),
        vec![
            SessionEvent::Voice(VoiceEvent::ConnectFailed {
                code: 17,
                message: "join rejected".into(),
            }),
            SessionEvent::Voice(VoiceEvent::Muted { uid: 456 }),
        ]
    );
}
