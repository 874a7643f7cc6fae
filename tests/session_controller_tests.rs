// Integration tests for the stream session controller
//
// These tests drive the controller against fake signaling, transport and
// sink implementations and check the single-session guarantees: one active
// session, ordered teardown, stale callbacks ignored, one attached stream.

mod common;

use anyhow::Result;
use camview::error::{ValidationError, ViewerError};
use camview::negotiation::{IceConnectionState, MediaStreamHandle, NegotiationState};
use camview::session::{SessionConfig, SessionKind, SessionState};
use camview::ConnectionStatus;
use common::{drain, recording, wait_for, FakeSignaling, Harness};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[tokio::test]
async fn test_stop_without_session_is_noop() -> Result<()> {
    let h = Harness::new(FakeSignaling::default());
    let mut rx = h.controller.subscribe();

    h.controller.stop().await;
    h.controller.stop().await;

    assert!(h.controller.snapshot().await.is_none());
    assert_eq!(h.controller.connection_status(), ConnectionStatus::Offline);
    assert!(drain(&mut rx).is_empty(), "Nothing to close, nothing to publish");

    Ok(())
}

#[tokio::test]
async fn test_live_session_reaches_ice_connecting() -> Result<()> {
    let h = Harness::new(FakeSignaling::default());
    let mut rx = h.controller.subscribe();

    let id = h.controller.start_live("5").await?;

    let snapshot = h.controller.snapshot().await.expect("session in slot");
    assert_eq!(snapshot.id, id);
    assert_eq!(snapshot.kind, SessionKind::Live);
    assert_eq!(snapshot.source, "live channel 5");
    assert_eq!(snapshot.state, SessionState::Negotiating);
    assert_eq!(snapshot.negotiation, NegotiationState::IceConnecting);

    let progress: Vec<NegotiationState> = drain(&mut rx)
        .into_iter()
        .map(|note| note.negotiation)
        .collect();
    assert_eq!(
        progress,
        vec![
            NegotiationState::Idle,
            NegotiationState::OfferCreated,
            NegotiationState::OfferSent,
            NegotiationState::AnswerReceived,
            NegotiationState::IceConnecting,
        ]
    );

    assert_eq!(h.signaling.calls(), vec!["live:5".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_blank_channel_rejected_before_any_io() -> Result<()> {
    let h = Harness::new(FakeSignaling::default());

    let err = h.controller.start_live("   ").await.unwrap_err();
    assert_eq!(err, ViewerError::Validation(ValidationError::MissingChannel));
    assert!(err.is_validation());

    assert!(h.signaling.calls().is_empty());
    assert!(h.transports.events.lock().unwrap().is_empty());
    assert!(h.controller.snapshot().await.is_none());

    Ok(())
}

#[tokio::test]
async fn test_backend_error_fails_session() -> Result<()> {
    let h = Harness::new(FakeSignaling::failing("channel offline"));
    let mut rx = h.controller.subscribe();

    let err = h.controller.start_live("9").await.unwrap_err();
    assert_eq!(err, ViewerError::Negotiation("channel offline".to_string()));
    assert_eq!(err.to_string(), "channel offline");

    let snapshot = h.controller.snapshot().await.expect("failed session stays visible");
    assert_eq!(
        snapshot.state,
        SessionState::Failed {
            reason: "channel offline".to_string()
        }
    );
    assert_eq!(snapshot.negotiation, NegotiationState::Failed);

    let failed = wait_for(&mut rx, |note| note.state.is_terminal()).await;
    assert_eq!(failed.negotiation, NegotiationState::Failed);

    assert_eq!(h.controller.connection_status(), ConnectionStatus::Offline);
    assert!(h.sink.history().is_empty(), "No stream may be attached");
    assert_eq!(h.transports.closed(), 1, "Transport released on failure");

    Ok(())
}

#[tokio::test]
async fn test_connected_attaches_single_stream() -> Result<()> {
    let h = Harness::new(FakeSignaling::default());
    let mut rx = h.controller.subscribe();

    let id = h.controller.start_live("5").await?;
    h.connect(id, "cam-5");

    let connected = wait_for(&mut rx, |note| note.state == SessionState::Connected).await;
    assert_eq!(connected.session, id);
    assert_eq!(connected.negotiation, NegotiationState::Connected);

    assert_eq!(h.sink.history(), vec!["attach:cam-5".to_string()]);
    assert_eq!(h.controller.connection_status(), ConnectionStatus::Online);

    // A second track for the same session is ignored
    let events = h.transports.events_for(id);
    events.track_arrived(MediaStreamHandle {
        id: "cam-5-audio".to_string(),
    });
    events.ice_state_changed(IceConnectionState::Completed);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.sink.history(), vec!["attach:cam-5".to_string()]);
    assert_eq!(h.sink.double_attach.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn test_track_after_connect_attaches_immediately() -> Result<()> {
    let h = Harness::new(FakeSignaling::default());
    let mut rx = h.controller.subscribe();

    let id = h.controller.start_live("5").await?;
    let events = h.transports.events_for(id);
    events.ice_state_changed(IceConnectionState::Connected);
    wait_for(&mut rx, |note| note.state == SessionState::Connected).await;
    assert!(!h.sink.is_attached());

    events.track_arrived(MediaStreamHandle {
        id: "late".to_string(),
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.sink.history(), vec!["attach:late".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_replacing_live_with_archive_closes_live_first() -> Result<()> {
    let gate = Arc::new(Notify::new());
    let h = Harness::new(FakeSignaling::holding(gate.clone()));
    let mut progress = h.controller.subscribe();
    let mut all = h.controller.subscribe();

    let controller = h.controller.clone();
    let live = tokio::spawn(async move { controller.start_live("5").await });

    // Live offer is out; its answer is still pending
    let sent = wait_for(&mut progress, |note| {
        note.negotiation == NegotiationState::OfferSent
    })
    .await;
    let live_id = sent.session;

    let rec = recording("201", "2024-03-01T08:00:00Z", "2024-03-01T08:10:00Z");
    let archive_id = h.controller.start_archive(&rec).await?;
    assert_ne!(live_id, archive_id);

    // Answer for the abandoned live session arrives late
    gate.notify_one();
    let live_result = live.await?;
    assert_eq!(live_result, Err(ViewerError::Superseded(live_id)));

    let notes = drain(&mut all);
    let live_closed: Vec<usize> = notes
        .iter()
        .enumerate()
        .filter(|(_, note)| note.session == live_id && note.state == SessionState::Closed)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(live_closed.len(), 1, "Live session closed exactly once");

    let first_archive = notes
        .iter()
        .position(|note| note.session == archive_id)
        .expect("archive notifications");
    assert!(live_closed[0] < first_archive, "Teardown precedes the new session");

    let archive_offer = notes
        .iter()
        .position(|note| {
            note.session == archive_id && note.negotiation == NegotiationState::OfferCreated
        })
        .expect("archive offer created");
    assert!(live_closed[0] < archive_offer);

    assert!(
        !notes
            .iter()
            .any(|note| note.session == live_id && note.state == SessionState::Connected),
        "Live session must never report connected"
    );

    let snapshot = h.controller.snapshot().await.expect("archive session");
    assert_eq!(snapshot.id, archive_id);
    assert_eq!(snapshot.kind, SessionKind::Archive);
    assert_eq!(h.transports.closed(), 1, "Only the live transport is closed");

    Ok(())
}

#[tokio::test]
async fn test_archive_resolves_playback_url_and_skips_audio() -> Result<()> {
    let h = Harness::new(FakeSignaling::default());

    h.controller.start_live("5").await?;
    let rec = recording("201", "2024-03-01T08:00:00Z", "2024-03-01T08:10:00Z");
    h.controller.play(&rec).await?;

    assert_eq!(
        h.signaling.calls(),
        vec![
            "live:5".to_string(),
            "archive:rtsp://recorder/201?start=080000".to_string(),
        ]
    );

    let offers = h.transports.offers();
    assert_eq!(offers.len(), 2);
    assert!(offers[0].receive_video && offers[0].receive_audio);
    assert!(offers[1].receive_video && !offers[1].receive_audio);

    Ok(())
}

#[tokio::test]
async fn test_stale_events_are_discarded() -> Result<()> {
    let h = Harness::new(FakeSignaling::default());
    let mut rx = h.controller.subscribe();
    let mut all = h.controller.subscribe();

    let first = h.controller.start_live("5").await?;
    let second = h.controller.start_live("6").await?;

    // Late callbacks from the first, already closed, transport
    let stale = h.transports.events_for(first);
    stale.track_arrived(MediaStreamHandle {
        id: "cam-5".to_string(),
    });
    stale.ice_state_changed(IceConnectionState::Connected);
    stale.ice_state_changed(IceConnectionState::Failed);

    h.connect(second, "cam-6");
    wait_for(&mut rx, |note| {
        note.session == second && note.state == SessionState::Connected
    })
    .await;

    assert_eq!(h.sink.history(), vec!["attach:cam-6".to_string()]);

    let notes = drain(&mut all);
    assert!(notes
        .iter()
        .filter(|note| note.session == first)
        .all(|note| note.state != SessionState::Connected && !matches!(note.state, SessionState::Failed { .. })));

    let snapshot = h.controller.snapshot().await.expect("second session");
    assert_eq!(snapshot.id, second);
    assert_eq!(snapshot.state, SessionState::Connected);
    assert_eq!(h.controller.connection_status(), ConnectionStatus::Online);

    Ok(())
}

#[tokio::test]
async fn test_replacement_never_attaches_two_streams() -> Result<()> {
    let h = Harness::new(FakeSignaling::default());
    let mut rx = h.controller.subscribe();

    let live = h.controller.start_live("5").await?;
    h.connect(live, "cam-5");
    wait_for(&mut rx, |note| note.session == live && note.state == SessionState::Connected).await;

    let rec = recording("5", "2024-03-01T07:00:00Z", "2024-03-01T07:30:00Z");
    let archive = h.controller.start_archive(&rec).await?;
    h.connect(archive, "archive-5");
    wait_for(&mut rx, |note| {
        note.session == archive && note.state == SessionState::Connected
    })
    .await;

    assert_eq!(
        h.sink.history(),
        vec![
            "attach:cam-5".to_string(),
            "detach".to_string(),
            "attach:archive-5".to_string(),
        ]
    );
    assert_eq!(h.sink.double_attach.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn test_ice_failure_tears_down_connected_session() -> Result<()> {
    let h = Harness::new(FakeSignaling::default());
    let mut rx = h.controller.subscribe();

    let id = h.controller.start_live("5").await?;
    h.connect(id, "cam-5");
    wait_for(&mut rx, |note| note.state == SessionState::Connected).await;
    assert_eq!(h.controller.connection_status(), ConnectionStatus::Online);

    h.transports
        .events_for(id)
        .ice_state_changed(IceConnectionState::Failed);

    let failed = wait_for(&mut rx, |note| note.state.is_terminal()).await;
    assert_eq!(
        failed.state,
        SessionState::Failed {
            reason: "media error: ICE connection failed".to_string()
        }
    );
    assert_eq!(failed.negotiation, NegotiationState::Failed);

    assert_eq!(h.sink.history(), vec!["attach:cam-5".to_string(), "detach".to_string()]);
    assert_eq!(h.controller.connection_status(), ConnectionStatus::Offline);
    assert_eq!(h.transports.closed(), 1);

    Ok(())
}

#[tokio::test]
async fn test_disconnect_counts_as_failure() -> Result<()> {
    let h = Harness::new(FakeSignaling::default());
    let mut rx = h.controller.subscribe();

    let id = h.controller.start_live("5").await?;
    h.connect(id, "cam-5");
    wait_for(&mut rx, |note| note.state == SessionState::Connected).await;

    h.transports
        .events_for(id)
        .ice_state_changed(IceConnectionState::Disconnected);

    let failed = wait_for(&mut rx, |note| note.state.is_terminal()).await;
    assert_eq!(
        failed.state,
        SessionState::Failed {
            reason: "media error: ICE connection disconnected".to_string()
        }
    );

    Ok(())
}

#[tokio::test]
async fn test_media_failure_reason_is_kept() -> Result<()> {
    let h = Harness::new(FakeSignaling::default());
    let mut rx = h.controller.subscribe();

    let id = h.controller.start_live("5").await?;
    h.transports.events_for(id).media_failed("decoder crashed");

    let failed = wait_for(&mut rx, |note| note.state.is_terminal()).await;
    assert_eq!(
        failed.state,
        SessionState::Failed {
            reason: "media error: decoder crashed".to_string()
        }
    );

    // Stopping a failed session closes it without a second failure
    h.controller.stop().await;
    assert!(h.controller.snapshot().await.is_none());

    Ok(())
}

#[tokio::test]
async fn test_stop_closes_session_once() -> Result<()> {
    let h = Harness::new(FakeSignaling::default());
    let mut rx = h.controller.subscribe();

    let id = h.controller.start_live("5").await?;
    h.connect(id, "cam-5");
    wait_for(&mut rx, |note| note.state == SessionState::Connected).await;

    h.controller.stop().await;
    h.controller.stop().await;
    h.controller.shutdown().await;

    let closed: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|note| note.state == SessionState::Closed)
        .collect();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].session, id);
    assert_eq!(closed[0].negotiation, NegotiationState::Closed);

    assert!(h.controller.snapshot().await.is_none());
    assert_eq!(h.controller.connection_status(), ConnectionStatus::Offline);
    assert_eq!(h.transports.closed(), 1);
    assert!(!h.sink.is_attached());

    // Callbacks after stop are ignored
    h.transports
        .events_for(id)
        .ice_state_changed(IceConnectionState::Connected);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.controller.connection_status(), ConnectionStatus::Offline);

    Ok(())
}

#[tokio::test]
async fn test_ice_watchdog_fails_stuck_session() -> Result<()> {
    let config = SessionConfig {
        ice_timeout: Some(Duration::from_millis(50)),
        ..SessionConfig::default()
    };
    let h = Harness::with_config(FakeSignaling::default(), config);
    let mut rx = h.controller.subscribe();

    h.controller.start_live("5").await?;

    let failed = wait_for(&mut rx, |note| note.state.is_terminal()).await;
    match failed.state {
        SessionState::Failed { reason } => {
            assert!(reason.contains("ICE connectivity not established"), "reason: {}", reason)
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(h.controller.connection_status(), ConnectionStatus::Offline);

    Ok(())
}

#[tokio::test]
async fn test_ice_watchdog_ignores_connected_session() -> Result<()> {
    let config = SessionConfig {
        ice_timeout: Some(Duration::from_millis(50)),
        ..SessionConfig::default()
    };
    let h = Harness::with_config(FakeSignaling::default(), config);
    let mut rx = h.controller.subscribe();

    let id = h.controller.start_live("5").await?;
    h.connect(id, "cam-5");
    wait_for(&mut rx, |note| note.state == SessionState::Connected).await;

    tokio::time::sleep(Duration::from_millis(150)).await;

    let snapshot = h.controller.snapshot().await.expect("session");
    assert_eq!(snapshot.state, SessionState::Connected);

    Ok(())
}
