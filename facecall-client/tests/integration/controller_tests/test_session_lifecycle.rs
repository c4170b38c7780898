use std::time::Duration;

use facecall_client::{NegotiationPhase, TrackKind};
use facecall_core::{Error, SdpKind, SessionDescriptor};

use crate::integration::create_test_controller;
use crate::utils::{MOCK_ANSWER_SDP, MockBehavior, PeerCall, host_candidate, init_tracing};

#[tokio::test]
async fn test_second_create_session_fails_until_teardown() {
    init_tracing();
    let (controller, engine) = create_test_controller(MockBehavior::default());

    controller.create_session().await.expect("first create");
    let err = controller.create_session().await.unwrap_err();
    assert!(matches!(err, Error::AlreadyInitialized));
    assert!(err.is_usage_error());
    assert_eq!(engine.peer_count(), 1);

    controller.teardown().await;
    controller.create_session().await.expect("create after teardown");
    assert_eq!(engine.peer_count(), 2);
}

#[tokio::test]
async fn test_concurrent_create_session_single_winner() {
    init_tracing();
    let (controller, engine) = create_test_controller(MockBehavior {
        creation_delay: Duration::from_millis(50),
        ..Default::default()
    });

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let controller = controller.clone();
            tokio::spawn(async move { controller.create_session().await })
        })
        .collect();

    let mut succeeded = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(e) => assert!(matches!(e, Error::AlreadyInitialized), "unexpected {e}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(engine.creations(), 1);
}

#[tokio::test]
async fn test_operations_without_session_fail() {
    init_tracing();
    let (controller, _engine) = create_test_controller(MockBehavior::default());

    assert!(matches!(controller.create_offer().await, Err(Error::NotInitialized)));
    assert!(matches!(controller.create_answer().await, Err(Error::NotInitialized)));
    assert!(matches!(
        controller
            .apply_remote_description(SessionDescriptor::answer(MOCK_ANSWER_SDP))
            .await,
        Err(Error::NotInitialized)
    ));
    assert!(matches!(
        controller.apply_remote_candidate(host_candidate(1)).await,
        Err(Error::NotInitialized)
    ));

    controller.create_session().await.unwrap();
    controller.teardown().await;
    assert!(matches!(controller.create_offer().await, Err(Error::NotInitialized)));
    assert_eq!(controller.phase(), NegotiationPhase::Closed);
}

#[tokio::test]
async fn test_teardown_is_idempotent() {
    init_tracing();
    let (controller, engine) = create_test_controller(MockBehavior::default());

    controller.teardown().await;
    controller.create_session().await.unwrap();
    controller.teardown().await;
    controller.teardown().await;

    let peer = engine.last_peer().unwrap();
    assert!(peer.is_closed());
    assert_eq!(
        peer.calls().iter().filter(|c| **c == PeerCall::Close).count(),
        1
    );
}

#[tokio::test]
async fn test_host_phases() {
    init_tracing();
    let (controller, engine) = create_test_controller(MockBehavior::default());
    assert_eq!(controller.phase(), NegotiationPhase::Idle);

    controller.create_session().await.unwrap();
    assert_eq!(controller.phase(), NegotiationPhase::SessionCreated);

    let offer = controller.create_offer().await.unwrap();
    assert_eq!(offer.kind, SdpKind::Offer);
    assert_eq!(controller.phase(), NegotiationPhase::OfferSent);

    controller
        .apply_remote_description(SessionDescriptor::answer(MOCK_ANSWER_SDP))
        .await
        .unwrap();
    assert_eq!(controller.phase(), NegotiationPhase::RemoteApplied);
    assert!(controller.has_remote_description().await);

    let peer = engine.last_peer().unwrap();
    peer.emit_state(facecall_core::ConnectionState::Checking);
    peer.emit_state(facecall_core::ConnectionState::Connected);
    assert_eq!(controller.phase(), NegotiationPhase::Connected);

    assert_eq!(
        peer.calls(),
        vec![
            PeerCall::CreateOffer,
            PeerCall::SetLocal(SdpKind::Offer),
            PeerCall::SetRemote(SdpKind::Answer),
        ]
    );

    controller.teardown().await;
    assert_eq!(controller.phase(), NegotiationPhase::Closed);
}

#[tokio::test]
async fn test_guest_phases() {
    init_tracing();
    let (controller, _engine) = create_test_controller(MockBehavior::default());

    controller.create_session().await.unwrap();
    controller
        .apply_remote_description(SessionDescriptor::offer("v=0\r\n"))
        .await
        .unwrap();
    assert_eq!(controller.phase(), NegotiationPhase::SessionCreated);

    let answer = controller.create_answer().await.unwrap();
    assert_eq!(answer.kind, SdpKind::Answer);
    assert_eq!(controller.phase(), NegotiationPhase::RemoteApplied);
}

#[tokio::test]
async fn test_missing_description_is_negotiation_failure() {
    init_tracing();
    let (controller, engine) = create_test_controller(MockBehavior {
        produce_description: false,
        ..Default::default()
    });

    controller.create_session().await.unwrap();
    let err = controller.create_offer().await.unwrap_err();
    assert!(matches!(err, Error::NegotiationFailed(_)));
    assert!(err.is_retryable());

    // No local description was set.
    assert_eq!(engine.last_peer().unwrap().calls(), vec![PeerCall::CreateOffer]);
    assert_eq!(controller.phase(), NegotiationPhase::SessionCreated);
}

#[tokio::test]
async fn test_remote_description_failure_propagates() {
    init_tracing();
    let (controller, _engine) = create_test_controller(MockBehavior {
        fail_remote_description: true,
        ..Default::default()
    });

    controller.create_session().await.unwrap();
    let err = controller
        .apply_remote_description(SessionDescriptor::offer("v=0\r\n"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(!controller.has_remote_description().await);
}

#[tokio::test]
async fn test_failed_creation_leaves_controller_idle() {
    init_tracing();
    let (controller, _engine) = create_test_controller(MockBehavior {
        fail_creation: true,
        ..Default::default()
    });

    assert!(matches!(controller.create_session().await, Err(Error::Transport(_))));
    assert_eq!(controller.phase(), NegotiationPhase::Idle);
    assert!(!controller.has_session().await);
}

#[tokio::test]
async fn test_track_toggles() {
    init_tracing();
    let (controller, _engine) = create_test_controller(MockBehavior::default());

    // No session: ignored.
    controller.set_audio_enabled(false).await;
    assert_eq!(controller.is_track_enabled(TrackKind::Audio).await, None);

    controller.create_session().await.unwrap();
    controller.set_audio_enabled(false).await;
    controller.set_video_enabled(false).await;
    assert_eq!(controller.is_track_enabled(TrackKind::Audio).await, Some(false));
    assert_eq!(controller.is_track_enabled(TrackKind::Video).await, Some(false));

    controller.set_video_enabled(true).await;
    assert_eq!(controller.is_track_enabled(TrackKind::Video).await, Some(true));
    assert!(controller.audio_sink().await.is_some());

    controller.teardown().await;
    assert!(controller.audio_sink().await.is_none());
}
