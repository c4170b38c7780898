use facecall_client::MARKER_COLOR;
use image::Rgba;

use crate::integration::create_test_pipeline;
use crate::utils::{DetectorOutcome, MockDetector, STEP_TIMEOUT_MS, gray_frame, init_tracing, wait_until};

#[tokio::test]
async fn test_no_face_emits_raw_frame() {
    init_tracing();
    let (pipeline, _detector, sink) = create_test_pipeline(MockDetector::new(DetectorOutcome::Empty));
    pipeline.start_capture_session();

    let frame = gray_frame(10);
    pipeline.on_frame_captured(frame.clone());
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 1).await);

    assert!(sink.last().unwrap().shares_buffer(&frame));
    assert!(pipeline.last_processed_frame().is_none());
    assert_eq!(pipeline.stats().empty_detections, 1);
}

#[tokio::test]
async fn test_failure_emits_raw_and_keeps_cache() {
    init_tracing();
    let (pipeline, detector, sink) = create_test_pipeline(MockDetector::face());
    pipeline.start_capture_session();

    pipeline.on_frame_captured(gray_frame(1));
    assert!(wait_until(STEP_TIMEOUT_MS, || !pipeline.is_detection_in_flight()).await);
    let cached = pipeline.last_processed_frame().unwrap();

    detector.set_outcome(DetectorOutcome::Fail);
    let failing = gray_frame(2);
    pipeline.on_frame_captured(failing.clone());
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 2).await);
    assert!(wait_until(STEP_TIMEOUT_MS, || !pipeline.is_detection_in_flight()).await);

    assert!(sink.last().unwrap().shares_buffer(&failing));
    assert!(pipeline.last_processed_frame().unwrap().shares_buffer(&cached));
    assert_eq!(pipeline.stats().failed_detections, 1);

    detector.set_outcome(DetectorOutcome::Empty);
    pipeline.on_frame_captured(gray_frame(3));
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 3).await);
    assert!(pipeline.last_processed_frame().unwrap().shares_buffer(&cached));
}

#[tokio::test]
async fn test_detector_panic_is_absorbed() {
    init_tracing();
    let (pipeline, detector, sink) = create_test_pipeline(MockDetector::new(DetectorOutcome::Panic));
    pipeline.start_capture_session();

    pipeline.on_frame_captured(gray_frame(1));
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 1).await);
    assert!(wait_until(STEP_TIMEOUT_MS, || !pipeline.is_detection_in_flight()).await);

    detector.set_outcome(DetectorOutcome::Empty);
    pipeline.on_frame_captured(gray_frame(2));
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 2).await);
    assert_eq!(detector.calls(), 2);
}

#[tokio::test]
async fn test_source_buffer_never_mutated() {
    init_tracing();
    let (pipeline, _detector, sink) = create_test_pipeline(MockDetector::face());
    pipeline.start_capture_session();

    let frame = gray_frame(5);
    pipeline.on_frame_captured(frame.clone());
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 1).await);

    let out = sink.last().unwrap();
    assert!(!out.shares_buffer(&frame));
    assert_eq!(out.timestamp_ns(), 5);
    assert_eq!(*out.buffer().get_pixel(20, 15), MARKER_COLOR);
    assert!(frame.buffer().pixels().all(|p| *p == Rgba([50, 50, 50, 255])));
}

#[tokio::test]
async fn test_same_frame_renders_identically() {
    init_tracing();
    let (pipeline, _detector, sink) = create_test_pipeline(MockDetector::face());
    pipeline.start_capture_session();

    let frame = gray_frame(9);
    pipeline.on_frame_captured(frame.clone());
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 1).await);
    assert!(wait_until(STEP_TIMEOUT_MS, || !pipeline.is_detection_in_flight()).await);
    pipeline.on_frame_captured(frame.clone());
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 2).await);

    let frames = sink.frames();
    assert!(!frames[0].shares_buffer(&frames[1]));
    assert_eq!(frames[0].buffer(), frames[1].buffer());
    assert_eq!(pipeline.stats().frames_augmented, 2);
}

#[tokio::test]
async fn test_persistent_failure_passes_every_frame_through() {
    init_tracing();
    let (pipeline, detector, sink) =
        create_test_pipeline(MockDetector::new(DetectorOutcome::Fail).gated());
    pipeline.start_capture_session();

    let captured: Vec<_> = (1..=7).map(gray_frame).collect();

    // 1 starts a detection; 2 and 3 arrive while it is held.
    pipeline.on_frame_captured(captured[0].clone());
    pipeline.on_frame_captured(captured[1].clone());
    pipeline.on_frame_captured(captured[2].clone());
    detector.release(1);
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 3).await);
    assert!(wait_until(STEP_TIMEOUT_MS, || !pipeline.is_detection_in_flight()).await);

    // 4 starts the next one; 5 and 6 overlap it; 7 runs after it.
    pipeline.on_frame_captured(captured[3].clone());
    pipeline.on_frame_captured(captured[4].clone());
    pipeline.on_frame_captured(captured[5].clone());
    detector.release(1);
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 6).await);
    assert!(wait_until(STEP_TIMEOUT_MS, || !pipeline.is_detection_in_flight()).await);
    pipeline.on_frame_captured(captured[6].clone());
    detector.release(1);
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 7).await);
    assert!(wait_until(STEP_TIMEOUT_MS, || !pipeline.is_detection_in_flight()).await);

    let emitted = sink.frames();
    for frame in &captured {
        let matches = emitted.iter().filter(|out| out.shares_buffer(frame)).count();
        assert_eq!(matches, 1, "frame {} emitted {} times", frame.timestamp_ns(), matches);
    }
    assert!(pipeline.last_processed_frame().is_none());

    let stats = pipeline.stats();
    assert_eq!(stats.failed_detections, 3);
    assert_eq!(stats.raw_emitted, 7);
    assert_eq!(stats.cached_emitted, 0);
}
