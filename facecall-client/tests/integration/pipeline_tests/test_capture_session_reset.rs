use crate::integration::create_test_pipeline;
use crate::utils::{MockDetector, STEP_TIMEOUT_MS, gray_frame, init_tracing, wait_until};

#[tokio::test]
async fn test_new_session_clears_cache_and_flag() {
    init_tracing();
    let (pipeline, detector, sink) = create_test_pipeline(MockDetector::face().gated());
    pipeline.start_capture_session();

    pipeline.on_frame_captured(gray_frame(1));
    detector.release(1);
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 1).await);
    assert!(wait_until(STEP_TIMEOUT_MS, || !pipeline.is_detection_in_flight()).await);
    assert!(pipeline.last_processed_frame().is_some());

    pipeline.on_frame_captured(gray_frame(2));
    assert!(pipeline.is_detection_in_flight());

    pipeline.start_capture_session();
    assert!(!pipeline.is_detection_in_flight());
    assert!(pipeline.last_processed_frame().is_none());
}

#[tokio::test]
async fn test_completion_from_previous_session_is_inert() {
    init_tracing();
    let (pipeline, detector, sink) = create_test_pipeline(MockDetector::face().gated());
    pipeline.start_capture_session();

    pipeline.on_frame_captured(gray_frame(1));
    assert!(wait_until(STEP_TIMEOUT_MS, || detector.calls() == 1).await);
    pipeline.start_capture_session();

    detector.release(1);
    assert!(wait_until(STEP_TIMEOUT_MS, || pipeline.stats().stale_completions == 1).await);
    assert_eq!(sink.len(), 0);
    assert!(pipeline.last_processed_frame().is_none());

    pipeline.on_frame_captured(gray_frame(2));
    assert!(pipeline.is_detection_in_flight());
    detector.release(1);
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() == 1).await);
    assert_eq!(sink.last().unwrap().timestamp_ns(), 2);
}
