use facecall_client::{CaptureError, CaptureSource, SyntheticCapture};

use crate::integration::create_test_pipeline;
use crate::utils::{MockDetector, STEP_TIMEOUT_MS, init_tracing, wait_until};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_synthetic_capture_drives_pipeline() {
    init_tracing();
    let (pipeline, _detector, sink) = create_test_pipeline(MockDetector::face());
    let mut capture = SyntheticCapture::new(64, 48, 100);

    capture.start(pipeline.clone()).unwrap();
    assert!(capture.is_running());
    assert!(matches!(
        capture.start(pipeline.clone()),
        Err(CaptureError::AlreadyRunning)
    ));

    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() >= 10).await);
    capture.stop();
    assert!(!capture.is_running());

    let produced = capture.frames_produced();
    assert_eq!(pipeline.stats().frames_captured, produced);
    assert!(wait_until(STEP_TIMEOUT_MS, || sink.len() as u64 == produced).await);

    let timestamps: Vec<i64> = sink.frames().iter().map(|f| f.timestamp_ns()).collect();
    assert!(timestamps.iter().all(|&ts| ts >= 0));
}
