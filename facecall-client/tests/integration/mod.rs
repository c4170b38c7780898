pub mod controller_tests;

use std::sync::Arc;

use facecall_client::{ConnectionController, FramePipeline};

use crate::utils::{MockBehavior, MockDetector, MockEngine, RecordingSink};

pub fn create_test_controller(behavior: MockBehavior) -> (ConnectionController, MockEngine) {
    let engine = MockEngine::with_behavior(behavior);
    let controller = ConnectionController::new(Arc::new(engine.clone()));
    (controller, engine)
}

pub fn create_test_pipeline(
    detector: MockDetector,
) -> (Arc<FramePipeline>, Arc<MockDetector>, Arc<RecordingSink>) {
    let detector = Arc::new(detector);
    let sink = Arc::new(RecordingSink::new());
    let pipeline = FramePipeline::new(
        detector.clone(),
        sink.clone(),
        tokio::runtime::Handle::current(),
    );
    (Arc::new(pipeline), detector, sink)
}
