use async_trait::async_trait;
use facecall_client::{
    DetectionError, DetectorOptions, Landmark, LandmarkDetector, LandmarkType, VideoFrame,
    synthetic_face_center,
};

/// Finds the face that `SyntheticCapture` draws, by construction.
pub struct SyntheticFaceDetector {
    options: DetectorOptions,
}

impl SyntheticFaceDetector {
    pub fn new(options: DetectorOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl LandmarkDetector for SyntheticFaceDetector {
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<Landmark>, DetectionError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(DetectionError::UnsupportedFrame("empty frame".into()));
        }

        let (cx, cy) = synthetic_face_center(frame.width(), frame.height(), frame.timestamp_ns());
        let r = frame.width().min(frame.height()) as f32 / 6.0;
        Ok(vec![
            Landmark::new(LandmarkType::LeftEye, cx - r * 0.4, cy - r * 0.3),
            Landmark::new(LandmarkType::RightEye, cx + r * 0.4, cy - r * 0.3),
            Landmark::new(LandmarkType::NoseBase, cx, cy + r * 0.1),
            Landmark::new(LandmarkType::MouthLeft, cx - r * 0.3, cy + r * 0.5),
            Landmark::new(LandmarkType::MouthRight, cx + r * 0.3, cy + r * 0.5),
            Landmark::new(LandmarkType::MouthBottom, cx, cy + r * 0.6),
        ])
    }

    fn options(&self) -> DetectorOptions {
        self.options
    }
}
