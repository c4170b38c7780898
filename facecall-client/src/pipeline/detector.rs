use crate::pipeline::VideoFrame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LandmarkType {
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftCheek,
    RightCheek,
    NoseBase,
    MouthLeft,
    MouthRight,
    MouthBottom,
}

/// Pixel position, origin at the top-left corner of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub kind: LandmarkType,
    pub position: LandmarkPoint,
}

impl Landmark {
    pub fn new(kind: LandmarkType, x: f32, y: f32) -> Self {
        Self {
            kind,
            position: LandmarkPoint { x, y },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("detector failed: {0}")]
    Failed(String),

    #[error("unsupported frame: {0}")]
    UnsupportedFrame(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceMode {
    Fast,
    Accurate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LandmarkMode {
    None,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationMode {
    None,
    All,
}

/// Detector modes, fixed when the detector is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorOptions {
    pub performance_mode: PerformanceMode,
    pub landmark_mode: LandmarkMode,
    pub classification_mode: ClassificationMode,
}

impl Default for DetectorOptions {
    /// Low latency: fast mode, every landmark, no classification.
    fn default() -> Self {
        Self {
            performance_mode: PerformanceMode::Fast,
            landmark_mode: LandmarkMode::All,
            classification_mode: ClassificationMode::None,
        }
    }
}

/// Face-landmark detection over a single frame.
#[async_trait]
pub trait LandmarkDetector: Send + Sync {
    /// An empty list means no face was found.
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<Landmark>, DetectionError>;

    fn options(&self) -> DetectorOptions {
        DetectorOptions::default()
    }
}
