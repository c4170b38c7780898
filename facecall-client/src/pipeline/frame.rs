use image::RgbaImage;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameRotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

/// A captured or processed video frame.
///
/// The pixel buffer is shared and never written after construction, so
/// cloning a frame is cheap.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    buffer: Arc<RgbaImage>,
    timestamp_ns: i64,
    rotation: FrameRotation,
}

impl VideoFrame {
    pub fn new(buffer: RgbaImage, timestamp_ns: i64) -> Self {
        Self {
            buffer: Arc::new(buffer),
            timestamp_ns,
            rotation: FrameRotation::Deg0,
        }
    }

    pub fn with_rotation(mut self, rotation: FrameRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// New frame around `buffer` carrying this frame's timestamp and rotation.
    pub fn derive(&self, buffer: RgbaImage) -> Self {
        Self {
            buffer: Arc::new(buffer),
            timestamp_ns: self.timestamp_ns,
            rotation: self.rotation,
        }
    }

    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    pub fn rotation(&self) -> FrameRotation {
        self.rotation
    }

    /// True when both frames share one pixel buffer.
    pub fn shares_buffer(&self, other: &VideoFrame) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }
}
