use crate::pipeline::{FramePipeline, VideoFrame};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraPosition {
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRateRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate_ranges: Vec<FrameRateRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureDevice {
    pub id: String,
    pub position: CameraPosition,
    pub formats: Vec<CaptureFormat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSelection {
    pub device_id: String,
    pub format: CaptureFormat,
    pub fps: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no front camera available")]
    NoFrontCamera,

    #[error("camera {0} exposes no formats")]
    NoFormats(String),

    #[error("capture already running")]
    AlreadyRunning,

    #[error("failed to start capture: {0}")]
    Start(#[from] std::io::Error),
}

/// Front camera, its widest format, and the highest max frame rate that
/// format offers.
pub fn select_capture_format(devices: &[CaptureDevice]) -> Result<CaptureSelection, CaptureError> {
    let device = devices
        .iter()
        .find(|d| d.position == CameraPosition::Front)
        .ok_or(CaptureError::NoFrontCamera)?;

    // First format wins on equal width.
    let format = device
        .formats
        .iter()
        .fold(None::<&CaptureFormat>, |best, f| match best {
            Some(b) if b.width >= f.width => Some(b),
            _ => Some(f),
        })
        .ok_or_else(|| CaptureError::NoFormats(device.id.clone()))?;

    let fps = format
        .frame_rate_ranges
        .iter()
        .map(|r| r.max)
        .fold(0.0_f64, f64::max);

    Ok(CaptureSelection {
        device_id: device.id.clone(),
        format: format.clone(),
        fps: fps.max(0.0) as u32,
    })
}

/// Producer of captured frames.
pub trait CaptureSource: Send {
    /// Starts delivering frames to `pipeline`, opening a new capture session.
    fn start(&mut self, pipeline: Arc<FramePipeline>) -> Result<(), CaptureError>;

    /// Stops delivery. Returns once no further frame will be delivered.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Test-pattern camera: a bright disc drifting over a dark background,
/// produced on its own thread at a fixed cadence.
pub struct SyntheticCapture {
    width: u32,
    height: u32,
    fps: u32,
    running: Arc<AtomicBool>,
    produced: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl SyntheticCapture {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            fps: fps.max(1),
            running: Arc::new(AtomicBool::new(false)),
            produced: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }

    pub fn from_selection(selection: &CaptureSelection) -> Self {
        Self::new(selection.format.width, selection.format.height, selection.fps)
    }

    pub fn frames_produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }
}

impl CaptureSource for SyntheticCapture {
    fn start(&mut self, pipeline: Arc<FramePipeline>) -> Result<(), CaptureError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(CaptureError::AlreadyRunning);
        }

        pipeline.start_capture_session();

        let running = Arc::clone(&self.running);
        let produced = Arc::clone(&self.produced);
        let (width, height) = (self.width, self.height);
        let interval = Duration::from_secs(1) / self.fps;

        let spawned = std::thread::Builder::new()
            .name("capture".to_owned())
            .spawn(move || {
                let started = Instant::now();
                let mut next = started;
                while running.load(Ordering::Acquire) {
                    let timestamp_ns = started.elapsed().as_nanos() as i64;
                    pipeline.on_frame_captured(synthetic_frame(width, height, timestamp_ns));
                    produced.fetch_add(1, Ordering::Relaxed);

                    next += interval;
                    let now = Instant::now();
                    if next > now {
                        std::thread::sleep(next - now);
                    } else {
                        next = now;
                    }
                }
                debug!("Capture thread finished");
            });

        match spawned {
            Ok(handle) => {
                info!("Synthetic capture started ({}x{} @ {} fps)", width, height, self.fps);
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(CaptureError::Start(e))
            }
        }
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Capture thread panicked");
            }
            info!("Synthetic capture stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Where the synthetic face sits at `timestamp_ns`.
pub fn synthetic_face_center(width: u32, height: u32, timestamp_ns: i64) -> (f32, f32) {
    let t = timestamp_ns as f64 / 1e9;
    let (w, h) = (f64::from(width), f64::from(height));
    let x = w / 2.0 + (w / 4.0) * (t * 0.7).sin();
    let y = h / 2.0 + (h / 6.0) * (t * 1.1).cos();
    (x as f32, y as f32)
}

pub fn synthetic_frame(width: u32, height: u32, timestamp_ns: i64) -> VideoFrame {
    let (cx, cy) = synthetic_face_center(width, height, timestamp_ns);
    let radius = (width.min(height) as f32 / 6.0).max(1.0);
    let image = RgbaImage::from_fn(width, height, |x, y| {
        let (dx, dy) = (x as f32 - cx, y as f32 - cy);
        if dx * dx + dy * dy <= radius * radius {
            Rgba([230, 190, 160, 255])
        } else {
            Rgba([20, 20, 30, 255])
        }
    });
    VideoFrame::new(image, timestamp_ns)
}
