use crate::pipeline::{LandmarkDetector, VideoFrame, render_landmarks};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

/// Destination of pipeline output. Must not block.
pub trait FrameSink: Send + Sync {
    fn emit(&self, frame: VideoFrame);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames_captured: u64,
    pub detections_started: u64,
    pub frames_augmented: u64,
    pub empty_detections: u64,
    pub failed_detections: u64,
    pub cached_emitted: u64,
    pub raw_emitted: u64,
    pub stale_completions: u64,
}

#[derive(Default)]
struct Counters {
    frames_captured: AtomicU64,
    detections_started: AtomicU64,
    frames_augmented: AtomicU64,
    empty_detections: AtomicU64,
    failed_detections: AtomicU64,
    cached_emitted: AtomicU64,
    raw_emitted: AtomicU64,
    stale_completions: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            detections_started: self.detections_started.load(Ordering::Relaxed),
            frames_augmented: self.frames_augmented.load(Ordering::Relaxed),
            empty_detections: self.empty_detections.load(Ordering::Relaxed),
            failed_detections: self.failed_detections.load(Ordering::Relaxed),
            cached_emitted: self.cached_emitted.load(Ordering::Relaxed),
            raw_emitted: self.raw_emitted.load(Ordering::Relaxed),
            stale_completions: self.stale_completions.load(Ordering::Relaxed),
        }
    }
}

struct PipelineState {
    in_flight: AtomicBool,
    /// Bumped under the cache lock by every new capture session.
    generation: AtomicU64,
    last_processed: Mutex<Option<VideoFrame>>,
    counters: Counters,
}

impl PipelineState {
    fn cache(&self) -> MutexGuard<'_, Option<VideoFrame>> {
        // The slot is only ever replaced whole, so poisoning is ignored.
        self.last_processed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

enum Outcome {
    Augmented(VideoFrame),
    Raw,
}

/// Per-frame landmark augmentation with a single detection in flight.
///
/// Frames arriving while a detection runs are answered immediately with the
/// last augmented frame, or the raw frame when none exists yet. Nothing is
/// queued.
pub struct FramePipeline {
    detector: Arc<dyn LandmarkDetector>,
    sink: Arc<dyn FrameSink>,
    runtime: Handle,
    state: Arc<PipelineState>,
}

impl FramePipeline {
    pub fn new(
        detector: Arc<dyn LandmarkDetector>,
        sink: Arc<dyn FrameSink>,
        runtime: Handle,
    ) -> Self {
        Self {
            detector,
            sink,
            runtime,
            state: Arc::new(PipelineState {
                in_flight: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                last_processed: Mutex::new(None),
                counters: Counters::default(),
            }),
        }
    }

    /// Capture callback. Returns without waiting for detection.
    pub fn on_frame_captured(&self, frame: VideoFrame) {
        let state = &self.state;
        Counters::bump(&state.counters.frames_captured);

        if state
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let cached = state.cache().clone();
            match cached {
                Some(cached) => {
                    Counters::bump(&state.counters.cached_emitted);
                    self.sink.emit(cached);
                }
                None => {
                    Counters::bump(&state.counters.raw_emitted);
                    self.sink.emit(frame);
                }
            }
            return;
        }

        Counters::bump(&state.counters.detections_started);
        let generation = state.generation.load(Ordering::Acquire);
        self.runtime.spawn(process(
            Arc::clone(&self.detector),
            Arc::clone(&self.sink),
            Arc::clone(&self.state),
            generation,
            frame,
        ));
    }

    /// Resets the cache and the in-flight flag. Completions still running
    /// for the previous session are discarded.
    pub fn start_capture_session(&self) {
        let mut cache = self.state.cache();
        let generation = self.state.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *cache = None;
        self.state.in_flight.store(false, Ordering::Release);
        info!("Capture session {} started", generation);
    }

    pub fn is_detection_in_flight(&self) -> bool {
        self.state.in_flight.load(Ordering::Acquire)
    }

    pub fn last_processed_frame(&self) -> Option<VideoFrame> {
        self.state.cache().clone()
    }

    pub fn stats(&self) -> PipelineStats {
        self.state.counters.snapshot()
    }
}

async fn process(
    detector: Arc<dyn LandmarkDetector>,
    sink: Arc<dyn FrameSink>,
    state: Arc<PipelineState>,
    generation: u64,
    frame: VideoFrame,
) {
    let detected = AssertUnwindSafe(detector.detect(&frame))
        .catch_unwind()
        .await;

    let outcome = match detected {
        Ok(Ok(landmarks)) if !landmarks.is_empty() => {
            let source = frame.clone();
            match tokio::task::spawn_blocking(move || render_landmarks(&source, &landmarks)).await
            {
                Ok(rendered) => Outcome::Augmented(rendered),
                Err(e) => {
                    warn!("Overlay rendering failed: {}", e);
                    Counters::bump(&state.counters.failed_detections);
                    Outcome::Raw
                }
            }
        }
        Ok(Ok(_)) => {
            trace!("No face in frame {}", frame.timestamp_ns());
            Counters::bump(&state.counters.empty_detections);
            Outcome::Raw
        }
        Ok(Err(e)) => {
            debug!("Landmark detection failed: {}", e);
            Counters::bump(&state.counters.failed_detections);
            Outcome::Raw
        }
        Err(_) => {
            warn!("Landmark detector panicked");
            Counters::bump(&state.counters.failed_detections);
            Outcome::Raw
        }
    };

    let mut cache = state.cache();
    if state.generation.load(Ordering::Acquire) != generation {
        Counters::bump(&state.counters.stale_completions);
        debug!("Discarding detection from capture session {}", generation);
        return;
    }

    match outcome {
        Outcome::Augmented(rendered) => {
            *cache = Some(rendered.clone());
            Counters::bump(&state.counters.frames_augmented);
            sink.emit(rendered);
        }
        Outcome::Raw => {
            Counters::bump(&state.counters.raw_emitted);
            sink.emit(frame);
        }
    }
    state.in_flight.store(false, Ordering::Release);
    drop(cache);
}
