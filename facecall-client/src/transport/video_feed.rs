use crate::pipeline::{FrameSink, VideoFrame};
use crate::transport::SampleWriter;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};
use webrtc::media::Sample;

/// Turns raw frames into encoded samples for the outgoing video track.
pub trait VideoEncoder: Send + Sync {
    /// `Ok(None)` when the encoder consumed the frame without producing output.
    fn encode(&self, frame: &VideoFrame) -> anyhow::Result<Option<Bytes>>;
}

/// Capture sink of the outgoing video track.
///
/// Emission never waits: when the encoder is behind, the frame is dropped.
pub struct VideoFeed {
    tx: mpsc::Sender<VideoFrame>,
    enabled: Arc<AtomicBool>,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl VideoFeed {
    pub(crate) fn spawn(
        writer: Arc<dyn SampleWriter>,
        encoder: Option<Arc<dyn VideoEncoder>>,
        enabled: Arc<AtomicBool>,
        capacity: usize,
        frame_rate: u32,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_encoder(rx, writer, encoder, Arc::clone(&enabled), frame_rate));

        Arc::new(Self {
            tx,
            enabled,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        })
    }

    /// Frames discarded because the encoder was still busy.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl FrameSink for VideoFeed {
    fn emit(&self, frame: VideoFrame) {
        if self.closed.load(Ordering::Acquire) || !self.enabled.load(Ordering::Acquire) {
            return;
        }

        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("Encoder busy, frame dropped");
            }
            Err(TrySendError::Closed(_)) => trace!("Video feed closed"),
        }
    }
}

async fn run_encoder(
    mut rx: mpsc::Receiver<VideoFrame>,
    writer: Arc<dyn SampleWriter>,
    encoder: Option<Arc<dyn VideoEncoder>>,
    enabled: Arc<AtomicBool>,
    frame_rate: u32,
) {
    let Some(encoder) = encoder else {
        debug!("No video encoder configured, outgoing frames are discarded");
        while rx.recv().await.is_some() {}
        return;
    };

    let nominal = Duration::from_secs(1) / frame_rate.max(1);
    let mut last_timestamp: Option<i64> = None;

    while let Some(frame) = rx.recv().await {
        if !enabled.load(Ordering::Acquire) {
            continue;
        }

        let duration = match last_timestamp {
            Some(prev) if frame.timestamp_ns() > prev => {
                Duration::from_nanos((frame.timestamp_ns() - prev) as u64)
            }
            _ => nominal,
        };
        last_timestamp = Some(frame.timestamp_ns());

        let data = match encoder.encode(&frame) {
            Ok(Some(data)) => data,
            Ok(None) => continue,
            Err(e) => {
                warn!("Video encoding failed: {:?}", e);
                continue;
            }
        };

        let sample = Sample {
            data,
            duration,
            ..Default::default()
        };
        if let Err(e) = writer.write(&sample).await {
            debug!("Failed to write video sample: {}", e);
        }
    }

    debug!("Video feed finished");
}
