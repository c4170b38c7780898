use crate::transport::SampleWriter;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};
use webrtc::media::Sample;

/// 20 ms Opus frame of silence.
pub const OPUS_SILENCE: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Encoded audio for the outgoing audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPacket {
    pub data: Bytes,
    pub duration: Duration,
}

/// Destination of captured audio. Must not block.
pub trait AudioSink: Send + Sync {
    fn emit(&self, packet: AudioPacket);
}

/// Capture sink of the outgoing audio track.
///
/// While the track is disabled every packet goes out as Opus silence, so
/// the remote side keeps its timing but hears nothing.
pub struct AudioFeed {
    tx: mpsc::Sender<AudioPacket>,
    closed: AtomicBool,
    silenced: Arc<AtomicU64>,
}

impl AudioFeed {
    pub(crate) fn spawn(
        writer: Arc<dyn SampleWriter>,
        enabled: Arc<AtomicBool>,
        capacity: usize,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let silenced = Arc::new(AtomicU64::new(0));
        tokio::spawn(run_audio(rx, writer, enabled, Arc::clone(&silenced)));

        Arc::new(Self {
            tx,
            closed: AtomicBool::new(false),
            silenced,
        })
    }

    /// Packets replaced by silence while the track was disabled.
    pub fn silenced_packets(&self) -> u64 {
        self.silenced.load(Ordering::Relaxed)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl AudioSink for AudioFeed {
    fn emit(&self, packet: AudioPacket) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        match self.tx.try_send(packet) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!("Audio writer busy, packet dropped"),
            Err(TrySendError::Closed(_)) => trace!("Audio feed closed"),
        }
    }
}

async fn run_audio(
    mut rx: mpsc::Receiver<AudioPacket>,
    writer: Arc<dyn SampleWriter>,
    enabled: Arc<AtomicBool>,
    silenced: Arc<AtomicU64>,
) {
    while let Some(packet) = rx.recv().await {
        let data = if enabled.load(Ordering::Acquire) {
            packet.data
        } else {
            silenced.fetch_add(1, Ordering::Relaxed);
            Bytes::from_static(&OPUS_SILENCE)
        };

        let sample = Sample {
            data,
            duration: packet.duration,
            ..Default::default()
        };
        if let Err(e) = writer.write(&sample).await {
            debug!("Failed to write audio sample: {}", e);
        }
    }
    debug!("Audio feed finished");
}
