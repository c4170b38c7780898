use crate::detector::SyntheticFaceDetector;
use anyhow::{Context, Result, bail};
use colored::*;
use facecall_client::{
    AudioSessionQueue, CallCoordinator, CallSession, CaptureSource, ConnectionController,
    DetectorOptions, FramePipeline, FrameSink, MemorySignaling, NegotiationPhase,
    NullAudioBackend, SyntheticCapture, TransportConfig, VideoFrame, WebRtcEngine,
};
use facecall_core::{ConnectionState, IceServerConfig, PeerId, PeerRole, RoomId};
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

pub struct LoopbackOptions {
    pub duration_secs: u64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub ice_servers: Vec<IceServerConfig>,
    pub speaker: bool,
}

/// Forwards pipeline output to the outgoing track and counts it.
struct CountingSink {
    inner: Arc<dyn FrameSink>,
    frames: AtomicU64,
}

impl FrameSink for CountingSink {
    fn emit(&self, frame: VideoFrame) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.inner.emit(frame);
    }
}

fn call_session(
    room: &RoomId,
    role: PeerRole,
    config: TransportConfig,
    signaling: &Arc<MemorySignaling>,
) -> CallSession {
    let controller = ConnectionController::new(Arc::new(WebRtcEngine::new(config)));
    CallSession::new(room.clone(), role, controller, signaling.clone())
}

fn print_states(label: &'static str, session: &CallSession) {
    let mut states = session.connection_state();
    tokio::spawn(async move {
        while let Some(state) = states.next().await {
            let shown = match state {
                ConnectionState::Connected | ConnectionState::Completed => {
                    format!("{:?}", state).green()
                }
                ConnectionState::Failed | ConnectionState::Disconnected => {
                    format!("{:?}", state).red()
                }
                _ => format!("{:?}", state).yellow(),
            };
            println!("   {} {}", format!("[{label}]").bold(), shown);
        }
    });
}

async fn wait_connected(sessions: &[&CallSession]) -> Result<()> {
    let deadline = tokio::time::Instant::now() + CONNECT_TIMEOUT;
    loop {
        let phases: Vec<_> = sessions.iter().map(|s| s.phase()).collect();
        if phases.iter().all(|p| *p == NegotiationPhase::Connected) {
            return Ok(());
        }
        if phases.iter().any(|p| p.is_terminal()) {
            bail!("Negotiation ended early: {:?}", phases);
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("Timed out waiting for connection: {:?}", phases);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

pub async fn run(options: LoopbackOptions) -> Result<()> {
    println!("{}", "📞 Starting loopback call...".green().bold());

    let signaling = Arc::new(MemorySignaling::new());
    let coordinator = CallCoordinator::new(signaling.clone());
    let (host_id, guest_id) = (PeerId::new(), PeerId::new());
    let room = RoomId::new();

    let audio = AudioSessionQueue::spawn(Box::new(NullAudioBackend))
        .context("Failed to start audio session queue")?;
    if options.speaker {
        audio.speaker_on();
    } else {
        audio.speaker_off();
    }

    // Ring the guest and let it pick up.
    let mut incoming = coordinator.watch_incoming(&guest_id);
    coordinator.start_call(&guest_id, &host_id).await?;
    while let Some(ringing) = incoming.next().await {
        if ringing {
            break;
        }
    }
    coordinator.answer_call(&guest_id).await?;
    println!("{} {}", "🔔 Call answered by".cyan(), guest_id);

    let config = TransportConfig {
        ice_servers: options.ice_servers.clone(),
        frame_rate: options.fps,
        ..TransportConfig::default()
    };
    let host = call_session(&room, PeerRole::Host, config.clone(), &signaling);
    let guest = call_session(&room, PeerRole::Guest, config, &signaling);
    print_states("host", &host);
    print_states("guest", &guest);

    host.connect().await.context("Host failed to publish an offer")?;
    guest.connect().await.context("Guest failed to answer")?;
    coordinator.connecting_call(&guest_id).await?;

    wait_connected(&[&host, &guest]).await?;
    println!("{}", "✅ Peers connected".green().bold());

    let outgoing = host
        .video_sink()
        .await
        .context("Host has no outgoing video track")?;
    let sink = Arc::new(CountingSink {
        inner: outgoing,
        frames: AtomicU64::new(0),
    });
    let detector = Arc::new(SyntheticFaceDetector::new(DetectorOptions::default()));
    let pipeline = Arc::new(FramePipeline::new(
        detector,
        sink.clone(),
        tokio::runtime::Handle::current(),
    ));

    let mut capture = SyntheticCapture::new(options.width, options.height, options.fps);
    capture.start(pipeline.clone())?;
    println!(
        "{} {}x{} @ {} fps for {}s",
        "🎥 Streaming".cyan(),
        options.width,
        options.height,
        options.fps,
        options.duration_secs
    );

    tokio::time::sleep(Duration::from_secs(options.duration_secs)).await;
    let produced = tokio::task::spawn_blocking(move || {
        capture.stop();
        capture.frames_produced()
    })
    .await?;

    let stats = pipeline.stats();
    info!("Pipeline stats: {:?}", stats);

    guest.end_call().await?;
    host.end_call().await?;
    coordinator.cancel_call(&guest_id).await?;
    audio.reset();
    audio.shutdown();

    println!("{}", "✨ Call finished".green().bold());
    println!("   🎞  Captured:  {}", produced);
    println!("   🙂 Augmented: {}", stats.frames_augmented);
    println!("   ♻️  Cached:    {}", stats.cached_emitted);
    println!("   ⬜ Raw:       {}", stats.raw_emitted);
    println!("   📤 Sent:      {}", sink.frames.load(Ordering::Relaxed));

    Ok(())
}
