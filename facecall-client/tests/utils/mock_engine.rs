use async_trait::async_trait;
use facecall_client::{
    AudioSink, FrameSink, MediaEngine, PeerConnection, PeerEventSink, TrackKind,
};
use facecall_core::{ConnectionState, Error, IceCandidate, Result, SdpKind, SessionDescriptor};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::recording_sink::{RecordingAudioSink, RecordingSink};

pub const MOCK_OFFER_SDP: &str = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=mock-offer\r\n";
pub const MOCK_ANSWER_SDP: &str = "v=0\r\no=- 2 1 IN IP4 127.0.0.1\r\ns=mock-answer\r\n";

/// How peers created by a [`MockEngine`] behave.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// `false` makes create_offer/create_answer produce no description.
    pub produce_description: bool,
    /// create_offer never resolves.
    pub hang_offer: bool,
    pub fail_remote_description: bool,
    pub creation_delay: Duration,
    pub fail_creation: bool,
    /// How long close takes to complete.
    pub close_delay: Duration,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            produce_description: true,
            hang_offer: false,
            fail_remote_description: false,
            creation_delay: Duration::ZERO,
            fail_creation: false,
            close_delay: Duration::ZERO,
        }
    }
}

/// Calls a [`MockPeer`] received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerCall {
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpKind),
    SetRemote(SdpKind),
    AddCandidate(IceCandidate),
    Close,
}

/// MediaEngine whose peers record every call and let tests inject events.
#[derive(Clone, Default)]
pub struct MockEngine {
    behavior: Arc<Mutex<MockBehavior>>,
    peers: Arc<Mutex<Vec<Arc<MockPeer>>>>,
    creations: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        let engine = Self::default();
        *engine.behavior.lock().unwrap() = behavior;
        engine
    }

    pub fn last_peer(&self) -> Option<Arc<MockPeer>> {
        self.peers.lock().unwrap().last().cloned()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    /// Creation attempts, including failed ones.
    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    async fn new_peer_connection(
        &self,
        events: Arc<dyn PeerEventSink>,
    ) -> Result<Arc<dyn PeerConnection>> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().unwrap().clone();
        if !behavior.creation_delay.is_zero() {
            tokio::time::sleep(behavior.creation_delay).await;
        }
        if behavior.fail_creation {
            return Err(Error::Transport("mock creation failure".into()));
        }

        let peer = Arc::new(MockPeer {
            events,
            behavior,
            calls: Mutex::new(Vec::new()),
            audio: AtomicBool::new(true),
            video: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            sink: Arc::new(RecordingSink::new()),
            audio_sink: Arc::new(RecordingAudioSink::default()),
        });
        self.peers.lock().unwrap().push(Arc::clone(&peer));
        Ok(peer)
    }
}

pub struct MockPeer {
    events: Arc<dyn PeerEventSink>,
    behavior: MockBehavior,
    calls: Mutex<Vec<PeerCall>>,
    audio: AtomicBool,
    video: AtomicBool,
    closed: AtomicBool,
    pub sink: Arc<RecordingSink>,
    pub audio_sink: Arc<RecordingAudioSink>,
}

impl MockPeer {
    pub fn calls(&self) -> Vec<PeerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn applied_candidates(&self) -> Vec<IceCandidate> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PeerCall::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn emit_state(&self, state: ConnectionState) {
        self.events.connection_state_changed(state);
    }

    pub fn emit_candidate(&self, candidate: IceCandidate) {
        self.events.candidate_generated(candidate);
    }

    pub fn emit_data_channel(&self, label: &str) {
        self.events.data_channel_opened(label.to_owned());
    }

    fn record(&self, call: PeerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    async fn create_offer(&self) -> Result<Option<SessionDescriptor>> {
        self.record(PeerCall::CreateOffer);
        if self.behavior.hang_offer {
            futures::future::pending::<()>().await;
        }
        Ok(self
            .behavior
            .produce_description
            .then(|| SessionDescriptor::offer(MOCK_OFFER_SDP)))
    }

    async fn create_answer(&self) -> Result<Option<SessionDescriptor>> {
        self.record(PeerCall::CreateAnswer);
        Ok(self
            .behavior
            .produce_description
            .then(|| SessionDescriptor::answer(MOCK_ANSWER_SDP)))
    }

    async fn set_local_description(&self, desc: SessionDescriptor) -> Result<()> {
        self.record(PeerCall::SetLocal(desc.kind));
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescriptor) -> Result<()> {
        self.record(PeerCall::SetRemote(desc.kind));
        if self.behavior.fail_remote_description {
            return Err(Error::Transport("mock rejected remote description".into()));
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(PeerCall::AddCandidate(candidate));
        Ok(())
    }

    fn set_track_enabled(&self, kind: TrackKind, enabled: bool) {
        match kind {
            TrackKind::Audio => self.audio.store(enabled, Ordering::SeqCst),
            TrackKind::Video => self.video.store(enabled, Ordering::SeqCst),
        }
    }

    fn is_track_enabled(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Audio => self.audio.load(Ordering::SeqCst),
            TrackKind::Video => self.video.load(Ordering::SeqCst),
        }
    }

    fn audio_sink(&self) -> Arc<dyn AudioSink> {
        Arc::clone(&self.audio_sink) as Arc<dyn AudioSink>
    }

    fn video_sink(&self) -> Arc<dyn FrameSink> {
        Arc::clone(&self.sink) as Arc<dyn FrameSink>
    }

    async fn close(&self) -> Result<()> {
        self.record(PeerCall::Close);
        if !self.behavior.close_delay.is_zero() {
            tokio::time::sleep(self.behavior.close_delay).await;
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
