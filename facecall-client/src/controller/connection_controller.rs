use crate::controller::NegotiationPhase;
use crate::controller::fanout::EventFanout;
use crate::controller::negotiation::Milestones;
use crate::controller::remote_candidates::{Admission, RemoteCandidates};
use crate::pipeline::FrameSink;
use crate::transport::{AudioSink, MediaEngine, PeerConnection, PeerEventSink, TrackKind};
use facecall_core::{ConnectionState, Error, IceCandidate, Result, SdpKind, SessionDescriptor};
use futures::Stream;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Drives one peer connection through offer/answer negotiation.
///
/// At most one session exists at a time. Every operation other than
/// [`create_session`](Self::create_session) fails with
/// [`Error::NotInitialized`] when no session exists, and operations
/// suspended on the transport resume with [`Error::Cancelled`] when the
/// session is torn down underneath them.
#[derive(Clone)]
pub struct ConnectionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    engine: Arc<dyn MediaEngine>,
    /// Doubles as the creation lock.
    slot: tokio::sync::Mutex<Option<Arc<ActiveSession>>>,
    hub: Arc<EventHub>,
}

struct ActiveSession {
    peer: Arc<dyn PeerConnection>,
    epoch: u64,
    cancel: watch::Sender<bool>,
    remote: tokio::sync::Mutex<RemoteCandidates>,
}

impl ActiveSession {
    /// Runs `op` unless the session is cancelled first.
    async fn guard<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        let cancelled = self.cancel.subscribe();
        if *cancelled.borrow() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = wait_cancelled(cancelled) => Err(Error::Cancelled),
            result = op => result,
        }
    }
}

async fn wait_cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Fans peer events out to observers. Shared across sessions; only events
/// tagged with the live epoch get through.
struct EventHub {
    next_epoch: AtomicU64,
    /// Epoch of the current session, 0 when there is none.
    live_epoch: AtomicU64,
    milestones: Mutex<Milestones>,
    states: EventFanout<ConnectionState>,
    candidates: EventFanout<IceCandidate>,
    data_channels: EventFanout<String>,
}

impl EventHub {
    fn new() -> Self {
        Self {
            next_epoch: AtomicU64::new(1),
            live_epoch: AtomicU64::new(0),
            milestones: Mutex::new(Milestones::default()),
            states: EventFanout::new(),
            candidates: EventFanout::new(),
            data_channels: EventFanout::new(),
        }
    }

    fn is_live(&self, epoch: u64) -> bool {
        self.live_epoch.load(Ordering::Acquire) == epoch
    }

    fn milestones(&self) -> MutexGuard<'_, Milestones> {
        self.milestones
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin_session(&self) -> u64 {
        let epoch = self.next_epoch.fetch_add(1, Ordering::AcqRel);
        *self.milestones() = Milestones {
            session: true,
            ..Default::default()
        };
        self.live_epoch.store(epoch, Ordering::Release);
        epoch
    }

    fn abort_session(&self, epoch: u64) {
        if self
            .live_epoch
            .compare_exchange(epoch, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            *self.milestones() = Milestones::default();
        }
    }

    fn end_session(&self, epoch: u64) {
        if self
            .live_epoch
            .compare_exchange(epoch, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.milestones().closed = true;
        }
    }

    fn record(&self, epoch: u64, update: impl FnOnce(&mut Milestones)) {
        let mut milestones = self.milestones();
        if self.is_live(epoch) {
            update(&mut milestones);
        }
    }

    fn close_streams(&self) {
        self.states.close();
        self.candidates.close();
        self.data_channels.close();
    }
}

/// Event sink handed to the engine for one session.
struct SessionEvents {
    hub: Arc<EventHub>,
    epoch: u64,
}

impl PeerEventSink for SessionEvents {
    fn connection_state_changed(&self, state: ConnectionState) {
        if !self.hub.is_live(self.epoch) {
            debug!("Dropping state {:?} from ended session {}", state, self.epoch);
            return;
        }

        match state {
            ConnectionState::Failed => error!("Connection failed"),
            ConnectionState::Disconnected => warn!("Connection disconnected"),
            _ => info!("Connection state: {:?}", state),
        }

        self.hub.record(self.epoch, |m| match state {
            ConnectionState::Connected | ConnectionState::Completed => m.connected = true,
            ConnectionState::Failed => m.failed = true,
            ConnectionState::Closed => m.closed = true,
            _ => {}
        });
        self.hub.states.publish(state);
    }

    fn candidate_generated(&self, candidate: IceCandidate) {
        if !self.hub.is_live(self.epoch) {
            return;
        }
        debug!("Local ICE candidate: {}", candidate.sdp);
        self.hub.candidates.publish(candidate);
    }

    fn data_channel_opened(&self, label: String) {
        if !self.hub.is_live(self.epoch) {
            return;
        }
        info!("Data channel '{}' opened", label);
        self.hub.data_channels.publish(label);
    }
}

impl ConnectionController {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                engine,
                slot: tokio::sync::Mutex::new(None),
                hub: Arc::new(EventHub::new()),
            }),
        }
    }

    /// Creates the peer connection for a new session.
    ///
    /// Concurrent callers are serialized; all but the first fail with
    /// [`Error::AlreadyInitialized`] until the session is torn down.
    pub async fn create_session(&self) -> Result<()> {
        let mut slot = self.inner.slot.lock().await;
        if slot.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let hub = &self.inner.hub;
        let epoch = hub.begin_session();
        let events = Arc::new(SessionEvents {
            hub: Arc::clone(hub),
            epoch,
        });

        match self.inner.engine.new_peer_connection(events).await {
            Ok(peer) => {
                let (cancel, _) = watch::channel(false);
                *slot = Some(Arc::new(ActiveSession {
                    peer,
                    epoch,
                    cancel,
                    remote: tokio::sync::Mutex::new(RemoteCandidates::default()),
                }));
                info!("Session {} created", epoch);
                Ok(())
            }
            Err(e) => {
                hub.abort_session(epoch);
                error!("Failed to create peer connection: {}", e);
                Err(e)
            }
        }
    }

    /// Creates an offer and sets it as the local description.
    pub async fn create_offer(&self) -> Result<SessionDescriptor> {
        self.create_local(SdpKind::Offer).await
    }

    /// Creates an answer and sets it as the local description.
    pub async fn create_answer(&self) -> Result<SessionDescriptor> {
        self.create_local(SdpKind::Answer).await
    }

    async fn create_local(&self, kind: SdpKind) -> Result<SessionDescriptor> {
        let session = self.active().await?;
        let created = match kind {
            SdpKind::Offer => session.guard(session.peer.create_offer()).await?,
            SdpKind::Answer => session.guard(session.peer.create_answer()).await?,
        };
        let desc = created.ok_or_else(|| {
            Error::NegotiationFailed(format!("engine produced no {}", kind.as_str()))
        })?;

        session
            .guard(session.peer.set_local_description(desc.clone()))
            .await?;
        self.inner
            .hub
            .record(session.epoch, |m| m.local = Some(kind));
        info!("Local {} set", kind.as_str());
        Ok(desc)
    }

    /// Applies the remote description, then the candidates buffered while
    /// waiting for it, in arrival order.
    pub async fn apply_remote_description(&self, desc: SessionDescriptor) -> Result<()> {
        let session = self.active().await?;
        let mut remote = session.remote.lock().await;

        let kind = desc.kind;
        session
            .guard(session.peer.set_remote_description(desc))
            .await?;
        self.inner
            .hub
            .record(session.epoch, |m| m.remote_applied = true);
        info!("Remote {} applied", kind.as_str());

        let pending = remote.release();
        if !pending.is_empty() {
            debug!("Flushing {} buffered remote candidates", pending.len());
        }
        for candidate in pending {
            match session
                .guard(session.peer.add_ice_candidate(candidate))
                .await
            {
                Ok(()) => {}
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => warn!("Failed to apply buffered remote candidate: {}", e),
            }
        }
        Ok(())
    }

    /// Applies a remote candidate, or buffers it until the remote
    /// description is applied. Repeated candidates are skipped.
    pub async fn apply_remote_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let session = self.active().await?;
        let mut remote = session.remote.lock().await;

        match remote.admit(&candidate) {
            Admission::Duplicate => {
                debug!("Skipping duplicate remote candidate: {}", candidate.sdp);
                Ok(())
            }
            Admission::Buffered => {
                debug!("Buffering remote candidate ({} pending)", remote.pending_len());
                Ok(())
            }
            Admission::Apply => {
                session
                    .guard(session.peer.add_ice_candidate(candidate))
                    .await
            }
        }
    }

    /// Releases the session. Observation streams end, suspended operations
    /// resume with [`Error::Cancelled`]. Calling it again is a no-op.
    pub async fn teardown(&self) {
        // Held until the streams are closed so a new session cannot start
        // while this one is still shutting down.
        let mut slot = self.inner.slot.lock().await;
        let Some(session) = slot.take() else {
            debug!("Teardown without an active session");
            return;
        };

        self.inner.hub.end_session(session.epoch);
        session.cancel.send_replace(true);

        if let Err(e) = session.peer.close().await {
            warn!("Error while closing peer connection: {}", e);
        }
        self.inner.hub.close_streams();
        drop(slot);
        info!("Session {} torn down", session.epoch);
    }

    /// Connection states in transport order. Ends when the session is torn
    /// down; dropping the stream unsubscribes.
    pub fn observe_connection_state(&self) -> impl Stream<Item = ConnectionState> + Send + Unpin + 'static {
        self.inner.hub.states.subscribe()
    }

    /// Locally gathered candidates in generation order.
    pub fn observe_local_candidates(&self) -> impl Stream<Item = IceCandidate> + Send + Unpin + 'static {
        self.inner.hub.candidates.subscribe()
    }

    /// Labels of data channels opened by the remote peer.
    pub fn observe_data_channels(&self) -> impl Stream<Item = String> + Send + Unpin + 'static {
        self.inner.hub.data_channels.subscribe()
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.inner.hub.milestones().phase()
    }

    pub async fn has_session(&self) -> bool {
        self.inner.slot.lock().await.is_some()
    }

    pub async fn has_remote_description(&self) -> bool {
        match self.active().await {
            Ok(session) => session.remote.lock().await.is_remote_applied(),
            Err(_) => false,
        }
    }

    pub async fn set_audio_enabled(&self, enabled: bool) {
        self.set_track_enabled(TrackKind::Audio, enabled).await;
    }

    pub async fn set_video_enabled(&self, enabled: bool) {
        self.set_track_enabled(TrackKind::Video, enabled).await;
    }

    async fn set_track_enabled(&self, kind: TrackKind, enabled: bool) {
        match self.active().await {
            Ok(session) => session.peer.set_track_enabled(kind, enabled),
            Err(_) => debug!("Ignoring {:?} toggle without a session", kind),
        }
    }

    /// `None` when no session exists.
    pub async fn is_track_enabled(&self, kind: TrackKind) -> Option<bool> {
        self.active()
            .await
            .ok()
            .map(|session| session.peer.is_track_enabled(kind))
    }

    /// Capture sink of the outgoing audio track of the current session.
    pub async fn audio_sink(&self) -> Option<Arc<dyn AudioSink>> {
        self.active()
            .await
            .ok()
            .map(|session| session.peer.audio_sink())
    }

    /// Capture sink of the outgoing video track of the current session.
    pub async fn video_sink(&self) -> Option<Arc<dyn FrameSink>> {
        self.active()
            .await
            .ok()
            .map(|session| session.peer.video_sink())
    }

    async fn active(&self) -> Result<Arc<ActiveSession>> {
        self.inner
            .slot
            .lock()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(Error::NotInitialized)
    }
}
