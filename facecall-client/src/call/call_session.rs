use crate::controller::{ConnectionController, NegotiationPhase};
use crate::pipeline::FrameSink;
use crate::transport::AudioSink;
use crate::signaling::{
    ANSWER_FIELD, Document, DocumentPath, OFFER_FIELD, SignalingChannel, candidates_collection,
    field, from_document, read_field, room_document, to_document,
};
use facecall_core::{ConnectionState, Error, IceCandidate, PeerRole, Result, RoomId, SessionDescriptor};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One side of a call: negotiates a session through the room document of
/// `room`.
///
/// The host clears the room, publishes an offer and waits for the answer.
/// The guest waits for the offer and publishes its answer. Each side
/// publishes its candidates into its own collection and applies the other
/// side's. When the room document disappears, the session is torn down.
pub struct CallSession {
    room: RoomId,
    role: PeerRole,
    controller: ConnectionController,
    signaling: Arc<dyn SignalingChannel>,
    ended: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CallSession {
    pub fn new(
        room: RoomId,
        role: PeerRole,
        controller: ConnectionController,
        signaling: Arc<dyn SignalingChannel>,
    ) -> Self {
        let (ended, _) = watch::channel(false);
        Self {
            room,
            role,
            controller,
            signaling,
            ended,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn controller(&self) -> &ConnectionController {
        &self.controller
    }

    /// Creates the session and starts negotiating.
    ///
    /// The host returns once its offer is published. The guest returns once
    /// its answer is published, failing with [`Error::Cancelled`] if the
    /// call ends before an offer arrives.
    pub async fn connect(&self) -> Result<()> {
        self.ended.send_replace(false);
        let room_doc = room_document(&self.room);

        if self.role == PeerRole::Host {
            self.clear_room().await?;
        }

        self.controller.create_session().await?;
        info!("Joining room {} as {:?}", self.room, self.role);

        self.spawn(forward_local_candidates(
            self.controller.observe_local_candidates(),
            Arc::clone(&self.signaling),
            self.role,
            self.room.clone(),
        ));
        self.spawn(apply_remote_candidates(
            self.signaling
                .watch_collection(&candidates_collection(&self.room, self.role.remote())),
            self.controller.clone(),
        ));

        let result = match self.role {
            PeerRole::Host => self.offer(&room_doc).await,
            PeerRole::Guest => self.answer(&room_doc).await,
        };

        if let Err(e) = &result {
            error!("Negotiation in room {} failed: {}", self.room, e);
        }
        result
    }

    /// Tears down and negotiates again from scratch.
    pub async fn retry_connect(&self) -> Result<()> {
        info!("Retrying room {}", self.room);
        self.stop().await;
        self.connect().await
    }

    /// Ends the call for both sides by deleting the room document.
    pub async fn end_call(&self) -> Result<()> {
        let deleted = self.signaling.delete(&room_document(&self.room)).await;
        self.stop().await;
        info!("Call in room {} ended", self.room);
        deleted
    }

    pub async fn mute_audio(&self) {
        self.controller.set_audio_enabled(false).await;
    }

    pub async fn unmute_audio(&self) {
        self.controller.set_audio_enabled(true).await;
    }

    pub async fn hide_video(&self) {
        self.controller.set_video_enabled(false).await;
    }

    pub async fn show_video(&self) {
        self.controller.set_video_enabled(true).await;
    }

    pub fn connection_state(&self) -> impl Stream<Item = ConnectionState> + Send + Unpin + 'static {
        self.controller.observe_connection_state()
    }

    /// Connection state as display text.
    pub fn connection_info(&self) -> impl Stream<Item = String> + Send + Unpin + 'static {
        self.controller
            .observe_connection_state()
            .map(|state| describe_state(state).to_owned())
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.controller.phase()
    }

    /// Capture sink of the outgoing audio track, once connected.
    pub async fn audio_sink(&self) -> Option<Arc<dyn AudioSink>> {
        self.controller.audio_sink().await
    }

    /// Capture sink of the outgoing video track, once connected.
    pub async fn video_sink(&self) -> Option<Arc<dyn FrameSink>> {
        self.controller.video_sink().await
    }

    async fn clear_room(&self) -> Result<()> {
        self.signaling.delete(&room_document(&self.room)).await?;
        for role in [PeerRole::Host, PeerRole::Guest] {
            self.signaling
                .clear_collection(&candidates_collection(&self.room, role))
                .await?;
        }
        Ok(())
    }

    async fn offer(&self, room_doc: &DocumentPath) -> Result<()> {
        let watch = self.signaling.watch_document(room_doc);

        let offer = self.controller.create_offer().await?;
        self.signaling
            .merge(room_doc, field(OFFER_FIELD, &offer)?)
            .await?;
        info!("Offer published to room {}", self.room);

        self.spawn(watch_room(watch, self.controller.clone(), false, true));
        Ok(())
    }

    async fn answer(&self, room_doc: &DocumentPath) -> Result<()> {
        let mut watch = self.signaling.watch_document(room_doc);
        let offer = tokio::select! {
            offer = wait_for_offer(&mut watch) => offer?,
            _ = until_ended(self.ended.subscribe()) => return Err(Error::Cancelled),
        };

        self.controller.apply_remote_description(offer).await?;
        let answer = self.controller.create_answer().await?;
        self.signaling
            .merge(room_doc, field(ANSWER_FIELD, &answer)?)
            .await?;
        info!("Answer published to room {}", self.room);

        self.spawn(watch_room(watch, self.controller.clone(), true, false));
        Ok(())
    }

    fn spawn(&self, task: impl std::future::Future<Output = ()> + Send + 'static) {
        let handle = tokio::spawn(task);
        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    async fn stop(&self) {
        self.ended.send_replace(true);
        let tasks: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
            tasks.drain(..).collect()
        };
        for task in tasks {
            task.abort();
        }
        self.controller.teardown().await;
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(|p| p.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

fn describe_state(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::New => "Waiting for peer",
        ConnectionState::Checking => "Checking connectivity",
        ConnectionState::Connected | ConnectionState::Completed => "Connected",
        ConnectionState::Disconnected => "Peer disconnected",
        ConnectionState::Failed => "Connection failed",
        ConnectionState::Closed => "Call ended",
    }
}

async fn until_ended(mut ended: watch::Receiver<bool>) {
    loop {
        if *ended.borrow_and_update() {
            return;
        }
        if ended.changed().await.is_err() {
            return;
        }
    }
}

async fn wait_for_offer(watch: &mut BoxStream<'static, Option<Document>>) -> Result<SessionDescriptor> {
    let mut seen = false;
    while let Some(snapshot) = watch.next().await {
        match snapshot {
            Some(doc) => {
                seen = true;
                if let Some(offer) = read_field::<SessionDescriptor>(&doc, OFFER_FIELD)? {
                    debug!("Offer received");
                    return Ok(offer);
                }
            }
            None if seen => return Err(Error::Cancelled),
            None => {}
        }
    }
    Err(Error::Cancelled)
}

/// Applies the answer (host side) and tears the session down when the
/// room document is deleted.
async fn watch_room(
    mut watch: BoxStream<'static, Option<Document>>,
    controller: ConnectionController,
    mut seen: bool,
    mut awaiting_answer: bool,
) {
    while let Some(snapshot) = watch.next().await {
        let Some(doc) = snapshot else {
            if seen {
                info!("Room deleted, tearing down");
                controller.teardown().await;
                return;
            }
            continue;
        };
        seen = true;

        if !awaiting_answer {
            continue;
        }
        match read_field::<SessionDescriptor>(&doc, ANSWER_FIELD) {
            Ok(Some(answer)) => {
                awaiting_answer = false;
                debug!("Answer received");
                if let Err(e) = controller.apply_remote_description(answer).await {
                    error!("Failed to apply remote answer: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Malformed answer in room document: {}", e),
        }
    }
}

async fn forward_local_candidates(
    mut candidates: impl Stream<Item = IceCandidate> + Unpin,
    signaling: Arc<dyn SignalingChannel>,
    role: PeerRole,
    room: RoomId,
) {
    let collection = candidates_collection(&room, role);
    while let Some(candidate) = candidates.next().await {
        let published = match to_document(&candidate) {
            Ok(doc) => signaling.add(&collection, doc).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = published {
            warn!("Failed to publish local candidate: {}", e);
        }
    }
    debug!("Local candidate stream of room {} ended", room);
}

async fn apply_remote_candidates(
    mut candidates: BoxStream<'static, (DocumentPath, Document)>,
    controller: ConnectionController,
) {
    while let Some((path, doc)) = candidates.next().await {
        let candidate = match from_document::<IceCandidate>(doc) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("Malformed candidate {}: {}", path, e);
                continue;
            }
        };
        match controller.apply_remote_candidate(candidate).await {
            Ok(()) => {}
            Err(Error::NotInitialized | Error::Cancelled) => return,
            Err(e) => warn!("Failed to apply remote candidate {}: {}", path, e),
        }
    }
}
