use crate::pipeline::FrameSink;
use crate::transport::{AudioSink, PeerEventSink, TrackKind};
use async_trait::async_trait;
use facecall_core::{IceCandidate, Result, SessionDescriptor};
use std::sync::Arc;

/// Factory for peer connections.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Create a peer connection with local audio and video senders attached.
    ///
    /// `events` receives every state change, gathered candidate and opened
    /// data channel of the new connection.
    async fn new_peer_connection(
        &self,
        events: Arc<dyn PeerEventSink>,
    ) -> Result<Arc<dyn PeerConnection>>;
}

/// Negotiation primitives of one peer connection.
///
/// Every async method resolves exactly once.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// `Ok(None)` when the engine produced no description.
    async fn create_offer(&self) -> Result<Option<SessionDescriptor>>;

    /// `Ok(None)` when the engine produced no description.
    async fn create_answer(&self) -> Result<Option<SessionDescriptor>>;

    async fn set_local_description(&self, desc: SessionDescriptor) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescriptor) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    fn set_track_enabled(&self, kind: TrackKind, enabled: bool);

    fn is_track_enabled(&self, kind: TrackKind) -> bool;

    /// Capture sink of the outgoing audio track. Disabling the audio track
    /// turns its output into silence.
    fn audio_sink(&self) -> Arc<dyn AudioSink>;

    /// Capture sink of the outgoing video track.
    fn video_sink(&self) -> Arc<dyn FrameSink>;

    async fn close(&self) -> Result<()>;
}
