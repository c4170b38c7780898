use facecall_core::{ConnectionState, IceCandidate};

/// Events a peer connection reports to its owner.
///
/// Implementations are invoked from media-engine callback contexts and must
/// not block.
pub trait PeerEventSink: Send + Sync {
    /// ICE connection state changed. Delivered in transport order.
    fn connection_state_changed(&self, state: ConnectionState);

    /// A local ICE candidate was gathered. Delivered in generation order.
    fn candidate_generated(&self, candidate: IceCandidate);

    /// A data channel opened by the remote peer is ready.
    fn data_channel_opened(&self, label: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}
