mod call;
mod connection;
mod peer;
mod room;
mod signaling;

pub use call::CallStatus;
pub use connection::{ConnectionState, PeerRole};
pub use peer::PeerId;
pub use room::RoomId;
pub use signaling::{IceCandidate, IceServerConfig, SdpKind, SessionDescriptor};
