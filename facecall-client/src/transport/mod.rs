mod audio_feed;
mod connection_wrapper;
mod media_engine;
mod peer_events;
mod sample_writer;
mod transport_config;
mod video_feed;
mod webrtc_engine;

pub use audio_feed::*;
pub use connection_wrapper::*;
pub use media_engine::*;
pub use peer_events::*;
pub use sample_writer::*;
pub use transport_config::*;
pub use video_feed::*;
pub use webrtc_engine::*;
