use facecall_core::IceServerConfig;
use facecall_core::utils::default_ice_servers;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Vp8,
    Vp9,
}

/// Peer connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// Preferred codec of the outgoing video track
    pub video_codec: VideoCodec,
    /// Frames buffered between the capture sink and the encoder
    pub frame_channel_capacity: usize,
    /// Packets buffered between the audio sink and the track
    pub audio_channel_capacity: usize,
    /// Nominal capture cadence, used for sample durations
    pub frame_rate: u32,
}

impl TransportConfig {
    /// No ICE servers: host candidates only. Suitable for same-host peers.
    pub fn local_only() -> Self {
        Self {
            ice_servers: Vec::new(),
            ..Self::default()
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            video_codec: VideoCodec::Vp9,
            frame_channel_capacity: 2,
            audio_channel_capacity: 16,
            frame_rate: 60,
        }
    }
}
