use crate::transport::{
    ConnectionWrapper, MediaEngine, PeerConnection, PeerEventSink, TransportConfig, VideoEncoder,
};
use async_trait::async_trait;
use facecall_core::Result;
use std::sync::Arc;

/// [`MediaEngine`] backed by webrtc-rs.
pub struct WebRtcEngine {
    config: TransportConfig,
    encoder: Option<Arc<dyn VideoEncoder>>,
}

impl WebRtcEngine {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            encoder: None,
        }
    }

    /// Encoder feeding the outgoing video track. Without one, submitted
    /// frames are discarded.
    pub fn with_encoder(mut self, encoder: Arc<dyn VideoEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Default for WebRtcEngine {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

#[async_trait]
impl MediaEngine for WebRtcEngine {
    async fn new_peer_connection(
        &self,
        events: Arc<dyn PeerEventSink>,
    ) -> Result<Arc<dyn PeerConnection>> {
        let wrapper = ConnectionWrapper::new(&self.config, self.encoder.clone(), events).await?;
        Ok(Arc::new(wrapper))
    }
}
