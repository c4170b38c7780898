use crate::pipeline::FrameSink;
use crate::transport::{
    AudioFeed, AudioSink, PeerConnection, PeerEventSink, TrackKind, TransportConfig, VideoCodec,
    VideoEncoder, VideoFeed,
};
use async_trait::async_trait;
use facecall_core::{ConnectionState, Error, IceCandidate, Result, SdpKind, SessionDescriptor};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MIME_TYPE_VP9, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const STREAM_ID: &str = "stream";
const AUDIO_TRACK_ID: &str = "audio0";
const VIDEO_TRACK_ID: &str = "video0";

pub(crate) fn transport_error(e: webrtc::Error) -> Error {
    Error::Transport(e.to_string())
}

/// webrtc-rs peer connection with one local audio and one local video track.
pub struct ConnectionWrapper {
    peer_connection: Arc<RTCPeerConnection>,
    audio_enabled: Arc<AtomicBool>,
    video_enabled: Arc<AtomicBool>,
    audio_feed: Arc<AudioFeed>,
    video_feed: Arc<VideoFeed>,
}

impl ConnectionWrapper {
    pub async fn new(
        config: &TransportConfig,
        encoder: Option<Arc<dyn VideoEncoder>>,
        events: Arc<dyn PeerEventSink>,
    ) -> Result<Self> {
        // 1. Codecs and interceptors
        let mut m = MediaEngine::default();
        m.register_default_codecs().map_err(transport_error)?;
        let registry =
            register_default_interceptors(Registry::new(), &mut m).map_err(transport_error)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        // 2. ICE servers
        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(transport_error)?,
        );

        // 3. Event callbacks
        let state_events = Arc::clone(&events);
        peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                if let Some(state) = map_ice_state(s) {
                    debug!("ICE connection state changed: {}", s);
                    state_events.connection_state_changed(state);
                }
                Box::pin(async {})
            },
        ));

        let ice_events = Arc::clone(&events);
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            if let Some(candidate) = c {
                match candidate.to_json() {
                    Ok(init) => ice_events.candidate_generated(IceCandidate {
                        sdp: init.candidate,
                        sdp_m_line_index: init.sdp_mline_index.map(i32::from).unwrap_or(0),
                        sdp_mid: init.sdp_mid,
                    }),
                    Err(e) => warn!("Failed to serialize local ICE candidate: {}", e),
                }
            }
            Box::pin(async {})
        }));

        let dc_events = Arc::clone(&events);
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let events = Arc::clone(&dc_events);
            Box::pin(async move {
                let label = dc.label().to_owned();
                dc.on_open(Box::new(move || {
                    events.data_channel_opened(label.clone());
                    Box::pin(async {})
                }));
            })
        }));

        // 4. Local media senders
        let audio_track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            AUDIO_TRACK_ID.to_owned(),
            STREAM_ID.to_owned(),
        ));
        let video_mime = match config.video_codec {
            VideoCodec::Vp8 => MIME_TYPE_VP8,
            VideoCodec::Vp9 => MIME_TYPE_VP9,
        };
        let video_track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: video_mime.to_owned(),
                ..Default::default()
            },
            VIDEO_TRACK_ID.to_owned(),
            STREAM_ID.to_owned(),
        ));

        for track in [
            Arc::clone(&audio_track) as Arc<dyn TrackLocal + Send + Sync>,
            Arc::clone(&video_track) as Arc<dyn TrackLocal + Send + Sync>,
        ] {
            let sender = peer_connection
                .add_track(track)
                .await
                .map_err(transport_error)?;
            drain_rtcp(sender);
        }

        let audio_enabled = Arc::new(AtomicBool::new(true));
        let video_enabled = Arc::new(AtomicBool::new(true));
        let audio_feed = AudioFeed::spawn(
            audio_track,
            Arc::clone(&audio_enabled),
            config.audio_channel_capacity,
        );
        let video_feed = VideoFeed::spawn(
            video_track,
            encoder,
            Arc::clone(&video_enabled),
            config.frame_channel_capacity,
            config.frame_rate,
        );

        info!(
            "Peer connection created ({} ICE servers, video {:?})",
            config.ice_servers.len(),
            config.video_codec
        );

        Ok(Self {
            peer_connection,
            audio_enabled,
            video_enabled,
            audio_feed,
            video_feed,
        })
    }

    pub fn audio_feed(&self) -> &Arc<AudioFeed> {
        &self.audio_feed
    }

    pub fn video_feed(&self) -> &Arc<VideoFeed> {
        &self.video_feed
    }

    fn enabled_flag(&self, kind: TrackKind) -> &AtomicBool {
        match kind {
            TrackKind::Audio => &self.audio_enabled,
            TrackKind::Video => &self.video_enabled,
        }
    }
}

#[async_trait]
impl PeerConnection for ConnectionWrapper {
    async fn create_offer(&self) -> Result<Option<SessionDescriptor>> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(transport_error)?;
        Ok(from_rtc(offer))
    }

    async fn create_answer(&self) -> Result<Option<SessionDescriptor>> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(transport_error)?;
        Ok(from_rtc(answer))
    }

    async fn set_local_description(&self, desc: SessionDescriptor) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc(desc)?)
            .await
            .map_err(transport_error)
    }

    async fn set_remote_description(&self, desc: SessionDescriptor) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(desc)?)
            .await
            .map_err(transport_error)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.sdp,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: u16::try_from(candidate.sdp_m_line_index).ok(),
            ..Default::default()
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(transport_error)
    }

    fn set_track_enabled(&self, kind: TrackKind, enabled: bool) {
        debug!("{:?} track enabled: {}", kind, enabled);
        self.enabled_flag(kind).store(enabled, Ordering::Release);
    }

    fn is_track_enabled(&self, kind: TrackKind) -> bool {
        self.enabled_flag(kind).load(Ordering::Acquire)
    }

    fn audio_sink(&self) -> Arc<dyn AudioSink> {
        Arc::clone(&self.audio_feed) as Arc<dyn AudioSink>
    }

    fn video_sink(&self) -> Arc<dyn FrameSink> {
        Arc::clone(&self.video_feed) as Arc<dyn FrameSink>
    }

    async fn close(&self) -> Result<()> {
        self.audio_feed.close();
        self.video_feed.close();
        self.peer_connection.close().await.map_err(transport_error)
    }
}

/// Keeps RTCP flowing through the interceptors of a sender.
fn drain_rtcp(sender: Arc<RTCRtpSender>) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 1500];
        while sender.read(&mut buf).await.is_ok() {}
    });
}

fn map_ice_state(state: RTCIceConnectionState) -> Option<ConnectionState> {
    match state {
        RTCIceConnectionState::New => Some(ConnectionState::New),
        RTCIceConnectionState::Checking => Some(ConnectionState::Checking),
        RTCIceConnectionState::Connected => Some(ConnectionState::Connected),
        RTCIceConnectionState::Completed => Some(ConnectionState::Completed),
        RTCIceConnectionState::Failed => Some(ConnectionState::Failed),
        RTCIceConnectionState::Disconnected => Some(ConnectionState::Disconnected),
        RTCIceConnectionState::Closed => Some(ConnectionState::Closed),
        RTCIceConnectionState::Unspecified => None,
    }
}

fn from_rtc(desc: RTCSessionDescription) -> Option<SessionDescriptor> {
    if desc.sdp.is_empty() {
        return None;
    }
    Some(SessionDescriptor {
        kind: match desc.sdp_type {
            webrtc::peer_connection::sdp::sdp_type::RTCSdpType::Answer => SdpKind::Answer,
            _ => SdpKind::Offer,
        },
        sdp: desc.sdp,
    })
}

fn to_rtc(desc: SessionDescriptor) -> Result<RTCSessionDescription> {
    match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp),
    }
    .map_err(transport_error)
}
