//! Peer-connection transport backed by webrtc-rs.
//!
//! Each session gets its own `RTCPeerConnection` with receive-only
//! transceivers. The offer is sent once ICE gathering completes, so the
//! backend gets every local candidate in a single round trip.

use super::transport::{
    IceConnectionState, MediaSink, MediaStreamHandle, MediaTransport, OfferOptions, SdpType,
    SessionDescription, TransportEvents, TransportFactory,
};
use crate::error::{Result, ViewerError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};
use webrtc::api::{
    interceptor_registry::register_default_interceptors, media_engine::MediaEngine,
    setting_engine::SettingEngine, APIBuilder, API,
};
use webrtc::ice::mdns::MulticastDnsMode;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

/// Upper bound on waiting for local candidates before sending the offer
const GATHER_TIMEOUT: Duration = Duration::from_secs(10);

fn rtc_error(context: &str, e: webrtc::Error) -> ViewerError {
    ViewerError::Media(format!("{}: {}", context, e))
}

/// Media engine with the default codecs and interceptors, mDNS candidates off
pub fn build_api() -> Result<API> {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .map_err(|e| rtc_error("codec registration failed", e))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| rtc_error("interceptor registration failed", e))?;

    let mut setting_engine = SettingEngine::default();
    setting_engine.set_ice_multicast_dns_mode(MulticastDnsMode::Disabled);

    Ok(APIBuilder::new()
        .with_setting_engine(setting_engine)
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build())
}

fn ice_state(state: RTCIceConnectionState) -> IceConnectionState {
    match state {
        RTCIceConnectionState::Checking => IceConnectionState::Checking,
        RTCIceConnectionState::Connected => IceConnectionState::Connected,
        RTCIceConnectionState::Completed => IceConnectionState::Completed,
        RTCIceConnectionState::Disconnected => IceConnectionState::Disconnected,
        RTCIceConnectionState::Failed => IceConnectionState::Failed,
        RTCIceConnectionState::Closed => IceConnectionState::Closed,
        _ => IceConnectionState::New,
    }
}

pub struct RtcTransport {
    api: Arc<API>,
    events: TransportEvents,
    peer: Option<Arc<RTCPeerConnection>>,
    closed: bool,
}

impl RtcTransport {
    pub fn new(api: Arc<API>, events: TransportEvents) -> Self {
        Self {
            api,
            events,
            peer: None,
            closed: false,
        }
    }

    async fn open_peer(&self, options: &OfferOptions) -> Result<Arc<RTCPeerConnection>> {
        let config = RTCConfiguration {
            ice_servers: if options.ice_servers.is_empty() {
                Vec::new()
            } else {
                vec![RTCIceServer {
                    urls: options.ice_servers.clone(),
                    ..Default::default()
                }]
            },
            ..Default::default()
        };

        let peer = Arc::new(
            self.api
                .new_peer_connection(config)
                .await
                .map_err(|e| rtc_error("create peer connection failed", e))?,
        );

        let events = self.events.clone();
        peer.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
            debug!("Session {} ICE {}", events.session(), state);
            events.ice_state_changed(ice_state(state));
            Box::pin(async {})
        }));

        let events = self.events.clone();
        peer.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            if state == RTCPeerConnectionState::Failed {
                events.media_failed("peer connection failed");
            }
            Box::pin(async {})
        }));

        let events = self.events.clone();
        peer.on_track(Box::new(move |track, _receiver, _transceiver| {
            let id = format!("{}/{}", track.stream_id(), track.id());
            info!("Session {} received {} track {}", events.session(), track.kind(), id);
            events.track_arrived(MediaStreamHandle { id });
            Box::pin(async {})
        }));

        let mut kinds = Vec::new();
        if options.receive_video {
            kinds.push(RTPCodecType::Video);
        }
        if options.receive_audio {
            kinds.push(RTPCodecType::Audio);
        }
        for kind in kinds {
            peer.add_transceiver_from_kind(
                kind,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: Vec::new(),
                }),
            )
            .await
            .map_err(|e| rtc_error("add transceiver failed", e))?;
        }

        Ok(peer)
    }
}

#[async_trait::async_trait]
impl MediaTransport for RtcTransport {
    async fn create_offer(&mut self, options: &OfferOptions) -> Result<SessionDescription> {
        if self.closed {
            return Err(ViewerError::Media("transport already closed".to_string()));
        }
        if !options.receive_video {
            return Err(ViewerError::Media("offer must receive video".to_string()));
        }

        let peer = self.open_peer(options).await?;
        self.peer = Some(peer.clone());

        let offer = peer
            .create_offer(None)
            .await
            .map_err(|e| rtc_error("create offer failed", e))?;
        let mut gathered = peer.gathering_complete_promise().await;
        peer.set_local_description(offer)
            .await
            .map_err(|e| rtc_error("set local description failed", e))?;

        if time::timeout(GATHER_TIMEOUT, gathered.recv()).await.is_err() {
            warn!(
                "ICE gathering incomplete after {:?}, sending partial candidates",
                GATHER_TIMEOUT
            );
        }

        let local = peer
            .local_description()
            .await
            .ok_or_else(|| ViewerError::Media("local description unavailable".to_string()))?;

        Ok(SessionDescription::offer(local.sdp))
    }

    async fn set_remote_description(&mut self, answer: SessionDescription) -> Result<()> {
        if self.closed {
            return Err(ViewerError::Media("transport already closed".to_string()));
        }
        let peer = self
            .peer
            .clone()
            .ok_or_else(|| ViewerError::Media("answer applied before offer".to_string()))?;

        if answer.kind != SdpType::Answer {
            return Err(ViewerError::Negotiation(format!(
                "expected an answer, got {:?}",
                answer.kind
            )));
        }

        let remote = RTCSessionDescription::answer(answer.sdp)
            .map_err(|e| ViewerError::Negotiation(format!("malformed answer: {}", e)))?;
        peer.set_remote_description(remote)
            .await
            .map_err(|e| ViewerError::Negotiation(format!("answer rejected: {}", e)))?;

        info!("Remote answer applied for session {}", self.events.session());
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
        if let Some(peer) = self.peer.take() {
            if let Err(e) = peer.close().await {
                warn!("Closing peer connection for session {}: {}", self.events.session(), e);
            }
        }
    }

    fn name(&self) -> &str {
        "webrtc"
    }
}

/// Builds one `RtcTransport` per session over a shared API instance
pub struct RtcTransportFactory {
    api: Arc<API>,
}

impl RtcTransportFactory {
    pub fn new() -> Result<Self> {
        Ok(Self::with_api(Arc::new(build_api()?)))
    }

    /// Use a preconfigured API, e.g. one with a custom setting engine
    pub fn with_api(api: Arc<API>) -> Self {
        Self { api }
    }
}

impl TransportFactory for RtcTransportFactory {
    fn create(&self, events: TransportEvents) -> Result<Box<dyn MediaTransport>> {
        Ok(Box::new(RtcTransport::new(self.api.clone(), events)))
    }
}

/// Sink that only logs attachments; stands in for a video surface in the CLI
#[derive(Debug, Default)]
pub struct LogSink;

impl MediaSink for LogSink {
    fn attach(&self, stream: &MediaStreamHandle) {
        info!("Media stream {} attached", stream.id);
    }

    fn detach(&self) {
        info!("Media sink cleared");
    }
}
