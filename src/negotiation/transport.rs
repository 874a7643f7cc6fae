use crate::error::Result;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Kind of session description on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// `{type, sdp}` exchanged with the negotiation endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// What the local offer asks the remote side to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferOptions {
    pub receive_video: bool,
    pub receive_audio: bool,
    pub ice_servers: Vec<String>,
}

/// Connectivity states reported by the platform transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl IceConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, IceConnectionState::Connected | IceConnectionState::Completed)
    }

    pub fn is_lost(self) -> bool {
        matches!(
            self,
            IceConnectionState::Disconnected | IceConnectionState::Failed | IceConnectionState::Closed
        )
    }
}

/// Opaque reference to a remote media stream owned by the platform stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaStreamHandle {
    pub id: String,
}

/// Asynchronous callback from the transport or a session timer
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    IceStateChanged(IceConnectionState),
    TrackArrived(MediaStreamHandle),
    MediaFailed(String),
    IceTimedOut,
}

/// A transport event stamped with the session it was raised for
#[derive(Debug, Clone)]
pub struct TaggedEvent {
    pub session: SessionId,
    pub event: TransportEvent,
}

/// Sender handed to a transport; stamps every event with its session
#[derive(Debug, Clone)]
pub struct TransportEvents {
    session: SessionId,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl TransportEvents {
    pub fn new(session: SessionId, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn emit(&self, event: TransportEvent) {
        // The receiver only goes away when the controller is dropped
        if self
            .tx
            .send(TaggedEvent {
                session: self.session,
                event,
            })
            .is_err()
        {
            debug!("Event loop gone, dropping event for session {}", self.session);
        }
    }

    pub fn ice_state_changed(&self, state: IceConnectionState) {
        self.emit(TransportEvent::IceStateChanged(state));
    }

    pub fn track_arrived(&self, stream: MediaStreamHandle) {
        self.emit(TransportEvent::TrackArrived(stream));
    }

    pub fn media_failed(&self, reason: impl Into<String>) {
        self.emit(TransportEvent::MediaFailed(reason.into()));
    }
}

/// Peer connection provided by the platform media stack
///
/// Implementations report connectivity and track arrival through the
/// `TransportEvents` they were created with.
#[async_trait::async_trait]
pub trait MediaTransport: Send {
    /// Build the local offer, including gathered candidates
    async fn create_offer(&mut self, options: &OfferOptions) -> Result<SessionDescription>;

    /// Apply the remote answer and begin connectivity checks
    async fn set_remote_description(&mut self, answer: SessionDescription) -> Result<()>;

    /// Release the connection and stop all tracks; must tolerate repeat calls
    async fn close(&mut self);

    /// Transport name for logging
    fn name(&self) -> &str;
}

/// Builds one transport per session
pub trait TransportFactory: Send + Sync {
    fn create(&self, events: TransportEvents) -> Result<Box<dyn MediaTransport>>;
}

/// Attachment point for remote media in the UI (the single video surface)
pub trait MediaSink: Send + Sync {
    fn attach(&self, stream: &MediaStreamHandle);
    fn detach(&self);
}
