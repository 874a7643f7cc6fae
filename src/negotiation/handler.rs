use super::state::NegotiationState;
use super::transport::{MediaTransport, OfferOptions, SessionDescription};
use crate::catalog::{ChannelId, Recording};
use crate::error::Result;
use crate::session::SessionId;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Transport shared between the session slot (for teardown) and the negotiator
pub type SharedTransport = Arc<Mutex<Box<dyn MediaTransport>>>;

/// What a session plays
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSource {
    Live {
        channel: ChannelId,
    },
    Archive {
        playback_url: String,
        recording: Recording,
    },
}

impl MediaSource {
    pub fn describe(&self) -> String {
        match self {
            MediaSource::Live { channel } => format!("live channel {}", channel),
            MediaSource::Archive { recording, .. } => Self::describe_archive(recording),
        }
    }

    pub fn describe_archive(recording: &Recording) -> String {
        format!(
            "archive {} from {}",
            recording.channel(),
            recording.start_time()
        )
    }
}

/// Negotiation contract of the signaling backend
#[async_trait::async_trait]
pub trait SignalingApi: Send + Sync {
    /// Send the offer keyed by the source and return the remote answer
    async fn negotiate(
        &self,
        source: &MediaSource,
        offer: &SessionDescription,
    ) -> Result<SessionDescription>;

    /// Resolve the backend playback URL for an archived recording
    async fn playback_url(&self, recording: &Recording) -> Result<String>;
}

/// Receives each state the negotiator moves through.
///
/// Returning an error (normally `ViewerError::Superseded`) aborts the
/// negotiation; the negotiator then stops touching the transport.
#[async_trait::async_trait]
pub trait NegotiationObserver: Send + Sync {
    async fn on_transition(&self, session: SessionId, state: NegotiationState) -> Result<()>;

    /// Fails with `Superseded` once `session` no longer owns the slot
    async fn ensure_current(&self, session: SessionId) -> Result<()>;
}

/// Runs one offer/answer exchange for one session. Never retries.
pub struct Negotiator {
    session: SessionId,
    transport: SharedTransport,
    state: NegotiationState,
}

impl Negotiator {
    pub fn new(session: SessionId, transport: SharedTransport) -> Self {
        Self {
            session,
            transport,
            state: NegotiationState::Idle,
        }
    }

    async fn advance(
        &mut self,
        to: NegotiationState,
        observer: &dyn NegotiationObserver,
    ) -> Result<()> {
        self.state = self.state.transition(to)?;
        debug!("Session {} negotiation -> {:?}", self.session, to);
        observer.on_transition(self.session, to).await
    }

    /// Drive the exchange from `Idle` to `IceConnecting`.
    ///
    /// Connectivity completion arrives later as a transport event. On error the
    /// caller decides whether the session fails or was merely superseded.
    pub async fn run(
        mut self,
        api: &dyn SignalingApi,
        source: &MediaSource,
        options: &OfferOptions,
        observer: &dyn NegotiationObserver,
    ) -> Result<NegotiationState> {
        info!("Negotiating {} for session {}", source.describe(), self.session);

        let offer = {
            let mut transport = self.transport.lock().await;
            transport.create_offer(options).await?
        };
        self.advance(NegotiationState::OfferCreated, observer).await?;

        // The request is in flight from here on; a teardown while it is
        // pending makes the observer reject the next transition.
        self.advance(NegotiationState::OfferSent, observer).await?;
        let answer = api.negotiate(source, &offer).await;
        observer.ensure_current(self.session).await?;
        let answer = answer?;
        self.advance(NegotiationState::AnswerReceived, observer).await?;

        {
            let mut transport = self.transport.lock().await;
            transport.set_remote_description(answer).await?;
        }
        self.advance(NegotiationState::IceConnecting, observer).await?;

        Ok(self.state)
    }
}
