use crate::negotiation::{MediaStreamHandle, NegotiationState, SharedTransport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Identity stamp carried by every asynchronous continuation of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Live,
    Archive,
}

/// Lifecycle of a session as collaborators see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Negotiating,
    Connected,
    Failed { reason: String },
    Closed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Failed { .. } | SessionState::Closed)
    }
}

/// Published on every session state change
#[derive(Debug, Clone, Serialize)]
pub struct SessionNotification {
    pub session: SessionId,
    pub kind: SessionKind,
    pub state: SessionState,
    pub negotiation: NegotiationState,
}

/// Point-in-time view of the active session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub kind: SessionKind,
    pub source: String,
    #[serde(flatten)]
    pub state: SessionState,
    pub negotiation: NegotiationState,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
}

/// The single session slot's contents. Only the controller touches this.
pub(crate) struct Session {
    pub(crate) id: SessionId,
    pub(crate) kind: SessionKind,
    pub(crate) source: String,
    pub(crate) state: SessionState,
    pub(crate) negotiation: NegotiationState,
    pub(crate) transport: Option<SharedTransport>,
    /// Remote stream that arrived before connectivity completed
    pub(crate) pending_stream: Option<MediaStreamHandle>,
    pub(crate) sink_attached: bool,
    pub(crate) watchdog: Option<JoinHandle<()>>,
    pub(crate) started_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        kind: SessionKind,
        source: String,
        transport: SharedTransport,
    ) -> Self {
        Self {
            id,
            kind,
            source,
            state: SessionState::Negotiating,
            negotiation: NegotiationState::Idle,
            transport: Some(transport),
            pending_stream: None,
            sink_attached: false,
            watchdog: None,
            started_at: Utc::now(),
        }
    }

    pub(crate) fn notification(&self) -> SessionNotification {
        SessionNotification {
            session: self.id,
            kind: self.kind,
            state: self.state.clone(),
            negotiation: self.negotiation,
        }
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        let duration = Utc::now().signed_duration_since(self.started_at);
        SessionSnapshot {
            id: self.id,
            kind: self.kind,
            source: self.source.clone(),
            state: self.state.clone(),
            negotiation: self.negotiation,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        }
    }
}
