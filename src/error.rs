//! Error types for the viewer core

use crate::negotiation::NegotiationState;
use crate::session::SessionId;
use thiserror::Error;

/// Rejections raised before any I/O happens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No channel was chosen
    #[error("no channel selected")]
    MissingChannel,

    /// No date was chosen for an archive search
    #[error("no date selected")]
    MissingDate,

    /// A recording whose interval is empty or inverted
    #[error("recording must start before it ends ({start} >= {end})")]
    InvalidInterval {
        /// Recorded start time
        start: String,
        /// Recorded end time
        end: String,
    },

    /// A timestamp the recorder format does not match
    #[error("unrecognized timestamp: {0}")]
    BadTimestamp(String),
}

/// Main error type for viewer operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewerError {
    /// Missing selection or malformed input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Network failure or non-success HTTP status
    #[error("{0}")]
    Transport(String),

    /// Error reported by the backend in its response body
    #[error("{0}")]
    Negotiation(String),

    /// Sink or transport failure once media is flowing
    #[error("media error: {0}")]
    Media(String),

    /// The session this work was started for has been replaced or stopped
    #[error("session {0} was superseded")]
    Superseded(SessionId),

    /// Negotiation state machine was driven along an edge it does not have
    #[error("invalid negotiation transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// State before the attempted transition
        from: NegotiationState,
        /// Rejected target state
        to: NegotiationState,
    },
}

impl ViewerError {
    /// True for failures that were rejected before any network traffic
    pub fn is_validation(&self) -> bool {
        matches!(self, ViewerError::Validation(_))
    }
}

impl From<reqwest::Error> for ViewerError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ViewerError::Transport(format!("HTTP {}", status)),
            None => ViewerError::Transport(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
