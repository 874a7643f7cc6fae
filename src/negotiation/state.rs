use crate::error::ViewerError;
use serde::Serialize;

/// Progress of one offer/answer/ICE exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    Idle,
    OfferCreated,
    OfferSent,
    AnswerReceived,
    IceConnecting,
    Connected,
    Failed,
    Closed,
}

impl NegotiationState {
    /// Position along the happy path; `None` for Failed and Closed
    fn step(self) -> Option<u8> {
        match self {
            NegotiationState::Idle => Some(0),
            NegotiationState::OfferCreated => Some(1),
            NegotiationState::OfferSent => Some(2),
            NegotiationState::AnswerReceived => Some(3),
            NegotiationState::IceConnecting => Some(4),
            NegotiationState::Connected => Some(5),
            NegotiationState::Failed | NegotiationState::Closed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Failed | NegotiationState::Closed)
    }

    /// True when `self` is at or beyond `other` on the happy path
    pub fn has_reached(self, other: NegotiationState) -> bool {
        match (self.step(), other.step()) {
            (Some(a), Some(b)) => a >= b,
            _ => self == other,
        }
    }

    /// Whether the state machine has an edge from `self` to `to`
    pub fn can_transition(self, to: NegotiationState) -> bool {
        match to {
            // Teardown is unconditional, including while a request is in flight
            NegotiationState::Closed => self != NegotiationState::Closed,
            NegotiationState::Failed => !self.is_terminal(),
            _ => match (self.step(), to.step()) {
                (Some(a), Some(b)) => b == a + 1,
                _ => false,
            },
        }
    }

    pub fn transition(self, to: NegotiationState) -> Result<NegotiationState, ViewerError> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(ViewerError::InvalidTransition { from: self, to })
        }
    }
}
