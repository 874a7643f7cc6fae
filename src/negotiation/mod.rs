//! WebRTC negotiation
//!
//! This module provides:
//! - The `NegotiationState` machine and its legal transitions
//! - The `MediaTransport` seam to the platform media stack
//! - The `Negotiator` that runs one offer/answer exchange per session
//! - A webrtc-rs peer-connection transport

mod handler;
mod rtc;
mod state;
mod transport;

pub use handler::{MediaSource, NegotiationObserver, Negotiator, SharedTransport, SignalingApi};
pub use rtc::{build_api, LogSink, RtcTransport, RtcTransportFactory};
pub use state::NegotiationState;
pub use transport::{
    IceConnectionState, MediaSink, MediaStreamHandle, MediaTransport, OfferOptions, SdpType,
    SessionDescription, TaggedEvent, TransportEvent, TransportEvents, TransportFactory,
};
