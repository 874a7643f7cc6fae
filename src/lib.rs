pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod negotiation;
pub mod session;
pub mod timeline;

pub use backend::BackendClient;
pub use catalog::{ingest, search, Catalog, ChannelId, RawRecording, Recording, RecordingQuery, SearchResult};
pub use config::Config;
pub use error::{ValidationError, ViewerError};
pub use health::{ConnectionStatus, HealthMonitor, HealthProbe};
pub use http::{create_router, AppState};
pub use negotiation::{
    MediaSink, MediaSource, MediaTransport, NegotiationState, SignalingApi, TransportFactory,
};
pub use session::{SessionConfig, SessionId, SessionNotification, SessionState, StreamSessionController};
pub use timeline::{project, TimelineSegment};
