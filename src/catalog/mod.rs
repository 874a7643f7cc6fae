//! Recording catalog
//!
//! Turns the backend's search payload into validated recordings ordered for
//! presentation, and runs a full day search against a `RecordingQuery`.

mod ingest;
mod recording;
mod search;

pub use ingest::{ingest, Catalog};
pub use recording::{
    format_timestamp, parse_timestamp, Camera, CameraStatus, ChannelId, RawRecording, Recording,
};
pub use search::{search, RecordingQuery, SearchResult};
