pub mod client;
pub mod messages;

pub use client::BackendClient;
pub use messages::{ArchiveOfferRequest, PlaybackUrlResponse, RecordingsResponse};
