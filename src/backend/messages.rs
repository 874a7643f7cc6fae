use crate::catalog::RawRecording;
use crate::negotiation::SessionDescription;
use serde::{Deserialize, Serialize};

/// Body of the archive negotiation request
#[derive(Debug, Serialize, Deserialize)]
pub struct ArchiveOfferRequest {
    pub offer: SessionDescription,
    pub url: String,
}

/// Query string of the live negotiation request
#[derive(Debug, Serialize)]
pub struct LiveOfferQuery<'a> {
    pub channel: &'a str,
}

/// Query string of the recording search
#[derive(Debug, Serialize)]
pub struct RecordingsQuery<'a> {
    pub channel: &'a str,
    pub start: String, // YYYY-MM-DD
    pub end: String,
}

/// Query string of the playback URL lookup
#[derive(Debug, Serialize)]
pub struct PlaybackUrlQuery<'a> {
    pub channel: &'a str,
    pub start: String, // RFC3339-style recorder time
    pub end: String,
}

/// Recording search response; `recordings` may be null when nothing matched
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordingsResponse {
    #[serde(default)]
    pub recordings: Option<Vec<RawRecording>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaybackUrlResponse {
    pub url: String,
}

/// Any backend response may carry an error message instead of its payload
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}
