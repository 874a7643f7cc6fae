use super::recording::{RawRecording, Recording};
use serde::Serialize;
use tracing::{debug, warn};

/// Result of normalizing one search result set
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    /// Valid recordings, most recent first
    pub recordings: Vec<Recording>,

    /// Entries rejected for bad timestamps or an empty/inverted interval
    pub dropped: usize,
}

impl Catalog {
    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }
}

/// Validate and order raw recordings for presentation.
///
/// Malformed entries are dropped and counted. The backend's ordering is not
/// trusted: output is sorted by start time descending, ties keep input order.
pub fn ingest(raw: &[RawRecording]) -> Catalog {
    let mut dropped = 0;
    let mut recordings: Vec<Recording> = raw
        .iter()
        .filter_map(|entry| match Recording::from_raw(entry) {
            Ok(recording) => Some(recording),
            Err(e) => {
                debug!("Dropping recording {:?}: {}", entry, e);
                dropped += 1;
                None
            }
        })
        .collect();

    recordings.sort_by(|a, b| b.start_time().cmp(&a.start_time()));

    if dropped > 0 {
        warn!("Dropped {} malformed recording(s) of {}", dropped, raw.len());
    }

    Catalog {
        recordings,
        dropped,
    }
}
