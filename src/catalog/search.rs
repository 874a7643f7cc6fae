use super::ingest::{ingest, Catalog};
use super::recording::{ChannelId, RawRecording};
use crate::error::{Result, ValidationError};
use crate::timeline::{hour_marks, project, HourMark, TimelineSegment};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

/// Recording-query contract of the storage backend
#[async_trait::async_trait]
pub trait RecordingQuery: Send + Sync {
    /// Fetch raw recordings for `channel` between two calendar days, inclusive
    async fn search_recordings(
        &self,
        channel: &ChannelId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRecording>>;
}

/// Everything a collaborator needs to render one archive search
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub channel: ChannelId,
    pub day: NaiveDate,
    #[serde(flatten)]
    pub catalog: Catalog,
    pub segments: Vec<TimelineSegment>,
    pub hours: Vec<HourMark>,
}

/// Search one channel's archive for a single day.
///
/// Missing selections are rejected before the backend is contacted.
pub async fn search(
    query: &dyn RecordingQuery,
    channel: &str,
    date: Option<NaiveDate>,
) -> Result<SearchResult> {
    let channel = ChannelId::parse(channel)?;
    let day = date.ok_or(ValidationError::MissingDate)?;

    info!("Searching recordings for channel {} on {}", channel, day);

    let raw = query.search_recordings(&channel, day, day).await?;
    let catalog = ingest(&raw);
    let segments = project(&catalog.recordings, day);

    info!(
        "Found {} recording(s), {} on the timeline",
        catalog.recordings.len(),
        segments.len()
    );

    Ok(SearchResult {
        channel,
        day,
        catalog,
        segments,
        hours: hour_marks(),
    })
}
