use crate::error::ValidationError;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Camera channel identifier as the backend knows it (e.g. "201")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Build a channel id, rejecting a blank selection
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingChannel);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recording as it arrives from the backend search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecording {
    #[serde(rename = "Channel")]
    pub channel: String,
    #[serde(rename = "StartTime")]
    pub start_time: String,
    #[serde(rename = "EndTime")]
    pub end_time: String,
}

/// One archived interval of footage for a channel
///
/// Times are the recorder's wall clock. Construction enforces `start < end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recording {
    channel: ChannelId,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
}

impl Recording {
    pub fn new(
        channel: ChannelId,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> Result<Self, ValidationError> {
        if start_time >= end_time {
            return Err(ValidationError::InvalidInterval {
                start: format_timestamp(&start_time),
                end: format_timestamp(&end_time),
            });
        }
        Ok(Self {
            channel,
            start_time,
            end_time,
        })
    }

    /// Parse and validate a backend record
    pub fn from_raw(raw: &RawRecording) -> Result<Self, ValidationError> {
        Self::new(
            ChannelId::parse(&raw.channel)?,
            parse_timestamp(&raw.start_time)?,
            parse_timestamp(&raw.end_time)?,
        )
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    pub fn end_time(&self) -> NaiveDateTime {
        self.end_time
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    /// Duration as "MM:SS"; minutes keep counting past the hour
    pub fn duration_label(&self) -> String {
        let total = self.duration().num_seconds();
        format!("{:02}:{:02}", total / 60, total % 60)
    }
}

impl<'de> Deserialize<'de> for Recording {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Fields {
            channel: String,
            start_time: String,
            end_time: String,
        }

        let fields = Fields::deserialize(deserializer)?;
        Recording::from_raw(&RawRecording {
            channel: fields.channel,
            start_time: fields.start_time,
            end_time: fields.end_time,
        })
        .map_err(serde::de::Error::custom)
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parse a recorder timestamp.
///
/// RFC 3339 values keep their wall-clock reading (the offset is dropped, not
/// applied) since recorders stamp local time with a nominal zone.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ValidationError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| ValidationError::BadTimestamp(raw.to_string()))
}

/// Format a timestamp the way the backend expects it in query strings
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Camera entry published by the discovery service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    #[serde(rename = "IP")]
    pub address: String,
    #[serde(rename = "Status")]
    pub status: CameraStatus,
    #[serde(rename = "LastSeen")]
    pub last_seen_at: DateTime<chrono::FixedOffset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    Online,
    Offline,
}
