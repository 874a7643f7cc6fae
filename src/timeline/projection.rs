use crate::catalog::Recording;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// One recording projected onto the day axis
#[derive(Debug, Clone, Serialize)]
pub struct TimelineSegment {
    /// Offset of the segment start from the day start, in [0, 1]
    pub left_fraction: f64,

    /// Share of the day covered, clipped so the segment ends by day end
    pub width_fraction: f64,

    /// "HH:MM - HH:MM" of the recording
    pub label: String,

    pub source_recording: Recording,
}

/// Axis tick for one hour of the day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourMark {
    pub fraction: f64,
    pub label: String,
}

/// Boundaries of the reference day: 00:00:00 through 23:59:59
#[derive(Debug, Clone, Copy)]
pub struct DayWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DayWindow {
    pub fn new(day: NaiveDate) -> Self {
        let start = day.and_time(NaiveTime::MIN);
        let end = day.and_hms_opt(23, 59, 59).unwrap_or(start);
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    fn duration_ms(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64
    }

    /// Position of `ts` on the axis; unbounded, callers decide what is in range
    fn fraction_of(&self, ts: NaiveDateTime) -> f64 {
        (ts - self.start).num_milliseconds() as f64 / self.duration_ms()
    }

    fn span_of(&self, from: NaiveDateTime, to: NaiveDateTime) -> f64 {
        (to - from).num_milliseconds() as f64 / self.duration_ms()
    }
}

/// Project recordings onto `day`.
///
/// Segments whose start falls outside the day are excluded; segments running
/// past day end are clipped. Overlapping recordings each keep their own
/// segment, in input order.
pub fn project(recordings: &[Recording], day: NaiveDate) -> Vec<TimelineSegment> {
    let window = DayWindow::new(day);

    recordings
        .iter()
        .filter_map(|recording| {
            let left = window.fraction_of(recording.start_time());
            if !(0.0..=1.0).contains(&left) {
                return None;
            }

            let raw_width = window.span_of(recording.start_time(), recording.end_time());
            let width = raw_width.min(1.0 - left);

            Some(TimelineSegment {
                left_fraction: left,
                width_fraction: width,
                label: format!(
                    "{} - {}",
                    recording.start_time().format("%H:%M"),
                    recording.end_time().format("%H:%M")
                ),
                source_recording: recording.clone(),
            })
        })
        .collect()
}

/// The 24 hour ticks drawn under the timeline
pub fn hour_marks() -> Vec<HourMark> {
    (0..24)
        .map(|hour| HourMark {
            fraction: hour as f64 / 24.0,
            label: format!("{}:00", hour),
        })
        .collect()
}
