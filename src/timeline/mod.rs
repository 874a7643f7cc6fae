//! Timeline projection
//!
//! Maps recording intervals onto a single day so collaborators can draw them
//! as positioned bars. Geometry only; colors and z-order belong to the renderer.

mod projection;

pub use projection::{hour_marks, project, DayWindow, HourMark, TimelineSegment};
