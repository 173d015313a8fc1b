//! Stats subsystem.
//!
//! The reporter samples per-backend counters every interval and appends one
//! line per backend to a size-rotated, optionally compressed file.

pub mod rotate;
pub mod sink;

pub use rotate::{RotatingFile, RotationPolicy};
pub use sink::{format_line, FileSink, StatsReporter, StatsSink};
