//! Attendance aggregation: status tallies, date bucketing and per-period summaries.
//!
//! Everything in here is pure; the service feeds it records it read from the store.

pub mod period;
pub mod stats;
pub mod summary;

pub use period::{Bucket, Period};
pub use stats::{AttendanceStats, Tally};
pub use summary::AttendanceSummary;
