use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::period::Bucket;
use super::stats::{AttendanceStats, Tally};
use crate::model::attendance::AttendanceRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "period_label": "2024-01-02",
    "bucket_start_date": "2024-01-02",
    "bucket_end_date": "2024-01-02",
    "total": 1,
    "present": 1,
    "absent": 0,
    "late": 0,
    "excused": 0,
    "percentage": 100.0
}))]
pub struct AttendanceSummary {
    pub period_label: String,
    #[schema(example = "2024-01-02", format = "date", value_type = String)]
    pub bucket_start_date: NaiveDate,
    #[schema(example = "2024-01-02", format = "date", value_type = String)]
    pub bucket_end_date: NaiveDate,
    pub total: u64,
    pub present: u64,
    pub absent: u64,
    pub late: u64,
    pub excused: u64,
    pub percentage: f64,
}

impl AttendanceSummary {
    fn new(bucket: &Bucket, stats: AttendanceStats) -> Self {
        AttendanceSummary {
            period_label: bucket.label.clone(),
            bucket_start_date: bucket.start,
            bucket_end_date: bucket.end,
            total: stats.total,
            present: stats.present,
            absent: stats.absent,
            late: stats.late,
            excused: stats.excused,
            percentage: stats.percentage,
        }
    }
}

/// One summary per bucket, in bucket order. Each record lands in the bucket
/// holding the UTC date of its `created_at`; records outside every bucket are
/// dropped. Empty buckets stay in the series with zero counts.
///
/// `buckets` must be sorted and non-overlapping, as produced by `period::buckets`.
pub fn assemble<'a, I>(buckets: &[Bucket], records: I) -> Vec<AttendanceSummary>
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut tallies = vec![Tally::default(); buckets.len()];

    for record in records {
        let date = record.created_at.date_naive();
        let idx = buckets.partition_point(|b| b.end < date);
        if let Some(bucket) = buckets.get(idx) {
            if bucket.contains(date) {
                tallies[idx].add(record.status);
            }
        }
    }

    buckets
        .iter()
        .zip(tallies)
        .map(|(bucket, tally)| AttendanceSummary::new(bucket, tally.into()))
        .collect()
}
