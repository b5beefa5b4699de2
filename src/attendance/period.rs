use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

/// Granularity of a summary time series.
#[derive(
    Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Period {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

/// Inclusive date range `[start, end]` with a display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

impl Bucket {
    fn new(period: Period, start: NaiveDate, end: NaiveDate) -> Self {
        let label = match period {
            Period::Daily => start.format("%Y-%m-%d").to_string(),
            Period::Weekly => format!("{}..{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d")),
            Period::Monthly => start.format("%Y-%m").to_string(),
        };
        Bucket { start, end, label }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Splits `[start, end]` into ordered, contiguous, non-overlapping buckets.
///
/// Weekly buckets are anchored at `start`, not at calendar weeks. Monthly
/// buckets follow calendar months, with the first and last clipped to the
/// range. An inverted range yields no buckets.
pub fn buckets(start: NaiveDate, end: NaiveDate, period: Period) -> Vec<Bucket> {
    let mut out = Vec::new();
    let mut cursor = Some(start);

    while let Some(from) = cursor.filter(|d| *d <= end) {
        let (to, next) = match period {
            Period::Daily => (from, from.succ_opt()),
            Period::Weekly => {
                let last = from
                    .checked_add_days(Days::new(6))
                    .map_or(end, |d| d.min(end));
                (last, from.checked_add_days(Days::new(7)))
            }
            Period::Monthly => {
                let next = first_of_next_month(from);
                let last = next.and_then(|d| d.pred_opt()).map_or(end, |d| d.min(end));
                (last, next)
            }
        };
        out.push(Bucket::new(period, from, to));
        cursor = next;
    }

    out
}

/// Number of buckets `buckets(start, end, period)` would produce, computed
/// without building them.
pub fn bucket_count(start: NaiveDate, end: NaiveDate, period: Period) -> u64 {
    if start > end {
        return 0;
    }
    let days = (end - start).num_days() as u64 + 1;
    match period {
        Period::Daily => days,
        Period::Weekly => days.div_ceil(7),
        Period::Monthly => {
            let months = (end.year() as i64 - start.year() as i64) * 12 + end.month() as i64
                - start.month() as i64;
            months as u64 + 1
        }
    }
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.checked_add_months(Months::new(1))
}
