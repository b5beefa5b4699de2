use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceRecord, AttendanceStatus};

/// Running per-status counter.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Tally {
    pub present: u64,
    pub absent: u64,
    pub late: u64,
    pub excused: u64,
}

impl Tally {
    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Excused => self.excused += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.present + self.absent + self.late + self.excused
    }
}

impl FromIterator<AttendanceStatus> for Tally {
    fn from_iter<I: IntoIterator<Item = AttendanceStatus>>(iter: I) -> Self {
        let mut tally = Tally::default();
        for status in iter {
            tally.add(status);
        }
        tally
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "total": 4,
    "present": 2,
    "absent": 1,
    "late": 1,
    "excused": 0,
    "percentage": 50.0
}))]
pub struct AttendanceStats {
    pub total: u64,
    pub present: u64,
    pub absent: u64,
    pub late: u64,
    pub excused: u64,
    /// Share of `present` records, 0-100 with two decimals
    pub percentage: f64,
}

impl AttendanceStats {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AttendanceRecord>,
    {
        records.into_iter().map(|r| r.status).collect::<Tally>().into()
    }
}

impl From<Tally> for AttendanceStats {
    fn from(tally: Tally) -> Self {
        let total = tally.total();
        AttendanceStats {
            total,
            present: tally.present,
            absent: tally.absent,
            late: tally.late,
            excused: tally.excused,
            percentage: percentage(tally.present, total),
        }
    }
}

/// `part / total * 100` rounded to two decimals; zero when there is nothing to divide.
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = part as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}
