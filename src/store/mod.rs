use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::AppError;
use crate::model::activity::{Activity, ActivityKind};
use crate::model::attendance::{AttachedTo, AttendanceRecord, AttendanceStatus};
use crate::model::user::UserSummary;

#[cfg(test)]
pub mod memory;
pub mod mysql;

/// Any combination of these narrows a record query; `None` means "don't care".
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AttendanceFilter {
    pub organization_id: Option<u64>,
    pub user_id: Option<u64>,
    pub event_id: Option<u64>,
    pub meeting_id: Option<u64>,
    pub status: Option<AttendanceStatus>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub until: Option<DateTime<Utc>>,
}

/// Midnight UTC at the start of `date`.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

impl AttendanceFilter {
    /// Restricts `created_at` to the whole days `[start, end]`; either side may be open.
    pub fn within_days(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.from = start.map(start_of_day);
        self.until = end.and_then(|d| d.succ_opt()).map(start_of_day);
        self
    }

    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        self.organization_id.is_none_or(|id| record.organization_id == id)
            && self.user_id.is_none_or(|id| record.user_id == id)
            && self.event_id.is_none_or(|id| record.attached_to.event_id() == Some(id))
            && self.meeting_id.is_none_or(|id| record.attached_to.meeting_id() == Some(id))
            && self.status.is_none_or(|s| record.status == s)
            && self.from.is_none_or(|t| record.created_at >= t)
            && self.until.is_none_or(|t| record.created_at < t)
    }
}

/// A validated record ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendance {
    pub user_id: u64,
    pub organization_id: u64,
    pub attached_to: AttachedTo,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub recorded_by: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl NewAttendance {
    pub fn into_record(self, id: u64) -> AttendanceRecord {
        AttendanceRecord {
            id,
            user_id: self.user_id,
            organization_id: self.organization_id,
            attached_to: self.attached_to,
            status: self.status,
            notes: self.notes,
            recorded_by: self.recorded_by,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Replacement values for the mutable columns. `notes: Some(None)` clears the notes.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendancePatch {
    pub status: Option<AttendanceStatus>,
    pub notes: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

impl AttendancePatch {
    pub fn apply(&self, record: &mut AttendanceRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(notes) = &self.notes {
            record.notes = notes.clone();
        }
        record.updated_at = self.updated_at;
    }
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn insert(&self, new: NewAttendance) -> Result<AttendanceRecord, AppError>;

    /// Inserts every row or none of them.
    async fn insert_batch(&self, batch: Vec<NewAttendance>)
    -> Result<Vec<AttendanceRecord>, AppError>;

    async fn get(&self, id: u64) -> Result<Option<AttendanceRecord>, AppError>;

    /// Newest first.
    async fn list(
        &self,
        filter: &AttendanceFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<AttendanceRecord>, AppError>;

    /// Every matching record, unpaginated. Used by the aggregations.
    async fn collect(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>, AppError>;

    async fn update(
        &self,
        id: u64,
        patch: &AttendancePatch,
    ) -> Result<Option<AttendanceRecord>, AppError>;

    /// Returns false when nothing was deleted.
    async fn delete(&self, id: u64) -> Result<bool, AppError>;

    async fn exists_for(&self, user_id: u64, attached_to: AttachedTo) -> Result<bool, AppError>;

    async fn find_user(&self, id: u64) -> Result<Option<UserSummary>, AppError>;

    async fn find_activity(&self, kind: ActivityKind, id: u64)
    -> Result<Option<Activity>, AppError>;

    /// Active users belonging to the organization, ordered by id.
    async fn roster(&self, organization_id: u64) -> Result<Vec<UserSummary>, AppError>;
}
