use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::activity::ActivityKind;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }
}

/// What an attendance record is attached to. A record points at one event,
/// one meeting, or neither, never both.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AttachedTo {
    Event(u64),
    Meeting(u64),
    None,
}

impl AttachedTo {
    /// Builds the variant from the two nullable wire/table columns.
    pub fn from_columns(event_id: Option<u64>, meeting_id: Option<u64>) -> Result<Self, AppError> {
        match (event_id, meeting_id) {
            (Some(_), Some(_)) => Err(AppError::validation(
                "Attendance can reference an event or a meeting, not both",
            )),
            (Some(id), None) => Ok(AttachedTo::Event(id)),
            (None, Some(id)) => Ok(AttachedTo::Meeting(id)),
            (None, None) => Ok(AttachedTo::None),
        }
    }

    pub fn event_id(&self) -> Option<u64> {
        match self {
            AttachedTo::Event(id) => Some(*id),
            _ => None,
        }
    }

    pub fn meeting_id(&self) -> Option<u64> {
        match self {
            AttachedTo::Meeting(id) => Some(*id),
            _ => None,
        }
    }

    pub fn activity(&self) -> Option<(ActivityKind, u64)> {
        match self {
            AttachedTo::Event(id) => Some((ActivityKind::Event, *id)),
            AttachedTo::Meeting(id) => Some((ActivityKind::Meeting, *id)),
            AttachedTo::None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    pub organization_id: u64,
    pub attached_to: AttachedTo,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub recorded_by: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `attendance` row as MySQL hands it back.
#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub user_id: u64,
    pub organization_id: u64,
    pub event_id: Option<u64>,
    pub meeting_id: Option<u64>,
    pub status: String,
    pub notes: Option<String>,
    pub recorded_by: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = AppError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<AttendanceStatus>().map_err(|_| {
            AppError::Internal(format!(
                "attendance {} has unknown status {:?}",
                row.id, row.status
            ))
        })?;
        let attached_to = AttachedTo::from_columns(row.event_id, row.meeting_id).map_err(|_| {
            AppError::Internal(format!(
                "attendance {} references both an event and a meeting",
                row.id
            ))
        })?;

        Ok(AttendanceRecord {
            id: row.id,
            user_id: row.user_id,
            organization_id: row.organization_id,
            attached_to,
            status,
            notes: row.notes,
            recorded_by: row.recorded_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 42,
    "user_id": 7,
    "organization_id": 1,
    "event_id": 3,
    "meeting_id": null,
    "status": "present",
    "notes": "Arrived with family",
    "recorded_by": 2,
    "created_at": "2024-01-07T10:15:00Z",
    "updated_at": "2024-01-07T10:15:00Z"
}))]
pub struct AttendanceResponse {
    pub id: u64,
    pub user_id: u64,
    pub organization_id: u64,
    #[schema(nullable = true)]
    pub event_id: Option<u64>,
    #[schema(nullable = true)]
    pub meeting_id: Option<u64>,
    pub status: AttendanceStatus,
    #[schema(nullable = true)]
    pub notes: Option<String>,
    #[schema(nullable = true)]
    pub recorded_by: Option<u64>,
    #[schema(example = "2024-01-07T10:15:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(example = "2024-01-07T10:15:00Z", format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl From<AttendanceRecord> for AttendanceResponse {
    fn from(record: AttendanceRecord) -> Self {
        AttendanceResponse {
            id: record.id,
            user_id: record.user_id,
            organization_id: record.organization_id,
            event_id: record.attached_to.event_id(),
            meeting_id: record.attached_to.meeting_id(),
            status: record.status,
            notes: record.notes,
            recorded_by: record.recorded_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Payload for recording one attendance.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "user_id": 7,
    "event_id": 3,
    "status": "present",
    "notes": "Arrived with family"
}))]
pub struct CreateAttendance {
    #[schema(example = 7)]
    pub user_id: u64,
    /// Set at most one of `event_id` / `meeting_id`
    #[serde(default)]
    pub event_id: Option<u64>,
    #[serde(default)]
    pub meeting_id: Option<u64>,
    /// Required when neither `event_id` nor `meeting_id` is given
    #[serde(default)]
    pub organization_id: Option<u64>,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Replacement status and/or notes. An empty `notes` string clears the notes.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "late",
    "notes": "Came after the opening hymn"
}))]
pub struct UpdateAttendance {
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}
