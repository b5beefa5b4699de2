use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlArguments;
use sqlx::query::QueryAs;
use sqlx::{MySql, MySqlPool};

use super::{AttendanceFilter, AttendancePatch, AttendanceStore, NewAttendance};
use crate::error::{AppError, Constraint, constraint_violation};
use crate::model::activity::{Activity, ActivityKind};
use crate::model::attendance::{AttachedTo, AttendanceRecord, AttendanceRow};
use crate::model::user::UserSummary;

const COLUMNS: &str = "id, user_id, organization_id, event_id, meeting_id, status, notes, \
                       recorded_by, created_at, updated_at";

const INSERT_SQL: &str = r#"
    INSERT INTO attendance
        (user_id, organization_id, event_id, meeting_id, status, notes, recorded_by, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const USER_SUMMARY_COLUMNS: &str =
    "id, email, CONCAT(first_name, ' ', last_name) AS full_name, organization_id, is_active";

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(&'static str),
    Time(DateTime<Utc>),
}

fn where_clause(filter: &AttendanceFilter) -> (String, Vec<FilterValue>) {
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args = Vec::new();

    if let Some(id) = filter.organization_id {
        where_sql.push_str(" AND organization_id = ?");
        args.push(FilterValue::U64(id));
    }
    if let Some(id) = filter.user_id {
        where_sql.push_str(" AND user_id = ?");
        args.push(FilterValue::U64(id));
    }
    if let Some(id) = filter.event_id {
        where_sql.push_str(" AND event_id = ?");
        args.push(FilterValue::U64(id));
    }
    if let Some(id) = filter.meeting_id {
        where_sql.push_str(" AND meeting_id = ?");
        args.push(FilterValue::U64(id));
    }
    if let Some(status) = filter.status {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status.as_str()));
    }
    if let Some(from) = filter.from {
        where_sql.push_str(" AND created_at >= ?");
        args.push(FilterValue::Time(from));
    }
    if let Some(until) = filter.until {
        where_sql.push_str(" AND created_at < ?");
        args.push(FilterValue::Time(until));
    }

    (where_sql, args)
}

fn bind_filters<'q>(
    mut query: QueryAs<'q, MySql, AttendanceRow, MySqlArguments>,
    args: Vec<FilterValue>,
) -> QueryAs<'q, MySql, AttendanceRow, MySqlArguments> {
    for arg in args {
        query = match arg {
            FilterValue::U64(v) => query.bind(v),
            FilterValue::Str(s) => query.bind(s),
            FilterValue::Time(t) => query.bind(t),
        };
    }
    query
}

fn into_records(rows: Vec<AttendanceRow>) -> Result<Vec<AttendanceRecord>, AppError> {
    rows.into_iter().map(AttendanceRecord::try_from).collect()
}

fn insert_error(e: sqlx::Error) -> AppError {
    match constraint_violation(&e) {
        Some(Constraint::Unique) => {
            AppError::validation("Attendance already recorded for this user and activity")
        }
        // user or activity removed after validation
        Some(Constraint::ForeignKey) => {
            AppError::not_found("Referenced user, event or meeting no longer exists")
        }
        None => AppError::Database(e),
    }
}

pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn insert(&self, new: NewAttendance) -> Result<AttendanceRecord, AppError> {
        let result = sqlx::query(INSERT_SQL)
            .bind(new.user_id)
            .bind(new.organization_id)
            .bind(new.attached_to.event_id())
            .bind(new.attached_to.meeting_id())
            .bind(new.status.as_str())
            .bind(new.notes.clone())
            .bind(new.recorded_by)
            .bind(new.created_at)
            .bind(new.created_at)
            .execute(&self.pool)
            .await
            .map_err(insert_error)?;

        Ok(new.into_record(result.last_insert_id()))
    }

    async fn insert_batch(
        &self,
        batch: Vec<NewAttendance>,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(batch.len());

        for new in batch {
            let result = sqlx::query(INSERT_SQL)
                .bind(new.user_id)
                .bind(new.organization_id)
                .bind(new.attached_to.event_id())
                .bind(new.attached_to.meeting_id())
                .bind(new.status.as_str())
                .bind(new.notes.clone())
                .bind(new.recorded_by)
                .bind(new.created_at)
                .bind(new.created_at)
                .execute(&mut *tx)
                .await
                .map_err(insert_error)?;
            created.push(new.into_record(result.last_insert_id()));
        }

        // dropping `tx` on an early return rolls everything back
        tx.commit().await?;
        Ok(created)
    }

    async fn get(&self, id: u64) -> Result<Option<AttendanceRecord>, AppError> {
        let sql = format!("SELECT {COLUMNS} FROM attendance WHERE id = ?");
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let (where_sql, args) = where_clause(filter);
        let sql = format!(
            "SELECT {COLUMNS} FROM attendance{where_sql} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );

        let rows = bind_filters(sqlx::query_as::<_, AttendanceRow>(&sql), args)
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await?;

        into_records(rows)
    }

    async fn collect(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>, AppError> {
        let (where_sql, args) = where_clause(filter);
        let sql = format!("SELECT {COLUMNS} FROM attendance{where_sql} ORDER BY created_at, id");

        let rows = bind_filters(sqlx::query_as::<_, AttendanceRow>(&sql), args)
            .fetch_all(&self.pool)
            .await?;

        into_records(rows)
    }

    async fn update(
        &self,
        id: u64,
        patch: &AttendancePatch,
    ) -> Result<Option<AttendanceRecord>, AppError> {
        let notes_given = patch.notes.is_some();
        let notes = patch.notes.clone().flatten();

        sqlx::query(
            r#"
            UPDATE attendance
            SET status = COALESCE(?, status),
                notes = IF(?, ?, notes),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(patch.status.map(|s| s.as_str()))
        .bind(notes_given)
        .bind(notes)
        .bind(patch.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    async fn delete(&self, id: u64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists_for(&self, user_id: u64, attached_to: AttachedTo) -> Result<bool, AppError> {
        let (column, activity_id) = match attached_to {
            AttachedTo::Event(id) => ("event_id", id),
            AttachedTo::Meeting(id) => ("meeting_id", id),
            AttachedTo::None => return Ok(false),
        };

        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM attendance WHERE user_id = ? AND {column} = ? LIMIT 1)"
        );
        let exists = sqlx::query_scalar::<_, i64>(&sql)
            .bind(user_id)
            .bind(activity_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists != 0)
    }

    async fn find_user(&self, id: u64) -> Result<Option<UserSummary>, AppError> {
        let sql = format!("SELECT {USER_SUMMARY_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_activity(
        &self,
        kind: ActivityKind,
        id: u64,
    ) -> Result<Option<Activity>, AppError> {
        let sql = format!(
            "SELECT id, organization_id, title FROM {} WHERE id = ?",
            kind.table()
        );
        let row = sqlx::query_as::<_, (u64, u64, String)>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(id, organization_id, title)| Activity {
            kind,
            id,
            organization_id,
            title,
        }))
    }

    async fn roster(&self, organization_id: u64) -> Result<Vec<UserSummary>, AppError> {
        let sql = format!(
            "SELECT {USER_SUMMARY_COLUMNS} FROM users \
             WHERE organization_id = ? AND is_active = TRUE ORDER BY id"
        );
        let users = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }
}
