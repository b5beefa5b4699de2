use crate::attendance::{AttendanceStats, AttendanceSummary, Period};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::attendance::{
    AttendanceRecord, AttendanceResponse, AttendanceStatus, CreateAttendance, UpdateAttendance,
};
use crate::model::user::UserSummary;
use crate::service::AttendanceService;
use crate::service::attendance::OrgScope;
use crate::store::AttendanceFilter;
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Filter by subject user. Ignored for members and guests, who only see their own records
    #[schema(example = 7)]
    pub user_id: Option<u64>,
    #[schema(example = 3)]
    pub event_id: Option<u64>,
    pub meeting_id: Option<u64>,
    #[schema(example = 1)]
    pub organization_id: Option<u64>,
    pub status: Option<AttendanceStatus>,
    /// First day included (by `created_at`)
    #[schema(example = "2024-01-01", format = "date", value_type = Option<String>)]
    #[param(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    /// Last day included (by `created_at`)
    #[schema(example = "2024-01-31", format = "date", value_type = Option<String>)]
    #[param(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    #[schema(example = 0)]
    pub skip: Option<u64>,
    /// Page size, defaults to 100 and is capped at 100
    #[schema(example = 20)]
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// Defaults to the caller's organization
    #[schema(example = 1)]
    pub organization_id: Option<u64>,
    #[schema(example = "2024-01-01", format = "date", value_type = String)]
    #[param(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2024-01-31", format = "date", value_type = String)]
    #[param(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub period: Period,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct NotAttendedQuery {
    /// Status that counts as "not attended" for users who do have a record. Defaults to `absent`
    pub status: Option<AttendanceStatus>,
}

fn to_responses(records: Vec<AttendanceRecord>) -> Vec<AttendanceResponse> {
    records.into_iter().map(AttendanceResponse::from).collect()
}

#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body(
        content = CreateAttendance,
        description = "Attendance to record",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Attendance recorded", body = AttendanceResponse),
        (status = 400, description = "Invalid payload or duplicate record", body = Object, example = json!({
            "error": "Attendance can reference an event or a meeting, not both"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User, event or meeting not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn create_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<CreateAttendance>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    auth.require_can_record_for(payload.user_id)?;
    let scope = auth.organization_scope()?;

    let record = service.create(payload, Some(auth.user_id), scope).await?;
    Ok(HttpResponse::Created().json(AttendanceResponse::from(record)))
}

#[utoipa::path(
    post,
    path = "/api/attendance/bulk",
    request_body(
        content = Vec<CreateAttendance>,
        description = "Records to insert together; nothing is written if any item is invalid",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "All records inserted", body = Vec<AttendanceResponse>),
        (status = 400, description = "An item is invalid", body = Object, example = json!({
            "error": "item 2: Attendance can reference an event or a meeting, not both"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "An item references a missing user, event or meeting")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn bulk_create_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<Vec<CreateAttendance>>,
) -> Result<HttpResponse, AppError> {
    auth.require_recorder()?;
    let scope = auth.organization_scope()?;

    let records = service
        .bulk_create(payload.into_inner(), Some(auth.user_id), scope)
        .await?;
    Ok(HttpResponse::Created().json(to_responses(records)))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance records, newest first", body = Vec<AttendanceResponse>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Organization outside the caller's scope")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();

    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if start > end {
            return Err(AppError::validation("start_date cannot be after end_date"));
        }
    }

    let user_id = if auth.role.is_recorder() {
        query.user_id
    } else {
        Some(auth.user_id)
    };

    let organization_id = match auth.organization_scope()? {
        OrgScope::Any => query.organization_id,
        OrgScope::Only(own) => {
            if let Some(requested) = query.organization_id {
                OrgScope::Only(own).check(requested)?;
            }
            Some(own)
        }
    };

    let filter = AttendanceFilter {
        organization_id,
        user_id,
        event_id: query.event_id,
        meeting_id: query.meeting_id,
        status: query.status,
        ..Default::default()
    }
    .within_days(query.start_date, query.end_date);

    let records = service
        .list(&filter, query.skip.unwrap_or(0), query.limit)
        .await?;
    Ok(HttpResponse::Ok().json(to_responses(records)))
}

#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "One summary per period, oldest first", body = Vec<AttendanceSummary>),
        (status = 400, description = "Invalid query"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn attendance_summary(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    query: web::Query<SummaryQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_recorder()?;

    let organization_id = query
        .organization_id
        .or(auth.organization_id)
        .ok_or_else(|| AppError::validation("organization_id is required"))?;
    auth.organization_scope()?.check(organization_id)?;

    let summaries = service
        .summary(organization_id, query.start_date, query.end_date, query.period)
        .await?;
    Ok(HttpResponse::Ok().json(summaries))
}

#[utoipa::path(
    get,
    path = "/api/attendance/event/{event_id}/stats",
    params(
        ("event_id" = u64, Path, description = "Event to tally")
    ),
    responses(
        (status = 200, description = "Status counts for the event", body = AttendanceStats),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Event not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn event_stats(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_recorder()?;

    let scope = auth.organization_scope()?;
    let stats = service.stats_for_event(path.into_inner(), scope).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[utoipa::path(
    get,
    path = "/api/attendance/event/{event_id}/not-attended",
    params(
        ("event_id" = u64, Path, description = "Event to check"),
        NotAttendedQuery
    ),
    responses(
        (status = 200, description = "Active members without a record or with the given status", body = Vec<UserSummary>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Event not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn event_not_attended(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    query: web::Query<NotAttendedQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_recorder()?;

    let status = query.status.unwrap_or(AttendanceStatus::Absent);
    let scope = auth.organization_scope()?;
    let users = service.not_attended(path.into_inner(), status, scope).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(
        ("id" = u64, Path, description = "Attendance record id")
    ),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found", body = Object, example = json!({
            "error": "Attendance record not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let record = service.get(path.into_inner()).await?;
    auth.require_can_view(&record)?;

    Ok(HttpResponse::Ok().json(AttendanceResponse::from(record)))
}

#[utoipa::path(
    put,
    path = "/api/attendance/{id}",
    params(
        ("id" = u64, Path, description = "Attendance record id")
    ),
    request_body(
        content = UpdateAttendance,
        description = "Fields to replace",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Updated record", body = AttendanceResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendance>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let existing = service.get(id).await?;
    auth.require_can_edit(&existing)?;

    let record = service.update(id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(record)))
}

#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(
        ("id" = u64, Path, description = "Attendance record id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Attendance record not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    service.delete(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Mounts `/attendance` and its sub-resources. Static segments are registered
/// before `/{id}` so they are not captured by it.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/attendance")
            // /attendance
            .service(
                web::resource("")
                    .route(web::post().to(create_attendance))
                    .route(web::get().to(list_attendance)),
            )
            .service(web::resource("/bulk").route(web::post().to(bulk_create_attendance)))
            .service(web::resource("/summary").route(web::get().to(attendance_summary)))
            .service(web::resource("/event/{event_id}/stats").route(web::get().to(event_stats)))
            .service(
                web::resource("/event/{event_id}/not-attended")
                    .route(web::get().to(event_not_attended)),
            )
            // /attendance/{id}
            .service(
                web::resource("/{id}")
                    .route(web::get().to(get_attendance))
                    .route(web::put().to(update_attendance))
                    .route(web::delete().to(delete_attendance)),
            ),
    );
}
