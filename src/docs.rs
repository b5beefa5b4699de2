use crate::api::attendance::{AttendanceQuery, NotAttendedQuery, SummaryQuery};
use crate::attendance::{AttendanceStats, AttendanceSummary, Period};
use crate::auth::auth::AuthUser;
use crate::auth::handlers::TokenPair;
use crate::model::attendance::{
    AttendanceResponse, AttendanceStatus, CreateAttendance, UpdateAttendance,
};
use crate::model::role::Role;
use crate::model::user::UserSummary;
use crate::models::{LoginReqDto, RegisterReq};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

/// Registers the `bearer_auth` scheme referenced by the protected paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Churchbase API",
        version = "0.1.0",
        description = r#"
## Church membership management

Accounts, authentication and attendance tracking for congregations.

### Attendance
- Record attendance for an event, a meeting, or neither (one record per user and activity)
- Bulk recording, all-or-nothing
- Per-event status counts and the list of members who did not attend
- Daily, weekly or monthly summaries over a date range, empty periods included

### Security
Every `/api` endpoint needs a JWT access token (`Authorization: Bearer ...`).
Admins and leaders record attendance for anyone; members only for themselves.

### Errors
Failures return `{"error": "<message>"}` with 400, 401, 403, 404, 409 or 500.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::attendance::create_attendance,
        crate::api::attendance::bulk_create_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::attendance_summary,
        crate::api::attendance::event_stats,
        crate::api::attendance::event_not_attended,
        crate::api::attendance::get_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            TokenPair,
            AuthUser,
            Role,
            AttendanceStatus,
            CreateAttendance,
            UpdateAttendance,
            AttendanceResponse,
            AttendanceQuery,
            SummaryQuery,
            NotAttendedQuery,
            Period,
            AttendanceStats,
            AttendanceSummary,
            UserSummary
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Attendance", description = "Attendance recording and reporting APIs"),
    )
)]
pub struct ApiDoc;
