use chrono::{DateTime, Duration, DurationRound, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::attendance::{AttendanceStats, AttendanceSummary, Period, period, summary};
use crate::error::AppError;
use crate::model::activity::{Activity, ActivityKind};
use crate::model::attendance::{
    AttachedTo, AttendanceRecord, AttendanceStatus, CreateAttendance, UpdateAttendance,
};
use crate::model::user::UserSummary;
use crate::store::{AttendanceFilter, AttendancePatch, AttendanceStore, NewAttendance};

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 100;
pub const MAX_NOTES_LEN: usize = 1000;
pub const DEFAULT_MAX_SUMMARY_BUCKETS: u64 = 1000;

/// Organizations a caller may touch. Admins act across organizations;
/// everyone else is held to the organization in their token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OrgScope {
    Any,
    Only(u64),
}

impl OrgScope {
    pub fn check(self, organization_id: u64) -> Result<(), AppError> {
        match self {
            OrgScope::Only(own) if own != organization_id => Err(AppError::forbidden(format!(
                "Not allowed to access organization {organization_id}"
            ))),
            _ => Ok(()),
        }
    }
}

/// Attendance operations on top of an `AttendanceStore`. Role checks live in
/// the HTTP layer; everything here assumes the caller was already authorized.
#[derive(Clone)]
pub struct AttendanceService {
    store: Arc<dyn AttendanceStore>,
    max_bulk_items: usize,
    max_summary_buckets: u64,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn AttendanceStore>, max_bulk_items: usize) -> Self {
        Self {
            store,
            max_bulk_items,
            max_summary_buckets: DEFAULT_MAX_SUMMARY_BUCKETS,
        }
    }

    pub fn with_max_summary_buckets(mut self, max_summary_buckets: u64) -> Self {
        self.max_summary_buckets = max_summary_buckets;
        self
    }

    pub async fn create(
        &self,
        req: CreateAttendance,
        recorded_by: Option<u64>,
        scope: OrgScope,
    ) -> Result<AttendanceRecord, AppError> {
        let new = self.prepare(req, recorded_by, scope, now()).await?;
        let record = self.store.insert(new).await?;

        info!(
            attendance_id = record.id,
            user_id = record.user_id,
            status = record.status.as_str(),
            "Attendance recorded"
        );
        Ok(record)
    }

    /// All-or-nothing: the first invalid item fails the whole batch and
    /// nothing is written.
    pub async fn bulk_create(
        &self,
        items: Vec<CreateAttendance>,
        recorded_by: Option<u64>,
        scope: OrgScope,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        if items.len() > self.max_bulk_items {
            return Err(AppError::validation(format!(
                "At most {} items can be recorded at once, got {}",
                self.max_bulk_items,
                items.len()
            )));
        }

        let now = now();
        let mut seen: HashSet<(u64, AttachedTo)> = HashSet::new();
        let mut batch = Vec::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            let new = self
                .prepare(item, recorded_by, scope, now)
                .await
                .map_err(|e| at_item(index, e))?;

            if new.attached_to != AttachedTo::None && !seen.insert((new.user_id, new.attached_to)) {
                return Err(at_item(
                    index,
                    AppError::validation("duplicates an earlier item in this batch"),
                ));
            }
            batch.push(new);
        }

        let created = self.store.insert_batch(batch).await?;
        info!(count = created.len(), "Bulk attendance recorded");
        Ok(created)
    }

    pub async fn get(&self, id: u64) -> Result<AttendanceRecord, AppError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("Attendance record not found"))
    }

    pub async fn list(
        &self,
        filter: &AttendanceFilter,
        skip: u64,
        limit: Option<u64>,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        self.store.list(filter, skip, limit).await
    }

    pub async fn update(
        &self,
        id: u64,
        req: UpdateAttendance,
    ) -> Result<AttendanceRecord, AppError> {
        if let Some(notes) = &req.notes {
            check_notes(notes)?;
        }

        let patch = AttendancePatch {
            status: req.status,
            notes: req.notes.map(normalize_notes),
            updated_at: now(),
        };

        let record = self
            .store
            .update(id, &patch)
            .await?
            .ok_or_else(|| AppError::not_found("Attendance record not found"))?;

        info!(attendance_id = id, "Attendance updated");
        Ok(record)
    }

    pub async fn delete(&self, id: u64) -> Result<(), AppError> {
        if !self.store.delete(id).await? {
            return Err(AppError::not_found("Attendance record not found"));
        }
        info!(attendance_id = id, "Attendance deleted");
        Ok(())
    }

    pub async fn stats_for_event(
        &self,
        event_id: u64,
        scope: OrgScope,
    ) -> Result<AttendanceStats, AppError> {
        let event = self.require_activity(ActivityKind::Event, event_id).await?;
        scope.check(event.organization_id)?;

        let filter = AttendanceFilter {
            event_id: Some(event_id),
            ..Default::default()
        };
        let records = self.store.collect(&filter).await?;
        Ok(AttendanceStats::from_records(&records))
    }

    /// One summary per period bucket of `[start, end]`, oldest first. Empty
    /// periods are included with zero counts. Ranges needing more than
    /// `max_summary_buckets` buckets are rejected before anything is built.
    pub async fn summary(
        &self,
        organization_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        period: Period,
    ) -> Result<Vec<AttendanceSummary>, AppError> {
        let count = period::bucket_count(start, end, period);
        if count > self.max_summary_buckets {
            return Err(AppError::validation(format!(
                "Range needs {count} {} buckets, at most {} allowed",
                period.as_ref(),
                self.max_summary_buckets
            )));
        }

        let buckets = period::buckets(start, end, period);
        if buckets.is_empty() {
            return Ok(Vec::new());
        }

        let filter = AttendanceFilter {
            organization_id: Some(organization_id),
            ..Default::default()
        }
        .within_days(Some(start), Some(end));
        let records = self.store.collect(&filter).await?;

        debug!(
            organization_id,
            period = period.as_ref(),
            buckets = buckets.len(),
            records = records.len(),
            "Assembling attendance summary"
        );
        Ok(summary::assemble(&buckets, &records))
    }

    /// Members of the event's organization who either have no record for the
    /// event or whose record carries `status`.
    pub async fn not_attended(
        &self,
        event_id: u64,
        status: AttendanceStatus,
        scope: OrgScope,
    ) -> Result<Vec<UserSummary>, AppError> {
        let event = self.require_activity(ActivityKind::Event, event_id).await?;
        scope.check(event.organization_id)?;

        let filter = AttendanceFilter {
            event_id: Some(event_id),
            ..Default::default()
        };
        let recorded: HashMap<u64, AttendanceStatus> = self
            .store
            .collect(&filter)
            .await?
            .into_iter()
            .map(|r| (r.user_id, r.status))
            .collect();

        let roster = self.store.roster(event.organization_id).await?;
        debug!(
            event_id,
            event = %event.title,
            roster = roster.len(),
            recorded = recorded.len(),
            "Computing not-attended list"
        );
        Ok(roster
            .into_iter()
            .filter(|user| recorded.get(&user.id).is_none_or(|s| *s == status))
            .collect())
    }

    async fn require_activity(
        &self,
        kind: ActivityKind,
        id: u64,
    ) -> Result<Activity, AppError> {
        self.store
            .find_activity(kind, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{} {} not found", kind.label(), id)))
    }

    async fn prepare(
        &self,
        req: CreateAttendance,
        recorded_by: Option<u64>,
        scope: OrgScope,
        now: DateTime<Utc>,
    ) -> Result<NewAttendance, AppError> {
        let attached_to = AttachedTo::from_columns(req.event_id, req.meeting_id)?;
        if let Some(notes) = &req.notes {
            check_notes(notes)?;
        }

        let user = self
            .store
            .find_user(req.user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {} not found", req.user_id)))?;

        let organization_id = match attached_to.activity() {
            Some((kind, id)) => {
                let activity = self.require_activity(kind, id).await?;
                if let Some(given) = req.organization_id {
                    if given != activity.organization_id {
                        return Err(AppError::validation(format!(
                            "{} {} does not belong to organization {}",
                            kind.label(),
                            id,
                            given
                        )));
                    }
                }
                activity.organization_id
            }
            None => req.organization_id.ok_or_else(|| {
                AppError::validation(
                    "organization_id is required when attendance is not tied to an event or meeting",
                )
            })?,
        };

        scope.check(organization_id)?;
        if user.organization_id != Some(organization_id) {
            return Err(AppError::validation(format!(
                "User {} does not belong to organization {}",
                req.user_id, organization_id
            )));
        }

        if self.store.exists_for(req.user_id, attached_to).await? {
            return Err(AppError::validation(
                "Attendance already recorded for this user and activity",
            ));
        }

        Ok(NewAttendance {
            user_id: req.user_id,
            organization_id,
            attached_to,
            status: req.status,
            notes: req.notes.and_then(normalize_notes),
            recorded_by,
            created_at: now,
        })
    }
}

fn check_notes(notes: &str) -> Result<(), AppError> {
    if notes.chars().count() > MAX_NOTES_LEN {
        return Err(AppError::validation(format!(
            "notes must be at most {MAX_NOTES_LEN} characters"
        )));
    }
    Ok(())
}

fn normalize_notes(notes: String) -> Option<String> {
    if notes.trim().is_empty() { None } else { Some(notes) }
}

/// Current time truncated to the microsecond precision of `DATETIME(6)`, so
/// the returned record equals what a later read gives back.
fn now() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(Duration::microseconds(1)).unwrap_or(now)
}

fn at_item(index: usize, err: AppError) -> AppError {
    match err {
        AppError::Validation(msg) => AppError::Validation(format!("item {index}: {msg}")),
        AppError::NotFound(msg) => AppError::NotFound(format!("item {index}: {msg}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryAttendanceStore;
    use chrono::TimeZone;

    const ORG: u64 = 1;
    const OTHER_ORG: u64 = 2;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Users 1..=4 in ORG (4 inactive), user 5 in OTHER_ORG; event 10 and
    /// meeting 20 in ORG, event 30 in OTHER_ORG.
    fn setup() -> (Arc<MemoryAttendanceStore>, AttendanceService) {
        let store = Arc::new(MemoryAttendanceStore::new());
        for id in 1..=3 {
            store.add_user(id, Some(ORG), true);
        }
        store.add_user(4, Some(ORG), false);
        store.add_user(5, Some(OTHER_ORG), true);
        store.add_activity(ActivityKind::Event, 10, ORG);
        store.add_activity(ActivityKind::Meeting, 20, ORG);
        store.add_activity(ActivityKind::Event, 30, OTHER_ORG);
        let service = AttendanceService::new(store.clone(), 5);
        (store, service)
    }

    fn create_req(user_id: u64, event_id: Option<u64>, status: AttendanceStatus) -> CreateAttendance {
        CreateAttendance {
            user_id,
            event_id,
            meeting_id: None,
            organization_id: None,
            status,
            notes: None,
        }
    }

    fn seeded(user_id: u64, at: DateTime<Utc>, status: AttendanceStatus) -> NewAttendance {
        NewAttendance {
            user_id,
            organization_id: ORG,
            attached_to: AttachedTo::None,
            status,
            notes: None,
            recorded_by: None,
            created_at: at,
        }
    }

    #[actix_web::test]
    async fn create_copies_organization_from_event() {
        let (_, service) = setup();
        let record = service
            .create(
                create_req(1, Some(10), AttendanceStatus::Present),
                Some(2),
                OrgScope::Any,
            )
            .await
            .unwrap();
        assert_eq!(record.organization_id, ORG);
        assert_eq!(record.attached_to, AttachedTo::Event(10));
        assert_eq!(record.recorded_by, Some(2));
        assert_eq!(record.created_at, record.updated_at);
    }

    #[actix_web::test]
    async fn create_with_event_and_meeting_is_rejected() {
        let (store, service) = setup();
        let mut req = create_req(1, Some(10), AttendanceStatus::Present);
        req.meeting_id = Some(20);
        let err = service.create(req, None, OrgScope::Any).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.len(), 0);
    }

    #[actix_web::test]
    async fn create_reports_missing_references() {
        let (_, service) = setup();
        let err = service
            .create(create_req(99, Some(10), AttendanceStatus::Present), None, OrgScope::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = service
            .create(create_req(1, Some(99), AttendanceStatus::Present), None, OrgScope::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Event 99 not found"));
    }

    #[actix_web::test]
    async fn unattached_record_needs_organization() {
        let (_, service) = setup();
        let err = service
            .create(create_req(1, None, AttendanceStatus::Present), None, OrgScope::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut req = create_req(1, None, AttendanceStatus::Present);
        req.organization_id = Some(ORG);
        let record = service.create(req, None, OrgScope::Any).await.unwrap();
        assert_eq!(record.attached_to, AttachedTo::None);
        assert_eq!(record.organization_id, ORG);
    }

    #[actix_web::test]
    async fn organization_must_match_activity() {
        let (_, service) = setup();
        let mut req = create_req(1, Some(30), AttendanceStatus::Present);
        req.organization_id = Some(ORG);
        let err = service.create(req, None, OrgScope::Any).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[actix_web::test]
    async fn second_record_for_same_event_is_rejected() {
        let (_, service) = setup();
        service
            .create(create_req(1, Some(10), AttendanceStatus::Present), None, OrgScope::Any)
            .await
            .unwrap();
        let err = service
            .create(create_req(1, Some(10), AttendanceStatus::Late), None, OrgScope::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[actix_web::test]
    async fn overlong_notes_are_rejected() {
        let (_, service) = setup();
        let mut req = create_req(1, Some(10), AttendanceStatus::Present);
        req.notes = Some("x".repeat(MAX_NOTES_LEN + 1));
        let err = service.create(req, None, OrgScope::Any).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[actix_web::test]
    async fn get_is_idempotent() {
        let (_, service) = setup();
        let created = service
            .create(create_req(1, Some(10), AttendanceStatus::Present), None, OrgScope::Any)
            .await
            .unwrap();
        let first = service.get(created.id).await.unwrap();
        let second = service.get(created.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, created);

        let err = service.get(created.id + 100).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn update_replaces_status_and_clears_notes() {
        let (_, service) = setup();
        let mut req = create_req(1, Some(10), AttendanceStatus::Present);
        req.notes = Some("first".into());
        let created = service.create(req, None, OrgScope::Any).await.unwrap();

        let updated = service
            .update(
                created.id,
                UpdateAttendance {
                    status: Some(AttendanceStatus::Excused),
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, AttendanceStatus::Excused);
        assert_eq!(updated.notes.as_deref(), Some("first"));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        let cleared = service
            .update(
                created.id,
                UpdateAttendance {
                    status: None,
                    notes: Some(String::new()),
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.notes, None);
        assert_eq!(cleared.status, AttendanceStatus::Excused);

        let err = service
            .update(999, UpdateAttendance::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn delete_then_not_found() {
        let (_, service) = setup();
        let created = service
            .create(create_req(1, Some(10), AttendanceStatus::Present), None, OrgScope::Any)
            .await
            .unwrap();
        service.delete(created.id).await.unwrap();
        assert!(matches!(service.get(created.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.delete(created.id).await, Err(AppError::NotFound(_))));
    }

    #[actix_web::test]
    async fn list_filters_and_pages_newest_first() {
        let (store, service) = setup();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        for i in 0..5 {
            store.seed(seeded(1 + (i % 2), base + chrono::Duration::days(i as i64), AttendanceStatus::Present));
        }

        let filter = AttendanceFilter {
            user_id: Some(1),
            ..Default::default()
        };
        let all = service.list(&filter, 0, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let page = service.list(&AttendanceFilter::default(), 1, Some(2)).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].created_at, base + chrono::Duration::days(3));
    }

    #[actix_web::test]
    async fn event_stats() {
        let (_, service) = setup();
        for (user, status) in [
            (1, AttendanceStatus::Present),
            (2, AttendanceStatus::Present),
            (3, AttendanceStatus::Late),
            (4, AttendanceStatus::Absent),
        ] {
            service.create(create_req(user, Some(10), status), None, OrgScope::Any).await.unwrap();
        }

        let stats = service.stats_for_event(10, OrgScope::Any).await.unwrap();
        assert_eq!(
            stats,
            AttendanceStats {
                total: 4,
                present: 2,
                absent: 1,
                late: 1,
                excused: 0,
                percentage: 50.0,
            }
        );

        let empty = service.stats_for_event(30, OrgScope::Any).await.unwrap();
        assert_eq!(empty, AttendanceStats::default());

        assert!(matches!(
            service.stats_for_event(404, OrgScope::Any).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn daily_summary_keeps_empty_days() {
        let (store, service) = setup();
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 18, 30, 0).unwrap();
        store.seed(seeded(1, at, AttendanceStatus::Present));
        let mut elsewhere = seeded(5, at, AttendanceStatus::Absent);
        elsewhere.organization_id = OTHER_ORG;
        store.seed(elsewhere);

        let out = service
            .summary(ORG, d(2024, 1, 1), d(2024, 1, 3), Period::Daily)
            .await
            .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!((out[0].total, out[0].percentage), (0, 0.0));
        assert_eq!((out[1].total, out[1].present, out[1].percentage), (1, 1, 100.0));
        assert_eq!((out[2].total, out[2].percentage), (0, 0.0));
    }

    #[actix_web::test]
    async fn summary_range_includes_whole_last_day() {
        let (store, service) = setup();
        store.seed(seeded(
            1,
            Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap(),
            AttendanceStatus::Late,
        ));
        store.seed(seeded(
            2,
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            AttendanceStatus::Present,
        ));

        let out = service
            .summary(ORG, d(2024, 1, 1), d(2024, 1, 31), Period::Monthly)
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].period_label, "2024-01");
        assert_eq!((out[0].total, out[0].late), (1, 1));
    }

    #[actix_web::test]
    async fn summary_on_inverted_range_is_empty() {
        let (_, service) = setup();
        let out = service
            .summary(ORG, d(2024, 2, 1), d(2024, 1, 1), Period::Weekly)
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[actix_web::test]
    async fn summary_rejects_ranges_wider_than_the_bucket_limit() {
        let (store, _) = setup();
        let service = AttendanceService::new(store, 5).with_max_summary_buckets(31);

        let err = service
            .summary(ORG, d(1, 1, 1), d(9999, 12, 31), Period::Daily)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .summary(ORG, d(2024, 1, 1), d(2024, 2, 1), Period::Daily)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let out = service
            .summary(ORG, d(2024, 1, 1), d(2024, 1, 31), Period::Daily)
            .await
            .unwrap();
        assert_eq!(out.len(), 31);

        // the same wide range is fine at a coarser granularity
        let out = service
            .summary(ORG, d(2000, 1, 1), d(2001, 12, 31), Period::Monthly)
            .await
            .unwrap();
        assert_eq!(out.len(), 24);
    }

    #[actix_web::test]
    async fn created_timestamps_fit_microsecond_columns() {
        let (_, service) = setup();
        let record = service
            .create(create_req(1, Some(10), AttendanceStatus::Present), None, OrgScope::Any)
            .await
            .unwrap();
        assert_eq!(record.created_at.timestamp_subsec_nanos() % 1_000, 0);

        let created = service
            .bulk_create(
                vec![create_req(2, Some(10), AttendanceStatus::Late)],
                None,
                OrgScope::Any,
            )
            .await
            .unwrap();
        assert_eq!(created[0].created_at.timestamp_subsec_nanos() % 1_000, 0);

        let updated = service
            .update(
                record.id,
                UpdateAttendance {
                    status: Some(AttendanceStatus::Late),
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.updated_at.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[actix_web::test]
    async fn scoped_callers_stay_in_their_organization() {
        let (store, service) = setup();

        let err = service
            .create(
                create_req(1, Some(10), AttendanceStatus::Present),
                None,
                OrgScope::Only(OTHER_ORG),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));

        let err = service
            .bulk_create(
                vec![
                    create_req(5, Some(30), AttendanceStatus::Present),
                    create_req(1, Some(10), AttendanceStatus::Present),
                ],
                None,
                OrgScope::Only(OTHER_ORG),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
        assert_eq!(store.len(), 0);

        assert!(matches!(
            service.stats_for_event(10, OrgScope::Only(OTHER_ORG)).await,
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(
            service
                .not_attended(10, AttendanceStatus::Absent, OrgScope::Only(OTHER_ORG))
                .await,
            Err(AppError::PermissionDenied(_))
        ));
        assert!(service.stats_for_event(10, OrgScope::Only(ORG)).await.is_ok());
    }

    #[actix_web::test]
    async fn subject_must_belong_to_the_activity_organization() {
        let (_, service) = setup();
        let err = service
            .create(create_req(5, Some(10), AttendanceStatus::Present), None, OrgScope::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("does not belong")));
    }

    #[actix_web::test]
    async fn not_attended_lists_unrecorded_and_matching_status() {
        let (_, service) = setup();
        service
            .create(create_req(1, Some(10), AttendanceStatus::Present), None, OrgScope::Any)
            .await
            .unwrap();
        service
            .create(create_req(2, Some(10), AttendanceStatus::Absent), None, OrgScope::Any)
            .await
            .unwrap();

        // user 3 has no record, user 4 is inactive, user 5 is in another organization
        let ids: Vec<u64> = service
            .not_attended(10, AttendanceStatus::Absent, OrgScope::Any)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec![2, 3]);

        let ids: Vec<u64> = service
            .not_attended(10, AttendanceStatus::Late, OrgScope::Any)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec![3]);

        assert!(matches!(
            service.not_attended(404, AttendanceStatus::Absent, OrgScope::Any).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn bulk_create_is_all_or_nothing() {
        let (store, service) = setup();
        let mut both = create_req(3, Some(10), AttendanceStatus::Late);
        both.meeting_id = Some(20);

        let err = service
            .bulk_create(
                vec![
                    create_req(1, Some(10), AttendanceStatus::Present),
                    create_req(2, Some(10), AttendanceStatus::Present),
                    both,
                ],
                Some(1),
                OrgScope::Any,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.starts_with("item 2:")));
        assert_eq!(store.len(), 0);

        let created = service
            .bulk_create(
                vec![
                    create_req(1, Some(10), AttendanceStatus::Present),
                    create_req(2, Some(10), AttendanceStatus::Absent),
                ],
                Some(1),
                OrgScope::Any,
            )
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[actix_web::test]
    async fn bulk_create_rejects_duplicates_within_batch() {
        let (store, service) = setup();
        let err = service
            .bulk_create(
                vec![
                    create_req(1, Some(10), AttendanceStatus::Present),
                    create_req(1, Some(10), AttendanceStatus::Late),
                ],
                None,
                OrgScope::Any,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.starts_with("item 1:")));
        assert_eq!(store.len(), 0);
    }

    #[actix_web::test]
    async fn bulk_create_limits() {
        let (_, service) = setup();
        assert!(service.bulk_create(Vec::new(), None, OrgScope::Any).await.unwrap().is_empty());

        let too_many = (0..6)
            .map(|_| create_req(1, None, AttendanceStatus::Present))
            .collect();
        assert!(matches!(
            service.bulk_create(too_many, None, OrgScope::Any).await,
            Err(AppError::Validation(_))
        ));
    }
}
