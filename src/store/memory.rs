//! In-process store backing the service and handler tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{AttendanceFilter, AttendancePatch, AttendanceStore, NewAttendance};
use crate::error::AppError;
use crate::model::activity::{Activity, ActivityKind};
use crate::model::attendance::{AttachedTo, AttendanceRecord};
use crate::model::user::UserSummary;


#[derive(Default)]
struct State {
    next_id: u64,
    records: BTreeMap<u64, AttendanceRecord>,
    users: Vec<UserSummary>,
    activities: Vec<Activity>,
}

#[derive(Default)]
pub struct MemoryAttendanceStore {
    state: Mutex<State>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, id: u64, organization_id: Option<u64>, is_active: bool) {
        let mut state = self.state.lock().unwrap();
        state.users.push(UserSummary {
            id,
            email: format!("user{id}@example.org"),
            full_name: format!("User {id}"),
            organization_id,
            is_active,
        });
    }

    pub fn add_activity(&self, kind: ActivityKind, id: u64, organization_id: u64) {
        let mut state = self.state.lock().unwrap();
        state.activities.push(Activity {
            kind,
            id,
            organization_id,
            title: format!("{} {id}", kind.label()),
        });
    }

    /// Stores a record as-is, keeping its timestamps. Returns the assigned id.
    pub fn seed(&self, new: NewAttendance) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.records.insert(id, new.into_record(id));
        id
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    fn duplicate(state: &State, new: &NewAttendance) -> bool {
        new.attached_to != AttachedTo::None
            && state
                .records
                .values()
                .any(|r| r.user_id == new.user_id && r.attached_to == new.attached_to)
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn insert(&self, new: NewAttendance) -> Result<AttendanceRecord, AppError> {
        let mut state = self.state.lock().unwrap();
        if Self::duplicate(&state, &new) {
            return Err(AppError::validation(
                "Attendance already recorded for this user and activity",
            ));
        }
        state.next_id += 1;
        let record = new.into_record(state.next_id);
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn insert_batch(
        &self,
        batch: Vec<NewAttendance>,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let mut state = self.state.lock().unwrap();
        let mut staged = State {
            next_id: state.next_id,
            records: state.records.clone(),
            ..Default::default()
        };
        let mut created = Vec::with_capacity(batch.len());
        for new in batch {
            if Self::duplicate(&staged, &new) {
                return Err(AppError::validation(
                    "Attendance already recorded for this user and activity",
                ));
            }
            staged.next_id += 1;
            let record = new.into_record(staged.next_id);
            staged.records.insert(record.id, record.clone());
            created.push(record);
        }
        state.next_id = staged.next_id;
        state.records = staged.records;
        Ok(created)
    }

    async fn get(&self, id: u64) -> Result<Option<AttendanceRecord>, AppError> {
        Ok(self.state.lock().unwrap().records.get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let mut records = self.collect(filter).await?;
        records.reverse();
        Ok(records
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn collect(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>, AppError> {
        let state = self.state.lock().unwrap();
        let mut records: Vec<_> = state
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.created_at, r.id));
        Ok(records)
    }

    async fn update(
        &self,
        id: u64,
        patch: &AttendancePatch,
    ) -> Result<Option<AttendanceRecord>, AppError> {
        let mut state = self.state.lock().unwrap();
        Ok(state.records.get_mut(&id).map(|record| {
            patch.apply(record);
            record.clone()
        }))
    }

    async fn delete(&self, id: u64) -> Result<bool, AppError> {
        Ok(self.state.lock().unwrap().records.remove(&id).is_some())
    }

    async fn exists_for(&self, user_id: u64, attached_to: AttachedTo) -> Result<bool, AppError> {
        if attached_to == AttachedTo::None {
            return Ok(false);
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .values()
            .any(|r| r.user_id == user_id && r.attached_to == attached_to))
    }

    async fn find_user(&self, id: u64) -> Result<Option<UserSummary>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn find_activity(
        &self,
        kind: ActivityKind,
        id: u64,
    ) -> Result<Option<Activity>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .activities
            .iter()
            .find(|a| a.kind == kind && a.id == id)
            .cloned())
    }

    async fn roster(&self, organization_id: u64) -> Result<Vec<UserSummary>, AppError> {
        let state = self.state.lock().unwrap();
        let mut users: Vec<_> = state
            .users
            .iter()
            .filter(|u| u.organization_id == Some(organization_id) && u.is_active)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }
}
