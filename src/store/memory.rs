use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    AttendanceStore, DuplicateKey, EmployeeStore, PayrollStore, ScanLog, StoreError, StoreResult, TagStore,
};
use crate::model::{
    Page, Paging,
    attendance::{
        AttendanceChanges, AttendanceFilter, AttendanceMethod, AttendanceRecord, AttendanceStatus, NewAttendance,
        NewCheckIn, duration_minutes,
    },
    employee::{Employee, EmployeeChanges, EmployeeFilter, EmployeeStatus, NewEmployee},
    nfc_tag::{NewTag, NfcTag, TagChanges, TagFilter, TagStatus, normalize_tag_uid},
    payroll::{NewPayroll, PayrollAmounts, PayrollFilter, PayrollRecord},
    scan_event::{NewScanEvent, ScanAction, ScanEvent},
};
use crate::utils::time::local_now;

/// Process-local store with the same uniqueness rules as the MySQL schema.
/// All checks and writes for one call happen under a single lock.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    employees: BTreeMap<u64, Employee>,
    tags: BTreeMap<u64, NfcTag>,
    attendance: BTreeMap<u64, AttendanceRecord>,
    scans: BTreeMap<u64, ScanEvent>,
    payroll: BTreeMap<u64, PayrollRecord>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_employee_unique(&self, id: Option<u64>, email: &str, code: &str) -> StoreResult<()> {
        for other in self.employees.values().filter(|e| Some(e.id) != id) {
            if other.email.eq_ignore_ascii_case(email) {
                return Err(StoreError::Duplicate(DuplicateKey::Email));
            }
            if other.employee_code == code {
                return Err(StoreError::Duplicate(DuplicateKey::EmployeeCode));
            }
        }
        Ok(())
    }

    fn require_employee(&self, id: Option<u64>) -> StoreResult<()> {
        match id {
            Some(id) if !self.employees.contains_key(&id) => Err(StoreError::MissingReference),
            _ => Ok(()),
        }
    }

    fn has_attendance(&self, employee_id: u64, date: NaiveDate) -> bool {
        self.attendance
            .values()
            .any(|r| r.employee_id == employee_id && r.date == date)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic while holding the lock leaves every map intact, so a poisoned
    /// lock is still usable.
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn paginate<T: Clone>(rows: Vec<T>, paging: Paging) -> Page<T> {
    let total = rows.len() as i64;
    let items = rows
        .into_iter()
        .skip(paging.offset() as usize)
        .take(paging.per_page as usize)
        .collect();
    Page { items, total }
}

#[async_trait]
impl EmployeeStore for MemoryStore {
    async fn create_employee(&self, new: &NewEmployee) -> StoreResult<Employee> {
        let mut state = self.state();
        state.check_employee_unique(None, &new.email, &new.employee_code)?;

        let employee = Employee {
            id: state.next_id(),
            employee_code: new.employee_code.clone(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            department: new.department.clone(),
            position: new.position.clone(),
            salary_type: new.salary_type,
            monthly_salary: new.monthly_salary,
            hourly_rate: new.hourly_rate,
            hire_date: new.hire_date,
            status: EmployeeStatus::Active,
            created_at: local_now(),
        };
        state.employees.insert(employee.id, employee.clone());
        Ok(employee)
    }

    async fn get_employee(&self, id: u64) -> StoreResult<Option<Employee>> {
        Ok(self.state().employees.get(&id).cloned())
    }

    async fn list_employees(&self, filter: &EmployeeFilter, paging: Paging) -> StoreResult<Page<Employee>> {
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let rows: Vec<Employee> = self
            .state()
            .employees
            .values()
            .rev()
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
            .filter(|e| filter.department.is_none() || e.department == filter.department)
            .filter(|e| {
                needle.as_ref().is_none_or(|n| {
                    e.first_name.to_lowercase().contains(n)
                        || e.last_name.to_lowercase().contains(n)
                        || e.email.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        Ok(paginate(rows, paging))
    }

    async fn active_employees(&self) -> StoreResult<Vec<Employee>> {
        Ok(self
            .state()
            .employees
            .values()
            .filter(|e| e.is_active())
            .cloned()
            .collect())
    }

    async fn update_employee(&self, id: u64, changes: &EmployeeChanges) -> StoreResult<Option<Employee>> {
        let mut state = self.state();
        let Some(current) = state.employees.get(&id).cloned() else {
            return Ok(None);
        };

        let email = changes.email.clone().unwrap_or(current.email.clone());
        let code = changes.employee_code.clone().unwrap_or(current.employee_code.clone());
        state.check_employee_unique(Some(id), &email, &code)?;

        let updated = Employee {
            employee_code: code,
            first_name: changes.first_name.clone().unwrap_or(current.first_name),
            last_name: changes.last_name.clone().unwrap_or(current.last_name),
            email,
            phone: changes.phone.clone().or(current.phone),
            department: changes.department.clone().or(current.department),
            position: changes.position.clone().or(current.position),
            salary_type: changes.salary_type.unwrap_or(current.salary_type),
            monthly_salary: changes.monthly_salary.or(current.monthly_salary),
            hourly_rate: changes.hourly_rate.or(current.hourly_rate),
            hire_date: changes.hire_date.unwrap_or(current.hire_date),
            status: changes.status.unwrap_or(current.status),
            ..current
        };
        state.employees.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_employee(&self, id: u64) -> StoreResult<bool> {
        let mut state = self.state();
        if state.employees.remove(&id).is_none() {
            return Ok(false);
        }
        // Mirror the schema's ON DELETE rules.
        state.attendance.retain(|_, r| r.employee_id != id);
        state.payroll.retain(|_, p| p.employee_id != id);
        for tag in state.tags.values_mut().filter(|t| t.employee_id == Some(id)) {
            tag.employee_id = None;
        }
        Ok(true)
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn create_tag(&self, new: &NewTag) -> StoreResult<NfcTag> {
        let mut state = self.state();
        let uid = normalize_tag_uid(&new.tag_uid);
        if state.tags.values().any(|t| t.tag_uid == uid) {
            return Err(StoreError::Duplicate(DuplicateKey::TagUid));
        }
        state.require_employee(new.employee_id)?;

        let tag = NfcTag {
            id: state.next_id(),
            tag_uid: uid,
            employee_id: new.employee_id,
            status: TagStatus::Active,
            label: new.label.clone(),
            enrolled_at: local_now(),
            last_used_at: None,
        };
        state.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn get_tag(&self, id: u64) -> StoreResult<Option<NfcTag>> {
        Ok(self.state().tags.get(&id).cloned())
    }

    async fn find_tag_by_uid(&self, uid: &str) -> StoreResult<Option<NfcTag>> {
        Ok(self.state().tags.values().find(|t| t.tag_uid == uid).cloned())
    }

    async fn list_tags(&self, filter: &TagFilter, paging: Paging) -> StoreResult<Page<NfcTag>> {
        let rows: Vec<NfcTag> = self
            .state()
            .tags
            .values()
            .rev()
            .filter(|t| filter.employee_id.is_none() || t.employee_id == filter.employee_id)
            .filter(|t| filter.status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        Ok(paginate(rows, paging))
    }

    async fn update_tag(&self, id: u64, changes: &TagChanges) -> StoreResult<Option<NfcTag>> {
        let mut state = self.state();
        if let Some(employee_id) = changes.employee_id {
            state.require_employee(employee_id)?;
        }
        let Some(tag) = state.tags.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(employee_id) = changes.employee_id {
            tag.employee_id = employee_id;
        }
        if let Some(status) = changes.status {
            tag.status = status;
        }
        if let Some(label) = &changes.label {
            tag.label = Some(label.clone());
        }
        Ok(Some(tag.clone()))
    }

    async fn delete_tag(&self, id: u64) -> StoreResult<bool> {
        Ok(self.state().tags.remove(&id).is_some())
    }

    async fn touch_tag(&self, id: u64, at: NaiveDateTime) -> StoreResult<()> {
        if let Some(tag) = self.state().tags.get_mut(&id) {
            tag.last_used_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn insert_check_in(&self, new: &NewCheckIn) -> StoreResult<Option<AttendanceRecord>> {
        let mut state = self.state();
        if state.has_attendance(new.employee_id, new.date) {
            return Ok(None);
        }
        state.require_employee(Some(new.employee_id))?;

        let record = AttendanceRecord {
            id: state.next_id(),
            employee_id: new.employee_id,
            date: new.date,
            check_in: Some(new.at),
            check_out: None,
            duration_minutes: None,
            status: AttendanceStatus::Present,
            method: new.method,
            reader_id: new.origin.reader_id.clone(),
            location: new.origin.location.clone(),
            latitude: new.origin.latitude,
            longitude: new.origin.longitude,
            notes: None,
        };
        state.attendance.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn close_open_record(
        &self,
        employee_id: u64,
        date: NaiveDate,
        at: NaiveDateTime,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let mut state = self.state();
        let open = state
            .attendance
            .values_mut()
            .find(|r| r.employee_id == employee_id && r.date == date && r.is_open());

        Ok(open.and_then(|record| {
            let check_in = record.check_in?;
            record.check_out = Some(at);
            record.duration_minutes = Some(duration_minutes(check_in, at));
            Some(record.clone())
        }))
    }

    async fn find_attendance(&self, employee_id: u64, date: NaiveDate) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self
            .state()
            .attendance
            .values()
            .find(|r| r.employee_id == employee_id && r.date == date)
            .cloned())
    }

    async fn create_attendance(&self, new: &NewAttendance) -> StoreResult<AttendanceRecord> {
        let mut state = self.state();
        if state.has_attendance(new.employee_id, new.date) {
            return Err(StoreError::Duplicate(DuplicateKey::Attendance));
        }
        state.require_employee(Some(new.employee_id))?;

        let record = AttendanceRecord {
            id: state.next_id(),
            employee_id: new.employee_id,
            date: new.date,
            check_in: new.check_in,
            check_out: new.check_out,
            duration_minutes: new.check_in.zip(new.check_out).map(|(i, o)| duration_minutes(i, o)),
            status: new.status,
            method: AttendanceMethod::Manual,
            reader_id: None,
            location: None,
            latitude: None,
            longitude: None,
            notes: new.notes.clone(),
        };
        state.attendance.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_attendance(&self, id: u64) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self.state().attendance.get(&id).cloned())
    }

    async fn list_attendance(&self, filter: &AttendanceFilter, paging: Paging) -> StoreResult<Page<AttendanceRecord>> {
        let mut rows: Vec<AttendanceRecord> = self
            .state()
            .attendance
            .values()
            .filter(|r| filter.employee_id.is_none_or(|id| r.employee_id == id))
            .filter(|r| filter.from.is_none_or(|from| r.date >= from))
            .filter(|r| filter.to.is_none_or(|to| r.date <= to))
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, paging))
    }

    async fn attendance_between(
        &self,
        employee_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let mut rows: Vec<AttendanceRecord> = self
            .state()
            .attendance
            .values()
            .filter(|r| r.employee_id == employee_id && r.date >= from && r.date <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }

    async fn update_attendance(&self, id: u64, changes: &AttendanceChanges) -> StoreResult<Option<AttendanceRecord>> {
        let mut state = self.state();
        let Some(record) = state.attendance.get_mut(&id) else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(record.clone()));
        }
        if let Some(check_in) = changes.check_in {
            record.check_in = Some(check_in);
        }
        if let Some(check_out) = changes.check_out {
            record.check_out = Some(check_out);
        }
        if let Some(status) = changes.status {
            record.status = status;
        }
        if let Some(notes) = &changes.notes {
            record.notes = Some(notes.clone());
        }
        record.duration_minutes = record
            .check_in
            .zip(record.check_out)
            .map(|(i, o)| duration_minutes(i, o));
        Ok(Some(record.clone()))
    }

    async fn delete_attendance(&self, id: u64) -> StoreResult<bool> {
        Ok(self.state().attendance.remove(&id).is_some())
    }
}

#[async_trait]
impl ScanLog for MemoryStore {
    async fn record_scan(&self, new: &NewScanEvent) -> StoreResult<ScanEvent> {
        let mut state = self.state();
        if let Some(key) = &new.idempotency_key {
            if state.scans.values().any(|s| s.idempotency_key.as_ref() == Some(key)) {
                return Err(StoreError::Duplicate(DuplicateKey::IdempotencyKey));
            }
        }

        let event = ScanEvent {
            id: state.next_id(),
            idempotency_key: new.idempotency_key.clone(),
            tag_uid: new.tag_uid.clone(),
            employee_id: new.employee_id,
            action: new.action,
            attendance_id: new.attendance_id,
            reader_id: new.origin.reader_id.clone(),
            location: new.origin.location.clone(),
            latitude: new.origin.latitude,
            longitude: new.origin.longitude,
            scanned_at: new.scanned_at,
        };
        state.scans.insert(event.id, event.clone());
        Ok(event)
    }

    async fn find_scan_by_key(&self, key: &str) -> StoreResult<Option<ScanEvent>> {
        Ok(self
            .state()
            .scans
            .values()
            .find(|s| s.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn complete_scan(
        &self,
        id: u64,
        action: ScanAction,
        employee_id: Option<u64>,
        attendance_id: Option<u64>,
    ) -> StoreResult<()> {
        if let Some(event) = self.state().scans.get_mut(&id) {
            event.action = action;
            event.employee_id = employee_id;
            event.attendance_id = attendance_id;
        }
        Ok(())
    }

    async fn delete_scan(&self, id: u64) -> StoreResult<()> {
        self.state().scans.remove(&id);
        Ok(())
    }

    async fn reclaim_scan(&self, id: u64, stale_before: NaiveDateTime, now: NaiveDateTime) -> StoreResult<bool> {
        match self.state().scans.get_mut(&id) {
            Some(event) if event.action == ScanAction::Pending && event.scanned_at < stale_before => {
                event.scanned_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PayrollStore for MemoryStore {
    async fn create_payroll(&self, new: &NewPayroll) -> StoreResult<PayrollRecord> {
        let mut state = self.state();
        if state
            .payroll
            .values()
            .any(|p| p.employee_id == new.employee_id && p.month == new.month)
        {
            return Err(StoreError::Duplicate(DuplicateKey::Payroll));
        }
        state.require_employee(Some(new.employee_id))?;

        let now = local_now();
        let record = PayrollRecord {
            id: state.next_id(),
            employee_id: new.employee_id,
            month: new.month,
            present_days: new.present_days,
            leave_days: new.leave_days,
            total_minutes: new.total_minutes,
            amounts: new.amounts,
            created_at: now,
            updated_at: now,
        };
        state.payroll.insert(record.id, record.clone());
        Ok(record)
    }

    async fn payroll_exists(&self, employee_id: u64, month: NaiveDate) -> StoreResult<bool> {
        Ok(self
            .state()
            .payroll
            .values()
            .any(|p| p.employee_id == employee_id && p.month == month))
    }

    async fn get_payroll(&self, id: u64) -> StoreResult<Option<PayrollRecord>> {
        Ok(self.state().payroll.get(&id).cloned())
    }

    async fn list_payroll(&self, filter: &PayrollFilter, paging: Paging) -> StoreResult<Page<PayrollRecord>> {
        let mut rows: Vec<PayrollRecord> = self
            .state()
            .payroll
            .values()
            .filter(|p| filter.employee_id.is_none_or(|id| p.employee_id == id))
            .filter(|p| filter.month.is_none_or(|m| p.month == m))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.month.cmp(&a.month).then(a.employee_id.cmp(&b.employee_id)));
        Ok(paginate(rows, paging))
    }

    async fn update_payroll_amounts(&self, id: u64, amounts: &PayrollAmounts) -> StoreResult<Option<PayrollRecord>> {
        let mut state = self.state();
        Ok(state.payroll.get_mut(&id).map(|record| {
            record.amounts = *amounts;
            record.updated_at = local_now();
            record.clone()
        }))
    }

    async fn delete_payroll(&self, id: u64) -> StoreResult<bool> {
        Ok(self.state().payroll.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::ScanOrigin;
    use crate::model::employee::SalaryType;

    fn new_employee(email: &str, code: &str) -> NewEmployee {
        NewEmployee {
            employee_code: code.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            phone: None,
            department: None,
            position: None,
            salary_type: SalaryType::Fixed,
            monthly_salary: Some(3000.0),
            hourly_rate: None,
            hire_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        }
    }

    fn check_in(employee_id: u64, date: NaiveDate, hour: u32) -> NewCheckIn {
        NewCheckIn {
            employee_id,
            date,
            at: date.and_hms_opt(hour, 0, 0).unwrap(),
            method: AttendanceMethod::Nfc,
            origin: ScanOrigin::default(),
        }
    }

    #[actix_web::test]
    async fn duplicate_email_is_rejected_without_insert() {
        let store = MemoryStore::new();
        store.create_employee(&new_employee("a@x.io", "E1")).await.unwrap();

        let err = store
            .create_employee(&new_employee("A@x.io", "E2"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(DuplicateKey::Email)));

        let page = store
            .list_employees(&EmployeeFilter::default(), Paging::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[actix_web::test]
    async fn only_one_record_per_employee_and_day() {
        let store = MemoryStore::new();
        let emp = store.create_employee(&new_employee("a@x.io", "E1")).await.unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        assert!(store.insert_check_in(&check_in(emp.id, day, 9)).await.unwrap().is_some());
        assert!(store.insert_check_in(&check_in(emp.id, day, 10)).await.unwrap().is_none());

        let closed = store
            .close_open_record(emp.id, day, day.and_hms_opt(17, 30, 0).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.duration_minutes, Some(510));

        // Nothing left open.
        let again = store
            .close_open_record(emp.id, day, day.and_hms_opt(18, 0, 0).unwrap())
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[actix_web::test]
    async fn leave_day_is_never_closed_by_a_scan() {
        let store = MemoryStore::new();
        let emp = store.create_employee(&new_employee("a@x.io", "E1")).await.unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        store
            .create_attendance(&NewAttendance {
                employee_id: emp.id,
                date: day,
                check_in: None,
                check_out: None,
                status: AttendanceStatus::Leave,
                notes: Some("annual leave".into()),
            })
            .await
            .unwrap();

        let closed = store
            .close_open_record(emp.id, day, day.and_hms_opt(17, 0, 0).unwrap())
            .await
            .unwrap();
        assert!(closed.is_none());
    }

    #[actix_web::test]
    async fn deleting_an_employee_unassigns_badges_and_drops_records() {
        let store = MemoryStore::new();
        let emp = store.create_employee(&new_employee("a@x.io", "E1")).await.unwrap();
        let tag = store
            .create_tag(&NewTag {
                tag_uid: "04:aa".into(),
                employee_id: Some(emp.id),
                label: None,
            })
            .await
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        store.insert_check_in(&check_in(emp.id, day, 9)).await.unwrap();

        assert!(store.delete_employee(emp.id).await.unwrap());
        assert_eq!(store.get_tag(tag.id).await.unwrap().unwrap().employee_id, None);
        assert!(store.find_attendance(emp.id, day).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn idempotency_keys_are_unique() {
        let store = MemoryStore::new();
        let scan = NewScanEvent {
            idempotency_key: Some("k1".into()),
            tag_uid: "04AA".into(),
            employee_id: None,
            action: ScanAction::Pending,
            attendance_id: None,
            origin: ScanOrigin::default(),
            scanned_at: local_now(),
        };
        store.record_scan(&scan).await.unwrap();
        let err = store.record_scan(&scan).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(DuplicateKey::IdempotencyKey)));
    }

    #[actix_web::test]
    async fn only_stale_pending_claims_are_reclaimed() {
        let store = MemoryStore::new();
        let at = |h| NaiveDate::from_ymd_opt(2026, 3, 2).unwrap().and_hms_opt(h, 0, 0).unwrap();
        let event = store
            .record_scan(&NewScanEvent {
                idempotency_key: Some("k2".into()),
                tag_uid: "04AA".into(),
                employee_id: None,
                action: ScanAction::Pending,
                attendance_id: None,
                origin: ScanOrigin::default(),
                scanned_at: at(9),
            })
            .await
            .unwrap();

        assert!(!store.reclaim_scan(event.id, at(9), at(10)).await.unwrap());
        assert!(store.reclaim_scan(event.id, at(10), at(10)).await.unwrap());
        // Restamped, so a second taker within the lease loses.
        assert!(!store.reclaim_scan(event.id, at(10), at(10)).await.unwrap());

        store
            .complete_scan(event.id, ScanAction::Checkin, Some(1), Some(1))
            .await
            .unwrap();
        assert!(!store.reclaim_scan(event.id, at(12), at(12)).await.unwrap());
    }

    #[actix_web::test]
    async fn keeps_serving_after_a_panic_while_locked() {
        let store = MemoryStore::new();
        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.state();
            panic!("writer died");
        }));
        assert!(poisoned.is_err());
        assert!(store.state.is_poisoned());

        store.create_employee(&new_employee("a@x.io", "E1")).await.unwrap();
        let page = store
            .list_employees(&EmployeeFilter::default(), Paging::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }
}
