//! Persistence seam. `MySqlStore` backs production; `MemoryStore` serves tests
//! and `STORAGE=memory` local runs. Both uphold the same uniqueness rules:
//! one email per employee, one UID per badge, one attendance row per
//! employee and day, one payroll row per employee and month.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::model::{
    Page, Paging,
    attendance::{AttendanceChanges, AttendanceFilter, AttendanceRecord, NewAttendance, NewCheckIn},
    employee::{Employee, EmployeeChanges, EmployeeFilter, NewEmployee},
    nfc_tag::{NewTag, NfcTag, TagChanges, TagFilter},
    payroll::{NewPayroll, PayrollAmounts, PayrollFilter, PayrollRecord},
    scan_event::{NewScanEvent, ScanAction, ScanEvent},
};

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// Which unique key a write collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKey {
    Email,
    EmployeeCode,
    TagUid,
    Attendance,
    Payroll,
    IdempotencyKey,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {0:?}")]
    Duplicate(DuplicateKey),

    /// A foreign key pointed at a missing employee.
    #[error("referenced employee does not exist")]
    MissingReference,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EmployeeStore: Send + Sync {
    async fn create_employee(&self, new: &NewEmployee) -> StoreResult<Employee>;
    async fn get_employee(&self, id: u64) -> StoreResult<Option<Employee>>;
    async fn list_employees(&self, filter: &EmployeeFilter, paging: Paging) -> StoreResult<Page<Employee>>;
    async fn active_employees(&self) -> StoreResult<Vec<Employee>>;
    async fn update_employee(&self, id: u64, changes: &EmployeeChanges) -> StoreResult<Option<Employee>>;
    async fn delete_employee(&self, id: u64) -> StoreResult<bool>;
}

#[async_trait]
pub trait TagStore: Send + Sync {
    async fn create_tag(&self, new: &NewTag) -> StoreResult<NfcTag>;
    async fn get_tag(&self, id: u64) -> StoreResult<Option<NfcTag>>;
    /// `uid` must already be normalized.
    async fn find_tag_by_uid(&self, uid: &str) -> StoreResult<Option<NfcTag>>;
    async fn list_tags(&self, filter: &TagFilter, paging: Paging) -> StoreResult<Page<NfcTag>>;
    async fn update_tag(&self, id: u64, changes: &TagChanges) -> StoreResult<Option<NfcTag>>;
    async fn delete_tag(&self, id: u64) -> StoreResult<bool>;
    async fn touch_tag(&self, id: u64, at: NaiveDateTime) -> StoreResult<()>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Inserts today's row unless one already exists for the employee and date.
    /// Returns `None` when a row was already there; never overwrites it.
    async fn insert_check_in(&self, new: &NewCheckIn) -> StoreResult<Option<AttendanceRecord>>;

    /// Closes the employee's open present row for `date` in one conditional
    /// write. Returns `None` when there was nothing open.
    async fn close_open_record(
        &self,
        employee_id: u64,
        date: NaiveDate,
        at: NaiveDateTime,
    ) -> StoreResult<Option<AttendanceRecord>>;

    async fn find_attendance(&self, employee_id: u64, date: NaiveDate) -> StoreResult<Option<AttendanceRecord>>;
    async fn create_attendance(&self, new: &NewAttendance) -> StoreResult<AttendanceRecord>;
    async fn get_attendance(&self, id: u64) -> StoreResult<Option<AttendanceRecord>>;
    async fn list_attendance(&self, filter: &AttendanceFilter, paging: Paging) -> StoreResult<Page<AttendanceRecord>>;
    /// Every record of one employee within `[from, to]`, for payroll.
    async fn attendance_between(
        &self,
        employee_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>>;
    async fn update_attendance(&self, id: u64, changes: &AttendanceChanges) -> StoreResult<Option<AttendanceRecord>>;
    async fn delete_attendance(&self, id: u64) -> StoreResult<bool>;
}

#[async_trait]
pub trait ScanLog: Send + Sync {
    /// Fails with `Duplicate(IdempotencyKey)` when the key was seen before.
    async fn record_scan(&self, new: &NewScanEvent) -> StoreResult<ScanEvent>;
    async fn find_scan_by_key(&self, key: &str) -> StoreResult<Option<ScanEvent>>;
    async fn complete_scan(
        &self,
        id: u64,
        action: ScanAction,
        employee_id: Option<u64>,
        attendance_id: Option<u64>,
    ) -> StoreResult<()>;
    async fn delete_scan(&self, id: u64) -> StoreResult<()>;
    /// Restarts a pending claim whose `scanned_at` is before `stale_before`,
    /// stamping it with `now`. Returns `false` when the claim was completed or
    /// taken over by someone else first.
    async fn reclaim_scan(&self, id: u64, stale_before: NaiveDateTime, now: NaiveDateTime) -> StoreResult<bool>;
}

#[async_trait]
pub trait PayrollStore: Send + Sync {
    async fn create_payroll(&self, new: &NewPayroll) -> StoreResult<PayrollRecord>;
    async fn payroll_exists(&self, employee_id: u64, month: NaiveDate) -> StoreResult<bool>;
    async fn get_payroll(&self, id: u64) -> StoreResult<Option<PayrollRecord>>;
    async fn list_payroll(&self, filter: &PayrollFilter, paging: Paging) -> StoreResult<Page<PayrollRecord>>;
    async fn update_payroll_amounts(&self, id: u64, amounts: &PayrollAmounts) -> StoreResult<Option<PayrollRecord>>;
    async fn delete_payroll(&self, id: u64) -> StoreResult<bool>;
}

/// Everything the handlers need, as one object-safe trait.
pub trait Store: EmployeeStore + TagStore + AttendanceStore + ScanLog + PayrollStore {}

impl<T> Store for T where T: EmployeeStore + TagStore + AttendanceStore + ScanLog + PayrollStore {}
