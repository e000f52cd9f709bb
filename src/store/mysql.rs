use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::mysql::MySqlRow;
use sqlx::{FromRow, MySql, MySqlPool, Row};
use std::str::FromStr;

use super::{
    AttendanceStore, DuplicateKey, EmployeeStore, PayrollStore, ScanLog, StoreError, StoreResult, TagStore,
};
use crate::model::{
    Page, Paging,
    attendance::{
        AttendanceChanges, AttendanceFilter, AttendanceMethod, AttendanceRecord, NewAttendance, NewCheckIn,
        duration_minutes,
    },
    employee::{Employee, EmployeeChanges, EmployeeFilter, EmployeeStatus, NewEmployee},
    nfc_tag::{NewTag, NfcTag, TagChanges, TagFilter, TagStatus, normalize_tag_uid},
    payroll::{NewPayroll, PayrollAmounts, PayrollFilter, PayrollRecord},
    scan_event::{NewScanEvent, ScanAction, ScanEvent},
};
use crate::utils::db_utils::{SqlFilter, SqlUpdate, SqlValue, to_arguments};
use crate::utils::time::local_now;

const EMPLOYEE_COLUMNS: &str = "id, employee_code, first_name, last_name, email, phone, department, position, \
     salary_type, monthly_salary, hourly_rate, hire_date, status, created_at";
const TAG_COLUMNS: &str = "id, tag_uid, employee_id, status, label, enrolled_at, last_used_at";
const ATTENDANCE_COLUMNS: &str = "id, employee_id, date, check_in, check_out, duration_minutes, status, method, \
     reader_id, location, latitude, longitude, notes";
const SCAN_COLUMNS: &str = "id, idempotency_key, tag_uid, employee_id, action, attendance_id, reader_id, location, \
     latitude, longitude, scanned_at";
const PAYROLL_COLUMNS: &str = "id, employee_id, month, present_days, leave_days, total_minutes, basic, allowances, \
     deductions, statutory_deduction, net, created_at, updated_at";

/// Recomputes `duration_minutes` from the row's own timestamps. MySQL
/// evaluates single-table assignments left to right, so this must come last.
const DURATION_EXPR: &str = "CASE WHEN check_in IS NOT NULL AND check_out IS NOT NULL \
     THEN GREATEST(TIMESTAMPDIFF(MINUTE, check_in, check_out), 0) ELSE NULL END";

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn fetch_page<T>(
        &self,
        table: &str,
        columns: &str,
        filter: &SqlFilter,
        order_by: &str,
        paging: Paging,
    ) -> StoreResult<Page<T>>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let where_clause = filter.where_clause();

        let count_sql = format!("SELECT COUNT(*) FROM {table} {where_clause}");
        tracing::debug!(sql = %count_sql, bindings = ?filter.values(), "Counting rows");
        let total = sqlx::query_scalar_with::<MySql, i64, _>(&count_sql, to_arguments(filter.values()))
            .fetch_one(&self.pool)
            .await?;

        let data_sql = format!("SELECT {columns} FROM {table} {where_clause} ORDER BY {order_by} LIMIT ? OFFSET ?");
        let mut values = filter.values().to_vec();
        values.push(SqlValue::U64(paging.per_page as u64));
        values.push(SqlValue::U64(paging.offset()));
        tracing::debug!(sql = %data_sql, page = paging.page, per_page = paging.per_page, "Fetching rows");

        let items = sqlx::query_as_with::<MySql, T, _>(&data_sql, to_arguments(&values))
            .fetch_all(&self.pool)
            .await?;

        Ok(Page { items, total })
    }

    async fn execute_update(&self, update: SqlUpdate, id: u64) -> StoreResult<u64> {
        let (sql, values) = update.build(id);
        let result = sqlx::query_with::<MySql, _>(&sql, to_arguments(&values))
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(result.rows_affected())
    }
}

/// Translates constraint violations into `StoreError` variants; MySQL reports
/// both unique and foreign-key failures as SQLSTATE 23000.
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23000") {
            let message = db_err.message();
            if message.contains("foreign key constraint") {
                return StoreError::MissingReference;
            }
            let key = [
                ("uq_employees_email", DuplicateKey::Email),
                ("uq_employees_code", DuplicateKey::EmployeeCode),
                ("uq_nfc_tags_uid", DuplicateKey::TagUid),
                ("uq_attendance_employee_date", DuplicateKey::Attendance),
                ("uq_payroll_employee_month", DuplicateKey::Payroll),
                ("uq_scan_events_key", DuplicateKey::IdempotencyKey),
            ]
            .into_iter()
            .find(|(name, _)| message.contains(name))
            .map(|(_, key)| key);

            if let Some(key) = key {
                return StoreError::Duplicate(key);
            }
        }
    }
    StoreError::Database(e)
}

fn parse_column<T>(row: &MySqlRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn inserted<T>(found: Option<T>) -> StoreResult<T> {
    found.ok_or(StoreError::Database(sqlx::Error::RowNotFound))
}

impl<'r> FromRow<'r, MySqlRow> for Employee {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Employee {
            id: row.try_get("id")?,
            employee_code: row.try_get("employee_code")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            department: row.try_get("department")?,
            position: row.try_get("position")?,
            salary_type: parse_column(row, "salary_type")?,
            monthly_salary: row.try_get("monthly_salary")?,
            hourly_rate: row.try_get("hourly_rate")?,
            hire_date: row.try_get("hire_date")?,
            status: parse_column(row, "status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl<'r> FromRow<'r, MySqlRow> for NfcTag {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(NfcTag {
            id: row.try_get("id")?,
            tag_uid: row.try_get("tag_uid")?,
            employee_id: row.try_get("employee_id")?,
            status: parse_column(row, "status")?,
            label: row.try_get("label")?,
            enrolled_at: row.try_get("enrolled_at")?,
            last_used_at: row.try_get("last_used_at")?,
        })
    }
}

impl<'r> FromRow<'r, MySqlRow> for AttendanceRecord {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(AttendanceRecord {
            id: row.try_get("id")?,
            employee_id: row.try_get("employee_id")?,
            date: row.try_get("date")?,
            check_in: row.try_get("check_in")?,
            check_out: row.try_get("check_out")?,
            duration_minutes: row.try_get("duration_minutes")?,
            status: parse_column(row, "status")?,
            method: parse_column(row, "method")?,
            reader_id: row.try_get("reader_id")?,
            location: row.try_get("location")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            notes: row.try_get("notes")?,
        })
    }
}

impl<'r> FromRow<'r, MySqlRow> for ScanEvent {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(ScanEvent {
            id: row.try_get("id")?,
            idempotency_key: row.try_get("idempotency_key")?,
            tag_uid: row.try_get("tag_uid")?,
            employee_id: row.try_get("employee_id")?,
            action: parse_column(row, "action")?,
            attendance_id: row.try_get("attendance_id")?,
            reader_id: row.try_get("reader_id")?,
            location: row.try_get("location")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            scanned_at: row.try_get("scanned_at")?,
        })
    }
}

impl<'r> FromRow<'r, MySqlRow> for PayrollRecord {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(PayrollRecord {
            id: row.try_get("id")?,
            employee_id: row.try_get("employee_id")?,
            month: row.try_get("month")?,
            present_days: row.try_get("present_days")?,
            leave_days: row.try_get("leave_days")?,
            total_minutes: row.try_get("total_minutes")?,
            amounts: PayrollAmounts {
                basic: row.try_get("basic")?,
                allowances: row.try_get("allowances")?,
                deductions: row.try_get("deductions")?,
                statutory_deduction: row.try_get("statutory_deduction")?,
                net: row.try_get("net")?,
            },
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl EmployeeStore for MySqlStore {
    async fn create_employee(&self, new: &NewEmployee) -> StoreResult<Employee> {
        let result = sqlx::query(
            r#"
            INSERT INTO employees
            (employee_code, first_name, last_name, email, phone, department, position,
             salary_type, monthly_salary, hourly_rate, hire_date, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.employee_code.as_str())
        .bind(new.first_name.as_str())
        .bind(new.last_name.as_str())
        .bind(new.email.as_str())
        .bind(new.phone.as_deref())
        .bind(new.department.as_deref())
        .bind(new.position.as_deref())
        .bind(new.salary_type.as_ref())
        .bind(new.monthly_salary)
        .bind(new.hourly_rate)
        .bind(new.hire_date)
        .bind(EmployeeStatus::Active.as_ref())
        .bind(local_now())
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        inserted(self.get_employee(result.last_insert_id()).await?)
    }

    async fn get_employee(&self, id: u64) -> StoreResult<Option<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_employees(&self, filter: &EmployeeFilter, paging: Paging) -> StoreResult<Page<Employee>> {
        let mut sql_filter = SqlFilter::new();
        sql_filter
            .push("status = ?", filter.status.map(|s| s.as_ref().to_string()))
            .push("department = ?", filter.department.clone())
            .push_repeated(
                "(first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)",
                filter.search.as_ref().map(|s| SqlValue::from(format!("%{s}%"))),
            );

        self.fetch_page("employees", EMPLOYEE_COLUMNS, &sql_filter, "id DESC", paging)
            .await
    }

    async fn active_employees(&self) -> StoreResult<Vec<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE status = ? ORDER BY id");
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .bind(EmployeeStatus::Active.as_ref())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_employee(&self, id: u64, changes: &EmployeeChanges) -> StoreResult<Option<Employee>> {
        let mut update = SqlUpdate::new("employees");
        update
            .set_if("employee_code", changes.employee_code.clone())
            .set_if("first_name", changes.first_name.clone())
            .set_if("last_name", changes.last_name.clone())
            .set_if("email", changes.email.clone())
            .set_if("phone", changes.phone.clone())
            .set_if("department", changes.department.clone())
            .set_if("position", changes.position.clone())
            .set_if("salary_type", changes.salary_type.map(|s| s.as_ref().to_string()))
            .set_if("monthly_salary", changes.monthly_salary)
            .set_if("hourly_rate", changes.hourly_rate)
            .set_if("hire_date", changes.hire_date)
            .set_if("status", changes.status.map(|s| s.as_ref().to_string()));

        if !update.is_empty() {
            self.execute_update(update, id).await?;
        }
        // Unchanged values report zero affected rows, so existence is re-read.
        self.get_employee(id).await
    }

    async fn delete_employee(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TagStore for MySqlStore {
    async fn create_tag(&self, new: &NewTag) -> StoreResult<NfcTag> {
        let result = sqlx::query(
            r#"
            INSERT INTO nfc_tags (tag_uid, employee_id, status, label, enrolled_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(normalize_tag_uid(&new.tag_uid))
        .bind(new.employee_id)
        .bind(TagStatus::Active.as_ref())
        .bind(new.label.as_deref())
        .bind(local_now())
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        inserted(self.get_tag(result.last_insert_id()).await?)
    }

    async fn get_tag(&self, id: u64) -> StoreResult<Option<NfcTag>> {
        let sql = format!("SELECT {TAG_COLUMNS} FROM nfc_tags WHERE id = ?");
        Ok(sqlx::query_as::<_, NfcTag>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_tag_by_uid(&self, uid: &str) -> StoreResult<Option<NfcTag>> {
        let sql = format!("SELECT {TAG_COLUMNS} FROM nfc_tags WHERE tag_uid = ?");
        Ok(sqlx::query_as::<_, NfcTag>(&sql)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_tags(&self, filter: &TagFilter, paging: Paging) -> StoreResult<Page<NfcTag>> {
        let mut sql_filter = SqlFilter::new();
        sql_filter
            .push("employee_id = ?", filter.employee_id)
            .push("status = ?", filter.status.map(|s| s.as_ref().to_string()));

        self.fetch_page("nfc_tags", TAG_COLUMNS, &sql_filter, "id DESC", paging)
            .await
    }

    async fn update_tag(&self, id: u64, changes: &TagChanges) -> StoreResult<Option<NfcTag>> {
        let mut update = SqlUpdate::new("nfc_tags");
        if let Some(employee_id) = changes.employee_id {
            update.set("employee_id", employee_id);
        }
        update
            .set_if("status", changes.status.map(|s| s.as_ref().to_string()))
            .set_if("label", changes.label.clone());

        if !update.is_empty() {
            self.execute_update(update, id).await?;
        }
        self.get_tag(id).await
    }

    async fn delete_tag(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM nfc_tags WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_tag(&self, id: u64, at: NaiveDateTime) -> StoreResult<()> {
        sqlx::query("UPDATE nfc_tags SET last_used_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn insert_check_in(&self, new: &NewCheckIn) -> StoreResult<Option<AttendanceRecord>> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
            (employee_id, date, check_in, status, method, reader_id, location, latitude, longitude)
            VALUES (?, ?, ?, 'present', ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.employee_id)
        .bind(new.date)
        .bind(new.at)
        .bind(new.method.as_ref())
        .bind(new.origin.reader_id.as_deref())
        .bind(new.origin.location.as_deref())
        .bind(new.origin.latitude)
        .bind(new.origin.longitude)
        .execute(&self.pool)
        .await;

        match result.map_err(map_write_error) {
            Ok(done) => Ok(Some(inserted(self.get_attendance(done.last_insert_id()).await?)?)),
            // The unique (employee_id, date) key makes the existing row win.
            Err(StoreError::Duplicate(DuplicateKey::Attendance)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn close_open_record(
        &self,
        employee_id: u64,
        date: NaiveDate,
        at: NaiveDateTime,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_out = ?,
                duration_minutes = GREATEST(TIMESTAMPDIFF(MINUTE, check_in, ?), 0)
            WHERE employee_id = ?
              AND date = ?
              AND status = 'present'
              AND check_in IS NOT NULL
              AND check_out IS NULL
            "#,
        )
        .bind(at)
        .bind(at)
        .bind(employee_id)
        .bind(date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_attendance(employee_id, date).await
    }

    async fn find_attendance(&self, employee_id: u64, date: NaiveDate) -> StoreResult<Option<AttendanceRecord>> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ?");
        Ok(sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_attendance(&self, new: &NewAttendance) -> StoreResult<AttendanceRecord> {
        let duration = match (new.check_in, new.check_out) {
            (Some(check_in), Some(check_out)) => Some(duration_minutes(check_in, check_out)),
            _ => None,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO attendance
            (employee_id, date, check_in, check_out, duration_minutes, status, method, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.employee_id)
        .bind(new.date)
        .bind(new.check_in)
        .bind(new.check_out)
        .bind(duration)
        .bind(new.status.as_ref())
        .bind(AttendanceMethod::Manual.as_ref())
        .bind(new.notes.as_deref())
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        inserted(self.get_attendance(result.last_insert_id()).await?)
    }

    async fn get_attendance(&self, id: u64) -> StoreResult<Option<AttendanceRecord>> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?");
        Ok(sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_attendance(&self, filter: &AttendanceFilter, paging: Paging) -> StoreResult<Page<AttendanceRecord>> {
        let mut sql_filter = SqlFilter::new();
        sql_filter
            .push("employee_id = ?", filter.employee_id)
            .push("date >= ?", filter.from)
            .push("date <= ?", filter.to)
            .push("status = ?", filter.status.map(|s| s.as_ref().to_string()));

        self.fetch_page("attendance", ATTENDANCE_COLUMNS, &sql_filter, "date DESC, id DESC", paging)
            .await
    }

    async fn attendance_between(
        &self,
        employee_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date BETWEEN ? AND ? ORDER BY date"
        );
        Ok(sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(employee_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_attendance(&self, id: u64, changes: &AttendanceChanges) -> StoreResult<Option<AttendanceRecord>> {
        let mut update = SqlUpdate::new("attendance");
        update
            .set_if("check_in", changes.check_in)
            .set_if("check_out", changes.check_out)
            .set_if("status", changes.status.map(|s| s.as_ref().to_string()))
            .set_if("notes", changes.notes.clone());

        if !update.is_empty() {
            update.set_expr("duration_minutes", DURATION_EXPR, Vec::new());
            self.execute_update(update, id).await?;
        }
        self.get_attendance(id).await
    }

    async fn delete_attendance(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ScanLog for MySqlStore {
    async fn record_scan(&self, new: &NewScanEvent) -> StoreResult<ScanEvent> {
        let result = sqlx::query(
            r#"
            INSERT INTO scan_events
            (idempotency_key, tag_uid, employee_id, action, attendance_id,
             reader_id, location, latitude, longitude, scanned_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.idempotency_key.as_deref())
        .bind(new.tag_uid.as_str())
        .bind(new.employee_id)
        .bind(new.action.as_ref())
        .bind(new.attendance_id)
        .bind(new.origin.reader_id.as_deref())
        .bind(new.origin.location.as_deref())
        .bind(new.origin.latitude)
        .bind(new.origin.longitude)
        .bind(new.scanned_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        let sql = format!("SELECT {SCAN_COLUMNS} FROM scan_events WHERE id = ?");
        let event = sqlx::query_as::<_, ScanEvent>(&sql)
            .bind(result.last_insert_id())
            .fetch_optional(&self.pool)
            .await?;
        inserted(event)
    }

    async fn find_scan_by_key(&self, key: &str) -> StoreResult<Option<ScanEvent>> {
        let sql = format!("SELECT {SCAN_COLUMNS} FROM scan_events WHERE idempotency_key = ?");
        Ok(sqlx::query_as::<_, ScanEvent>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn complete_scan(
        &self,
        id: u64,
        action: ScanAction,
        employee_id: Option<u64>,
        attendance_id: Option<u64>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE scan_events SET action = ?, employee_id = ?, attendance_id = ? WHERE id = ?")
            .bind(action.as_ref())
            .bind(employee_id)
            .bind(attendance_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_scan(&self, id: u64) -> StoreResult<()> {
        sqlx::query("DELETE FROM scan_events WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reclaim_scan(&self, id: u64, stale_before: NaiveDateTime, now: NaiveDateTime) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE scan_events SET scanned_at = ? WHERE id = ? AND action = ? AND scanned_at < ?",
        )
        .bind(now)
        .bind(id)
        .bind(ScanAction::Pending.as_ref())
        .bind(stale_before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl PayrollStore for MySqlStore {
    async fn create_payroll(&self, new: &NewPayroll) -> StoreResult<PayrollRecord> {
        let now = local_now();
        let result = sqlx::query(
            r#"
            INSERT INTO payroll
            (employee_id, month, present_days, leave_days, total_minutes,
             basic, allowances, deductions, statutory_deduction, net, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.employee_id)
        .bind(new.month)
        .bind(new.present_days)
        .bind(new.leave_days)
        .bind(new.total_minutes)
        .bind(new.amounts.basic)
        .bind(new.amounts.allowances)
        .bind(new.amounts.deductions)
        .bind(new.amounts.statutory_deduction)
        .bind(new.amounts.net)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        inserted(self.get_payroll(result.last_insert_id()).await?)
    }

    async fn payroll_exists(&self, employee_id: u64, month: NaiveDate) -> StoreResult<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payroll WHERE employee_id = ? AND month = ?")
            .bind(employee_id)
            .bind(month)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn get_payroll(&self, id: u64) -> StoreResult<Option<PayrollRecord>> {
        let sql = format!("SELECT {PAYROLL_COLUMNS} FROM payroll WHERE id = ?");
        Ok(sqlx::query_as::<_, PayrollRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_payroll(&self, filter: &PayrollFilter, paging: Paging) -> StoreResult<Page<PayrollRecord>> {
        let mut sql_filter = SqlFilter::new();
        sql_filter
            .push("employee_id = ?", filter.employee_id)
            .push("month = ?", filter.month);

        self.fetch_page("payroll", PAYROLL_COLUMNS, &sql_filter, "month DESC, employee_id", paging)
            .await
    }

    async fn update_payroll_amounts(&self, id: u64, amounts: &PayrollAmounts) -> StoreResult<Option<PayrollRecord>> {
        let mut update = SqlUpdate::new("payroll");
        update
            .set("basic", amounts.basic)
            .set("allowances", amounts.allowances)
            .set("deductions", amounts.deductions)
            .set("statutory_deduction", amounts.statutory_deduction)
            .set("net", amounts.net)
            .set("updated_at", local_now());

        self.execute_update(update, id).await?;
        self.get_payroll(id).await
    }

    async fn delete_payroll(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM payroll WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
