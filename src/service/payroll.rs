//! Monthly payroll generation from attendance.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    model::{
        attendance::{AttendanceRecord, AttendanceStatus},
        employee::{Employee, SalaryType},
        payroll::{NewPayroll, PayrollAmounts, PayrollChanges, PayrollRecord},
    },
    store::{AttendanceStore, DuplicateKey, EmployeeStore, PayrollStore, Store, StoreError},
    utils::time::{days_in_month, month_bounds, month_start},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthlyTotals {
    pub present_days: i32,
    pub leave_days: i32,
    pub total_minutes: i64,
}

pub fn summarize(records: &[AttendanceRecord]) -> MonthlyTotals {
    records.iter().fold(MonthlyTotals::default(), |mut acc, r| {
        match r.status {
            AttendanceStatus::Present => acc.present_days += 1,
            AttendanceStatus::Leave => acc.leave_days += 1,
        }
        acc.total_minutes += r.duration_minutes.unwrap_or(0).max(0);
        acc
    })
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Gross pay before allowances and deductions. A missing rate pays 0.
pub fn basic_pay(employee: &Employee, totals: &MonthlyTotals, month: NaiveDate) -> f64 {
    let basic = match employee.salary_type {
        SalaryType::Fixed => {
            let salary = employee.monthly_salary.unwrap_or(0.0);
            salary / f64::from(days_in_month(month)) * f64::from(totals.present_days)
        }
        SalaryType::Hourly => {
            let rate = employee.hourly_rate.unwrap_or(0.0);
            rate * totals.total_minutes as f64 / 60.0
        }
    };
    round2(basic)
}

pub fn statutory_deduction(basic: f64, percent: f64) -> f64 {
    round2(basic * percent / 100.0)
}

/// Fills in `net` from the other components.
pub fn with_net(basic: f64, allowances: f64, deductions: f64, statutory_deduction: f64) -> PayrollAmounts {
    PayrollAmounts {
        basic: round2(basic),
        allowances: round2(allowances),
        deductions: round2(deductions),
        statutory_deduction: round2(statutory_deduction),
        net: round2(basic + allowances - deductions - statutory_deduction),
    }
}

pub fn compute_amounts(
    employee: &Employee,
    totals: &MonthlyTotals,
    month: NaiveDate,
    deduction_percent: f64,
) -> PayrollAmounts {
    let basic = basic_pay(employee, totals, month);
    with_net(basic, 0.0, 0.0, statutory_deduction(basic, deduction_percent))
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerationReport {
    #[schema(value_type = String, format = "date")]
    pub month: NaiveDate,
    pub created: Vec<PayrollRecord>,
    /// Employees that already had a record for the month.
    pub skipped: Vec<u64>,
}

/// Generates payroll for `month` for every active employee, or only for
/// `employee_id` when given. Existing records are never overwritten.
#[instrument(name = "payroll_generate", skip(store))]
pub async fn generate(
    store: &dyn Store,
    month: NaiveDate,
    employee_id: Option<u64>,
    deduction_percent: f64,
) -> Result<GenerationReport, ApiError> {
    let month = month_start(month);
    let (from, to) = month_bounds(month);

    let employees = match employee_id {
        Some(id) => {
            let employee = store.get_employee(id).await?.ok_or(ApiError::EmployeeNotFound)?;
            if !employee.is_active() {
                return Err(ApiError::EmployeeInactive);
            }
            vec![employee]
        }
        None => store.active_employees().await?,
    };

    let mut report = GenerationReport {
        month,
        created: Vec::new(),
        skipped: Vec::new(),
    };

    for employee in employees {
        if store.payroll_exists(employee.id, month).await? {
            report.skipped.push(employee.id);
            continue;
        }

        let records = store.attendance_between(employee.id, from, to).await?;
        let totals = summarize(&records);
        let new = NewPayroll {
            employee_id: employee.id,
            month,
            present_days: totals.present_days,
            leave_days: totals.leave_days,
            total_minutes: totals.total_minutes,
            amounts: compute_amounts(&employee, &totals, month, deduction_percent),
        };

        match store.create_payroll(&new).await {
            Ok(record) => report.created.push(record),
            // Another generate run got there first.
            Err(StoreError::Duplicate(DuplicateKey::Payroll)) => {
                warn!(employee_id = employee.id, "Payroll created concurrently, skipping");
                report.skipped.push(employee.id);
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        created = report.created.len(),
        skipped = report.skipped.len(),
        "Payroll generated"
    );
    Ok(report)
}

/// Applies an admin edit and recomputes `net`.
pub async fn update(store: &dyn Store, id: u64, changes: &PayrollChanges) -> Result<PayrollRecord, ApiError> {
    if changes.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }
    for (field, value) in [
        ("basic", changes.basic),
        ("allowances", changes.allowances),
        ("deductions", changes.deductions),
        ("statutory_deduction", changes.statutory_deduction),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(ApiError::validation(format!("{field} must be a non-negative number")));
            }
        }
    }

    let current = store.get_payroll(id).await?.ok_or(ApiError::NotFound("Payroll"))?;
    let a = current.amounts;
    let amounts = with_net(
        changes.basic.unwrap_or(a.basic),
        changes.allowances.unwrap_or(a.allowances),
        changes.deductions.unwrap_or(a.deductions),
        changes.statutory_deduction.unwrap_or(a.statutory_deduction),
    );

    store
        .update_payroll_amounts(id, &amounts)
        .await?
        .ok_or(ApiError::NotFound("Payroll"))
}
