use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Monthly pay snapshot for one employee.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PayrollRecord {
    pub id: u64,
    pub employee_id: u64,
    /// First day of the pay month.
    #[schema(value_type = String, format = "date", example = "2026-01-01")]
    pub month: NaiveDate,
    pub present_days: i32,
    pub leave_days: i32,
    pub total_minutes: i64,
    #[serde(flatten)]
    pub amounts: PayrollAmounts,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PayrollAmounts {
    #[schema(example = 2800.0)]
    pub basic: f64,
    #[schema(example = 0.0)]
    pub allowances: f64,
    #[schema(example = 0.0)]
    pub deductions: f64,
    #[schema(example = 280.0)]
    pub statutory_deduction: f64,
    #[schema(example = 2520.0)]
    pub net: f64,
}

#[derive(Debug, Clone)]
pub struct NewPayroll {
    pub employee_id: u64,
    pub month: NaiveDate,
    pub present_days: i32,
    pub leave_days: i32,
    pub total_minutes: i64,
    pub amounts: PayrollAmounts,
}

/// Admin edit; `net` is always recomputed.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PayrollChanges {
    pub basic: Option<f64>,
    pub allowances: Option<f64>,
    pub deductions: Option<f64>,
    pub statutory_deduction: Option<f64>,
}

impl PayrollChanges {
    pub fn is_empty(&self) -> bool {
        self.basic.is_none()
            && self.allowances.is_none()
            && self.deductions.is_none()
            && self.statutory_deduction.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PayrollFilter {
    pub employee_id: Option<u64>,
    pub month: Option<NaiveDate>,
}
