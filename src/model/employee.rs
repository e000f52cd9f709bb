use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// How gross pay is derived for an employee.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SalaryType {
    /// `monthly_salary`, prorated by present days.
    Fixed,
    /// `hourly_rate` times hours worked.
    Hourly,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "department": "Operations",
        "position": "Technician",
        "salary_type": "fixed",
        "monthly_salary": 3000.0,
        "hourly_rate": null,
        "hire_date": "2024-01-01",
        "status": "active",
        "created_at": "2024-01-01T09:00:00"
    })
)]
pub struct Employee {
    pub id: u64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub salary_type: SalaryType,
    pub monthly_salary: Option<f64>,
    pub hourly_rate: Option<f64>,
    #[schema(value_type = String, format = "date")]
    pub hire_date: NaiveDate,
    pub status: EmployeeStatus,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NewEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john@email.com", format = "email")]
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub salary_type: SalaryType,
    #[schema(example = 3000.0)]
    pub monthly_salary: Option<f64>,
    pub hourly_rate: Option<f64>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct EmployeeChanges {
    pub employee_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub salary_type: Option<SalaryType>,
    pub monthly_salary: Option<f64>,
    pub hourly_rate: Option<f64>,
    pub hire_date: Option<NaiveDate>,
    pub status: Option<EmployeeStatus>,
}

impl EmployeeChanges {
    pub fn is_empty(&self) -> bool {
        self.employee_code.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.department.is_none()
            && self.position.is_none()
            && self.salary_type.is_none()
            && self.monthly_salary.is_none()
            && self.hourly_rate.is_none()
            && self.hire_date.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmployeeFilter {
    pub status: Option<EmployeeStatus>,
    pub department: Option<String>,
    /// Matched against first name, last name and email.
    pub search: Option<String>,
}
