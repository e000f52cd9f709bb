use crate::api::attendance::{AttendanceListResponse, PunchRequest, ToggleRequest};
use crate::api::employee::EmployeeListResponse;
use crate::api::nfc_tag::TagListResponse;
use crate::api::payroll::{GeneratePayroll, PaginatedPayrollResponse};
use crate::api::reader::{ReaderTokenRequest, ReaderTokenResponse};
use crate::api::MessageResponse;
use crate::model::attendance::{
    AttendanceChanges, AttendanceMethod, AttendanceRecord, AttendanceStatus, NewAttendance,
};
use crate::model::employee::{Employee, EmployeeChanges, EmployeeStatus, NewEmployee, SalaryType};
use crate::model::nfc_tag::{NewTag, NfcTag, TagChanges, TagStatus};
use crate::model::payroll::{PayrollAmounts, PayrollChanges, PayrollRecord};
use crate::model::scan_event::ScanAction;
use crate::service::attendance::ToggleOutcome;
use crate::service::payroll::GenerationReport;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Attendance API",
        version = "1.0.0",
        description = r#"
## NFC Attendance & Payroll

Badge-based time tracking for a single organization.

### 🔹 Key Features
- **Badge scans**
  - One endpoint toggles check-in and check-out; repeated deliveries are deduplicated with an `Idempotency-Key`
- **Employees & badges**
  - Enroll, assign, unassign and retire NFC tags
- **Attendance**
  - Self-service check-in/check-out, manual corrections, leave days
- **Payroll**
  - Monthly generation from attendance, admin adjustments

### 🔐 Security
Every endpoint needs a **JWT Bearer** token issued by the auth service.
Hardware readers use long-lived tokens from `/api/readers/token`.

### 📦 Errors
Always `{"error": "...", "code": "MACHINE_CODE"}`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::toggle,
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::list_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::create_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::nfc_tag::create_tag,
        crate::api::nfc_tag::list_tags,
        crate::api::nfc_tag::get_tag,
        crate::api::nfc_tag::update_tag,
        crate::api::nfc_tag::delete_tag,

        crate::api::payroll::generate_payroll,
        crate::api::payroll::list_payrolls,
        crate::api::payroll::get_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::delete_payroll,

        crate::api::reader::issue_reader_token
    ),
    components(
        schemas(
            Employee,
            NewEmployee,
            EmployeeChanges,
            EmployeeStatus,
            SalaryType,
            EmployeeListResponse,
            NfcTag,
            NewTag,
            TagChanges,
            TagStatus,
            TagListResponse,
            AttendanceRecord,
            AttendanceStatus,
            AttendanceMethod,
            NewAttendance,
            AttendanceChanges,
            AttendanceListResponse,
            ToggleRequest,
            ToggleOutcome,
            ScanAction,
            PunchRequest,
            PayrollRecord,
            PayrollAmounts,
            PayrollChanges,
            GeneratePayroll,
            GenerationReport,
            PaginatedPayrollResponse,
            ReaderTokenRequest,
            ReaderTokenResponse,
            MessageResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Badge scans and attendance records"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "NFC Tag", description = "Badge enrollment and assignment"),
        (name = "Payroll", description = "Payroll management APIs"),
        (name = "Reader", description = "Hardware reader credentials"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

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
