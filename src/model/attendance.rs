use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Leave,
}

/// How the record was captured.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceMethod {
    Nfc,
    Manual,
    Geolocation,
}

/// One row per employee per calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<NaiveDateTime>,
    pub duration_minutes: Option<i64>,
    pub status: AttendanceStatus,
    pub method: AttendanceMethod,
    pub reader_id: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: Option<String>,
}

impl AttendanceRecord {
    /// Checked in and not yet checked out.
    pub fn is_open(&self) -> bool {
        self.status == AttendanceStatus::Present && self.check_in.is_some() && self.check_out.is_none()
    }
}

/// Where a scan or self-service punch came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOrigin {
    pub reader_id: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ScanOrigin {
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Insert for an automatic check-in (toggle or self-service).
#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub at: NaiveDateTime,
    pub method: AttendanceMethod,
    pub origin: ScanOrigin,
}

/// Admin-entered record, e.g. a leave day or a forgotten punch.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NewAttendance {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

/// Admin correction; duration is recomputed from the resulting timestamps.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AttendanceChanges {
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<NaiveDateTime>,
    pub status: Option<AttendanceStatus>,
    pub notes: Option<String>,
}

impl AttendanceChanges {
    pub fn is_empty(&self) -> bool {
        self.check_in.is_none() && self.check_out.is_none() && self.status.is_none() && self.notes.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub employee_id: Option<u64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
}

/// Whole minutes between check-in and check-out, never negative.
pub fn duration_minutes(check_in: NaiveDateTime, check_out: NaiveDateTime) -> i64 {
    (check_out - check_in).num_minutes().max(0)
}
