use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::attendance::ScanOrigin;

/// Outcome of one badge scan.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanAction {
    /// Idempotency key claimed, toggle not finished yet.
    Pending,
    Checkin,
    Checkout,
    AlreadyCompleted,
}

/// Append-only audit row for every badge scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    pub id: u64,
    pub idempotency_key: Option<String>,
    pub tag_uid: String,
    pub employee_id: Option<u64>,
    pub action: ScanAction,
    pub attendance_id: Option<u64>,
    pub reader_id: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub scanned_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewScanEvent {
    pub idempotency_key: Option<String>,
    pub tag_uid: String,
    pub employee_id: Option<u64>,
    pub action: ScanAction,
    pub attendance_id: Option<u64>,
    pub origin: ScanOrigin,
    pub scanned_at: NaiveDateTime,
}
