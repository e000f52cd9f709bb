//! Badge-scan toggle and the self-service check-in/check-out it supersedes.
//!
//! A scan never reads-then-writes: check-in is an insert guarded by the
//! unique (employee, date) key, check-out is a conditional update on the open
//! row. Whichever of two concurrent scans lands first wins; the other falls
//! through to the next branch.

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    model::{
        attendance::{AttendanceMethod, AttendanceRecord, NewCheckIn, ScanOrigin},
        employee::Employee,
        nfc_tag::{TagStatus, normalize_tag_uid},
        scan_event::{NewScanEvent, ScanAction, ScanEvent},
    },
    store::{AttendanceStore, DuplicateKey, EmployeeStore, ScanLog, Store, StoreError, TagStore},
    utils::tag_cache::TagCache,
};

/// A pending claim older than this is treated as abandoned (client gone,
/// process restarted, completion write failed) and may be taken over.
pub const CLAIM_LEASE_SECS: i64 = 30;

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub tag_uid: String,
    pub origin: ScanOrigin,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToggleOutcome {
    pub action: ScanAction,
    pub message: String,
    pub employee_id: u64,
    pub employee_name: String,
    /// The attendance row as currently stored. On a replay this can be newer
    /// than `action`, e.g. a replayed `checkin` after a later checkout.
    pub record: Option<AttendanceRecord>,
    /// True when an earlier scan with the same idempotency key is being replayed.
    pub replayed: bool,
}

struct Applied {
    tag_id: u64,
    employee: Employee,
    action: ScanAction,
    record: Option<AttendanceRecord>,
}

#[instrument(name = "attendance_toggle", skip(store, cache, scan), fields(tag_uid = %scan.tag_uid))]
pub async fn toggle(
    store: &dyn Store,
    cache: &TagCache,
    scan: ScanRequest,
    now: NaiveDateTime,
) -> Result<ToggleOutcome, ApiError> {
    let uid = normalize_tag_uid(&scan.tag_uid);
    if uid.is_empty() {
        return Err(ApiError::validation("tag_uid must not be empty"));
    }
    let key = scan
        .idempotency_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string);

    let claim = match &key {
        Some(key) => match claim_key(store, key, &uid, &scan.origin, now).await? {
            Claim::Fresh(event) => Some(event),
            Claim::Replay(outcome) => return Ok(*outcome),
        },
        None => None,
    };

    let applied = match apply_scan(store, cache, &uid, &scan.origin, now).await {
        Ok(applied) => applied,
        Err(e) => {
            // Free the key so the reader can retry once the badge is fixed.
            if let Some(event) = claim {
                if let Err(release) = store.delete_scan(event.id).await {
                    warn!(error = %release, scan_id = event.id, "Failed to release idempotency key");
                }
            }
            return Err(e);
        }
    };

    let attendance_id = applied.record.as_ref().map(|r| r.id);
    match claim {
        Some(event) => {
            store
                .complete_scan(event.id, applied.action, Some(applied.employee.id), attendance_id)
                .await?
        }
        None => {
            store
                .record_scan(&NewScanEvent {
                    idempotency_key: None,
                    tag_uid: uid.clone(),
                    employee_id: Some(applied.employee.id),
                    action: applied.action,
                    attendance_id,
                    origin: scan.origin.clone(),
                    scanned_at: now,
                })
                .await?;
        }
    }
    // The scan is already recorded; a stale `last_used_at` is not worth failing it.
    if let Err(e) = store.touch_tag(applied.tag_id, now).await {
        warn!(error = %e, tag_id = applied.tag_id, "Failed to update badge last use");
    }

    info!(
        employee_id = applied.employee.id,
        action = %applied.action,
        attendance_id,
        "Badge scan applied"
    );

    Ok(outcome(applied.action, &applied.employee, applied.record, false))
}

enum Claim {
    Fresh(ScanEvent),
    Replay(Box<ToggleOutcome>),
}

/// Reserves `key` with a pending scan row; a second scan with the same key
/// gets the first scan's outcome instead of toggling again. The key is bound to
/// the badge it was first used with.
async fn claim_key(
    store: &dyn Store,
    key: &str,
    uid: &str,
    origin: &ScanOrigin,
    now: NaiveDateTime,
) -> Result<Claim, ApiError> {
    let pending = NewScanEvent {
        idempotency_key: Some(key.to_string()),
        tag_uid: uid.to_string(),
        employee_id: None,
        action: ScanAction::Pending,
        attendance_id: None,
        origin: origin.clone(),
        scanned_at: now,
    };

    match store.record_scan(&pending).await {
        Ok(event) => Ok(Claim::Fresh(event)),
        Err(StoreError::Duplicate(DuplicateKey::IdempotencyKey)) => {
            let mut event = store
                .find_scan_by_key(key)
                .await?
                .ok_or_else(|| ApiError::conflict("SCAN_IN_PROGRESS", "Scan is still being processed"))?;
            if event.tag_uid != uid {
                warn!(key, first_uid = %event.tag_uid, "Idempotency key reused for another badge");
                return Err(ApiError::conflict(
                    "IDEMPOTENCY_KEY_REUSED",
                    "Idempotency key was already used for a different badge",
                ));
            }
            if event.action == ScanAction::Pending {
                let stale_before = now - Duration::seconds(CLAIM_LEASE_SECS);
                if event.scanned_at < stale_before && store.reclaim_scan(event.id, stale_before, now).await? {
                    warn!(key, scan_id = event.id, "Taking over abandoned scan claim");
                    event.scanned_at = now;
                    return Ok(Claim::Fresh(event));
                }
            }
            replay(store, event).await.map(|o| Claim::Replay(Box::new(o)))
        }
        Err(e) => Err(e.into()),
    }
}

async fn replay(store: &dyn Store, event: ScanEvent) -> Result<ToggleOutcome, ApiError> {
    if event.action == ScanAction::Pending {
        return Err(ApiError::conflict("SCAN_IN_PROGRESS", "Scan is still being processed"));
    }
    let employee_id = event.employee_id.ok_or(ApiError::EmployeeNotFound)?;
    let employee = store
        .get_employee(employee_id)
        .await?
        .ok_or(ApiError::EmployeeNotFound)?;
    let record = match event.attendance_id {
        Some(id) => store.get_attendance(id).await?,
        None => None,
    };

    Ok(outcome(event.action, &employee, record, true))
}

async fn apply_scan(
    store: &dyn Store,
    cache: &TagCache,
    uid: &str,
    origin: &ScanOrigin,
    now: NaiveDateTime,
) -> Result<Applied, ApiError> {
    let binding = cache.resolve(store, uid).await?.ok_or(ApiError::TagNotFound)?;
    if binding.tag.status != TagStatus::Active {
        return Err(ApiError::TagInactive);
    }
    let employee = binding.employee.ok_or(ApiError::TagNotAssigned)?;
    if !employee.is_active() {
        return Err(ApiError::EmployeeInactive);
    }

    let date = now.date();
    let method = if origin.has_coordinates() {
        AttendanceMethod::Geolocation
    } else {
        AttendanceMethod::Nfc
    };

    let check_in = NewCheckIn {
        employee_id: employee.id,
        date,
        at: now,
        method,
        origin: origin.clone(),
    };

    let (action, record) = if let Some(record) = store.insert_check_in(&check_in).await? {
        (ScanAction::Checkin, Some(record))
    } else if let Some(record) = store.close_open_record(employee.id, date, now).await? {
        (ScanAction::Checkout, Some(record))
    } else {
        (ScanAction::AlreadyCompleted, store.find_attendance(employee.id, date).await?)
    };

    Ok(Applied {
        tag_id: binding.tag.id,
        employee,
        action,
        record,
    })
}

fn outcome(action: ScanAction, employee: &Employee, record: Option<AttendanceRecord>, replayed: bool) -> ToggleOutcome {
    let message = match (action, record.as_ref()) {
        (ScanAction::Checkin, Some(r)) => match r.check_in {
            Some(at) => format!("Checked in at {:02}:{:02}", at.hour(), at.minute()),
            None => "Checked in".to_string(),
        },
        (ScanAction::Checkout, Some(r)) => {
            let minutes = r.duration_minutes.unwrap_or(0);
            format!("Checked out, worked {}h {:02}m", minutes / 60, minutes % 60)
        }
        _ => "Attendance already completed for today".to_string(),
    };

    ToggleOutcome {
        action,
        message,
        employee_id: employee.id,
        employee_name: employee.full_name(),
        record,
        replayed,
    }
}

/// Self-service check-in for the caller's own profile.
pub async fn check_in(
    store: &dyn Store,
    employee_id: u64,
    origin: ScanOrigin,
    now: NaiveDateTime,
) -> Result<AttendanceRecord, ApiError> {
    let employee = store
        .get_employee(employee_id)
        .await?
        .ok_or(ApiError::EmployeeNotFound)?;
    if !employee.is_active() {
        return Err(ApiError::EmployeeInactive);
    }

    let method = if origin.has_coordinates() {
        AttendanceMethod::Geolocation
    } else {
        AttendanceMethod::Manual
    };

    store
        .insert_check_in(&NewCheckIn {
            employee_id,
            date: now.date(),
            at: now,
            method,
            origin,
        })
        .await?
        .ok_or_else(|| ApiError::conflict("ALREADY_CHECKED_IN", "Already checked in today"))
}

/// Self-service check-out; only closes an open record for today.
pub async fn check_out(store: &dyn Store, employee_id: u64, now: NaiveDateTime) -> Result<AttendanceRecord, ApiError> {
    store
        .close_open_record(employee_id, now.date(), now)
        .await?
        .ok_or_else(|| ApiError::conflict("NO_OPEN_RECORD", "No active check-in found for today"))
}
