use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        Paging,
        attendance::{
            AttendanceChanges, AttendanceFilter, AttendanceRecord, AttendanceStatus, NewAttendance, ScanOrigin,
        },
    },
    service::attendance::{self as toggle_service, ScanRequest, ToggleOutcome},
    store::{AttendanceStore, Store},
    utils::{tag_cache::TagCache, time::local_now},
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};

use super::{MessageResponse, deleted, parse_param};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Badge scan as sent by a reader or the NFC web client.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ToggleRequest {
    #[schema(example = "04:A2:24:B1:C2:5E:80")]
    pub tag_uid: String,
    #[schema(example = "reader-lobby-1")]
    pub reader_id: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Alternative to the `Idempotency-Key` header.
    pub idempotency_key: Option<String>,
}

/// Optional body for self-service check-in.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PunchRequest {
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AttendanceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    /// Inclusive, `YYYY-MM-DD`
    pub from: Option<NaiveDate>,
    /// Inclusive, `YYYY-MM-DD`
    pub to: Option<NaiveDate>,
    /// `present` or `leave`
    pub status: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), ApiError> {
    match (latitude, longitude) {
        (None, None) => Ok(()),
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ApiError::validation("latitude must be between -90 and 90"));
            }
            if !(-180.0..=180.0).contains(&lon) {
                return Err(ApiError::validation("longitude must be between -180 and 180"));
            }
            Ok(())
        }
        _ => Err(ApiError::validation("latitude and longitude must be sent together")),
    }
}

fn validate_times(check_in: Option<NaiveDateTime>, check_out: Option<NaiveDateTime>) -> Result<(), ApiError> {
    match (check_in, check_out) {
        (None, Some(_)) => Err(ApiError::validation("check_out requires check_in")),
        (Some(i), Some(o)) if o < i => Err(ApiError::validation("check_out must not be before check_in")),
        _ => Ok(()),
    }
}

/// Staff may see everything; everyone else only their own records.
fn scope_employee(auth: &AuthUser, requested: Option<u64>) -> Result<Option<u64>, ApiError> {
    if auth.require_hr_or_admin().is_ok() {
        return Ok(requested);
    }
    let own = auth.employee_profile()?;
    match requested {
        Some(id) if id != own => Err(ApiError::Forbidden("You can only view your own attendance".into())),
        _ => Ok(Some(own)),
    }
}

/// Badge scan: checks in on the first tap of the day, out on the second.
#[utoipa::path(
    post,
    path = "/api/attendance/toggle",
    request_body = ToggleRequest,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Replays the first outcome for a repeated key")
    ),
    responses(
        (status = 200, description = "Scan applied", body = ToggleOutcome),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Badge or employee inactive, or badge unassigned"),
        (status = 404, description = "Badge not registered", body = Object, example = json!({
            "error": "Badge is not registered",
            "code": "TAG_NOT_FOUND"
        })),
        (status = 409, description = "Same key still in flight (SCAN_IN_PROGRESS) or used for another badge (IDEMPOTENCY_KEY_REUSED)"),
        (status = 429, description = "Too many scans")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn toggle(
    req: HttpRequest,
    auth: AuthUser,
    store: web::Data<dyn Store>,
    cache: web::Data<TagCache>,
    payload: web::Json<ToggleRequest>,
) -> Result<impl Responder, ApiError> {
    auth.require_scanner()?;

    let body = payload.into_inner();
    validate_coordinates(body.latitude, body.longitude)?;

    let header_key = req
        .headers()
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let scan = ScanRequest {
        tag_uid: body.tag_uid,
        origin: ScanOrigin {
            reader_id: body.reader_id,
            location: body.location,
            latitude: body.latitude,
            longitude: body.longitude,
        },
        idempotency_key: header_key.or(body.idempotency_key),
    };

    match toggle_service::toggle(store.get_ref(), cache.get_ref(), scan, local_now()).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(outcome)),
        Err(e) => {
            warn!(error = %e, code = e.code(), by = auth.user_id, "Badge scan refused");
            Err(e)
        }
    }
}

/// Self-service check-in
#[utoipa::path(
    post,
    path = "/api/attendance/checkin",
    request_body(content = PunchRequest, description = "Optional location"),
    responses(
        (status = 201, description = "Checked in", body = AttendanceRecord),
        (status = 403, description = "No employee profile or inactive employee"),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "error": "Already checked in today",
            "code": "ALREADY_CHECKED_IN"
        }))
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn check_in(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    payload: Option<web::Json<PunchRequest>>,
) -> Result<impl Responder, ApiError> {
    let employee_id = auth.employee_profile()?;
    let body = payload.map(web::Json::into_inner).unwrap_or_default();
    validate_coordinates(body.latitude, body.longitude)?;

    let origin = ScanOrigin {
        reader_id: None,
        location: body.location,
        latitude: body.latitude,
        longitude: body.longitude,
    };
    let record = toggle_service::check_in(store.get_ref(), employee_id, origin, local_now()).await?;

    info!(employee_id, attendance_id = record.id, "Checked in");
    Ok(HttpResponse::Created().json(record))
}

/// Self-service check-out
#[utoipa::path(
    post,
    path = "/api/attendance/checkout",
    responses(
        (status = 200, description = "Checked out", body = AttendanceRecord),
        (status = 409, description = "No active check-in found for today", body = Object, example = json!({
            "error": "No active check-in found for today",
            "code": "NO_OPEN_RECORD"
        }))
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn check_out(auth: AuthUser, store: web::Data<dyn Store>) -> Result<impl Responder, ApiError> {
    let employee_id = auth.employee_profile()?;
    let record = toggle_service::check_out(store.get_ref(), employee_id, local_now()).await?;

    info!(employee_id, attendance_id = record.id, duration = ?record.duration_minutes, "Checked out");
    Ok(HttpResponse::Ok().json(record))
}

/// The caller's own record for today
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's record", body = AttendanceRecord),
        (status = 404, description = "No record yet today")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn today(auth: AuthUser, store: web::Data<dyn Store>) -> Result<impl Responder, ApiError> {
    let employee_id = auth.employee_profile()?;

    let record = store
        .find_attendance(employee_id, local_now().date())
        .await?
        .ok_or(ApiError::NotFound("Attendance record"))?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance list", body = AttendanceListResponse)
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<AttendanceQuery>,
) -> Result<impl Responder, ApiError> {
    let employee_id = scope_employee(&auth, query.employee_id)?;
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::validation("from must not be after to"));
        }
    }

    let paging = Paging::new(query.page, query.per_page);
    let filter = AttendanceFilter {
        employee_id,
        from: query.from,
        to: query.to,
        status: parse_param::<AttendanceStatus>("status", &query.status)?,
    };
    let page = store.list_attendance(&filter, paging).await?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data: page.items,
        page: paging.page,
        per_page: paging.per_page,
        total: page.total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{attendance_id}",
    params(
        ("attendance_id", Path, description = "Attendance record ID")
    ),
    responses(
        (status = 200, description = "Record found", body = AttendanceRecord),
        (status = 404, description = "Record not found")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<impl Responder, ApiError> {
    let record = store
        .get_attendance(path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Attendance record"))?;
    scope_employee(&auth, Some(record.employee_id))?;

    Ok(HttpResponse::Ok().json(record))
}

/// Manual entry, e.g. a leave day or a forgotten punch
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = NewAttendance,
    responses(
        (status = 201, description = "Record created", body = AttendanceRecord),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Record already exists for that day", body = Object, example = json!({
            "error": "Attendance already recorded for this day",
            "code": "DUPLICATE_ATTENDANCE"
        }))
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    payload: web::Json<NewAttendance>,
) -> Result<impl Responder, ApiError> {
    auth.require_hr_or_admin()?;
    validate_times(payload.check_in, payload.check_out)?;

    let record = store.create_attendance(&payload).await.map_err(|e| {
        error!(error = %e, employee_id = payload.employee_id, date = %payload.date, "Failed to create attendance");
        ApiError::from(e)
    })?;

    info!(attendance_id = record.id, employee_id = record.employee_id, by = auth.user_id, "Attendance created");
    Ok(HttpResponse::Created().json(record))
}

/// Correct a record; duration is recomputed
#[utoipa::path(
    put,
    path = "/api/attendance/{attendance_id}",
    params(
        ("attendance_id", Path, description = "Attendance record ID")
    ),
    request_body = AttendanceChanges,
    responses(
        (status = 200, description = "Record updated", body = AttendanceRecord),
        (status = 404, description = "Record not found")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
    body: web::Json<AttendanceChanges>,
) -> Result<impl Responder, ApiError> {
    auth.require_hr_or_admin()?;
    let attendance_id = path.into_inner();
    if body.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    let current = store
        .get_attendance(attendance_id)
        .await?
        .ok_or(ApiError::NotFound("Attendance record"))?;
    validate_times(body.check_in.or(current.check_in), body.check_out.or(current.check_out))?;

    let record = store
        .update_attendance(attendance_id, &body)
        .await?
        .ok_or(ApiError::NotFound("Attendance record"))?;

    info!(attendance_id, by = auth.user_id, duration = ?record.duration_minutes, "Attendance updated");
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    delete,
    path = "/api/attendance/{attendance_id}",
    params(
        ("attendance_id", Path, description = "Attendance record ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = MessageResponse),
        (status = 404, description = "Record not found")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<impl Responder, ApiError> {
    auth.require_hr_or_admin()?;
    let attendance_id = path.into_inner();

    if !store.delete_attendance(attendance_id).await? {
        return Err(ApiError::NotFound("Attendance record"));
    }

    info!(attendance_id, by = auth.user_id, "Attendance deleted");
    Ok(deleted())
}
