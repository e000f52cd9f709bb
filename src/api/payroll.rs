use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    model::{
        Paging,
        payroll::{PayrollChanges, PayrollFilter, PayrollRecord},
        role::Role,
    },
    service::payroll::{self as payroll_service, GenerationReport},
    store::{PayrollStore, Store},
    utils::time::parse_month,
};

use super::{MessageResponse, deleted, non_empty};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct GeneratePayroll {
    /// `YYYY-MM`
    #[schema(example = "2026-01")]
    pub month: String,
    /// Only this employee; every active employee when omitted.
    #[schema(example = 1001)]
    pub employee_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PayrollQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    /// `YYYY-MM`
    pub month: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<PayrollRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

fn require_payroll_reader(auth: &AuthUser) -> Result<(), ApiError> {
    auth.require_any(&[Role::Admin, Role::Hr], "Admin/HR only")
}

/// Generate payroll for a month from attendance
#[utoipa::path(
    post,
    path = "/api/payroll/generate",
    request_body = GeneratePayroll,
    responses(
        (status = 201, description = "Payroll generated; existing records are skipped", body = GenerationReport),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn generate_payroll(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
    payload: web::Json<GeneratePayroll>,
) -> Result<impl Responder, ApiError> {
    auth.require_admin()?;

    let month = parse_month(&payload.month)
        .ok_or_else(|| ApiError::validation("month must be formatted as YYYY-MM"))?;

    let report = payroll_service::generate(
        store.get_ref(),
        month,
        payload.employee_id,
        config.payroll_deduction_percent,
    )
    .await
    .map_err(|e| {
        error!(error = %e, %month, "Payroll generation failed");
        e
    })?;

    info!(%month, created = report.created.len(), by = auth.user_id, "Payroll run finished");
    Ok(HttpResponse::Created().json(report))
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, description = "Paginated payroll list", body = PaginatedPayrollResponse),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<PayrollQuery>,
) -> Result<impl Responder, ApiError> {
    require_payroll_reader(&auth)?;

    let month = match non_empty(&query.month) {
        Some(raw) => Some(parse_month(raw).ok_or_else(|| ApiError::validation("month must be formatted as YYYY-MM"))?),
        None => None,
    };
    let paging = Paging::new(query.page, query.per_page);
    let filter = PayrollFilter {
        employee_id: query.employee_id,
        month,
    };
    let page = store.list_payroll(&filter, paging).await?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data: page.items,
        page: paging.page,
        per_page: paging.per_page,
        total: page.total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll found", body = PayrollRecord),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<impl Responder, ApiError> {
    require_payroll_reader(&auth)?;

    let record = store
        .get_payroll(path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Payroll"))?;
    Ok(HttpResponse::Ok().json(record))
}

/// Edit amounts; `net` is recomputed
#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}",
    request_body = PayrollChanges,
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll updated", body = PayrollRecord),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
    body: web::Json<PayrollChanges>,
) -> Result<impl Responder, ApiError> {
    auth.require_admin()?;
    let payroll_id = path.into_inner();

    let record = payroll_service::update(store.get_ref(), payroll_id, &body).await?;

    info!(payroll_id, net = record.amounts.net, by = auth.user_id, "Payroll updated");
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    delete,
    path = "/api/payroll/{payroll_id}",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = MessageResponse),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn delete_payroll(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<impl Responder, ApiError> {
    auth.require_admin()?;
    let payroll_id = path.into_inner();

    if !store.delete_payroll(payroll_id).await? {
        return Err(ApiError::NotFound("Payroll"));
    }

    info!(payroll_id, by = auth.user_id, "Payroll deleted");
    Ok(deleted())
}
