use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        Paging,
        employee::{Employee, EmployeeChanges, EmployeeFilter, EmployeeStatus, NewEmployee, SalaryType},
    },
    store::{EmployeeStore, Store},
    utils::tag_cache::TagCache,
};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use super::{MessageResponse, deleted, non_empty, parse_param, require_non_negative, require_text};

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// `active` or `inactive`
    pub status: Option<String>,
    pub department: Option<String>,
    /// Matched against first name, last name and email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => Ok(()),
        _ => Err(ApiError::validation("email must be a valid address")),
    }
}

fn validate_new(payload: &NewEmployee) -> Result<(), ApiError> {
    require_text("employee_code", &payload.employee_code)?;
    require_text("first_name", &payload.first_name)?;
    require_text("last_name", &payload.last_name)?;
    validate_email(&payload.email)?;
    require_non_negative("monthly_salary", payload.monthly_salary)?;
    require_non_negative("hourly_rate", payload.hourly_rate)?;
    require_pay_rate(payload.salary_type, payload.monthly_salary, payload.hourly_rate)
}

/// A fixed employee needs a monthly salary, an hourly one a rate; otherwise
/// payroll silently pays nothing.
fn require_pay_rate(salary_type: SalaryType, monthly_salary: Option<f64>, hourly_rate: Option<f64>) -> Result<(), ApiError> {
    match salary_type {
        SalaryType::Fixed if monthly_salary.is_none() => {
            Err(ApiError::validation("monthly_salary is required for fixed salary"))
        }
        SalaryType::Hourly if hourly_rate.is_none() => {
            Err(ApiError::validation("hourly_rate is required for hourly salary"))
        }
        _ => Ok(()),
    }
}

/// Checks the row as it would look after `changes`.
fn validate_merged(current: &Employee, changes: &EmployeeChanges) -> Result<(), ApiError> {
    require_pay_rate(
        changes.salary_type.unwrap_or(current.salary_type),
        changes.monthly_salary.or(current.monthly_salary),
        changes.hourly_rate.or(current.hourly_rate),
    )
}

fn validate_changes(changes: &EmployeeChanges) -> Result<(), ApiError> {
    if changes.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }
    for (field, value) in [
        ("employee_code", &changes.employee_code),
        ("first_name", &changes.first_name),
        ("last_name", &changes.last_name),
    ] {
        if let Some(v) = value {
            require_text(field, v)?;
        }
    }
    if let Some(email) = &changes.email {
        validate_email(email)?;
    }
    require_non_negative("monthly_salary", changes.monthly_salary)?;
    require_non_negative("hourly_rate", changes.hourly_rate)
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = NewEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email or employee code already in use", body = Object, example = json!({
            "error": "Email already in use",
            "code": "DUPLICATE_EMAIL"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    payload: web::Json<NewEmployee>,
) -> Result<impl Responder, ApiError> {
    auth.require_hr_or_admin()?;

    let mut new = payload.into_inner();
    validate_new(&new)?;
    new.email = new.email.trim().to_string();
    new.employee_code = new.employee_code.trim().to_string();

    let employee = store.create_employee(&new).await.map_err(|e| {
        error!(error = %e, email = %new.email, "Failed to create employee");
        ApiError::from(e)
    })?;

    info!(employee_id = employee.id, by = auth.user_id, "Employee created");
    Ok(HttpResponse::Created().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<EmployeeQuery>,
) -> Result<impl Responder, ApiError> {
    auth.require_hr_or_admin()?;

    let paging = Paging::new(query.page, query.per_page);
    let filter = EmployeeFilter {
        status: parse_param::<EmployeeStatus>("status", &query.status)?,
        department: non_empty(&query.department).map(str::to_string),
        search: non_empty(&query.search).map(str::to_string),
    };

    let page = store.list_employees(&filter, paging).await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: page.items,
        page: paging.page,
        per_page: paging.per_page,
        total: page.total,
    }))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<impl Responder, ApiError> {
    let employee_id = path.into_inner();
    // Employees may read their own profile.
    if auth.employee_id != Some(employee_id) {
        auth.require_hr_or_admin()?;
    }

    let employee = store
        .get_employee(employee_id)
        .await?
        .ok_or(ApiError::EmployeeNotFound)?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = EmployeeChanges,
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Email or employee code already in use")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    cache: web::Data<TagCache>,
    path: web::Path<u64>,
    body: web::Json<EmployeeChanges>,
) -> Result<impl Responder, ApiError> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();
    let mut changes = body.into_inner();
    validate_changes(&changes)?;
    changes.email = changes.email.map(|v| v.trim().to_string());
    changes.employee_code = changes.employee_code.map(|v| v.trim().to_string());

    let current = store
        .get_employee(employee_id)
        .await?
        .ok_or(ApiError::EmployeeNotFound)?;
    validate_merged(&current, &changes)?;

    let employee = store
        .update_employee(employee_id, &changes)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to update employee");
            ApiError::from(e)
        })?
        .ok_or(ApiError::EmployeeNotFound)?;

    // Status changes must reach badge scans immediately.
    cache.invalidate_all();

    info!(employee_id, by = auth.user_id, "Employee updated");
    Ok(HttpResponse::Ok().json(employee))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = MessageResponse),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "error": "Employee not found",
            "code": "NOT_FOUND"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    cache: web::Data<TagCache>,
    path: web::Path<u64>,
) -> Result<impl Responder, ApiError> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    if !store.delete_employee(employee_id).await? {
        return Err(ApiError::NotFound("Employee"));
    }
    cache.invalidate_all();

    info!(employee_id, by = auth.user_id, "Employee deleted");
    Ok(deleted())
}
