pub mod attendance;
pub mod employee;
pub mod nfc_tag;
pub mod payroll;
pub mod reader;

use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::error::ApiError;

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Successfully deleted")]
    pub message: String,
}

pub(crate) fn deleted() -> actix_web::HttpResponse {
    actix_web::HttpResponse::Ok().json(json!({ "message": "Successfully deleted" }))
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(())
}

pub(crate) fn require_non_negative(field: &str, value: Option<f64>) -> Result<(), ApiError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ApiError::validation(format!("{field} must be a non-negative number"))),
        _ => Ok(()),
    }
}

/// Trims and drops empty query values so `?status=` means "no filter".
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parses an optional enum-valued query parameter.
pub(crate) fn parse_param<T: std::str::FromStr>(field: &str, value: &Option<String>) -> Result<Option<T>, ApiError> {
    non_empty(value)
        .map(|raw| {
            raw.to_lowercase()
                .parse::<T>()
                .map_err(|_| ApiError::validation(format!("Invalid {field}: {raw}")))
        })
        .transpose()
}
