use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::store::{DuplicateKey, StoreError};

/// Every handler failure ends up here; the body is always `{"error", "code"}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid request body: {0}")]
    InvalidJson(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Badge is not registered")]
    TagNotFound,

    #[error("Badge is not active")]
    TagInactive,

    #[error("Badge is not assigned to an employee")]
    TagNotAssigned,

    #[error("Employee is not active")]
    EmployeeInactive,

    #[error("Employee not found")]
    EmployeeNotFound,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Conflict {
            code,
            message: message.into(),
        }
    }

    /// Machine-readable error code sent next to the message.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::TagNotFound => "TAG_NOT_FOUND",
            ApiError::TagInactive => "TAG_INACTIVE",
            ApiError::TagNotAssigned => "TAG_NOT_ASSIGNED",
            ApiError::EmployeeInactive => "EMPLOYEE_INACTIVE",
            ApiError::EmployeeNotFound => "EMPLOYEE_NOT_FOUND",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict { code, .. } => *code,
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_)
            | ApiError::TagInactive
            | ApiError::TagNotAssigned
            | ApiError::EmployeeInactive => StatusCode::FORBIDDEN,
            ApiError::TagNotFound | ApiError::EmployeeNotFound | ApiError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), code = self.code(), error = %self, "Request rejected");
        }

        HttpResponse::build(status).json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }))
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Duplicate(key) => {
                let (code, message) = match key {
                    DuplicateKey::Email => ("DUPLICATE_EMAIL", "Email is already in use"),
                    DuplicateKey::EmployeeCode => {
                        ("DUPLICATE_EMPLOYEE_CODE", "Employee code is already in use")
                    }
                    DuplicateKey::TagUid => ("DUPLICATE_TAG", "Badge is already enrolled"),
                    DuplicateKey::Attendance => (
                        "DUPLICATE_ATTENDANCE",
                        "Attendance already recorded for this employee and date",
                    ),
                    DuplicateKey::Payroll => (
                        "DUPLICATE_PAYROLL",
                        "Payroll already exists for this employee and month",
                    ),
                    DuplicateKey::IdempotencyKey => {
                        ("DUPLICATE_SCAN", "Scan with this idempotency key already exists")
                    }
                };
                ApiError::conflict(code, message)
            }
            StoreError::MissingReference => ApiError::EmployeeNotFound,
            StoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}
