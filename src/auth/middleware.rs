use crate::auth::auth::authenticate;
use crate::config::Config;
use crate::error::ApiError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

/// Rejects requests without a valid bearer token and stashes the caller for
/// the `AuthUser` extractor.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("App config missing".into()))?;

    match authenticate(req.headers(), &config) {
        Ok(auth_user) => {
            tracing::debug!(user_id = auth_user.user_id, role = %auth_user.role, path = req.path(), "Authenticated");
            req.extensions_mut().insert(auth_user);
            next.call(req).await
        }
        Err(e) => {
            let resp = e.error_response();
            Ok(req.into_response(resp))
        }
    }
}
