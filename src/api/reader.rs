//! Long-lived bearer tokens for hardware badge readers.

use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use crate::{
    auth::{
        auth::AuthUser,
        jwt::{TokenSubject, generate_token},
    },
    config::Config,
    error::ApiError,
    model::role::Role,
    models::TokenType,
};

use super::require_text;

/// Ten years.
pub const MAX_READER_TOKEN_TTL: usize = 315_360_000;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ReaderTokenRequest {
    #[schema(example = "reader-lobby-1")]
    pub reader_id: String,
    /// Seconds; defaults to `READER_TOKEN_TTL`, at most ten years.
    pub ttl_secs: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct ReaderTokenResponse {
    pub token: String,
    pub reader_id: String,
    pub token_type: String,
    /// Unix timestamp
    pub expires_at: usize,
}

/// Issue a reader token
#[utoipa::path(
    post,
    path = "/api/readers/token",
    request_body = ReaderTokenRequest,
    responses(
        (status = 201, description = "Token issued", body = ReaderTokenResponse),
        (status = 400, description = "ttl_secs out of range"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Reader"
)]
pub async fn issue_reader_token(
    auth: AuthUser,
    config: web::Data<Config>,
    payload: web::Json<ReaderTokenRequest>,
) -> Result<impl Responder, ApiError> {
    auth.require_admin()?;
    require_text("reader_id", &payload.reader_id)?;

    let ttl = payload.ttl_secs.unwrap_or(config.reader_token_ttl);
    if ttl == 0 || ttl > MAX_READER_TOKEN_TTL {
        return Err(ApiError::validation(format!(
            "ttl_secs must be between 1 and {MAX_READER_TOKEN_TTL}"
        )));
    }

    let reader_id = payload.reader_id.trim().to_string();
    let subject = TokenSubject {
        user_id: auth.user_id,
        username: format!("reader:{reader_id}"),
        role: Role::ApiUser,
        employee_id: None,
    };

    let (token, claims) = generate_token(&subject, TokenType::Reader, &config.jwt_secret, ttl).map_err(|e| {
        error!(error = %e, %reader_id, "Failed to sign reader token");
        ApiError::Internal(e.to_string())
    })?;

    info!(%reader_id, jti = %claims.jti, by = auth.user_id, "Reader token issued");
    Ok(HttpResponse::Created().json(ReaderTokenResponse {
        token,
        reader_id,
        token_type: "Bearer".to_string(),
        expires_at: claims.exp,
    }))
}
