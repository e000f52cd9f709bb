use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        Paging,
        nfc_tag::{NewTag, NfcTag, TagChanges, TagFilter, TagStatus, normalize_tag_uid},
    },
    store::{Store, TagStore},
    utils::tag_cache::TagCache,
};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use super::{MessageResponse, deleted, parse_param};

#[derive(Debug, Deserialize, IntoParams)]
pub struct TagQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    /// `active`, `inactive` or `lost`
    pub status: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TagListResponse {
    pub data: Vec<NfcTag>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Enroll a badge, optionally assigning it right away.
#[utoipa::path(
    post,
    path = "/api/tags",
    request_body = NewTag,
    responses(
        (status = 201, description = "Badge enrolled", body = NfcTag),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Badge already enrolled", body = Object, example = json!({
            "error": "Badge already enrolled",
            "code": "DUPLICATE_TAG"
        }))
    ),
    tag = "NFC Tag",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_tag(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    cache: web::Data<TagCache>,
    payload: web::Json<NewTag>,
) -> Result<impl Responder, ApiError> {
    auth.require_hr_or_admin()?;

    let mut new = payload.into_inner();
    new.tag_uid = normalize_tag_uid(&new.tag_uid);
    if new.tag_uid.is_empty() {
        return Err(ApiError::validation("tag_uid is required"));
    }

    let tag = store.create_tag(&new).await.map_err(|e| {
        error!(error = %e, tag_uid = %new.tag_uid, "Failed to enroll badge");
        ApiError::from(e)
    })?;
    cache.invalidate(&tag.tag_uid).await;

    info!(tag_id = tag.id, tag_uid = %tag.tag_uid, employee_id = ?tag.employee_id, "Badge enrolled");
    Ok(HttpResponse::Created().json(tag))
}

#[utoipa::path(
    get,
    path = "/api/tags",
    params(TagQuery),
    responses(
        (status = 200, description = "Paginated badge list", body = TagListResponse)
    ),
    tag = "NFC Tag",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_tags(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<TagQuery>,
) -> Result<impl Responder, ApiError> {
    auth.require_hr_or_admin()?;

    let paging = Paging::new(query.page, query.per_page);
    let filter = TagFilter {
        employee_id: query.employee_id,
        status: parse_param::<TagStatus>("status", &query.status)?,
    };
    let page = store.list_tags(&filter, paging).await?;

    Ok(HttpResponse::Ok().json(TagListResponse {
        data: page.items,
        page: paging.page,
        per_page: paging.per_page,
        total: page.total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/tags/{tag_id}",
    params(
        ("tag_id", Path, description = "Badge ID")
    ),
    responses(
        (status = 200, description = "Badge found", body = NfcTag),
        (status = 404, description = "Badge not found")
    ),
    tag = "NFC Tag",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_tag(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<impl Responder, ApiError> {
    auth.require_hr_or_admin()?;

    let tag = store
        .get_tag(path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Badge"))?;
    Ok(HttpResponse::Ok().json(tag))
}

/// Reassign, unassign (`"employee_id": null`), relabel or change a badge's status.
#[utoipa::path(
    put,
    path = "/api/tags/{tag_id}",
    params(
        ("tag_id", Path, description = "Badge ID")
    ),
    request_body = TagChanges,
    responses(
        (status = 200, description = "Badge updated", body = NfcTag),
        (status = 404, description = "Badge or employee not found")
    ),
    tag = "NFC Tag",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_tag(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    cache: web::Data<TagCache>,
    path: web::Path<u64>,
    body: web::Json<TagChanges>,
) -> Result<impl Responder, ApiError> {
    auth.require_hr_or_admin()?;
    let tag_id = path.into_inner();
    if body.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    let tag = store
        .update_tag(tag_id, &body)
        .await
        .map_err(|e| {
            error!(error = %e, tag_id, "Failed to update badge");
            ApiError::from(e)
        })?
        .ok_or(ApiError::NotFound("Badge"))?;
    cache.invalidate(&tag.tag_uid).await;

    info!(tag_id, status = %tag.status, employee_id = ?tag.employee_id, "Badge updated");
    Ok(HttpResponse::Ok().json(tag))
}

#[utoipa::path(
    delete,
    path = "/api/tags/{tag_id}",
    params(
        ("tag_id", Path, description = "Badge ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = MessageResponse),
        (status = 404, description = "Badge not found")
    ),
    tag = "NFC Tag",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_tag(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    cache: web::Data<TagCache>,
    path: web::Path<u64>,
) -> Result<impl Responder, ApiError> {
    auth.require_hr_or_admin()?;
    let tag_id = path.into_inner();

    let Some(tag) = store.get_tag(tag_id).await? else {
        return Err(ApiError::NotFound("Badge"));
    };
    if !store.delete_tag(tag_id).await? {
        return Err(ApiError::NotFound("Badge"));
    }
    cache.invalidate(&tag.tag_uid).await;

    info!(tag_id, tag_uid = %tag.tag_uid, "Badge deleted");
    Ok(deleted())
}
