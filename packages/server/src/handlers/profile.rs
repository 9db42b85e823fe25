use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::instrument;
use uuid::Uuid;

use crate::entity::print_profile;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::extractors::tenant::{TenantContext, client_ip};
use crate::ingest::IncomingFile;
use crate::models::profile::{
    ProfileListResponse, ProfileResponse, ProfileUploadReport, ProfileUploadResult,
    ResolveConflictRequest, ResolveConflictResponse,
};
use crate::profiles;
use crate::state::AppState;

use super::find_owned_version;

pub fn profile_upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(256 * 1024 * 1024) // 256 MB
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Print Profiles",
    operation_id = "uploadProfiles",
    summary = "Upload slicer files as print profiles",
    description = "Each `files` part is parsed independently and reported as created, conflict, \
        or rejected; the batch is deliberately not transactional. A conflict parks the upload \
        under a temp key and returns a resolution token.",
    params(("version_id" = Uuid, Path, description = "Version ID")),
    request_body(content_type = "multipart/form-data", description = "Repeated `files` parts"),
    responses(
        (status = 200, description = "Per-file report", body = ProfileUploadReport),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Missing tenant context (TENANT_MISSING)", body = ErrorBody),
        (status = 404, description = "Version not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant, headers, multipart), fields(version_id = %version_id))]
pub async fn upload_profiles(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ProfileUploadReport>, AppError> {
    let (_, version) =
        find_owned_version(&state.db, tenant.organization_id, version_id).await?;

    let mut files: Vec<IncomingFile> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() == Some("files") {
            files.push(super::version::read_file_field(field).await?);
        }
    }
    if files.is_empty() {
        return Err(AppError::Validation("Missing 'files' field".into()));
    }

    let outcomes = profiles::upload_profiles(
        &state.db,
        state.store.as_ref(),
        &state.bucket,
        tenant.organization_id,
        tenant.actor_id,
        &version,
        files,
        client_ip(&headers),
    )
    .await?;

    Ok(Json(ProfileUploadReport {
        results: outcomes.into_iter().map(ProfileUploadResult::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/resolve",
    tag = "Print Profiles",
    operation_id = "resolveProfileConflict",
    summary = "Resolve a parked profile conflict",
    description = "Applies the caller's decision to a conflict token returned by the upload \
        endpoint: `replace` removes the existing profile first, `keep_both` disambiguates the \
        new printer name, `skip` discards the parked file.",
    params(("version_id" = Uuid, Path, description = "Version ID")),
    request_body = ResolveConflictRequest,
    responses(
        (status = 200, description = "Resolution applied", body = ResolveConflictResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Version not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant, headers, payload), fields(version_id = %version_id))]
pub async fn resolve_conflict(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
    headers: HeaderMap,
    AppJson(payload): AppJson<ResolveConflictRequest>,
) -> Result<Json<ResolveConflictResponse>, AppError> {
    let (_, version) =
        find_owned_version(&state.db, tenant.organization_id, version_id).await?;

    let outcome = profiles::resolve_conflict(
        &state.db,
        state.store.as_ref(),
        &state.bucket,
        tenant.organization_id,
        tenant.actor_id,
        &version,
        &payload.token,
        &payload.filename,
        payload.action,
        client_ip(&headers),
    )
    .await?;

    Ok(Json(outcome.into()))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Print Profiles",
    operation_id = "listProfiles",
    summary = "List a version's print profiles",
    params(("version_id" = Uuid, Path, description = "Version ID")),
    responses(
        (status = 200, description = "Profile list", body = ProfileListResponse),
        (status = 404, description = "Version not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant), fields(version_id = %version_id))]
pub async fn list_profiles(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
) -> Result<Json<ProfileListResponse>, AppError> {
    let (_, version) =
        find_owned_version(&state.db, tenant.organization_id, version_id).await?;

    let rows = print_profile::Entity::find()
        .filter(print_profile::Column::VersionId.eq(version.id))
        .order_by_asc(print_profile::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let total = rows.len() as u64;
    Ok(Json(ProfileListResponse {
        profiles: rows.into_iter().map(ProfileResponse::from).collect(),
        total,
    }))
}

#[utoipa::path(
    delete,
    path = "/{profile_id}",
    tag = "Print Profiles",
    operation_id = "deleteProfile",
    summary = "Delete a print profile",
    description = "Removes the profile. The backing object is reclaimed only when the profile \
        came from a dedicated slicer upload; source-file-backed profiles keep their file.",
    params(("profile_id" = Uuid, Path, description = "Profile ID")),
    responses(
        (status = 204, description = "Profile deleted"),
        (status = 404, description = "Profile not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant), fields(profile_id = %profile_id))]
pub async fn delete_profile(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    profiles::delete_profile(
        &state.db,
        state.store.as_ref(),
        tenant.organization_id,
        profile_id,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
