use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use tracing::instrument;
use uuid::Uuid;

use crate::entity::{model_file, model_version};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::extractors::tenant::{TenantContext, client_ip};
use crate::ingest::{self, AddVersionInput, IncomingFile, IngestOptions};
use crate::models::version::{
    AddVersionResponse, FileResponse, UpdateVersionRequest, VersionDetailResponse,
    VersionListResponse, VersionResponse,
};
use crate::state::AppState;

use super::{find_owned_model, find_owned_version_by_label};

pub fn version_upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(512 * 1024 * 1024) // 512 MB
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Versions",
    operation_id = "addVersion",
    summary = "Create a new version from a batch of files",
    description = "Uploads every `files` part, derives a thumbnail (from the `preview` part if \
        given, else from the first 3MF's embedded image), and records the version atomically. \
        Any failure fully reverses the storage writes of the attempt. 3MF files are additionally \
        parsed for print profiles after the version is committed, best-effort.",
    params(("id" = Uuid, Path, description = "Model ID")),
    request_body(content_type = "multipart/form-data",
        description = "Repeated `files` parts, optional `preview` image, optional `changelog` \
            and `name` text fields"),
    responses(
        (status = 201, description = "Version created", body = AddVersionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Missing tenant context (TENANT_MISSING)", body = ErrorBody),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Object storage failure (STORAGE_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant, headers, multipart), fields(model_id = %id))]
pub async fn add_version(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut files: Vec<IncomingFile> = Vec::new();
    let mut preview_image: Option<IncomingFile> = None;
    let mut changelog: Option<String> = None;
    let mut display_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        match field.name() {
            Some("files") => files.push(read_file_field(field).await?),
            Some("preview") => preview_image = Some(read_file_field(field).await?),
            Some("changelog") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read changelog: {e}")))?;
                changelog = Some(text);
            }
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read name: {e}")))?;
                display_name = Some(text).filter(|t| !t.trim().is_empty());
            }
            _ => {} // Ignore unknown fields.
        }
    }

    let input = AddVersionInput {
        model_id: id,
        organization_id: tenant.organization_id,
        actor_id: tenant.actor_id,
        display_name,
        changelog,
        files,
        preview_image,
        ip: client_ip(&headers),
    };

    let outcome = ingest::add_version(
        &state.db,
        state.store.as_ref(),
        &state.bucket,
        &state.config.upload,
        input,
        IngestOptions::default(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AddVersionResponse {
            version_id: outcome.version.id.to_string(),
            version_label: outcome.version.label.clone(),
            files: outcome.files.into_iter().map(FileResponse::from).collect(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Versions",
    operation_id = "listVersions",
    summary = "List a model's versions, newest first",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Version list", body = VersionListResponse),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant), fields(model_id = %id))]
pub async fn list_versions(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VersionListResponse>, AppError> {
    let found = find_owned_model(&state.db, tenant.organization_id, id).await?;

    let rows = model_version::Entity::find()
        .filter(model_version::Column::ModelId.eq(found.id))
        .order_by_desc(model_version::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let total = rows.len() as u64;
    Ok(Json(VersionListResponse {
        versions: rows.into_iter().map(VersionResponse::from).collect(),
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/{label}",
    tag = "Versions",
    operation_id = "getVersion",
    summary = "Get a version with its files",
    params(
        ("id" = Uuid, Path, description = "Model ID"),
        ("label" = String, Path, description = "Version label, e.g. v3"),
    ),
    responses(
        (status = 200, description = "Version details", body = VersionDetailResponse),
        (status = 404, description = "Version not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant), fields(model_id = %id, label = %label))]
pub async fn get_version(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path((id, label)): Path<(Uuid, String)>,
) -> Result<Json<VersionDetailResponse>, AppError> {
    let (_, version) =
        find_owned_version_by_label(&state.db, tenant.organization_id, id, &label).await?;

    let files = model_file::Entity::find()
        .filter(model_file::Column::VersionId.eq(version.id))
        .order_by_asc(model_file::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(VersionDetailResponse {
        version: version.into(),
        files: files.into_iter().map(FileResponse::from).collect(),
    }))
}

#[utoipa::path(
    patch,
    path = "/{label}",
    tag = "Versions",
    operation_id = "updateVersion",
    summary = "Edit version metadata",
    description = "Only the display name and changelog are mutable; the file set of a version \
        never changes after creation.",
    params(
        ("id" = Uuid, Path, description = "Model ID"),
        ("label" = String, Path, description = "Version label, e.g. v3"),
    ),
    request_body = UpdateVersionRequest,
    responses(
        (status = 200, description = "Version updated", body = VersionResponse),
        (status = 404, description = "Version not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant, payload), fields(model_id = %id, label = %label))]
pub async fn update_version(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path((id, label)): Path<(Uuid, String)>,
    AppJson(payload): AppJson<UpdateVersionRequest>,
) -> Result<Json<VersionResponse>, AppError> {
    let (_, version) =
        find_owned_version_by_label(&state.db, tenant.organization_id, id, &label).await?;

    let mut active = version.into_active_model();
    if let Some(name) = payload.name {
        active.name = Set(Some(name).filter(|n| !n.trim().is_empty()));
    }
    if let Some(changelog) = payload.changelog {
        active.changelog = Set(Some(changelog));
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    Ok(Json(updated.into()))
}

/// Read one multipart file part into memory.
pub(super) async fn read_file_field(
    field: axum::extract::multipart::Field<'_>,
) -> Result<IncomingFile, AppError> {
    let original_name = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
    let content_type = field.content_type().map(str::to_string);
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?;

    Ok(IncomingFile {
        original_name,
        content_type,
        bytes: data.to_vec(),
    })
}
