use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::tenant::{TenantContext, client_ip};
use crate::ingest::{self, AddVersionInput, IncomingFile, IngestOptions};
use crate::models::version::{AddVersionResponse, FileResponse};
use crate::state::AppState;

use super::version::read_file_field;

/// Programmatic single-file upload, used by API-key integrations through
/// the gateway. Runs the same pipeline as the interactive surface with
/// thumbnail derivation switched off; when a version label is given the
/// file is appended to that version instead of creating a new one.
#[utoipa::path(
    post,
    path = "/",
    tag = "Uploads",
    operation_id = "programmaticUpload",
    summary = "Upload one file programmatically",
    request_body(content_type = "multipart/form-data",
        description = "One `file` part plus `model_id`, optional `version` label, optional \
            `name` and `description` text fields"),
    responses(
        (status = 201, description = "New version created", body = AddVersionResponse),
        (status = 200, description = "File appended to an existing version", body = FileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Missing tenant context (TENANT_MISSING)", body = ErrorBody),
        (status = 404, description = "Model or version not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Object storage failure (STORAGE_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant, headers, multipart))]
pub async fn programmatic_upload(
    tenant: TenantContext,
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<axum::response::Response, AppError> {
    let mut file: Option<IncomingFile> = None;
    let mut model_id: Option<Uuid> = None;
    let mut version_label: Option<String> = None;
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        match field.name() {
            Some("file") => file = Some(read_file_field(field).await?),
            Some("model_id") => {
                let text = read_text(field).await?;
                model_id = Some(
                    Uuid::parse_str(text.trim())
                        .map_err(|_| AppError::Validation("Invalid model_id".into()))?,
                );
            }
            Some("version") => {
                version_label = Some(read_text(field).await?.trim().to_string())
                    .filter(|v| !v.is_empty());
            }
            Some("name") => name = Some(read_text(field).await?),
            Some("description") => description = Some(read_text(field).await?),
            _ => {} // Ignore unknown fields.
        }
    }

    let file = file.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;
    let model_id = model_id.ok_or_else(|| AppError::Validation("Missing 'model_id' field".into()))?;
    let ip = client_ip(&headers);

    if let Some(label) = version_label {
        let appended = ingest::append_file(
            &state.db,
            state.store.as_ref(),
            &state.bucket,
            &state.config.upload,
            tenant.organization_id,
            tenant.actor_id,
            model_id,
            &label,
            file,
            ip,
        )
        .await?;
        return Ok(Json(FileResponse::from(appended)).into_response());
    }

    let outcome = ingest::add_version(
        &state.db,
        state.store.as_ref(),
        &state.bucket,
        &state.config.upload,
        AddVersionInput {
            model_id,
            organization_id: tenant.organization_id,
            actor_id: tenant.actor_id,
            display_name: name,
            changelog: description,
            files: vec![file],
            preview_image: None,
            ip,
        },
        IngestOptions {
            derive_thumbnail: false,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AddVersionResponse {
            version_id: outcome.version.id.to_string(),
            version_label: outcome.version.label.clone(),
            files: outcome.files.into_iter().map(FileResponse::from).collect(),
        }),
    )
        .into_response())
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read field: {e}")))
}
