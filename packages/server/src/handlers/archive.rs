use std::io::{Cursor, Write};

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::instrument;
use uuid::Uuid;
use zip::write::SimpleFileOptions;

use crate::entity::model_file;
use crate::error::{AppError, ErrorBody};
use crate::extractors::tenant::TenantContext;
use crate::models::version::PresignedUrlResponse;
use crate::state::AppState;

use super::{find_owned_model, find_owned_version_by_label};

#[utoipa::path(
    get,
    path = "/{label}/download",
    tag = "Versions",
    operation_id = "downloadVersionArchive",
    summary = "Download all files of a version as a ZIP",
    description = "Files are fetched from object storage one at a time and assembled into a \
        single archive, trading throughput for a flat memory footprint.",
    params(
        ("id" = Uuid, Path, description = "Model ID"),
        ("label" = String, Path, description = "Version label, e.g. v3"),
    ),
    responses(
        (status = 200, description = "ZIP archive"),
        (status = 404, description = "Version not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Object storage failure (STORAGE_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant), fields(model_id = %id, label = %label))]
pub async fn download_version_archive(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path((id, label)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    let (model, version) =
        find_owned_version_by_label(&state.db, tenant.organization_id, id, &label).await?;

    let files = model_file::Entity::find()
        .filter(model_file::Column::VersionId.eq(version.id))
        .order_by_asc(model_file::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    let mut used_names: Vec<String> = Vec::new();

    for file in &files {
        let entry_name = unique_entry_name(&file.original_filename, &mut used_names);
        writer
            .start_file(entry_name, options)
            .map_err(|e| AppError::Internal(format!("ZIP write failed: {e}")))?;

        // One file in flight at a time, copied in 64KB chunks.
        let mut reader = state.store.get_stream(&file.storage_key).await?;
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| AppError::Storage(format!("read {}: {e}", file.storage_key)))?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .map_err(|e| AppError::Internal(format!("ZIP write failed: {e}")))?;
        }
    }

    let bytes = writer
        .finish()
        .map_err(|e| AppError::Internal(format!("ZIP finalize failed: {e}")))?
        .into_inner();

    let archive_name = format!("{}-{}.zip", model.slug, version.label);
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_LENGTH, bytes.len().to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{archive_name}\""),
        )
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))?;

    Ok(response)
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct DownloadUrlQuery {
    /// Link lifetime in minutes; defaults to the configured TTL, capped at
    /// 24 hours.
    pub ttl_minutes: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/{file_id}/download-url",
    tag = "Files",
    operation_id = "fileDownloadUrl",
    summary = "Produce a presigned download URL for a file",
    params(
        ("file_id" = Uuid, Path, description = "File ID"),
        DownloadUrlQuery,
    ),
    responses(
        (status = 200, description = "Presigned URL", body = PresignedUrlResponse),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Object storage failure (STORAGE_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant, query), fields(file_id = %file_id))]
pub async fn file_download_url(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Query(query): Query<DownloadUrlQuery>,
) -> Result<Json<PresignedUrlResponse>, AppError> {
    let file = model_file::Entity::find_by_id(file_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    let version = crate::entity::model_version::Entity::find_by_id(file.version_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;
    find_owned_model(&state.db, tenant.organization_id, version.model_id)
        .await
        .map_err(|_| AppError::NotFound("File not found".into()))?;

    let ttl_minutes = query
        .ttl_minutes
        .unwrap_or(state.config.storage.presign_ttl_minutes)
        .clamp(1, 24 * 60);

    let url = state
        .store
        .presign_download(&file.storage_key, ttl_minutes)
        .await?;

    Ok(Json(PresignedUrlResponse {
        url,
        expires_at: Utc::now() + Duration::minutes(i64::from(ttl_minutes)),
    }))
}

/// Archive entry names come from user uploads; duplicates get an index
/// suffix so the second `part.stl` becomes `part (2).stl`.
fn unique_entry_name(original: &str, used: &mut Vec<String>) -> String {
    if !used.iter().any(|u| u == original) {
        used.push(original.to_string());
        return original.to_string();
    }

    let (stem, ext) = match original.rsplit_once('.') {
        Some((s, e)) => (s, Some(e)),
        None => (original, None),
    };
    for n in 2u32.. {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        if !used.iter().any(|u| u == &candidate) {
            used.push(candidate.clone());
            return candidate;
        }
    }
    unreachable!("suffix space exhausted");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_entry_names_get_suffixes() {
        let mut used = Vec::new();
        assert_eq!(unique_entry_name("part.stl", &mut used), "part.stl");
        assert_eq!(unique_entry_name("part.stl", &mut used), "part (2).stl");
        assert_eq!(unique_entry_name("part.stl", &mut used), "part (3).stl");
        assert_eq!(unique_entry_name("readme", &mut used), "readme");
        assert_eq!(unique_entry_name("readme", &mut used), "readme (2)");
    }
}
