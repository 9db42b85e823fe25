use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{model_file, model_version};

/// Response DTO for an uploaded file.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileResponse {
    pub id: String,
    #[schema(example = "benchy-x7k2q9.stl")]
    pub stored_filename: String,
    #[schema(example = "Benchy.stl")]
    pub original_filename: String,
    pub size: i64,
    pub content_type: Option<String>,
    pub extension: String,
    pub created_at: DateTime<Utc>,
}

impl From<model_file::Model> for FileResponse {
    fn from(m: model_file::Model) -> Self {
        Self {
            id: m.id.to_string(),
            stored_filename: m.stored_filename,
            original_filename: m.original_filename,
            size: m.size,
            content_type: m.content_type,
            extension: m.extension,
            created_at: m.created_at,
        }
    }
}

/// Response DTO for a version without its file listing.
#[derive(Serialize, utoipa::ToSchema)]
pub struct VersionResponse {
    pub id: String,
    #[schema(example = "v4")]
    pub label: String,
    pub name: Option<String>,
    pub changelog: Option<String>,
    pub thumbnail_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<model_version::Model> for VersionResponse {
    fn from(m: model_version::Model) -> Self {
        Self {
            id: m.id.to_string(),
            label: m.label,
            name: m.name,
            changelog: m.changelog,
            thumbnail_key: m.thumbnail_key,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct VersionListResponse {
    pub versions: Vec<VersionResponse>,
    pub total: u64,
}

/// Response DTO for a version including its files.
#[derive(Serialize, utoipa::ToSchema)]
pub struct VersionDetailResponse {
    #[serde(flatten)]
    pub version: VersionResponse,
    pub files: Vec<FileResponse>,
}

/// Result of creating a new version.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AddVersionResponse {
    pub version_id: String,
    #[schema(example = "v4")]
    pub version_label: String,
    pub files: Vec<FileResponse>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateVersionRequest {
    pub name: Option<String>,
    pub changelog: Option<String>,
}

/// Time-boxed download link for a single file.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PresignedUrlResponse {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}
