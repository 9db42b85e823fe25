use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::model;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateModelRequest {
    /// Human name; the URL slug is derived from it once and never changes.
    #[schema(example = "Benchy")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateModelRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Response DTO for a model.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ModelResponse {
    pub id: String,
    pub name: String,
    /// Immutable URL slug.
    #[schema(example = "benchy")]
    pub slug: String,
    pub description: Option<String>,
    /// Label of the newest version, absent until the first upload.
    #[schema(example = "v4")]
    pub current_version: Option<String>,
    pub total_versions: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<model::Model> for ModelResponse {
    fn from(m: model::Model) -> Self {
        Self {
            id: m.id.to_string(),
            name: m.name,
            slug: m.slug,
            description: m.description,
            current_version: m.current_version,
            total_versions: m.total_versions,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ModelListResponse {
    pub models: Vec<ModelResponse>,
    pub total: u64,
}

/// Organization usage report: the denormalized counters next to the live
/// aggregates they approximate.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UsageResponse {
    /// Counter maintained alongside lifecycle events. Advisory.
    pub current_storage: i64,
    /// Counter maintained alongside lifecycle events. Advisory.
    pub current_model_count: i32,
    /// Byte total derived from a live query over file rows.
    pub live_storage: i64,
    /// Model count derived from a live query.
    pub live_model_count: u64,
}
