use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Upload audit trail stored in the `metadata` JSON column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAudit {
    /// Actor who performed the upload.
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
    /// Client IP when the upstream gateway forwarded one.
    pub ip: Option<String>,
    /// SHA-256 of the uploaded bytes, recorded at ingest time.
    pub sha256: String,
    /// Whether the auto-parse pass has examined this file.
    pub processed: bool,
}

impl FileAudit {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("audit metadata serializes")
    }
}

/// One uploaded artifact inside a version. Immutable after creation;
/// removed only by compensating rollback or when a dedicated slicer
/// upload's profile is deleted.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "model_file")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub version_id: Uuid,
    #[sea_orm(belongs_to, from = "version_id", to = "id")]
    pub version: HasOne<super::model_version::Entity>,

    /// Slugged name with a random suffix, unique within the version.
    pub stored_filename: String,

    pub original_filename: String,

    pub size: i64,

    pub content_type: Option<String>,

    /// Lowercased extension without the dot.
    pub extension: String,

    /// Full object key. Reconstructible from the metadata row alone, which
    /// is what makes compensating deletes possible without a lookup table.
    pub storage_key: String,

    pub storage_bucket: String,

    #[sea_orm(has_one)]
    pub profile: HasOne<super::print_profile::Entity>,

    /// Upload audit blob, see [`FileAudit`].
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: serde_json::Value,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
