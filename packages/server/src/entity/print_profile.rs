use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Slicer metadata extracted from a 3MF file in a version.
///
/// Created synchronously on explicit profile upload, or best-effort during
/// version ingestion when an uploaded file turns out to be a 3MF container.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "print_profile")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub version_id: Uuid,
    #[sea_orm(belongs_to, from = "version_id", to = "id")]
    pub version: HasOne<super::model_version::Entity>,

    /// The 3MF file this profile was extracted from.
    pub model_file_id: Uuid,
    #[sea_orm(belongs_to, from = "model_file_id", to = "id")]
    pub model_file: HasOne<super::model_file::Entity>,

    /// Printer name as written by the slicer.
    pub printer_name: String,

    /// Canonical form used for conflict matching within a version.
    pub normalized_printer_name: String,

    /// Dialect tag: `bambu`, `orca`, or `prusa`.
    pub slicer: String,

    /// Storage key of the thumbnail extracted from the container.
    pub thumbnail_key: Option<String>,

    pub print_time_seconds: Option<i64>,
    pub filament_summary: Option<String>,
    pub filament_weight_grams: Option<f64>,
    pub layer_height_mm: Option<f64>,
    pub infill_percent: Option<f64>,
    pub nozzle_temp_c: Option<i32>,
    pub bed_temp_c: Option<i32>,
    pub plate_copies: Option<i32>,

    /// True when the backing file was uploaded specifically as a slicer
    /// profile. Deleting such a profile reclaims the object; profiles
    /// backed by a general source upload keep their file.
    pub dedicated: bool,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
