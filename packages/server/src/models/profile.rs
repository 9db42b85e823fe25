use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::print_profile;
use crate::profiles::{ConflictAction, PendingConflict, ProfileUploadOutcome, ResolveOutcome};

/// Response DTO for a print profile.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfileResponse {
    pub id: String,
    #[schema(example = "X1 Carbon")]
    pub printer_name: String,
    /// Dialect tag: `bambu`, `orca`, or `prusa`.
    #[schema(example = "bambu")]
    pub slicer: String,
    pub model_file_id: String,
    pub thumbnail_key: Option<String>,
    pub print_time_seconds: Option<i64>,
    pub filament_summary: Option<String>,
    pub filament_weight_grams: Option<f64>,
    pub layer_height_mm: Option<f64>,
    pub infill_percent: Option<f64>,
    pub nozzle_temp_c: Option<i32>,
    pub bed_temp_c: Option<i32>,
    pub plate_copies: Option<i32>,
    /// Whether the backing file was a dedicated slicer upload.
    pub dedicated: bool,
    pub created_at: DateTime<Utc>,
}

impl From<print_profile::Model> for ProfileResponse {
    fn from(m: print_profile::Model) -> Self {
        Self {
            id: m.id.to_string(),
            printer_name: m.printer_name,
            slicer: m.slicer,
            model_file_id: m.model_file_id.to_string(),
            thumbnail_key: m.thumbnail_key,
            print_time_seconds: m.print_time_seconds,
            filament_summary: m.filament_summary,
            filament_weight_grams: m.filament_weight_grams,
            layer_height_mm: m.layer_height_mm,
            infill_percent: m.infill_percent,
            nozzle_temp_c: m.nozzle_temp_c,
            bed_temp_c: m.bed_temp_c,
            plate_copies: m.plate_copies,
            dedicated: m.dedicated,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfileListResponse {
    pub profiles: Vec<ProfileResponse>,
    pub total: u64,
}

/// What the client needs to resolve a printer-name collision.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ConflictInfo {
    /// Opaque token identifying the parked upload; pass it back to the
    /// resolve endpoint.
    pub token: String,
    pub existing: ProfileResponse,
    #[schema(example = "X1 Carbon")]
    pub incoming_printer_name: String,
    #[schema(example = "bambu")]
    pub incoming_slicer: String,
}

/// Per-file result of a batch profile upload.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProfileUploadResult {
    Created {
        filename: String,
        profile: ProfileResponse,
    },
    Conflict {
        filename: String,
        conflict: ConflictInfo,
    },
    Rejected {
        filename: String,
        /// One of `not_3mf`, `unknown_format`, `parse_error`,
        /// `upload_failed`.
        reason: String,
        message: String,
    },
}

impl From<ProfileUploadOutcome> for ProfileUploadResult {
    fn from(outcome: ProfileUploadOutcome) -> Self {
        match outcome {
            ProfileUploadOutcome::Created { filename, profile } => Self::Created {
                filename,
                profile: profile.into(),
            },
            ProfileUploadOutcome::Conflict(pending) => Self::Conflict {
                filename: pending.filename.clone(),
                conflict: pending.into(),
            },
            ProfileUploadOutcome::Rejected { filename, reason } => Self::Rejected {
                filename,
                reason: reason.tag().to_string(),
                message: reason.message(),
            },
        }
    }
}

impl From<PendingConflict> for ConflictInfo {
    fn from(pending: PendingConflict) -> Self {
        Self {
            token: pending.token,
            existing: pending.existing.into(),
            incoming_printer_name: pending.incoming.printer_name,
            incoming_slicer: pending.incoming.slicer.as_str().to_string(),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfileUploadReport {
    pub results: Vec<ProfileUploadResult>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ResolveConflictRequest {
    /// Token from the conflict report.
    pub token: String,
    /// Original filename of the parked upload, echoed into the created
    /// file row.
    pub filename: String,
    pub action: ConflictAction,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ResolveConflictResponse {
    /// `created` or `skipped`.
    #[schema(example = "created")]
    pub status: &'static str,
    pub profile: Option<ProfileResponse>,
}

impl From<ResolveOutcome> for ResolveConflictResponse {
    fn from(outcome: ResolveOutcome) -> Self {
        match outcome {
            ResolveOutcome::Created(profile) => Self {
                status: "created",
                profile: Some(profile.into()),
            },
            ResolveOutcome::Skipped => Self {
                status: "skipped",
                profile: None,
            },
        }
    }
}
