//! Print-profile upload, conflict detection, and resolution.
//!
//! Batch upload is deliberately not transactional across files: slicer
//! files are logically separate artifacts and the producer should see
//! partial progress. Each file resolves to created/conflict/rejected
//! independently. Conflicted files are parked as temp objects until the
//! caller decides; the temp key doubles as the resolution token.

use chrono::Utc;
use common::storage::{ObjectKind, ObjectStore, StorageError, object_key};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::ExprTrait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use slicer::{ParseOutcome, ParsedProfile, parse_container, printer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::entity::{model_file, model_version, organization, print_profile};
use crate::error::AppError;
use crate::ingest::{self, CleanupStack, IncomingFile, SLICER_EXTENSION};
use crate::utils::filename;

const THREEMF_CONTENT_TYPE: &str = "application/vnd.ms-package.3dmanufacturing-3dmodel+3mf";

/// Per-file outcome of a batch profile upload.
pub enum ProfileUploadOutcome {
    Created {
        filename: String,
        profile: print_profile::Model,
    },
    Conflict(PendingConflict),
    Rejected {
        filename: String,
        reason: RejectReason,
    },
}

#[derive(Debug)]
pub enum RejectReason {
    /// The file is not a 3MF container at all.
    Not3mf,
    /// No dialect recognized the container.
    UnknownFormat,
    /// A dialect claimed the container but extraction failed.
    ParseError(String),
    /// Storage or persistence failed for this file; the rest of the batch
    /// proceeds.
    Failed(String),
}

impl RejectReason {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Not3mf => "not_3mf",
            Self::UnknownFormat => "unknown_format",
            Self::ParseError(_) => "parse_error",
            Self::Failed(_) => "upload_failed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Not3mf => "Only .3mf files carry print profiles".into(),
            Self::UnknownFormat => "The slicer that produced this file is not supported".into(),
            Self::ParseError(msg) => msg.clone(),
            Self::Failed(msg) => msg.clone(),
        }
    }
}

/// A parked upload awaiting a conflict decision.
pub struct PendingConflict {
    /// Temp object key; returned to the client as the resolution token.
    pub token: String,
    pub filename: String,
    pub existing: print_profile::Model,
    pub incoming: ParsedProfile,
}

/// Caller decision for a pending conflict.
#[derive(Debug, Clone, Copy, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConflictAction {
    /// Delete the existing profile (and its object, for dedicated
    /// uploads), then create the new one.
    Replace,
    /// Create the new profile under a disambiguated printer name.
    KeepBoth,
    /// Discard the parked file; no profile is created.
    Skip,
}

pub enum ResolveOutcome {
    Created(print_profile::Model),
    Skipped,
}

/// Process a batch of profile uploads against a version. Outcomes are
/// independent per file and reported in input order.
#[allow(clippy::too_many_arguments)]
pub async fn upload_profiles(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    bucket: &str,
    organization_id: Uuid,
    actor_id: Uuid,
    version: &model_version::Model,
    files: Vec<IncomingFile>,
    ip: Option<String>,
) -> Result<Vec<ProfileUploadOutcome>, AppError> {
    let mut taken = ingest::existing_normalized_names(db, version.id).await?;
    let mut outcomes = Vec::with_capacity(files.len());

    for file in files {
        let filename_for_report = file.original_name.trim().to_string();

        match process_file(
            db,
            store,
            bucket,
            organization_id,
            actor_id,
            version,
            file,
            ip.clone(),
            &taken,
        )
        .await
        {
            Ok(ProfileUploadOutcome::Created { filename, profile }) => {
                taken.push(profile.normalized_printer_name.clone());
                outcomes.push(ProfileUploadOutcome::Created { filename, profile });
            }
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                warn!(file = %filename_for_report, error = %err, "profile upload failed");
                outcomes.push(ProfileUploadOutcome::Rejected {
                    filename: filename_for_report,
                    reason: RejectReason::Failed(err.to_string()),
                });
            }
        }
    }

    Ok(outcomes)
}

#[allow(clippy::too_many_arguments)]
async fn process_file(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    bucket: &str,
    organization_id: Uuid,
    actor_id: Uuid,
    version: &model_version::Model,
    file: IncomingFile,
    ip: Option<String>,
    taken: &[String],
) -> Result<ProfileUploadOutcome, StorageOrDb> {
    let name = file.original_name.trim().to_string();

    let is_3mf = filename::split_extension(&name)
        .map(|(_, ext)| ext == SLICER_EXTENSION)
        .unwrap_or(false);
    if !is_3mf {
        return Ok(ProfileUploadOutcome::Rejected {
            filename: name,
            reason: RejectReason::Not3mf,
        });
    }

    let parsed = match parse_container(&file.bytes) {
        ParseOutcome::Parsed(profile) => profile,
        ParseOutcome::UnknownFormat => {
            return Ok(ProfileUploadOutcome::Rejected {
                filename: name,
                reason: RejectReason::UnknownFormat,
            });
        }
        ParseOutcome::ParseError(msg) => {
            return Ok(ProfileUploadOutcome::Rejected {
                filename: name,
                reason: RejectReason::ParseError(msg),
            });
        }
    };

    if taken.contains(&parsed.normalized_printer_name) {
        let existing = find_conflicting(db, version.id, &parsed.normalized_printer_name)
            .await?
            .ok_or_else(|| {
                StorageOrDb::Storage(StorageError::Backend(
                    "conflicting profile disappeared mid-batch".into(),
                ))
            })?;

        // Park the bytes under a temp key until the caller decides.
        let stored = filename::stored_filename(&name)
            .map(|s| s.stored)
            .unwrap_or_else(|_| format!("pending-{}.3mf", filename::random_suffix()));
        let token = object_key(
            organization_id,
            version.model_id,
            &version.label,
            ObjectKind::Temp {
                epoch_millis: Utc::now().timestamp_millis(),
            },
            &stored,
        );
        store.upload(&token, &file.bytes, THREEMF_CONTENT_TYPE).await?;

        info!(printer = %parsed.printer_name, "profile conflict parked for resolution");
        return Ok(ProfileUploadOutcome::Conflict(PendingConflict {
            token,
            filename: name,
            existing,
            incoming: parsed,
        }));
    }

    let profile = create_dedicated_profile(
        db,
        store,
        bucket,
        organization_id,
        actor_id,
        version,
        &name,
        &file.bytes,
        &parsed,
        None,
        ip,
    )
    .await?;
    Ok(ProfileUploadOutcome::Created {
        filename: name,
        profile,
    })
}

/// Resolve a parked conflict. The temp object is re-read and re-parsed so
/// the resolution does not trust client-supplied metadata.
#[allow(clippy::too_many_arguments)]
pub async fn resolve_conflict(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    bucket: &str,
    organization_id: Uuid,
    actor_id: Uuid,
    version: &model_version::Model,
    token: &str,
    original_filename: &str,
    action: ConflictAction,
    ip: Option<String>,
) -> Result<ResolveOutcome, AppError> {
    if !token.starts_with("temp/") {
        return Err(AppError::Validation("Invalid conflict token".into()));
    }

    if matches!(action, ConflictAction::Skip) {
        if let Err(err) = store.delete(token).await {
            warn!(token = %token, error = %err, "failed to discard parked upload");
        }
        return Ok(ResolveOutcome::Skipped);
    }

    let object = match store.get_bytes(token).await {
        Ok(object) => object,
        Err(err) if err.is_not_found() => {
            return Err(AppError::Validation(
                "Pending upload expired; upload the file again".into(),
            ));
        }
        Err(err) => return Err(err.into()),
    };

    let parsed = match parse_container(&object.bytes) {
        ParseOutcome::Parsed(profile) => profile,
        _ => {
            return Err(AppError::Validation(
                "Parked file no longer parses as a slicer project".into(),
            ));
        }
    };

    let profile = match action {
        ConflictAction::Replace => {
            if let Some(existing) =
                find_conflicting(db, version.id, &parsed.normalized_printer_name).await?
            {
                remove_profile(db, store, organization_id, &existing).await?;
            }
            create_dedicated_profile(
                db,
                store,
                bucket,
                organization_id,
                actor_id,
                version,
                original_filename,
                &object.bytes,
                &parsed,
                None,
                ip,
            )
            .await
            .map_err(AppError::from)?
        }
        ConflictAction::KeepBoth => {
            let taken = ingest::existing_normalized_names(db, version.id).await?;
            let renamed = printer::disambiguate(&parsed.printer_name, &taken);
            create_dedicated_profile(
                db,
                store,
                bucket,
                organization_id,
                actor_id,
                version,
                original_filename,
                &object.bytes,
                &parsed,
                Some(renamed),
                ip,
            )
            .await
            .map_err(AppError::from)?
        }
        ConflictAction::Skip => unreachable!("handled above"),
    };

    if let Err(err) = store.delete(token).await {
        warn!(token = %token, error = %err, "failed to remove parked upload");
    }

    Ok(ResolveOutcome::Created(profile))
}

/// Delete a profile. The backing object is reclaimed only for dedicated
/// slicer uploads; source-backed profiles keep their file for the source
/// files view.
pub async fn delete_profile(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    organization_id: Uuid,
    profile_id: Uuid,
) -> Result<(), AppError> {
    let profile = print_profile::Entity::find_by_id(profile_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    let version = model_version::Entity::find_by_id(profile.version_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;
    ingest::find_owned_model(db, version.model_id, organization_id)
        .await
        .map_err(|_| AppError::NotFound("Profile not found".into()))?;

    remove_profile(db, store, organization_id, &profile).await
}

/// Row deletions commit first; object deletions follow best-effort. An
/// orphaned object is acceptable, a dangling row is not.
async fn remove_profile(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    organization_id: Uuid,
    profile: &print_profile::Model,
) -> Result<(), AppError> {
    let backing = if profile.dedicated {
        model_file::Entity::find_by_id(profile.model_file_id)
            .one(db)
            .await?
    } else {
        None
    };

    let txn = db.begin().await?;
    print_profile::Entity::delete_by_id(profile.id)
        .exec(&txn)
        .await?;
    if let Some(file) = &backing {
        model_file::Entity::delete_by_id(file.id).exec(&txn).await?;
        organization::Entity::update_many()
            .col_expr(
                organization::Column::CurrentStorage,
                Expr::col(organization::Column::CurrentStorage).sub(file.size),
            )
            .filter(organization::Column::Id.eq(organization_id))
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;

    if let Some(file) = &backing {
        if let Err(err) = store.delete(&file.storage_key).await {
            warn!(key = %file.storage_key, error = %err, "failed to delete profile object");
        }
    }
    if let Some(key) = &profile.thumbnail_key {
        if let Err(err) = store.delete(key).await {
            warn!(key = %key, error = %err, "failed to delete profile thumbnail");
        }
    }

    Ok(())
}

/// Upload a dedicated slicer file and create its file + profile rows in
/// one transaction, compensating the objects if the transaction fails.
#[allow(clippy::too_many_arguments)]
async fn create_dedicated_profile(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    bucket: &str,
    organization_id: Uuid,
    actor_id: Uuid,
    version: &model_version::Model,
    original_name: &str,
    bytes: &[u8],
    parsed: &ParsedProfile,
    printer_name_override: Option<String>,
    ip: Option<String>,
) -> Result<print_profile::Model, StorageOrDb> {
    let stored = filename::stored_filename(original_name)
        .map(|s| s.stored)
        .unwrap_or_else(|_| format!("profile-{}.3mf", filename::random_suffix()));

    let mut cleanup = CleanupStack::new();

    let key = object_key(
        organization_id,
        version.model_id,
        &version.label,
        ObjectKind::Slicer,
        &stored,
    );
    let receipt = store.upload(&key, bytes, THREEMF_CONTENT_TYPE).await?;
    cleanup.push(key.clone());

    let thumbnail_key = match &parsed.thumbnail {
        Some(thumb) => {
            let thumb_key = object_key(
                organization_id,
                version.model_id,
                &version.label,
                ObjectKind::Artifact,
                &format!("profile-{}.png", filename::random_suffix()),
            );
            match store.upload(&thumb_key, thumb, "image/png").await {
                Ok(_) => {
                    cleanup.push(thumb_key.clone());
                    Some(thumb_key)
                }
                Err(err) => {
                    warn!(error = %err, "profile thumbnail upload failed");
                    None
                }
            }
        }
        None => None,
    };

    let (printer_name, normalized) = match printer_name_override {
        Some(name) => {
            let normalized = printer::normalize_printer_name(&name);
            (name, normalized)
        }
        None => (
            parsed.printer_name.clone(),
            parsed.normalized_printer_name.clone(),
        ),
    };

    let persisted = persist_profile_rows(
        db,
        organization_id,
        actor_id,
        version,
        &stored,
        original_name,
        &key,
        bucket,
        receipt.size as i64,
        &ingest::content_digest(bytes),
        thumbnail_key,
        parsed,
        printer_name,
        normalized,
        ip,
    )
    .await;

    match persisted {
        Ok(profile) => Ok(profile),
        Err(err) => {
            cleanup.unwind(store).await;
            Err(StorageOrDb::Db(err))
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn persist_profile_rows(
    db: &DatabaseConnection,
    organization_id: Uuid,
    actor_id: Uuid,
    version: &model_version::Model,
    stored_filename: &str,
    original_name: &str,
    storage_key: &str,
    bucket: &str,
    size: i64,
    sha256: &str,
    thumbnail_key: Option<String>,
    parsed: &ParsedProfile,
    printer_name: String,
    normalized: String,
    ip: Option<String>,
) -> Result<print_profile::Model, sea_orm::DbErr> {
    let txn = db.begin().await?;
    let now = Utc::now();

    let audit = model_file::FileAudit {
        uploaded_by: actor_id,
        uploaded_at: now,
        ip,
        sha256: sha256.to_string(),
        processed: true,
    };

    let file = model_file::ActiveModel {
        id: Set(Uuid::now_v7()),
        version_id: Set(version.id),
        stored_filename: Set(stored_filename.to_string()),
        original_filename: Set(original_name.to_string()),
        size: Set(size),
        content_type: Set(Some(THREEMF_CONTENT_TYPE.to_string())),
        extension: Set(SLICER_EXTENSION.to_string()),
        storage_key: Set(storage_key.to_string()),
        storage_bucket: Set(bucket.to_string()),
        metadata: Set(audit.to_json()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let profile = print_profile::ActiveModel {
        id: Set(Uuid::now_v7()),
        version_id: Set(version.id),
        model_file_id: Set(file.id),
        printer_name: Set(printer_name),
        normalized_printer_name: Set(normalized),
        slicer: Set(parsed.slicer.as_str().to_string()),
        thumbnail_key: Set(thumbnail_key),
        print_time_seconds: Set(parsed.metadata.print_time_seconds.map(|s| s as i64)),
        filament_summary: Set(parsed.metadata.filament_summary.clone()),
        filament_weight_grams: Set(parsed.metadata.filament_weight_grams),
        layer_height_mm: Set(parsed.metadata.layer_height_mm),
        infill_percent: Set(parsed.metadata.infill_percent),
        nozzle_temp_c: Set(parsed.metadata.nozzle_temp_c),
        bed_temp_c: Set(parsed.metadata.bed_temp_c),
        plate_copies: Set(parsed.metadata.plate_copies.map(|c| c as i32)),
        dedicated: Set(true),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    organization::Entity::update_many()
        .col_expr(
            organization::Column::CurrentStorage,
            Expr::col(organization::Column::CurrentStorage).add(size),
        )
        .filter(organization::Column::Id.eq(organization_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(profile)
}

async fn find_conflicting(
    db: &DatabaseConnection,
    version_id: Uuid,
    normalized: &str,
) -> Result<Option<print_profile::Model>, sea_orm::DbErr> {
    print_profile::Entity::find()
        .filter(print_profile::Column::VersionId.eq(version_id))
        .filter(print_profile::Column::NormalizedPrinterName.eq(normalized))
        .one(db)
        .await
}

/// Internal error carrier for the per-file path; folded into per-file
/// outcomes or promoted to `AppError` at the service boundary.
#[derive(Debug, thiserror::Error)]
enum StorageOrDb {
    #[error("{0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Db(#[from] sea_orm::DbErr),
}

impl From<StorageOrDb> for AppError {
    fn from(err: StorageOrDb) -> Self {
        match err {
            StorageOrDb::Storage(e) => e.into(),
            StorageOrDb::Db(e) => e.into(),
        }
    }
}
