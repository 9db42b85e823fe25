//! Version ingestion pipeline.
//!
//! Ordering is the consistency mechanism: validate, reserve the label,
//! upload every object, then write all metadata in one transaction. Any
//! failure after the first upload unwinds the accumulated storage writes in
//! reverse. The post-commit auto-parse step is advisory and can never fail
//! the version it runs for.

mod rollback;

pub use rollback::CleanupStack;

use chrono::Utc;
use common::storage::{ObjectKind, ObjectStore, StorageError, object_key};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::ExprTrait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QuerySelect, Set, TransactionTrait,
};
use sha2::{Digest, Sha256};
use slicer::{ParseOutcome, parse_container};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::entity::{model, model_file, model_version, organization, print_profile};
use crate::utils::filename::{self, StoredName};
use crate::utils::version_label;

/// Extension identifying slicer project files.
pub const SLICER_EXTENSION: &str = "3mf";

/// Accepted preview image extensions for caller-supplied thumbnails.
const PREVIEW_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// One file of an upload batch, fully buffered.
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct AddVersionInput {
    pub model_id: Uuid,
    pub organization_id: Uuid,
    pub actor_id: Uuid,
    pub display_name: Option<String>,
    pub changelog: Option<String>,
    pub files: Vec<IncomingFile>,
    pub preview_image: Option<IncomingFile>,
    pub ip: Option<String>,
}

/// Feature switches for callers that want a reduced pipeline. The
/// programmatic upload surface turns thumbnail derivation off; everything
/// else behaves identically for every entry point.
#[derive(Clone, Copy)]
pub struct IngestOptions {
    pub derive_thumbnail: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            derive_thumbnail: true,
        }
    }
}

pub struct AddVersionOutcome {
    pub version: model_version::Model,
    pub files: Vec<model_file::Model>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no files were provided")]
    EmptyUpload,
    #[error("{reason} ({filename})")]
    InvalidFilename {
        filename: String,
        reason: &'static str,
    },
    #[error("unsupported file type '.{extension}' ({filename})")]
    UnsupportedType {
        filename: String,
        extension: String,
    },
    #[error("file '{filename}' is {size} bytes, over the {limit} byte limit for .{extension}")]
    FileTooLarge {
        filename: String,
        extension: String,
        size: u64,
        limit: u64,
    },
    /// Covers both a missing model and one owned by another tenant.
    #[error("model not found or access denied")]
    NotFoundOrDenied,
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] DbErr),
}

/// A file uploaded to object storage, awaiting its metadata row.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub storage_key: String,
    pub storage_bucket: String,
    pub stored_filename: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub extension: String,
    pub size: u64,
    /// Hex SHA-256 of the uploaded bytes, kept in the audit metadata.
    pub sha256: String,
}

/// Hex SHA-256 digest of an upload.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Create a new version from a batch of uploaded files.
///
/// Steps 1-4 (validate, reserve label, upload, persist) are all-or-nothing
/// from the caller's perspective via compensating deletes; the auto-parse
/// step afterwards is best-effort.
#[instrument(skip(db, store, upload_cfg, input, options), fields(model_id = %input.model_id))]
pub async fn add_version(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    bucket: &str,
    upload_cfg: &UploadConfig,
    input: AddVersionInput,
    options: IngestOptions,
) -> Result<AddVersionOutcome, IngestError> {
    validate_input(&input, upload_cfg)?;

    // Reserve the label under a row lock before any storage I/O; a failed
    // attempt leaves a gap, never a duplicate.
    let (model, label) = reserve_label(db, input.model_id, input.organization_id).await?;

    let (records, mut cleanup) = upload_batch(
        store,
        bucket,
        model.organization_id,
        model.id,
        &label,
        &input.files,
    )
    .await?;

    let thumbnail_key = match resolve_thumbnail(
        store,
        model.organization_id,
        model.id,
        &label,
        &input,
        options,
        &mut cleanup,
    )
    .await
    {
        Ok(key) => key,
        Err(err) => {
            cleanup.unwind(store).await;
            return Err(err);
        }
    };

    let outcome = match persist_version(db, &model, &label, thumbnail_key, &records, &input).await {
        Ok(outcome) => outcome,
        Err(err) => {
            cleanup.unwind(store).await;
            return Err(IngestError::Persistence(err));
        }
    };

    info!(label = %label, files = outcome.files.len(), "version created");

    auto_parse(
        db,
        store,
        model.organization_id,
        model.id,
        &label,
        outcome.version.id,
        &outcome.files,
        &input.files,
    )
    .await;

    Ok(outcome)
}

/// Append a single file to an existing version. Used by the programmatic
/// upload surface; shares key naming, upload, compensation, and auto-parse
/// with the batch pipeline.
#[instrument(skip(db, store, upload_cfg, file), fields(model_id = %model_id, label = %label))]
pub async fn append_file(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    bucket: &str,
    upload_cfg: &UploadConfig,
    organization_id: Uuid,
    actor_id: Uuid,
    model_id: Uuid,
    label: &str,
    file: IncomingFile,
    ip: Option<String>,
) -> Result<model_file::Model, IngestError> {
    validate_file(&file, upload_cfg)?;

    let model = find_owned_model(db, model_id, organization_id).await?;
    let version = model_version::Entity::find()
        .filter(model_version::Column::ModelId.eq(model.id))
        .filter(model_version::Column::Label.eq(label))
        .one(db)
        .await?
        .ok_or(IngestError::NotFoundOrDenied)?;

    let (records, cleanup) = upload_batch(
        store,
        bucket,
        model.organization_id,
        model.id,
        label,
        std::slice::from_ref(&file),
    )
    .await?;

    let persisted = match insert_file_rows(
        db,
        version.id,
        model.organization_id,
        &records,
        actor_id,
        ip,
    )
    .await
    {
        Ok(mut rows) => rows.remove(0),
        Err(err) => {
            debug!(key = %records[0].storage_key, "metadata write failed; compensating");
            cleanup.unwind(store).await;
            return Err(IngestError::Persistence(err));
        }
    };

    auto_parse(
        db,
        store,
        model.organization_id,
        model.id,
        label,
        version.id,
        std::slice::from_ref(&persisted),
        std::slice::from_ref(&file),
    )
    .await;

    Ok(persisted)
}

/// Load a model row enforcing tenant ownership and liveness. Missing and
/// foreign rows are indistinguishable to the caller.
pub async fn find_owned_model(
    db: &DatabaseConnection,
    model_id: Uuid,
    organization_id: Uuid,
) -> Result<model::Model, IngestError> {
    model::Entity::find_by_id(model_id)
        .filter(model::Column::OrganizationId.eq(organization_id))
        .filter(model::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or(IngestError::NotFoundOrDenied)
}

fn validate_input(input: &AddVersionInput, cfg: &UploadConfig) -> Result<(), IngestError> {
    if input.files.is_empty() {
        return Err(IngestError::EmptyUpload);
    }
    for file in &input.files {
        validate_file(file, cfg)?;
    }
    if let Some(preview) = &input.preview_image {
        validate_preview(preview, cfg)?;
    }
    Ok(())
}

fn validate_file(file: &IncomingFile, cfg: &UploadConfig) -> Result<(), IngestError> {
    let (name, extension) = checked_name_and_extension(&file.original_name)?;
    let limit = cfg
        .limit_for(&extension)
        .ok_or_else(|| IngestError::UnsupportedType {
            filename: name.to_string(),
            extension: extension.clone(),
        })?;

    let size = file.bytes.len() as u64;
    if size > limit {
        return Err(IngestError::FileTooLarge {
            filename: name.to_string(),
            extension,
            size,
            limit,
        });
    }
    Ok(())
}

fn validate_preview(preview: &IncomingFile, cfg: &UploadConfig) -> Result<(), IngestError> {
    let (name, extension) = checked_name_and_extension(&preview.original_name)?;
    if !PREVIEW_EXTENSIONS.contains(&extension.as_str()) {
        return Err(IngestError::UnsupportedType {
            filename: name.to_string(),
            extension,
        });
    }
    let size = preview.bytes.len() as u64;
    if size > cfg.max_preview_size {
        return Err(IngestError::FileTooLarge {
            filename: name.to_string(),
            extension,
            size,
            limit: cfg.max_preview_size,
        });
    }
    Ok(())
}

fn checked_name_and_extension(original: &str) -> Result<(&str, String), IngestError> {
    let name = filename::validate_upload_filename(original).map_err(|e| {
        IngestError::InvalidFilename {
            filename: original.to_string(),
            reason: e.message(),
        }
    })?;
    let (_, extension) =
        filename::split_extension(name).map_err(|e| IngestError::InvalidFilename {
            filename: original.to_string(),
            reason: e.message(),
        })?;
    Ok((name, extension))
}

/// Reserve the next version label by bumping `version_seq` under a row
/// lock. Returns the refreshed model row and the label.
async fn reserve_label(
    db: &DatabaseConnection,
    model_id: Uuid,
    organization_id: Uuid,
) -> Result<(model::Model, String), IngestError> {
    use sea_orm::sea_query::LockType;

    let txn = db.begin().await?;

    let found = model::Entity::find_by_id(model_id)
        .filter(model::Column::OrganizationId.eq(organization_id))
        .filter(model::Column::DeletedAt.is_null())
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(IngestError::NotFoundOrDenied)?;

    // The sequence is authoritative, but a label ahead of it (imported
    // data, manual fixes) must not be reissued.
    let next = version_label::next_number(found.current_version.as_deref())
        .max(found.version_seq.saturating_add(1));

    let mut active = found.clone().into_active_model();
    active.version_seq = Set(next);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    Ok((updated, version_label::format(next)))
}

/// Upload every file of the batch sequentially. Stops at the first failed
/// upload, unwinds the files already written, and rethrows; on success the
/// caller owns the returned stack for later compensation.
pub async fn upload_batch(
    store: &dyn ObjectStore,
    bucket: &str,
    organization_id: Uuid,
    model_id: Uuid,
    label: &str,
    files: &[IncomingFile],
) -> Result<(Vec<UploadedFile>, CleanupStack), IngestError> {
    let mut cleanup = CleanupStack::new();
    let mut records = Vec::with_capacity(files.len());

    for file in files {
        let StoredName { stored, extension } = match filename::stored_filename(&file.original_name)
        {
            Ok(name) => name,
            Err(e) => {
                cleanup.unwind(store).await;
                return Err(IngestError::InvalidFilename {
                    filename: file.original_name.clone(),
                    reason: e.message(),
                });
            }
        };

        let kind = if extension == SLICER_EXTENSION {
            ObjectKind::Slicer
        } else {
            ObjectKind::Source
        };
        let key = object_key(organization_id, model_id, label, kind, &stored);

        let content_type = file
            .content_type
            .clone()
            .or_else(|| guess_content_type(&file.original_name));

        let upload = store
            .upload(
                &key,
                &file.bytes,
                content_type.as_deref().unwrap_or("application/octet-stream"),
            )
            .await;

        match upload {
            Ok(receipt) => {
                cleanup.push(key.clone());
                records.push(UploadedFile {
                    storage_key: key,
                    storage_bucket: bucket.to_string(),
                    stored_filename: stored,
                    original_name: file.original_name.trim().to_string(),
                    content_type,
                    extension,
                    size: receipt.size,
                    sha256: content_digest(&file.bytes),
                });
            }
            Err(err) => {
                warn!(key = %key, error = %err, "upload failed; compensating batch");
                cleanup.unwind(store).await;
                return Err(IngestError::Storage(err));
            }
        }
    }

    Ok((records, cleanup))
}

fn guess_content_type(name: &str) -> Option<String> {
    mime_guess::from_path(name).first().map(|m| m.to_string())
}

/// Resolve the version thumbnail: a caller-supplied preview wins; otherwise
/// try the first 3MF's embedded thumbnail. Parser failures are swallowed
/// ("no thumbnail"); upload failures are real storage errors.
#[allow(clippy::too_many_arguments)]
async fn resolve_thumbnail(
    store: &dyn ObjectStore,
    organization_id: Uuid,
    model_id: Uuid,
    label: &str,
    input: &AddVersionInput,
    options: IngestOptions,
    cleanup: &mut CleanupStack,
) -> Result<Option<String>, IngestError> {
    if let Some(preview) = &input.preview_image {
        let stored = filename::stored_filename(&preview.original_name).map_err(|e| {
            IngestError::InvalidFilename {
                filename: preview.original_name.clone(),
                reason: e.message(),
            }
        })?;
        let key = object_key(
            organization_id,
            model_id,
            label,
            ObjectKind::Artifact,
            &stored.stored,
        );
        let content_type = preview
            .content_type
            .clone()
            .or_else(|| guess_content_type(&preview.original_name))
            .unwrap_or_else(|| "image/png".to_string());
        store.upload(&key, &preview.bytes, &content_type).await?;
        cleanup.push(key.clone());
        return Ok(Some(key));
    }

    if !options.derive_thumbnail {
        return Ok(None);
    }

    let Some(project) = input.files.iter().find(|f| {
        filename::split_extension(f.original_name.trim())
            .map(|(_, ext)| ext == SLICER_EXTENSION)
            .unwrap_or(false)
    }) else {
        return Ok(None);
    };

    let profile = match parse_container(&project.bytes) {
        ParseOutcome::Parsed(profile) => profile,
        ParseOutcome::UnknownFormat => {
            debug!(file = %project.original_name, "unrecognized slicer dialect; no thumbnail");
            return Ok(None);
        }
        ParseOutcome::ParseError(msg) => {
            warn!(file = %project.original_name, error = %msg, "thumbnail extraction failed");
            return Ok(None);
        }
    };
    let Some(thumbnail) = profile.thumbnail else {
        return Ok(None);
    };

    let key = object_key(
        organization_id,
        model_id,
        label,
        ObjectKind::Artifact,
        &format!("preview-{}.png", filename::random_suffix()),
    );
    store.upload(&key, &thumbnail, "image/png").await?;
    cleanup.push(key.clone());
    Ok(Some(key))
}

/// Write the version row, its file rows, and the model pointer/counters in
/// one transaction.
async fn persist_version(
    db: &DatabaseConnection,
    model: &model::Model,
    label: &str,
    thumbnail_key: Option<String>,
    records: &[UploadedFile],
    input: &AddVersionInput,
) -> Result<AddVersionOutcome, DbErr> {
    let txn = db.begin().await?;
    let now = Utc::now();

    let version = model_version::ActiveModel {
        id: Set(Uuid::now_v7()),
        model_id: Set(model.id),
        label: Set(label.to_string()),
        name: Set(input.display_name.clone()),
        changelog: Set(input.changelog.clone()),
        thumbnail_key: Set(thumbnail_key),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut files = Vec::with_capacity(records.len());
    for record in records {
        let audit = model_file::FileAudit {
            uploaded_by: input.actor_id,
            uploaded_at: now,
            ip: input.ip.clone(),
            sha256: record.sha256.clone(),
            processed: false,
        };
        let file = model_file::ActiveModel {
            id: Set(Uuid::now_v7()),
            version_id: Set(version.id),
            stored_filename: Set(record.stored_filename.clone()),
            original_filename: Set(record.original_name.clone()),
            size: Set(record.size as i64),
            content_type: Set(record.content_type.clone()),
            extension: Set(record.extension.clone()),
            storage_key: Set(record.storage_key.clone()),
            storage_bucket: Set(record.storage_bucket.clone()),
            metadata: Set(audit.to_json()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        files.push(file);
    }

    model::Entity::update_many()
        .col_expr(model::Column::CurrentVersion, Expr::value(label.to_string()))
        .col_expr(
            model::Column::TotalVersions,
            Expr::col(model::Column::TotalVersions).add(1),
        )
        .col_expr(model::Column::UpdatedAt, Expr::value(now))
        .filter(model::Column::Id.eq(model.id))
        .exec(&txn)
        .await?;

    let added_bytes: i64 = records.iter().map(|r| r.size as i64).sum();
    organization::Entity::update_many()
        .col_expr(
            organization::Column::CurrentStorage,
            Expr::col(organization::Column::CurrentStorage).add(added_bytes),
        )
        .filter(organization::Column::Id.eq(model.organization_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    Ok(AddVersionOutcome { version, files })
}

/// Insert file rows (plus the org storage counter bump) for an append to
/// an existing version.
async fn insert_file_rows(
    db: &DatabaseConnection,
    version_id: Uuid,
    organization_id: Uuid,
    records: &[UploadedFile],
    actor_id: Uuid,
    ip: Option<String>,
) -> Result<Vec<model_file::Model>, DbErr> {
    let txn = db.begin().await?;
    let now = Utc::now();

    let mut files = Vec::with_capacity(records.len());
    for record in records {
        let audit = model_file::FileAudit {
            uploaded_by: actor_id,
            uploaded_at: now,
            ip: ip.clone(),
            sha256: record.sha256.clone(),
            processed: false,
        };
        let file = model_file::ActiveModel {
            id: Set(Uuid::now_v7()),
            version_id: Set(version_id),
            stored_filename: Set(record.stored_filename.clone()),
            original_filename: Set(record.original_name.clone()),
            size: Set(record.size as i64),
            content_type: Set(record.content_type.clone()),
            extension: Set(record.extension.clone()),
            storage_key: Set(record.storage_key.clone()),
            storage_bucket: Set(record.storage_bucket.clone()),
            metadata: Set(audit.to_json()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        files.push(file);
    }

    let added_bytes: i64 = records.iter().map(|r| r.size as i64).sum();
    organization::Entity::update_many()
        .col_expr(
            organization::Column::CurrentStorage,
            Expr::col(organization::Column::CurrentStorage).add(added_bytes),
        )
        .filter(organization::Column::Id.eq(organization_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(files)
}

/// Post-commit best-effort pass: extract a print profile from every 3MF in
/// the batch, reusing the already-persisted file rows. A version must not
/// fail to exist because its slicer metadata couldn't be read, so every
/// failure here is logged and dropped.
#[allow(clippy::too_many_arguments)]
async fn auto_parse(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    organization_id: Uuid,
    model_id: Uuid,
    label: &str,
    version_id: Uuid,
    files: &[model_file::Model],
    payloads: &[IncomingFile],
) {
    let mut taken = match existing_normalized_names(db, version_id).await {
        Ok(names) => names,
        Err(err) => {
            warn!(error = %err, "auto-parse skipped: could not load existing profiles");
            return;
        }
    };

    for (row, payload) in files.iter().zip(payloads) {
        if row.extension != SLICER_EXTENSION {
            continue;
        }

        let parsed = match parse_container(&payload.bytes) {
            ParseOutcome::Parsed(profile) => profile,
            ParseOutcome::UnknownFormat => {
                debug!(file = %row.original_filename, "auto-parse: unrecognized dialect");
                mark_processed(db, row).await;
                continue;
            }
            ParseOutcome::ParseError(msg) => {
                warn!(file = %row.original_filename, error = %msg, "auto-parse failed");
                mark_processed(db, row).await;
                continue;
            }
        };

        if taken.contains(&parsed.normalized_printer_name) {
            debug!(
                printer = %parsed.printer_name,
                "auto-parse: printer already profiled in this version"
            );
            mark_processed(db, row).await;
            continue;
        }

        let thumbnail_key = match &parsed.thumbnail {
            Some(bytes) => {
                let key = object_key(
                    organization_id,
                    model_id,
                    label,
                    ObjectKind::Artifact,
                    &format!("profile-{}.png", filename::random_suffix()),
                );
                match store.upload(&key, bytes, "image/png").await {
                    Ok(_) => Some(key),
                    Err(err) => {
                        warn!(error = %err, "auto-parse: thumbnail upload failed");
                        None
                    }
                }
            }
            None => None,
        };

        let insert = print_profile::ActiveModel {
            id: Set(Uuid::now_v7()),
            version_id: Set(version_id),
            model_file_id: Set(row.id),
            printer_name: Set(parsed.printer_name.clone()),
            normalized_printer_name: Set(parsed.normalized_printer_name.clone()),
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
            dedicated: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await;

        match insert {
            Ok(_) => {
                info!(
                    file = %row.original_filename,
                    printer = %parsed.printer_name,
                    slicer = %parsed.slicer,
                    "print profile extracted"
                );
                taken.push(parsed.normalized_printer_name);
            }
            Err(err) => warn!(error = %err, "auto-parse: profile insert failed"),
        }
        mark_processed(db, row).await;
    }
}

/// Normalized printer names already present in a version.
pub async fn existing_normalized_names(
    db: &DatabaseConnection,
    version_id: Uuid,
) -> Result<Vec<String>, DbErr> {
    print_profile::Entity::find()
        .filter(print_profile::Column::VersionId.eq(version_id))
        .select_only()
        .column(print_profile::Column::NormalizedPrinterName)
        .into_tuple::<String>()
        .all(db)
        .await
}

/// Flip the audit `processed` flag after the auto-parse pass looked at a
/// file, successfully or not.
async fn mark_processed(db: &DatabaseConnection, row: &model_file::Model) {
    let mut audit = serde_json::from_value::<model_file::FileAudit>(row.metadata.clone())
        .unwrap_or(model_file::FileAudit {
            uploaded_by: Uuid::nil(),
            uploaded_at: row.created_at,
            ip: None,
            sha256: String::new(),
            processed: false,
        });
    audit.processed = true;

    let mut active = row.clone().into_active_model();
    active.metadata = Set(audit.to_json());
    if let Err(err) = active.update(db).await {
        warn!(error = %err, "failed to mark file as processed");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use common::storage::memory::InMemoryObjectStore;
    use common::storage::{
        ObjectMetadata, StoredObject, UploadReceipt, version_prefix,
    };
    use zip::write::SimpleFileOptions;

    use super::*;

    fn upload_cfg() -> UploadConfig {
        UploadConfig {
            limits: HashMap::from([
                ("stl".to_string(), 1024),
                ("3mf".to_string(), 4096),
                ("obj".to_string(), 1024),
            ]),
            max_preview_size: 512,
        }
    }

    fn file(name: &str, size: usize) -> IncomingFile {
        IncomingFile {
            original_name: name.to_string(),
            content_type: None,
            bytes: vec![0u8; size],
        }
    }

    fn input(files: Vec<IncomingFile>) -> AddVersionInput {
        AddVersionInput {
            model_id: Uuid::now_v7(),
            organization_id: Uuid::now_v7(),
            actor_id: Uuid::now_v7(),
            display_name: None,
            changelog: Some("initial release".into()),
            files,
            preview_image: None,
            ip: None,
        }
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            validate_input(&input(vec![]), &upload_cfg()),
            Err(IngestError::EmptyUpload)
        ));
    }

    #[test]
    fn unsupported_extension_names_the_file() {
        let err = validate_input(&input(vec![file("malware.exe", 10)]), &upload_cfg())
            .unwrap_err();
        match err {
            IngestError::UnsupportedType {
                filename,
                extension,
            } => {
                assert_eq!(filename, "malware.exe");
                assert_eq!(extension, "exe");
            }
            other => panic!("expected UnsupportedType, got {other:?}"),
        }
    }

    #[test]
    fn oversized_file_rejects_whole_batch_before_any_upload() {
        // A valid .obj next to an oversized .stl: validation fails on the
        // batch as a unit, naming the offender with both numbers.
        let err = validate_input(
            &input(vec![file("ok.obj", 10), file("big.stl", 2048)]),
            &upload_cfg(),
        )
        .unwrap_err();
        match err {
            IngestError::FileTooLarge {
                filename,
                extension,
                size,
                limit,
            } => {
                assert_eq!(filename, "big.stl");
                assert_eq!(extension, "stl");
                assert_eq!(size, 2048);
                assert_eq!(limit, 1024);
            }
            other => panic!("expected FileTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn preview_image_type_is_checked() {
        let mut with_preview = input(vec![file("part.stl", 10)]);
        with_preview.preview_image = Some(file("preview.stl", 10));
        assert!(matches!(
            validate_input(&with_preview, &upload_cfg()),
            Err(IngestError::UnsupportedType { .. })
        ));

        let mut ok = input(vec![file("part.stl", 10)]);
        ok.preview_image = Some(file("preview.png", 10));
        assert!(validate_input(&ok, &upload_cfg()).is_ok());
    }

    #[tokio::test]
    async fn upload_batch_places_files_under_kind_segments() {
        let store = InMemoryObjectStore::new();
        let org = Uuid::now_v7();
        let model = Uuid::now_v7();

        let files = vec![file("part.stl", 16), file("project.3mf", 32)];
        let (records, cleanup) = upload_batch(&store, "vault", org, model, "v1", &files)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(cleanup.len(), 2);
        assert!(records[0].storage_key.contains("/v1/sources/"));
        assert!(records[1].storage_key.contains("/v1/slicer/"));
        assert_eq!(records[0].size, 16);
        assert_eq!(records[1].storage_bucket, "vault");

        let keys = store.keys_with_prefix(&version_prefix(org, model, "v1")).await;
        assert_eq!(keys.len(), 2);
    }

    /// Store that fails the Nth upload.
    struct FailingStore {
        inner: InMemoryObjectStore,
        fail_at: usize,
        uploads: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn upload(
            &self,
            key: &str,
            data: &[u8],
            content_type: &str,
        ) -> Result<UploadReceipt, StorageError> {
            let n = self.uploads.fetch_add(1, Ordering::SeqCst);
            if n == self.fail_at {
                return Err(StorageError::Backend("simulated upload failure".into()));
            }
            self.inner.upload(key, data, content_type).await
        }

        async fn get_bytes(&self, key: &str) -> Result<StoredObject, StorageError> {
            self.inner.get_bytes(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.inner.delete(key).await
        }

        async fn exists(&self, key: &str) -> Result<bool, StorageError> {
            self.inner.exists(key).await
        }

        async fn head(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
            self.inner.head(key).await
        }

        async fn presign_download(
            &self,
            key: &str,
            ttl_minutes: u32,
        ) -> Result<String, StorageError> {
            self.inner.presign_download(key, ttl_minutes).await
        }
    }

    #[tokio::test]
    async fn failed_upload_compensates_earlier_files() {
        let store = FailingStore {
            inner: InMemoryObjectStore::new(),
            fail_at: 2,
            uploads: AtomicUsize::new(0),
        };
        let org = Uuid::now_v7();
        let model = Uuid::now_v7();

        let files = vec![
            file("one.stl", 8),
            file("two.obj", 8),
            file("three.stl", 8),
        ];
        let err = upload_batch(&store, "vault", org, model, "v2", &files)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Storage(_)));

        // Everything uploaded before the failure was deleted again: the
        // version prefix is empty.
        let leftovers = store
            .inner
            .keys_with_prefix(&version_prefix(org, model, "v2"))
            .await;
        assert!(leftovers.is_empty(), "orphaned objects: {leftovers:?}");
    }

    #[tokio::test]
    async fn metadata_failure_unwind_leaves_prefix_empty() {
        // Every storage write of the attempt succeeded, then the metadata
        // transaction fails: unwinding the stack clears the whole version
        // prefix, files and thumbnail alike.
        let store = InMemoryObjectStore::new();
        let (org, model) = (Uuid::now_v7(), Uuid::now_v7());

        let mut batch = input(vec![file("part.stl", 16), file("shell.obj", 8)]);
        batch.preview_image = Some(IncomingFile {
            original_name: "cover.png".into(),
            content_type: Some("image/png".into()),
            bytes: vec![9u8; 32],
        });

        let (_, mut cleanup) = upload_batch(&store, "vault", org, model, "v7", &batch.files)
            .await
            .unwrap();
        resolve_thumbnail(
            &store,
            org,
            model,
            "v7",
            &batch,
            IngestOptions::default(),
            &mut cleanup,
        )
        .await
        .unwrap();
        assert_eq!(store.object_count().await, 3);

        cleanup.unwind(&store).await;
        let leftovers = store
            .keys_with_prefix(&version_prefix(org, model, "v7"))
            .await;
        assert!(leftovers.is_empty(), "orphaned objects: {leftovers:?}");
    }

    fn bambu_3mf_with_thumbnail() -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file("3D/3dmodel.model", options).unwrap();
        writer
            .write_all(
                br#"<model><metadata name="Application">BambuStudio-01.08</metadata></model>"#,
            )
            .unwrap();
        writer
            .start_file("Metadata/project_settings.config", options)
            .unwrap();
        writer
            .write_all(br#"{"printer_model": "Bambu Lab X1 Carbon"}"#)
            .unwrap();
        writer.start_file("Metadata/plate_1.png", options).unwrap();
        writer.write_all(b"\x89PNG thumbnail bytes").unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn thumbnail_prefers_caller_preview() {
        let store = InMemoryObjectStore::new();
        let (org, model) = (Uuid::now_v7(), Uuid::now_v7());
        let mut cleanup = CleanupStack::new();

        let mut with_preview = input(vec![file("part.stl", 10)]);
        with_preview.preview_image = Some(IncomingFile {
            original_name: "cover.png".into(),
            content_type: Some("image/png".into()),
            bytes: vec![1, 2, 3],
        });

        let key = resolve_thumbnail(
            &store,
            org,
            model,
            "v1",
            &with_preview,
            IngestOptions::default(),
            &mut cleanup,
        )
        .await
        .unwrap()
        .expect("preview should produce a key");

        assert!(key.contains("/v1/artifacts/"));
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(cleanup.len(), 1);
    }

    #[tokio::test]
    async fn thumbnail_extracted_from_first_project_file() {
        let store = InMemoryObjectStore::new();
        let (org, model) = (Uuid::now_v7(), Uuid::now_v7());
        let mut cleanup = CleanupStack::new();

        let batch = input(vec![
            file("part.stl", 10),
            IncomingFile {
                original_name: "project.3mf".into(),
                content_type: None,
                bytes: bambu_3mf_with_thumbnail(),
            },
        ]);

        let key = resolve_thumbnail(
            &store,
            org,
            model,
            "v4",
            &batch,
            IngestOptions::default(),
            &mut cleanup,
        )
        .await
        .unwrap()
        .expect("embedded thumbnail should be extracted");

        let object = store.get_bytes(&key).await.unwrap();
        assert_eq!(object.bytes, b"\x89PNG thumbnail bytes");
    }

    #[tokio::test]
    async fn thumbnail_derivation_can_be_disabled() {
        let store = InMemoryObjectStore::new();
        let (org, model) = (Uuid::now_v7(), Uuid::now_v7());
        let mut cleanup = CleanupStack::new();

        let batch = input(vec![IncomingFile {
            original_name: "project.3mf".into(),
            content_type: None,
            bytes: bambu_3mf_with_thumbnail(),
        }]);

        let key = resolve_thumbnail(
            &store,
            org,
            model,
            "v1",
            &batch,
            IngestOptions {
                derive_thumbnail: false,
            },
            &mut cleanup,
        )
        .await
        .unwrap();
        assert!(key.is_none());
        assert_eq!(store.object_count().await, 0);
    }

    #[tokio::test]
    async fn malformed_project_file_means_no_thumbnail_not_failure() {
        let store = InMemoryObjectStore::new();
        let (org, model) = (Uuid::now_v7(), Uuid::now_v7());
        let mut cleanup = CleanupStack::new();

        let batch = input(vec![IncomingFile {
            original_name: "broken.3mf".into(),
            content_type: None,
            bytes: b"not a zip at all".to_vec(),
        }]);

        let key = resolve_thumbnail(
            &store,
            org,
            model,
            "v1",
            &batch,
            IngestOptions::default(),
            &mut cleanup,
        )
        .await
        .unwrap();
        assert!(key.is_none());
        assert!(cleanup.is_empty());
    }
}
