pub mod archive;
pub mod model;
pub mod profile;
pub mod upload;
pub mod version;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entity::{model, model_version};
use crate::error::AppError;
use crate::ingest;

/// Load a model enforcing tenant ownership; missing and foreign rows are
/// reported identically.
pub(crate) async fn find_owned_model(
    db: &DatabaseConnection,
    organization_id: Uuid,
    model_id: Uuid,
) -> Result<model::Model, AppError> {
    ingest::find_owned_model(db, model_id, organization_id)
        .await
        .map_err(|_| AppError::NotFound("Model not found".into()))
}

/// Load a version by id and verify the chain up to the tenant.
pub(crate) async fn find_owned_version(
    db: &DatabaseConnection,
    organization_id: Uuid,
    version_id: Uuid,
) -> Result<(model::Model, model_version::Model), AppError> {
    let version = model_version::Entity::find_by_id(version_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Version not found".into()))?;
    let model = ingest::find_owned_model(db, version.model_id, organization_id)
        .await
        .map_err(|_| AppError::NotFound("Version not found".into()))?;
    Ok((model, version))
}

/// Load a version by model and label, tenant-checked.
pub(crate) async fn find_owned_version_by_label(
    db: &DatabaseConnection,
    organization_id: Uuid,
    model_id: Uuid,
    label: &str,
) -> Result<(model::Model, model_version::Model), AppError> {
    let model = find_owned_model(db, organization_id, model_id).await?;
    let version = model_version::Entity::find()
        .filter(model_version::Column::ModelId.eq(model.id))
        .filter(model_version::Column::Label.eq(label))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Version not found".into()))?;
    Ok((model, version))
}
