use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{ExprTrait, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use crate::entity::{model, model_file, model_version, organization};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::extractors::tenant::TenantContext;
use crate::models::model::{
    CreateModelRequest, ModelListResponse, ModelResponse, UpdateModelRequest, UsageResponse,
};
use crate::state::AppState;
use crate::utils::filename::{random_suffix, slugify};

use super::find_owned_model;

#[utoipa::path(
    post,
    path = "/",
    tag = "Models",
    operation_id = "createModel",
    summary = "Create a model",
    description = "Creates an empty model. The URL slug is derived from the name once and never \
        changes; a random suffix is appended when the slug is already taken in the organization.",
    request_body = CreateModelRequest,
    responses(
        (status = 201, description = "Model created", body = ModelResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Missing tenant context (TENANT_MISSING)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant, payload), fields(org = %tenant.organization_id))]
pub async fn create_model(
    tenant: TenantContext,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateModelRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = payload.name.trim().to_string();
    if name.is_empty() || name.len() > 120 {
        return Err(AppError::Validation(
            "Model name must be 1-120 characters".into(),
        ));
    }

    let base_slug = slugify(&name);
    let slug_taken = model::Entity::find()
        .filter(model::Column::OrganizationId.eq(tenant.organization_id))
        .filter(model::Column::Slug.eq(&base_slug))
        .one(&state.db)
        .await?
        .is_some();
    let slug = if slug_taken {
        format!("{base_slug}-{}", random_suffix())
    } else {
        base_slug
    };

    let now = Utc::now();
    let txn = state.db.begin().await?;

    ensure_organization(&txn, tenant.organization_id).await?;

    let created = model::ActiveModel {
        id: Set(Uuid::now_v7()),
        organization_id: Set(tenant.organization_id),
        name: Set(name),
        slug: Set(slug),
        description: Set(payload.description),
        current_version: Set(None),
        version_seq: Set(0),
        total_versions: Set(0),
        deleted_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    organization::Entity::update_many()
        .col_expr(
            organization::Column::CurrentModelCount,
            Expr::col(organization::Column::CurrentModelCount).add(1),
        )
        .filter(organization::Column::Id.eq(tenant.organization_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(ModelResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Models",
    operation_id = "listModels",
    summary = "List the organization's models",
    responses(
        (status = 200, description = "Model list", body = ModelListResponse),
        (status = 401, description = "Missing tenant context (TENANT_MISSING)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant))]
pub async fn list_models(
    tenant: TenantContext,
    State(state): State<AppState>,
) -> Result<Json<ModelListResponse>, AppError> {
    let rows = model::Entity::find()
        .filter(model::Column::OrganizationId.eq(tenant.organization_id))
        .filter(model::Column::DeletedAt.is_null())
        .order_by_desc(model::Column::UpdatedAt)
        .all(&state.db)
        .await?;

    let total = rows.len() as u64;
    Ok(Json(ModelListResponse {
        models: rows.into_iter().map(ModelResponse::from).collect(),
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Models",
    operation_id = "getModel",
    summary = "Get a model by ID",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Model details", body = ModelResponse),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant), fields(model_id = %id))]
pub async fn get_model(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ModelResponse>, AppError> {
    let found = find_owned_model(&state.db, tenant.organization_id, id).await?;
    Ok(Json(found.into()))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Models",
    operation_id = "updateModel",
    summary = "Rename a model or edit its description",
    description = "PATCH semantics; only provided fields change. The slug never does.",
    params(("id" = Uuid, Path, description = "Model ID")),
    request_body = UpdateModelRequest,
    responses(
        (status = 200, description = "Model updated", body = ModelResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant, payload), fields(model_id = %id))]
pub async fn update_model(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateModelRequest>,
) -> Result<Json<ModelResponse>, AppError> {
    let found = find_owned_model(&state.db, tenant.organization_id, id).await?;

    let mut active = found.into_active_model();
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() || name.len() > 120 {
            return Err(AppError::Validation(
                "Model name must be 1-120 characters".into(),
            ));
        }
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Models",
    operation_id = "deleteModel",
    summary = "Soft-delete a model",
    description = "Marks the model deleted. Versions, files, and objects are retained; the \
        organization's model counter is decremented.",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 204, description = "Model deleted"),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant), fields(model_id = %id))]
pub async fn delete_model(
    tenant: TenantContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let found = find_owned_model(&state.db, tenant.organization_id, id).await?;

    let txn = state.db.begin().await?;
    let mut active = found.into_active_model();
    active.deleted_at = Set(Some(Utc::now()));
    active.update(&txn).await?;

    organization::Entity::update_many()
        .col_expr(
            organization::Column::CurrentModelCount,
            Expr::col(organization::Column::CurrentModelCount).sub(1),
        )
        .filter(organization::Column::Id.eq(tenant.organization_id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/usage",
    tag = "Organizations",
    operation_id = "organizationUsage",
    summary = "Report usage counters and live aggregates",
    description = "The denormalized counters are advisory; any enforcement decision must use \
        the live aggregates reported next to them.",
    responses(
        (status = 200, description = "Usage report", body = UsageResponse),
        (status = 401, description = "Missing tenant context (TENANT_MISSING)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, tenant), fields(org = %tenant.organization_id))]
pub async fn organization_usage(
    tenant: TenantContext,
    State(state): State<AppState>,
) -> Result<Json<UsageResponse>, AppError> {
    let org = organization::Entity::find_by_id(tenant.organization_id)
        .one(&state.db)
        .await?;
    let (current_storage, current_model_count) = org
        .map(|o| (o.current_storage, o.current_model_count))
        .unwrap_or((0, 0));

    let model_ids: Vec<Uuid> = model::Entity::find()
        .filter(model::Column::OrganizationId.eq(tenant.organization_id))
        .filter(model::Column::DeletedAt.is_null())
        .select_only()
        .column(model::Column::Id)
        .into_tuple()
        .all(&state.db)
        .await?;
    let live_model_count = model_ids.len() as u64;

    let live_storage = if model_ids.is_empty() {
        0
    } else {
        let version_ids: Vec<Uuid> = model_version::Entity::find()
            .filter(model_version::Column::ModelId.is_in(model_ids))
            .select_only()
            .column(model_version::Column::Id)
            .into_tuple()
            .all(&state.db)
            .await?;
        if version_ids.is_empty() {
            0
        } else {
            let sizes: Vec<i64> = model_file::Entity::find()
                .filter(model_file::Column::VersionId.is_in(version_ids))
                .select_only()
                .column(model_file::Column::Size)
                .into_tuple()
                .all(&state.db)
                .await?;
            sizes.iter().sum()
        }
    };

    Ok(Json(UsageResponse {
        current_storage,
        current_model_count,
        live_storage,
        live_model_count,
    }))
}

/// Organizations are provisioned upstream; make sure the counter row
/// exists before touching it.
async fn ensure_organization<C: sea_orm::ConnectionTrait>(
    db: &C,
    organization_id: Uuid,
) -> Result<(), AppError> {
    let row = organization::ActiveModel {
        id: Set(organization_id),
        name: Set(format!("org-{organization_id}")),
        current_storage: Set(0),
        current_model_count: Set(0),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    organization::Entity::insert(row)
        .on_conflict(
            OnConflict::column(organization::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}
