use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organization")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,

    /// Denormalized byte total across all live model files. Advisory only:
    /// limit decisions must re-derive from a live aggregate query.
    pub current_storage: i64,

    /// Denormalized count of non-deleted models. Advisory, see above.
    pub current_model_count: i32,

    #[sea_orm(has_many)]
    pub models: HasMany<super::model::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
