use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An immutable, labeled snapshot of files. Only `name` and `changelog`
/// may change after creation; the file set never does.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "model_version")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub model_id: Uuid,
    #[sea_orm(belongs_to, from = "model_id", to = "id")]
    pub model: HasOne<super::model::Entity>,

    /// `v<N>`, strictly increasing per model, never reused.
    pub label: String,

    /// Optional display name shown alongside the label.
    pub name: Option<String>,

    pub changelog: Option<String>,

    /// Storage key of the preview thumbnail, when one exists.
    pub thumbnail_key: Option<String>,

    #[sea_orm(has_many)]
    pub files: HasMany<super::model_file::Entity>,

    #[sea_orm(has_many)]
    pub profiles: HasMany<super::print_profile::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
