use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "model")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub organization_id: Uuid,
    #[sea_orm(belongs_to, from = "organization_id", to = "id")]
    pub organization: HasOne<super::organization::Entity>,

    pub name: String,

    /// Immutable URL slug, unique within the organization.
    pub slug: String,

    pub description: Option<String>,

    /// Label of the most recently created version (`v<N>`). NULL until the
    /// first version lands.
    pub current_version: Option<String>,

    /// Monotonic label sequence. Reserved with a row lock before any
    /// storage I/O begins, so two concurrent uploads can never compute the
    /// same label. A failed upload leaves a gap; labels are never reused.
    pub version_seq: i32,

    /// Count of committed versions. Unlike `version_seq`, this only moves
    /// when the ingestion transaction commits.
    pub total_versions: i32,

    #[sea_orm(has_many)]
    pub versions: HasMany<super::model_version::Entity>,

    /// Soft-delete marker; rows and objects are retained.
    pub deleted_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
