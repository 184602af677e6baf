//! RepoCategory entity - maps a GitHub repository onto a forum category.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// RepoCategory model.
///
/// At most one row exists per `repo_id`. Rows created before the repository
/// id was known are matched by `repo_name` and then backfilled.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repo_categories")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// The category this repository mirrors into.
    #[sea_orm(unique)]
    pub category_id: Uuid,

    /// GitHub repository id.
    #[sea_orm(unique)]
    pub repo_id: Option<String>,

    /// Full repository name (`owner/name`).
    pub repo_name: String,

    /// Whether the category holds issues (as opposed to commits).
    pub is_issues: bool,

    /// When the mapping was created.
    pub created_at: DateTimeWithTimeZone,

    /// When the mapping was last changed.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
