//! Category entity - a forum grouping that topics live in.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Category name. Must be unique across all categories.
    #[sea_orm(unique)]
    pub name: String,

    /// Human readable description.
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Parent category, if nested.
    pub parent_category_id: Option<Uuid>,

    /// When the category was created.
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A category has many topics.
    #[sea_orm(has_many = "super::topic::Entity")]
    Topics,
    /// A category may be mapped to a GitHub repository.
    #[sea_orm(has_one = "super::repo_category::Entity")]
    RepoCategory,
}

impl Related<super::topic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Topics.def()
    }
}

impl Related<super::repo_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RepoCategory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
