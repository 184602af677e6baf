//! ForumUser entity - local accounts, optionally linked to a GitHub login.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// ForumUser model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "forum_users")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Forum username.
    pub username: String,

    /// Display name.
    pub name: Option<String>,

    /// GitHub login this account mirrors, if any.
    #[sea_orm(unique)]
    pub github_login: Option<String>,

    /// When the account was created.
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A user authors many topics.
    #[sea_orm(has_many = "super::topic::Entity")]
    Topics,
    /// A user authors many posts.
    #[sea_orm(has_many = "super::post::Entity")]
    Posts,
}

impl Related<super::topic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Topics.def()
    }
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Posts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Name shown next to content this user wrote.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.username)
    }
}
