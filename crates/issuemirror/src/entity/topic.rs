//! Topic entity - one discussion thread, mirroring one GitHub issue.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::archetype::Archetype;

/// Topic model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "topics")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Category the topic lives in.
    pub category_id: Option<Uuid>,

    /// Author of the topic.
    pub user_id: Uuid,

    /// Topic title.
    pub title: String,

    /// Regular topic or private message.
    pub archetype: Archetype,

    /// Whether the topic is closed for replies.
    #[sea_orm(default_value = false)]
    pub closed: bool,

    /// Tag names (JSON array).
    #[sea_orm(column_type = "Json")]
    pub tags: serde_json::Value,

    // ─── Mirroring ───────────────────────────────────────────────────────────
    /// GitHub node id of the mirrored issue. Nonce for the topic itself.
    #[sea_orm(unique)]
    pub remote_node_id: Option<String>,

    /// GitHub issue number.
    pub remote_issue_number: Option<i64>,

    // ─── Timestamps ──────────────────────────────────────────────────────────
    pub created_at: DateTimeWithTimeZone,
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
    #[sea_orm(
        belongs_to = "super::forum_user::Entity",
        from = "Column::UserId",
        to = "super::forum_user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::post::Entity")]
    Posts,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::forum_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Posts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether this is a regular (non-private) topic.
    pub fn is_regular(&self) -> bool {
        self.archetype == Archetype::Regular
    }

    /// Tag names as strings, skipping anything that isn't one.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags
            .as_array()
            .map(|tags| tags.iter().filter_map(|t| t.as_str()).collect())
            .unwrap_or_default()
    }
}
