//! Post entity - a reply in a topic: a mirrored comment or a state marker.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::post_type::PostType;

/// Post model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Topic the post belongs to.
    pub topic_id: Uuid,

    /// Author of the post.
    pub user_id: Uuid,

    /// 1-based position within the topic. Post 1 is the topic body.
    pub post_number: i32,

    /// Regular content or small-action marker.
    pub post_type: PostType,

    /// Marker code for small actions (`closed.enabled`, `renamed`, ...).
    pub action_code: Option<String>,

    /// Raw markdown.
    #[sea_orm(column_type = "Text")]
    pub raw: String,

    // ─── Mirroring ───────────────────────────────────────────────────────────
    /// GitHub node id of the mirrored event. Nonce for this post.
    #[sea_orm(unique)]
    pub remote_node_id: Option<String>,

    /// GitHub database id of the mirrored comment.
    pub remote_comment_number: Option<i64>,

    // ─── Timestamps ──────────────────────────────────────────────────────────
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::topic::Entity",
        from = "Column::TopicId",
        to = "super::topic::Column::Id"
    )]
    Topic,
    #[sea_orm(
        belongs_to = "super::forum_user::Entity",
        from = "Column::UserId",
        to = "super::forum_user::Column::Id"
    )]
    User,
}

impl Related<super::topic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Topic.def()
    }
}

impl Related<super::forum_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether this post is the topic's opening post.
    pub fn is_first(&self) -> bool {
        self.post_number == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn make_test_model(post_number: i32) -> Model {
        let now = Utc::now().fixed_offset();
        Model {
            id: Uuid::new_v4(),
            topic_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            post_number,
            post_type: PostType::Regular,
            action_code: None,
            raw: "Body".to_string(),
            remote_node_id: None,
            remote_comment_number: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_is_first() {
        assert!(make_test_model(1).is_first());
        assert!(!make_test_model(2).is_first());
    }
}
