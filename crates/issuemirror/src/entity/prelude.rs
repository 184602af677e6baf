//! Common re-exports for convenient entity usage.

pub use super::archetype::Archetype;
pub use super::category::{
    ActiveModel as CategoryActiveModel, Column as CategoryColumn, Entity as Category,
    Model as CategoryModel,
};
pub use super::forum_user::{
    ActiveModel as ForumUserActiveModel, Column as ForumUserColumn, Entity as ForumUser,
    Model as ForumUserModel,
};
pub use super::post::{
    ActiveModel as PostActiveModel, Column as PostColumn, Entity as Post, Model as PostModel,
};
pub use super::post_type::PostType;
pub use super::repo_category::{
    ActiveModel as RepoCategoryActiveModel, Column as RepoCategoryColumn, Entity as RepoCategory,
    Model as RepoCategoryModel,
};
pub use super::topic::{
    ActiveModel as TopicActiveModel, Column as TopicColumn, Entity as Topic, Model as TopicModel,
};
