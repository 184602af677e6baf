//! Local forum state: idempotent creation of mirrored records, repository
//! categories and users.

pub mod nonce;
pub mod repo_categories;
pub mod users;

pub use nonce::{
    Ensured, EntityFactory, FollowUp, LockScope, NewPost, NewTopic, NonceLocks, NonceTagged,
    StateChange, ensure_closed_state_with_nonce, ensure_entity_with_nonce, ensure_post_with_nonce,
    ensure_topic_with_nonce,
};
pub use repo_categories::{CategoryHooks, CategoryNamer, ParentCategoryFinder, RepoCategories};
pub use users::{GithubLoginUsers, UserResolver};
