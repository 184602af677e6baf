//! SeaORM entity definitions for the mirrored forum schema.

pub mod archetype;
pub mod category;
pub mod forum_user;
pub mod post;
pub mod post_type;
pub mod prelude;
pub mod repo_category;
pub mod topic;
