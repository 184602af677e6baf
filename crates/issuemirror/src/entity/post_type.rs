//! Post type enum distinguishing user content from synthetic markers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Post types.
///
/// `SmallAction` posts are markers for state changes (close, reopen, rename)
/// and carry an `action_code` instead of meaningful content.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum PostType {
    #[sea_orm(string_value = "regular")]
    #[default]
    Regular,
    #[sea_orm(string_value = "small_action")]
    SmallAction,
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostType::Regular => write!(f, "regular"),
            PostType::SmallAction => write!(f, "small_action"),
        }
    }
}
