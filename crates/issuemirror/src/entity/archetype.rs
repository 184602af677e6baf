//! Topic archetype enum.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of topic. Only regular topics take part in mirroring.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum Archetype {
    #[sea_orm(string_value = "regular")]
    #[default]
    Regular,
    #[sea_orm(string_value = "private_message")]
    PrivateMessage,
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Archetype::Regular => write!(f, "regular"),
            Archetype::PrivateMessage => write!(f, "private_message"),
        }
    }
}
