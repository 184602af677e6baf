//! Mapping GitHub actors onto local forum users.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use tracing::debug;
use uuid::Uuid;

use crate::entity::forum_user::{self, Entity as ForumUser};
use crate::error::{MirrorError, Result, is_unique_violation};
use crate::source::Actor;

/// Resolves the local account that content by a GitHub actor is posted as.
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn ensure_user(&self, db: &DatabaseConnection, actor: &Actor)
    -> Result<forum_user::Model>;
}

/// Creates one local user per GitHub login, named after the login.
#[derive(Debug, Clone, Copy, Default)]
pub struct GithubLoginUsers;

/// Find a user by GitHub login.
pub async fn find_by_github_login(
    db: &DatabaseConnection,
    login: &str,
) -> Result<Option<forum_user::Model>> {
    Ok(ForumUser::find()
        .filter(forum_user::Column::GithubLogin.eq(login))
        .one(db)
        .await?)
}

/// Get a user by id.
pub async fn get_by_id(db: &DatabaseConnection, id: Uuid) -> Result<forum_user::Model> {
    ForumUser::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| MirrorError::user_not_found(id))
}

#[async_trait]
impl UserResolver for GithubLoginUsers {
    async fn ensure_user(
        &self,
        db: &DatabaseConnection,
        actor: &Actor,
    ) -> Result<forum_user::Model> {
        let login = actor.github_login.as_str();
        if let Some(user) = find_by_github_login(db, login).await? {
            return Ok(user);
        }

        let inserted = forum_user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(login.to_string()),
            name: Set(Some(login.to_string())),
            github_login: Set(Some(login.to_string())),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(db)
        .await;

        match inserted {
            Ok(user) => {
                debug!(login, "Created user for GitHub login");
                Ok(user)
            }
            Err(e) if is_unique_violation(&e) => find_by_github_login(db, login)
                .await?
                .ok_or(MirrorError::Database(e)),
            Err(e) => Err(e.into()),
        }
    }
}
