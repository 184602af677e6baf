//! Mapping GitHub repositories onto forum categories.

use chrono::Utc;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entity::category::{self, Entity as Category};
use crate::entity::repo_category::{self, Entity as RepoCategory};
use crate::entity::topic;
use crate::error::Result;

/// Picks the name of a newly created category.
pub trait CategoryNamer: Send + Sync {
    fn category_name(&self, repo_name: &str, repo_id: Option<&str>, issues: bool)
    -> Option<String>;
}

impl<F> CategoryNamer for F
where
    F: Fn(&str, Option<&str>, bool) -> Option<String> + Send + Sync,
{
    fn category_name(
        &self,
        repo_name: &str,
        repo_id: Option<&str>,
        issues: bool,
    ) -> Option<String> {
        self(repo_name, repo_id, issues)
    }
}

/// Picks the parent of a newly created category.
pub trait ParentCategoryFinder: Send + Sync {
    fn parent_category(&self, repo_name: &str, repo_id: Option<&str>, issues: bool)
    -> Option<Uuid>;
}

impl<F> ParentCategoryFinder for F
where
    F: Fn(&str, Option<&str>, bool) -> Option<Uuid> + Send + Sync,
{
    fn parent_category(
        &self,
        repo_name: &str,
        repo_id: Option<&str>,
        issues: bool,
    ) -> Option<Uuid> {
        self(repo_name, repo_id, issues)
    }
}

/// Ordered naming and parent hooks. The first hook with an answer wins.
#[derive(Default)]
pub struct CategoryHooks {
    namers: Vec<Box<dyn CategoryNamer>>,
    parent_finders: Vec<Box<dyn ParentCategoryFinder>>,
}

impl CategoryHooks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_namer(mut self, namer: impl CategoryNamer + 'static) -> Self {
        self.namers.push(Box::new(namer));
        self
    }

    #[must_use]
    pub fn with_parent_finder(mut self, finder: impl ParentCategoryFinder + 'static) -> Self {
        self.parent_finders.push(Box::new(finder));
        self
    }

    pub fn category_name(
        &self,
        repo_name: &str,
        repo_id: Option<&str>,
        issues: bool,
    ) -> Option<String> {
        self.namers
            .iter()
            .filter_map(|n| n.category_name(repo_name, repo_id, issues))
            .find(|name| !name.trim().is_empty())
    }

    pub fn parent_category(
        &self,
        repo_name: &str,
        repo_id: Option<&str>,
        issues: bool,
    ) -> Option<Uuid> {
        self.parent_finders
            .iter()
            .find_map(|f| f.parent_category(repo_name, repo_id, issues))
    }
}

impl std::fmt::Debug for CategoryHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryHooks")
            .field("namers", &self.namers.len())
            .field("parent_finders", &self.parent_finders.len())
            .finish()
    }
}

/// Resolves and creates the category a repository is mirrored into.
#[derive(Debug, Default)]
pub struct RepoCategories {
    hooks: CategoryHooks,
    /// Name of the category new categories are nested under when no hook
    /// picks a parent.
    default_parent: Option<String>,
}

fn category_description(repo_name: &str, issues: bool) -> String {
    if issues {
        format!("Discussion of issues in the GitHub repository {repo_name}")
    } else {
        format!("Discussion of commits in the GitHub repository {repo_name}")
    }
}

fn random_suffix() -> String {
    let suffix: u128 = rand::rng().random();
    format!("{suffix:032x}")
}

impl RepoCategories {
    pub fn new(hooks: CategoryHooks, default_parent: Option<String>) -> Self {
        Self {
            hooks,
            default_parent,
        }
    }

    /// Resolve the category for a repository, creating it when `repo_id` is
    /// known and no mapping exists yet.
    ///
    /// Mappings are found by `repo_id` first and by `repo_name` second. The
    /// mapping's attributes are brought up to date on every call. Everything
    /// happens in one (possibly nested) transaction.
    pub async fn ensure_category<C>(
        &self,
        conn: &C,
        repo_name: &str,
        repo_id: Option<&str>,
        issues: bool,
    ) -> Result<Option<category::Model>>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let txn = conn.begin().await?;

        let mut mapping = match repo_id {
            Some(id) => {
                RepoCategory::find()
                    .filter(repo_category::Column::RepoId.eq(id))
                    .one(&txn)
                    .await?
            }
            None => None,
        };
        if mapping.is_none() {
            mapping = RepoCategory::find()
                .filter(repo_category::Column::RepoName.eq(repo_name))
                .order_by_asc(repo_category::Column::CreatedAt)
                .one(&txn)
                .await?;
        }

        let existing = match &mapping {
            Some(m) => Category::find_by_id(m.category_id).one(&txn).await?,
            None => None,
        };

        let category = match existing {
            Some(category) => category,
            None if repo_id.is_some() => {
                self.create_category(&txn, repo_name, repo_id, issues)
                    .await?
            }
            None => {
                txn.commit().await?;
                return Ok(None);
            }
        };

        let now = Utc::now().fixed_offset();
        match mapping {
            Some(m) => {
                let changed = m.category_id != category.id
                    || m.repo_name != repo_name
                    || m.is_issues != issues
                    || (repo_id.is_some() && m.repo_id.as_deref() != repo_id);
                if changed {
                    let mut active: repo_category::ActiveModel = m.into();
                    active.category_id = Set(category.id);
                    active.repo_name = Set(repo_name.to_string());
                    active.is_issues = Set(issues);
                    if let Some(id) = repo_id {
                        active.repo_id = Set(Some(id.to_string()));
                    }
                    active.updated_at = Set(now);
                    active.update(&txn).await?;
                }
            }
            None => {
                repo_category::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    category_id: Set(category.id),
                    repo_id: Set(repo_id.map(str::to_string)),
                    repo_name: Set(repo_name.to_string()),
                    is_issues: Set(issues),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;
        Ok(Some(category))
    }

    async fn create_category<C>(
        &self,
        conn: &C,
        repo_name: &str,
        repo_id: Option<&str>,
        issues: bool,
    ) -> Result<category::Model>
    where
        C: ConnectionTrait,
    {
        let name = self.find_category_name(conn, repo_name, repo_id, issues).await?;
        let parent_category_id = self
            .find_parent_category_id(conn, repo_name, repo_id, issues)
            .await?;

        let category = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            description: Set(Some(category_description(repo_name, issues))),
            parent_category_id: Set(parent_category_id),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(conn)
        .await?;

        info!(repo = repo_name, category = %category.name, "Created category");
        Ok(category)
    }

    async fn find_category_name<C>(
        &self,
        conn: &C,
        repo_name: &str,
        repo_id: Option<&str>,
        issues: bool,
    ) -> Result<String>
    where
        C: ConnectionTrait,
    {
        if let Some(name) = self.hooks.category_name(repo_name, repo_id, issues) {
            return Ok(name);
        }

        let short_name = repo_name
            .split_once('/')
            .map_or(repo_name, |(_, name)| name);
        let mut name = short_name.to_string();
        if issues {
            name.push_str("-issues");
        }

        let taken = Category::find()
            .filter(category::Column::Name.eq(name.as_str()))
            .one(conn)
            .await?
            .is_some();
        if taken {
            debug!(name = %name, "Category name taken, adding suffix");
            name.push_str(&random_suffix());
        }
        Ok(name)
    }

    async fn find_parent_category_id<C>(
        &self,
        conn: &C,
        repo_name: &str,
        repo_id: Option<&str>,
        issues: bool,
    ) -> Result<Option<Uuid>>
    where
        C: ConnectionTrait,
    {
        if let Some(id) = self.hooks.parent_category(repo_name, repo_id, issues) {
            return Ok(Some(id));
        }

        let Some(parent) = self.default_parent.as_deref() else {
            return Ok(None);
        };
        Ok(Category::find()
            .filter(category::Column::Name.eq(parent))
            .one(conn)
            .await?
            .map(|c| c.id))
    }
}

/// Names of all mapped repositories.
pub async fn repo_names<C>(conn: &C) -> Result<Vec<String>>
where
    C: ConnectionTrait,
{
    Ok(RepoCategory::find()
        .select_only()
        .column(repo_category::Column::RepoName)
        .order_by_asc(repo_category::Column::RepoName)
        .distinct()
        .into_tuple::<String>()
        .all(conn)
        .await?)
}

/// All repository mappings, by repository name.
pub async fn list_mappings<C>(conn: &C) -> Result<Vec<(repo_category::Model, category::Model)>>
where
    C: ConnectionTrait,
{
    let rows = RepoCategory::find()
        .find_also_related(Category)
        .order_by_asc(repo_category::Column::RepoName)
        .all(conn)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(mapping, category)| category.map(|c| (mapping, c)))
        .collect())
}

/// Name of the repository a topic's category mirrors, if any.
pub async fn repo_name_for_topic<C>(conn: &C, topic: &topic::Model) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let Some(category_id) = topic.category_id else {
        return Ok(None);
    };
    Ok(RepoCategory::find()
        .filter(repo_category::Column::CategoryId.eq(category_id))
        .one(conn)
        .await?
        .map(|m| m.repo_name))
}
