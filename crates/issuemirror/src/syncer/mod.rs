//! Syncing GitHub issues into forum topics.
//!
//! [`IssueSyncer::sync_issue`] is safe to call any number of times, from any
//! number of tasks: every record it writes is keyed by a GitHub node id, so a
//! repeated call only adds what is missing.

mod mirror;

use std::sync::Arc;

use futures::TryStreamExt;
use sea_orm::DatabaseConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::poster::{IssuePoster, Posted, issue_title};
use crate::source::{IssueRef, IssueSource, RepoName};
use crate::state::nonce::{LockScope, NewTopic, NonceLocks, ensure_topic_with_nonce};
use crate::state::repo_categories::{CategoryHooks, RepoCategories};
use crate::state::users::{GithubLoginUsers, UserResolver};

/// Default tag applied to topics that mirror an issue.
pub const DEFAULT_ISSUE_TAG: &str = "github-issue";

/// Knobs for how mirrored content looks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSettings {
    /// Tag applied to every topic that mirrors an issue.
    pub issue_tag: String,
    /// Name of the category new repository categories are nested under.
    pub default_parent_category: Option<String>,
    /// Base URL of the forum, used to link back from mirrored comments.
    pub forum_base_url: String,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            issue_tag: DEFAULT_ISSUE_TAG.to_string(),
            default_parent_category: None,
            forum_base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Body of the first post of a topic mirroring an issue.
pub fn issue_body(body: &str, url: &str) -> String {
    format!("{body}\n\n[GitHub]({url})")
}

/// What one `sync_issue` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSyncReport {
    pub issue: IssueRef,
    pub topic_id: Uuid,
    pub topic_created: bool,
    pub posts_created: usize,
    pub posts_existing: usize,
    pub unchanged: usize,
}

impl IssueSyncReport {
    fn new(issue: IssueRef, topic_id: Uuid, topic_created: bool) -> Self {
        Self {
            issue,
            topic_id,
            topic_created,
            posts_created: 0,
            posts_existing: 0,
            unchanged: 0,
        }
    }

    fn record(&mut self, posted: Posted) {
        match posted {
            Posted::Created => self.posts_created += 1,
            Posted::Existing => self.posts_existing += 1,
            Posted::Unchanged => self.unchanged += 1,
        }
    }

    /// Events seen on the timeline.
    pub fn events(&self) -> usize {
        self.posts_created + self.posts_existing + self.unchanged
    }
}

/// What one `sync_repo` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoSyncReport {
    pub issues: usize,
    pub topics_created: usize,
    pub posts_created: usize,
}

impl RepoSyncReport {
    fn add(&mut self, issue: &IssueSyncReport) {
        self.issues += 1;
        self.topics_created += usize::from(issue.topic_created);
        self.posts_created += issue.posts_created;
    }
}

/// Syncs issues from an [`IssueSource`] into the forum and mirrors forum
/// activity back.
pub struct IssueSyncer<S> {
    db: Arc<DatabaseConnection>,
    source: S,
    users: Box<dyn UserResolver>,
    categories: RepoCategories,
    locks: NonceLocks,
    settings: MirrorSettings,
}

impl<S: IssueSource> IssueSyncer<S> {
    pub fn new(db: Arc<DatabaseConnection>, source: S, settings: MirrorSettings) -> Self {
        let categories =
            RepoCategories::new(CategoryHooks::new(), settings.default_parent_category.clone());
        Self {
            db,
            source,
            users: Box::new(GithubLoginUsers),
            categories,
            locks: NonceLocks::new(),
            settings,
        }
    }

    /// Replace the category naming and parent hooks.
    #[must_use]
    pub fn with_category_hooks(mut self, hooks: CategoryHooks) -> Self {
        self.categories = RepoCategories::new(hooks, self.settings.default_parent_category.clone());
        self
    }

    #[must_use]
    pub fn with_user_resolver(mut self, users: impl UserResolver + 'static) -> Self {
        self.users = Box::new(users);
        self
    }

    /// Share lock regions with other syncers in the same process.
    #[must_use]
    pub fn with_locks(mut self, locks: NonceLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn locks(&self) -> &NonceLocks {
        &self.locks
    }

    pub fn settings(&self) -> &MirrorSettings {
        &self.settings
    }

    pub fn categories(&self) -> &RepoCategories {
        &self.categories
    }

    /// Mirror one issue and its timeline.
    pub async fn sync_issue(
        &self,
        repo_name: &str,
        issue_number: i64,
        repo_id: Option<&str>,
    ) -> Result<IssueSyncReport> {
        let repo: RepoName = repo_name.parse()?;
        let issue = repo.issue(issue_number);

        let data = self.source.issue_data(&issue).await?;
        let category = {
            // Categories are created alongside topics; serialize them the same way.
            let _guard = self.locks.acquire(LockScope::EnsureTopic).await;
            self.categories
                .ensure_category(self.db(), repo_name, repo_id, true)
                .await?
        };
        let author = self.users.ensure_user(self.db(), &data.author).await?;

        let new_topic = NewTopic {
            category_id: category.as_ref().map(|c| c.id),
            user_id: author.id,
            title: issue_title(&data.title, Some(issue_number)),
            raw: issue_body(&data.body, &issue.html_url()),
            tags: vec![self.settings.issue_tag.clone()],
            issue_number: Some(issue_number),
            created_at: data.created_at,
        };
        let topic =
            ensure_topic_with_nonce(self.db(), &self.locks, &data.github_id, &new_topic).await?;
        let mut report = IssueSyncReport::new(issue.clone(), topic.get().id, topic.was_created());
        let topic = topic.into_inner();

        let mut events = self.source.issue_events(&issue);
        while let Some((info, event)) = events.try_next().await? {
            let author = self.users.ensure_user(self.db(), &info.actor).await?;
            let posted = IssuePoster::new(self.db(), &self.locks, &topic, &author, &info)
                .post_event(&event)
                .await?;
            report.record(posted);
        }

        info!(
            issue = %issue,
            topic_id = %report.topic_id,
            topic_created = report.topic_created,
            posts_created = report.posts_created,
            "Synced issue"
        );
        Ok(report)
    }

    /// Mirror every issue of a repository.
    pub async fn sync_repo(&self, repo_name: &str, repo_id: Option<&str>) -> Result<RepoSyncReport> {
        let repo: RepoName = repo_name.parse()?;
        let mut report = RepoSyncReport::default();

        let mut issues = self.source.issues(&repo);
        while let Some(issue) = issues.try_next().await? {
            debug!(issue = %issue, "Syncing issue from repository listing");
            let issue_report = self.sync_issue(repo_name, issue.number, repo_id).await?;
            report.add(&issue_report);
        }

        info!(
            repo = repo_name,
            issues = report.issues,
            topics_created = report.topics_created,
            posts_created = report.posts_created,
            "Synced repository"
        );
        Ok(report)
    }
}
