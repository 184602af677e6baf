//! Mirroring forum activity back to GitHub.
//!
//! Each mirror call stamps the GitHub node id it got back onto the local
//! record while still holding the same lock region forward sync uses, so the
//! webhook echo of our own write is recognized as already mirrored.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{IssueSyncer, issue_body};
use crate::entity::post::{self, Entity as Post};
use crate::entity::post_type::PostType;
use crate::entity::topic::{self, Entity as Topic};
use crate::error::{MirrorError, Result};
use crate::poster::issue_title;
use crate::source::{CreatedComment, CreatedIssue, IssueSource, IssueState, RepoName};
use crate::state::nonce::LockScope;
use crate::state::repo_categories::repo_name_for_topic;
use crate::state::users;

impl<S: IssueSource> IssueSyncer<S> {
    /// Link to a post on the forum.
    pub fn post_url(&self, topic_id: Uuid, post_number: i32) -> String {
        format!(
            "{}/t/{}/{}",
            self.settings.forum_base_url.trim_end_matches('/'),
            topic_id,
            post_number
        )
    }

    async fn load_topic(&self, topic_id: Uuid) -> Result<topic::Model> {
        Topic::find_by_id(topic_id)
            .one(self.db())
            .await?
            .ok_or_else(|| MirrorError::topic_not_found(topic_id))
    }

    async fn load_post(&self, post_id: Uuid) -> Result<post::Model> {
        Post::find_by_id(post_id)
            .one(self.db())
            .await?
            .ok_or_else(|| MirrorError::NotFound {
                context: format!("post id={post_id}"),
            })
    }

    /// Repository a topic is mirrored from, if its category is mapped.
    async fn topic_repo(&self, topic: &topic::Model) -> Result<Option<RepoName>> {
        match repo_name_for_topic(self.db(), topic).await? {
            Some(name) => Ok(Some(name.parse()?)),
            None => Ok(None),
        }
    }

    /// Post a forum reply as a comment on the mirrored issue.
    ///
    /// Only replies written on the forum are mirrored: the post must be a
    /// regular, non-first post of a regular topic, carry no node id yet, and
    /// live in a mapped category on a topic that mirrors an issue. Returns
    /// `None` when any of that doesn't hold.
    pub async fn mirror_issue_post(&self, post: &post::Model) -> Result<Option<CreatedComment>> {
        let topic = self.load_topic(post.topic_id).await?;

        let mirrorable = topic.is_regular()
            && !post.is_first()
            && post.post_type == PostType::Regular
            && post.remote_node_id.is_none();
        if !mirrorable {
            debug!(post_id = %post.id, "Post is not mirrorable");
            return Ok(None);
        }

        let Some(repo) = self.topic_repo(&topic).await? else {
            return Ok(None);
        };
        let Some(issue_number) = topic.remote_issue_number else {
            return Ok(None);
        };

        let user = users::get_by_id(self.db(), post.user_id).await?;
        let body = format!(
            "[{} posted]({}):\n\n{}",
            user.display_name(),
            self.post_url(topic.id, post.post_number),
            post.raw
        );

        let _guard = self.locks.acquire(LockScope::EnsurePost).await;

        let current = self.load_post(post.id).await?;
        if current.remote_node_id.is_some() {
            return Ok(None);
        }

        let comment = self
            .source
            .create_issue_comment(&repo, issue_number, &body)
            .await?;

        let mut active: post::ActiveModel = current.into();
        active.remote_node_id = Set(Some(comment.node_id.clone()));
        active.remote_comment_number = Set(Some(comment.id));
        active.updated_at = Set(Utc::now().fixed_offset());
        active.update(self.db()).await?;

        info!(
            post_id = %post.id,
            repo = %repo,
            issue_number,
            node_id = %comment.node_id,
            "Mirrored post to GitHub"
        );
        Ok(Some(comment))
    }

    /// Open a GitHub issue for a topic started on the forum.
    ///
    /// `post` must be the regular first post of a regular topic in a mapped
    /// category that does not mirror an issue yet. The topic is retitled,
    /// tagged and linked to the new issue.
    pub async fn mirror_issue_topic(&self, post: &post::Model) -> Result<Option<CreatedIssue>> {
        let topic = self.load_topic(post.topic_id).await?;

        let mirrorable = topic.is_regular()
            && post.is_first()
            && post.post_type == PostType::Regular
            && topic.remote_node_id.is_none();
        if !mirrorable {
            debug!(topic_id = %topic.id, "Topic is not mirrorable");
            return Ok(None);
        }

        let Some(repo) = self.topic_repo(&topic).await? else {
            return Ok(None);
        };

        let _guard = self.locks.acquire(LockScope::EnsureTopic).await;

        let topic = self.load_topic(topic.id).await?;
        if topic.remote_node_id.is_some() {
            return Ok(None);
        }
        let first_post = self.load_post(post.id).await?;

        let issue = self
            .source
            .create_issue(&repo, &topic.title, &first_post.raw)
            .await?;

        let mut tags: Vec<String> = topic.tag_names().into_iter().map(String::from).collect();
        if !tags.contains(&self.settings.issue_tag) {
            tags.push(self.settings.issue_tag.clone());
        }
        let now = Utc::now().fixed_offset();
        let title = issue_title(&topic.title, Some(issue.number));
        let raw = issue_body(&first_post.raw, &issue.url);

        let txn = self.db().begin().await?;

        let mut active_topic: topic::ActiveModel = topic.into();
        active_topic.title = Set(title);
        active_topic.tags = Set(serde_json::json!(tags));
        active_topic.remote_node_id = Set(Some(issue.node_id.clone()));
        active_topic.remote_issue_number = Set(Some(issue.number));
        active_topic.updated_at = Set(now);
        active_topic.update(&txn).await?;

        let mut active_post: post::ActiveModel = first_post.into();
        active_post.raw = Set(raw);
        active_post.updated_at = Set(now);
        active_post.update(&txn).await?;

        txn.commit().await?;

        info!(
            topic_id = %post.topic_id,
            repo = %repo,
            issue_number = issue.number,
            "Mirrored topic to GitHub"
        );
        Ok(Some(issue))
    }

    /// Close or reopen the mirrored issue so it matches `closed`.
    ///
    /// Returns whether GitHub was changed.
    pub async fn mirror_issue_state(&self, topic: &topic::Model, closed: bool) -> Result<bool> {
        let Some(repo) = self.topic_repo(topic).await? else {
            return Ok(false);
        };
        let Some(issue_number) = topic.remote_issue_number else {
            return Ok(false);
        };

        let data = self.source.issue_data(&repo.issue(issue_number)).await?;

        let _guard = self.locks.acquire(LockScope::EnsurePost).await;

        let changed = match (data.state, closed) {
            (IssueState::Open, true) => {
                self.source.close_issue(&repo, issue_number).await?;
                true
            }
            (IssueState::Closed, false) => {
                self.source.reopen_issue(&repo, issue_number).await?;
                true
            }
            _ => false,
        };

        if changed {
            info!(repo = %repo, issue_number, closed, "Mirrored issue state to GitHub");
        }
        Ok(changed)
    }

    /// Replies in a topic that have not been mirrored yet, oldest first.
    pub async fn unmirrored_posts(&self, topic_id: Uuid) -> Result<Vec<post::Model>> {
        Ok(Post::find()
            .filter(post::Column::TopicId.eq(topic_id))
            .filter(post::Column::PostNumber.gt(1))
            .filter(post::Column::PostType.eq(PostType::Regular))
            .filter(post::Column::RemoteNodeId.is_null())
            .order_by_asc(post::Column::PostNumber)
            .all(self.db())
            .await?)
    }
}
