//! Applies one timeline event to a mirrored topic.

use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::entity::{forum_user, topic};
use crate::error::Result;
use crate::source::{EventInfo, IssueEvent};
use crate::state::nonce::{
    self, Ensured, FollowUp, NewPost, NonceLocks, RENAMED_ACTION, StateChange,
};

/// Topic title for an issue.
pub fn issue_title(title: &str, issue_number: Option<i64>) -> String {
    match issue_number {
        Some(number) => format!("{title} (Issue #{number})"),
        None => title.to_string(),
    }
}

/// Body of the marker posted when an issue is renamed.
pub fn rename_body(previous_title: &str, new_title: &str) -> String {
    format!("The title of this issue changed from \"{previous_title}\" to \"{new_title}\"")
}

/// What posting an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posted {
    /// A post was created (and the topic changed, for state events).
    Created,
    /// The event had already been mirrored.
    Existing,
    /// The event asked for the state the topic was already in.
    Unchanged,
}

impl<T> From<&Ensured<T>> for Posted {
    fn from(ensured: &Ensured<T>) -> Self {
        if ensured.was_created() {
            Posted::Created
        } else {
            Posted::Existing
        }
    }
}

impl From<&StateChange> for Posted {
    fn from(change: &StateChange) -> Self {
        match change {
            StateChange::Changed(_) => Posted::Created,
            StateChange::Existing(_) => Posted::Existing,
            StateChange::Unchanged => Posted::Unchanged,
        }
    }
}

/// Posts timeline events into one topic as one author.
pub struct IssuePoster<'a> {
    db: &'a DatabaseConnection,
    locks: &'a NonceLocks,
    topic: &'a topic::Model,
    author: &'a forum_user::Model,
    info: &'a EventInfo,
}

impl<'a> IssuePoster<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        locks: &'a NonceLocks,
        topic: &'a topic::Model,
        author: &'a forum_user::Model,
        info: &'a EventInfo,
    ) -> Self {
        Self {
            db,
            locks,
            topic,
            author,
            info,
        }
    }

    pub async fn post_event(&self, event: &IssueEvent) -> Result<Posted> {
        let posted = match event {
            IssueEvent::Closed => self.update_closed(true).await?,
            IssueEvent::Reopened => self.update_closed(false).await?,
            IssueEvent::IssueComment { body, number } => {
                let post = NewPost::regular(self.topic.id, self.author.id, body.as_str())
                    .with_comment_number(*number);
                self.ensure_post(post).await?
            }
            IssueEvent::RenamedTitle {
                previous_title,
                new_title,
            } => {
                let title = issue_title(new_title, self.topic.remote_issue_number);
                let post = NewPost::marker(
                    self.topic.id,
                    self.author.id,
                    RENAMED_ACTION,
                    rename_body(previous_title, new_title),
                )
                .with_follow_up(FollowUp::RetitleTopic { title });
                self.ensure_post(post).await?
            }
        };

        debug!(
            topic_id = %self.topic.id,
            event = event.tag(),
            nonce = %self.info.github_id,
            ?posted,
            "Posted event"
        );
        Ok(posted)
    }

    async fn update_closed(&self, closed: bool) -> Result<Posted> {
        let change = nonce::ensure_closed_state_with_nonce(
            self.db,
            self.locks,
            &self.info.github_id,
            self.topic.id,
            closed,
            self.author.id,
            self.info.created_at,
        )
        .await?;
        Ok(Posted::from(&change))
    }

    async fn ensure_post(&self, post: NewPost) -> Result<Posted> {
        let post = post.with_created_at(self.info.created_at);
        let ensured =
            nonce::ensure_post_with_nonce(self.db, self.locks, &self.info.github_id, &post).await?;
        Ok(Posted::from(&ensured))
    }
}
