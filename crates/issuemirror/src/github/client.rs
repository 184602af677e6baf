//! octocrab client wrapper implementing the GraphQL and REST seams.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use octocrab::Octocrab;
use octocrab::models::{CommentId, IssueState as OctocrabIssueState};
use serde_json::{Value, json};

use crate::retry::with_retry;
use crate::source::error::{Result, SourceError, short_error_message};
use crate::source::querier::GraphQlTransport;
use crate::source::service::IssueMutations;
use crate::source::types::{CreatedComment, CreatedIssue, RepoName};

/// Create an octocrab client from a personal access token.
pub fn create_client(token: &str) -> Result<Octocrab> {
    Octocrab::builder()
        .personal_token(token.to_string())
        .build()
        .map_err(SourceError::Api)
}

/// Extract `data` from a GraphQL response body, turning `errors` into
/// [`SourceError`]s.
pub fn graphql_data(mut response: Value) -> Result<Value> {
    if let Some(errors) = response.get("errors").and_then(Value::as_array)
        && !errors.is_empty()
    {
        let has_type = |kind: &str| errors.iter().any(|e| e["type"] == kind);
        let messages = errors
            .iter()
            .filter_map(|e| e["message"].as_str())
            .collect::<Vec<_>>()
            .join("; ");

        if has_type("RATE_LIMITED") {
            return Err(SourceError::RateLimited {
                reset_at: Utc::now(),
            });
        }
        if has_type("NOT_FOUND") {
            return Err(SourceError::NotFound(messages));
        }
        if has_type("FORBIDDEN") || has_type("UNAUTHORIZED") {
            return Err(SourceError::AuthRequired);
        }
        return Err(SourceError::Transport(messages));
    }

    match response.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(SourceError::malformed("GraphQL response without data")),
    }
}

fn to_u64(value: i64, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| SourceError::not_found(format!("{what} {value}")))
}

fn to_i64(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| SourceError::malformed(format!("{what} {value} out of range")))
}

/// GitHub client shared by the GraphQL reads and REST writes.
#[derive(Clone)]
pub struct GitHubClient {
    inner: Arc<Octocrab>,
}

impl GitHubClient {
    /// Create a new GitHub client from an authentication token.
    pub fn new(token: &str) -> Result<Self> {
        Ok(Self::from_octocrab(create_client(token)?))
    }

    pub fn from_octocrab(client: Octocrab) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl GraphQlTransport for GitHubClient {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        let payload = json!({ "query": query, "variables": variables });
        let payload = &payload;

        with_retry(
            move || async move {
                let response: Value = self.inner.graphql(payload).await?;
                graphql_data(response)
            },
            SourceError::is_rate_limited,
            short_error_message,
            "graphql",
        )
        .await
    }
}

#[async_trait]
impl IssueMutations for GitHubClient {
    async fn create_issue(
        &self,
        repo: &RepoName,
        title: &str,
        body: &str,
    ) -> Result<CreatedIssue> {
        let issue = with_retry(
            move || async move {
                Ok::<_, SourceError>(
                    self.inner
                        .issues(&repo.owner, &repo.name)
                        .create(title)
                        .body(body)
                        .send()
                        .await?,
                )
            },
            SourceError::is_rate_limited,
            short_error_message,
            "create issue",
        )
        .await?;

        Ok(CreatedIssue {
            url: issue.html_url.to_string(),
            number: to_i64(issue.number, "issue number")?,
            node_id: issue.node_id,
        })
    }

    async fn add_comment(
        &self,
        repo: &RepoName,
        issue_number: i64,
        body: &str,
    ) -> Result<CreatedComment> {
        let number = to_u64(issue_number, "issue")?;
        let comment = with_retry(
            move || async move {
                Ok::<_, SourceError>(
                    self.inner
                        .issues(&repo.owner, &repo.name)
                        .create_comment(number, body)
                        .await?,
                )
            },
            SourceError::is_rate_limited,
            short_error_message,
            "create comment",
        )
        .await?;

        Ok(CreatedComment {
            node_id: comment.node_id,
            id: to_i64(comment.id.0, "comment id")?,
        })
    }

    async fn delete_comment(&self, repo: &RepoName, comment_id: i64) -> Result<()> {
        let id = CommentId(to_u64(comment_id, "comment")?);
        with_retry(
            move || async move {
                Ok::<_, SourceError>(
                    self.inner
                        .issues(&repo.owner, &repo.name)
                        .delete_comment(id)
                        .await?,
                )
            },
            SourceError::is_rate_limited,
            short_error_message,
            "delete comment",
        )
        .await
    }

    async fn set_issue_closed(
        &self,
        repo: &RepoName,
        issue_number: i64,
        closed: bool,
    ) -> Result<()> {
        let number = to_u64(issue_number, "issue")?;
        let state = if closed {
            OctocrabIssueState::Closed
        } else {
            OctocrabIssueState::Open
        };

        let state = &state;

        with_retry(
            move || async move {
                self.inner
                    .issues(&repo.owner, &repo.name)
                    .update(number)
                    .state(state.clone())
                    .send()
                    .await?;
                Ok::<_, SourceError>(())
            },
            SourceError::is_rate_limited,
            short_error_message,
            if closed { "close issue" } else { "reopen issue" },
        )
        .await
    }
}
