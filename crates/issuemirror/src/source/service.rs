//! The issue source consumed by the syncer.

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::error::Result;
use super::querier::{GraphQlTransport, IssueQuerier, TimelineFeed};
use super::types::{
    CreatedComment, CreatedIssue, EventInfo, IssueData, IssueEvent, IssueRef, RepoName,
};
use crate::lazy::merge_ordered;

/// Read and write access to issues on the remote side.
///
/// Streams are lazy. Calling a stream method again starts over from the
/// first page.
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Issues of a repository.
    fn issues<'a>(&'a self, repo: &RepoName) -> BoxStream<'a, Result<IssueRef>>;

    /// Current snapshot of an issue.
    async fn issue_data(&self, issue: &IssueRef) -> Result<IssueData>;

    /// Mirrored timeline events of an issue in chronological order.
    fn issue_events<'a>(&'a self, issue: &IssueRef)
    -> BoxStream<'a, Result<(EventInfo, IssueEvent)>>;

    async fn create_issue(&self, repo: &RepoName, title: &str, body: &str)
    -> Result<CreatedIssue>;

    async fn create_issue_comment(
        &self,
        repo: &RepoName,
        issue_number: i64,
        body: &str,
    ) -> Result<CreatedComment>;

    async fn delete_issue_comment(&self, repo: &RepoName, comment_id: i64) -> Result<()>;

    async fn close_issue(&self, repo: &RepoName, issue_number: i64) -> Result<()>;

    async fn reopen_issue(&self, repo: &RepoName, issue_number: i64) -> Result<()>;
}

/// Write operations against the GitHub REST API.
#[async_trait]
pub trait IssueMutations: Send + Sync {
    async fn create_issue(&self, repo: &RepoName, title: &str, body: &str)
    -> Result<CreatedIssue>;

    async fn add_comment(
        &self,
        repo: &RepoName,
        issue_number: i64,
        body: &str,
    ) -> Result<CreatedComment>;

    async fn delete_comment(&self, repo: &RepoName, comment_id: i64) -> Result<()>;

    async fn set_issue_closed(&self, repo: &RepoName, issue_number: i64, closed: bool)
    -> Result<()>;
}

/// Strict ordering on event time, so ties fall back to feed order.
fn occurred_before(a: &(EventInfo, IssueEvent), b: &(EventInfo, IssueEvent)) -> bool {
    a.0.created_at < b.0.created_at
}

/// [`IssueSource`] backed by GraphQL reads and REST writes.
///
/// Comments and state-change events are requested as two separately
/// paginated feeds and merged by creation time. Events sharing a timestamp
/// keep the order of their own feed, and a comment goes before a state
/// change stamped with the same second.
pub struct GitHubIssueService<G, M> {
    querier: IssueQuerier<G>,
    mutations: M,
}

impl<G, M> GitHubIssueService<G, M>
where
    G: GraphQlTransport,
    M: IssueMutations,
{
    pub fn new(graphql: G, mutations: M) -> Self {
        Self {
            querier: IssueQuerier::new(graphql),
            mutations,
        }
    }
}

#[async_trait]
impl<G, M> IssueSource for GitHubIssueService<G, M>
where
    G: GraphQlTransport,
    M: IssueMutations,
{
    fn issues<'a>(&'a self, repo: &RepoName) -> BoxStream<'a, Result<IssueRef>> {
        self.querier.issues(repo)
    }

    async fn issue_data(&self, issue: &IssueRef) -> Result<IssueData> {
        self.querier.issue_data(issue).await
    }

    fn issue_events<'a>(
        &'a self,
        issue: &IssueRef,
    ) -> BoxStream<'a, Result<(EventInfo, IssueEvent)>> {
        merge_ordered(
            vec![
                self.querier.timeline(issue, TimelineFeed::Comments),
                self.querier.timeline(issue, TimelineFeed::Activity),
            ],
            occurred_before,
        )
    }

    async fn create_issue(
        &self,
        repo: &RepoName,
        title: &str,
        body: &str,
    ) -> Result<CreatedIssue> {
        self.mutations.create_issue(repo, title, body).await
    }

    async fn create_issue_comment(
        &self,
        repo: &RepoName,
        issue_number: i64,
        body: &str,
    ) -> Result<CreatedComment> {
        self.mutations.add_comment(repo, issue_number, body).await
    }

    async fn delete_issue_comment(&self, repo: &RepoName, comment_id: i64) -> Result<()> {
        self.mutations.delete_comment(repo, comment_id).await
    }

    async fn close_issue(&self, repo: &RepoName, issue_number: i64) -> Result<()> {
        self.mutations.set_issue_closed(repo, issue_number, true).await
    }

    async fn reopen_issue(&self, repo: &RepoName, issue_number: i64) -> Result<()> {
        self.mutations
            .set_issue_closed(repo, issue_number, false)
            .await
    }
}
