//! GraphQL queries for issues, issue snapshots and issue timelines.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::error::{Result, SourceError};
use super::pagination::{Page, paginate};
use super::types::{Actor, EventInfo, IssueData, IssueEvent, IssueRef, IssueState, RepoName};
use crate::lazy::{compact, map_items};

/// Executes a single GraphQL request and returns its `data` object.
#[async_trait]
pub trait GraphQlTransport: Send + Sync {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value>;
}

#[async_trait]
impl<T: GraphQlTransport + ?Sized> GraphQlTransport for std::sync::Arc<T> {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        (**self).execute(query, variables).await
    }
}

const PAGE_SIZE: i64 = 100;

const ISSUES_QUERY: &str = r#"
query($owner: String!, $name: String!, $first: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    issues(first: $first, orderBy: { direction: DESC, field: CREATED_AT }, after: $cursor) {
      nodes { number }
      pageInfo { endCursor hasNextPage }
    }
  }
}
"#;

const ISSUE_DATA_QUERY: &str = r#"
query($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    issue(number: $number) {
      id
      author { login }
      body
      title
      createdAt
      state
    }
  }
}
"#;

const TIMELINE_QUERY: &str = r#"
query($owner: String!, $name: String!, $number: Int!, $first: Int!, $itemTypes: [IssueTimelineItemsItemType!], $cursor: String) {
  repository(owner: $owner, name: $name) {
    issue(number: $number) {
      timelineItems(first: $first, itemTypes: $itemTypes, after: $cursor) {
        nodes {
          __typename
          ... on ClosedEvent { id createdAt actor { login } }
          ... on ReopenedEvent { id createdAt actor { login } }
          ... on IssueComment { id databaseId createdAt actor: author { login } body }
          ... on RenamedTitleEvent { id createdAt actor { login } previousTitle currentTitle }
        }
        pageInfo { endCursor hasNextPage }
      }
    }
  }
}
"#;

/// Which part of an issue timeline to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineFeed {
    /// Issue comments only.
    Comments,
    /// State changes and renames.
    Activity,
    /// Everything that gets mirrored.
    All,
}

impl TimelineFeed {
    /// GraphQL `IssueTimelineItemsItemType` values for this feed.
    pub fn item_types(self) -> &'static [&'static str] {
        match self {
            TimelineFeed::Comments => &["ISSUE_COMMENT"],
            TimelineFeed::Activity => &["CLOSED_EVENT", "REOPENED_EVENT", "RENAMED_TITLE_EVENT"],
            TimelineFeed::All => &[
                "CLOSED_EVENT",
                "ISSUE_COMMENT",
                "RENAMED_TITLE_EVENT",
                "REOPENED_EVENT",
            ],
        }
    }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RepositoryData<T> {
    repository: Option<T>,
}

#[derive(Debug, Deserialize)]
struct IssueField<T> {
    issue: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<N> {
    #[serde(default = "Vec::new")]
    nodes: Vec<Option<N>>,
    page_info: PageInfo,
}

impl<N> Connection<N> {
    fn into_page(self) -> Page<N> {
        Page {
            items: self.nodes.into_iter().flatten().collect(),
            end_cursor: self.page_info.end_cursor,
            has_next_page: self.page_info.has_next_page,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IssuesField {
    issues: Connection<IssueNumber>,
}

#[derive(Debug, Deserialize)]
struct IssueNumber {
    number: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineField {
    timeline_items: Connection<TimelineNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Login {
    pub login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    id: String,
    author: Option<Login>,
    body: Option<String>,
    title: String,
    created_at: DateTime<Utc>,
    state: IssueState,
}

/// One raw timeline item. Fields beyond `__typename` depend on the kind.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineNode {
    #[serde(rename = "__typename")]
    pub typename: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actor: Option<Login>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub database_id: Option<i64>,
    #[serde(default)]
    pub previous_title: Option<String>,
    #[serde(default)]
    pub current_title: Option<String>,
}

/// Timeline item kinds that exist on GitHub but are not mirrored.
const IGNORED_TIMELINE_ITEMS: &[&str] = &[
    "AddedToProjectEvent",
    "AssignedEvent",
    "CommentDeletedEvent",
    "ConnectedEvent",
    "ConvertedNoteToIssueEvent",
    "ConvertedToDiscussionEvent",
    "CrossReferencedEvent",
    "DemilestonedEvent",
    "DisconnectedEvent",
    "LabeledEvent",
    "LockedEvent",
    "MarkedAsDuplicateEvent",
    "MentionedEvent",
    "MilestonedEvent",
    "MovedColumnsInProjectEvent",
    "PinnedEvent",
    "ReferencedEvent",
    "RemovedFromProjectEvent",
    "SubscribedEvent",
    "TransferredEvent",
    "UnassignedEvent",
    "UnlabeledEvent",
    "UnlockedEvent",
    "UnmarkedAsDuplicateEvent",
    "UnpinnedEvent",
    "UnsubscribedEvent",
    "UserBlockedEvent",
];

/// Turn a raw timeline item into an event.
///
/// Known kinds that are not mirrored yield `Ok(None)`. A kind that is not
/// known at all is an error. Deleted accounts show up as the `ghost` actor
/// and a missing comment body is taken as empty.
pub fn classify_timeline_item(node: TimelineNode) -> Result<Option<(EventInfo, IssueEvent)>> {
    let event = match node.typename.as_str() {
        "ClosedEvent" => IssueEvent::Closed,
        "ReopenedEvent" => IssueEvent::Reopened,
        "IssueComment" => IssueEvent::IssueComment {
            body: node.body.clone().unwrap_or_default(),
            number: node.database_id.ok_or_else(|| {
                SourceError::malformed("IssueComment without databaseId")
            })?,
        },
        "RenamedTitleEvent" => IssueEvent::RenamedTitle {
            previous_title: node.previous_title.clone().unwrap_or_default(),
            new_title: node.current_title.clone().unwrap_or_default(),
        },
        other if IGNORED_TIMELINE_ITEMS.contains(&other) => {
            debug!(typename = other, "Skipping timeline item");
            return Ok(None);
        }
        other => {
            return Err(SourceError::UnrecognizedEventType {
                typename: other.to_string(),
            });
        }
    };

    let github_id = node
        .id
        .ok_or_else(|| SourceError::malformed(format!("{} without id", node.typename)))?;
    let created_at = node
        .created_at
        .ok_or_else(|| SourceError::malformed(format!("{} without createdAt", node.typename)))?;
    let actor = node
        .actor
        .map(|a| Actor::new(a.login))
        .unwrap_or_else(Actor::ghost);

    Ok(Some((
        EventInfo {
            github_id,
            actor,
            created_at,
        },
        event,
    )))
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T> {
    Ok(serde_json::from_value(data)?)
}

/// Typed, lazily paginated access to GitHub issues over GraphQL.
#[derive(Debug, Clone)]
pub struct IssueQuerier<G> {
    client: G,
}

impl<G: GraphQlTransport> IssueQuerier<G> {
    pub fn new(client: G) -> Self {
        Self { client }
    }

    /// Issues of a repository, newest first.
    pub fn issues<'a>(&'a self, repo: &RepoName) -> BoxStream<'a, Result<IssueRef>> {
        let client = &self.client;
        let owner = repo.owner.clone();
        let name = repo.name.clone();

        let numbers = paginate(move |cursor| {
            let variables = json!({
                "owner": owner,
                "name": name,
                "first": PAGE_SIZE,
                "cursor": cursor,
            });
            let owner = owner.clone();
            let name = name.clone();
            async move {
                let data = client.execute(ISSUES_QUERY, variables).await?;
                let response: RepositoryData<IssuesField> = decode(data)?;
                let repository = response
                    .repository
                    .ok_or_else(|| SourceError::not_found(format!("{owner}/{name}")))?;
                Ok(repository.issues.into_page())
            }
        });

        let repo = repo.clone();
        map_items(numbers, move |node: IssueNumber| Ok(repo.issue(node.number))).boxed()
    }

    /// Fetch the current state of one issue.
    pub async fn issue_data(&self, issue: &IssueRef) -> Result<IssueData> {
        let variables = json!({
            "owner": issue.owner,
            "name": issue.name,
            "number": issue.number,
        });
        let data = self.client.execute(ISSUE_DATA_QUERY, variables).await?;
        let response: RepositoryData<IssueField<IssueNode>> = decode(data)?;
        let node = response
            .repository
            .and_then(|r| r.issue)
            .ok_or_else(|| SourceError::not_found(issue.to_string()))?;

        Ok(IssueData {
            title: node.title,
            body: node.body.unwrap_or_default(),
            github_id: node.id,
            created_at: node.created_at,
            author: node
                .author
                .map(|a| Actor::new(a.login))
                .unwrap_or_else(Actor::ghost),
            state: node.state,
        })
    }

    /// Raw timeline items of one issue, oldest first.
    pub fn timeline_items<'a>(
        &'a self,
        issue: &IssueRef,
        feed: TimelineFeed,
    ) -> BoxStream<'a, Result<TimelineNode>> {
        let client = &self.client;
        let issue = issue.clone();

        paginate(move |cursor| {
            let variables = json!({
                "owner": issue.owner,
                "name": issue.name,
                "number": issue.number,
                "first": PAGE_SIZE,
                "itemTypes": feed.item_types(),
                "cursor": cursor,
            });
            let label = issue.to_string();
            async move {
                let data = client.execute(TIMELINE_QUERY, variables).await?;
                let response: RepositoryData<IssueField<TimelineField>> = decode(data)?;
                let issue = response
                    .repository
                    .and_then(|r| r.issue)
                    .ok_or_else(|| SourceError::not_found(label))?;
                Ok(issue.timeline_items.into_page())
            }
        })
    }

    /// Classified timeline events of one issue, oldest first.
    pub fn timeline<'a>(
        &'a self,
        issue: &IssueRef,
        feed: TimelineFeed,
    ) -> BoxStream<'a, Result<(EventInfo, IssueEvent)>> {
        compact(map_items(
            self.timeline_items(issue, feed),
            classify_timeline_item,
        ))
        .boxed()
    }
}
