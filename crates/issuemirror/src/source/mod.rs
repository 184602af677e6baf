//! Remote side of the mirror: GitHub issues and their timelines.

pub mod error;
pub mod pagination;
pub mod querier;
pub mod service;
pub mod types;

pub use error::SourceError;
pub use pagination::{Page, paginate};
pub use querier::{GraphQlTransport, IssueQuerier, TimelineFeed, classify_timeline_item};
pub use service::{GitHubIssueService, IssueMutations, IssueSource};
pub use types::{
    Actor, CreatedComment, CreatedIssue, EventInfo, IssueData, IssueEvent, IssueRef, IssueState,
    RepoName,
};
