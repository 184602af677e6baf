//! GitHub transport backed by octocrab.
//!
//! Reads go through the GraphQL API, writes through REST. Both retry on rate
//! limits; nothing else is retried.
//!
//! ```ignore
//! use issuemirror::github::{GitHubClient, issue_service};
//! use issuemirror::syncer::{IssueSyncer, MirrorSettings};
//!
//! let service = issue_service(&token)?;
//! let syncer = IssueSyncer::new(db, service, MirrorSettings::default());
//! syncer.sync_issue("owner/name", 101, None).await?;
//! ```

mod client;

pub use client::{GitHubClient, create_client, graphql_data};

use crate::source::GitHubIssueService;
use crate::source::error::Result;

/// Issue service that uses one octocrab client for reads and writes.
pub type GitHubService = GitHubIssueService<GitHubClient, GitHubClient>;

/// Build an issue service authenticated with `token`.
pub fn issue_service(token: &str) -> Result<GitHubService> {
    let client = GitHubClient::new(token)?;
    Ok(GitHubIssueService::new(client.clone(), client))
}
