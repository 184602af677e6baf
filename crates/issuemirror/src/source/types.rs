//! Event model for GitHub issues and their timelines.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A full repository name, `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoName {
    pub owner: String,
    pub name: String,
}

impl RepoName {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Reference to issue `number` in this repository.
    pub fn issue(&self, number: i64) -> IssueRef {
        IssueRef {
            owner: self.owner.clone(),
            name: self.name.clone(),
            number,
        }
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Error returned when a repository name is not of the form `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid repository name {0:?}, expected owner/name")]
pub struct ParseRepoNameError(pub String);

impl FromStr for RepoName {
    type Err = ParseRepoNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
                Ok(Self::new(owner, name))
            }
            _ => Err(ParseRepoNameError(s.to_string())),
        }
    }
}

/// Identifies one issue. Used as a lookup key, never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueRef {
    pub owner: String,
    pub name: String,
    pub number: i64,
}

impl IssueRef {
    pub fn repo_name(&self) -> RepoName {
        RepoName::new(self.owner.clone(), self.name.clone())
    }

    /// Canonical web URL of the issue.
    pub fn html_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/issues/{}",
            self.owner, self.name, self.number
        )
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.name, self.number)
    }
}

/// Login substituted for actors whose GitHub account no longer exists.
pub const GHOST_LOGIN: &str = "ghost";

/// A GitHub account that performed an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Actor {
    pub github_login: String,
}

impl Actor {
    pub fn new(github_login: impl Into<String>) -> Self {
        Self {
            github_login: github_login.into(),
        }
    }

    pub fn ghost() -> Self {
        Self::new(GHOST_LOGIN)
    }
}

/// Envelope shared by every timeline event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInfo {
    /// GitHub node id of the event. Used as its nonce.
    pub github_id: String,
    pub actor: Actor,
    pub created_at: DateTime<Utc>,
}

/// The kinds of timeline event that are mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueEvent {
    Closed,
    Reopened,
    IssueComment {
        body: String,
        /// GitHub database id of the comment.
        number: i64,
    },
    RenamedTitle {
        previous_title: String,
        new_title: String,
    },
}

impl IssueEvent {
    /// Short tag naming the event kind, for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            IssueEvent::Closed => "closed",
            IssueEvent::Reopened => "reopened",
            IssueEvent::IssueComment { .. } => "issue_comment",
            IssueEvent::RenamedTitle { .. } => "renamed_title",
        }
    }
}

/// Open/closed state as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn is_closed(self) -> bool {
        self == IssueState::Closed
    }
}

/// Point-in-time snapshot of an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueData {
    pub title: String,
    pub body: String,
    pub github_id: String,
    pub created_at: DateTime<Utc>,
    pub author: Actor,
    pub state: IssueState,
}

/// Result of opening an issue on GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    pub url: String,
    pub number: i64,
    pub node_id: String,
}

/// Result of commenting on an issue on GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedComment {
    pub node_id: String,
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_name_parse() {
        let repo: RepoName = "owner/name".parse().expect("valid repo name");
        assert_eq!(repo.owner, "owner");
        assert_eq!(repo.name, "name");
        assert_eq!(repo.to_string(), "owner/name");
    }

    #[test]
    fn test_repo_name_parse_rejects_missing_parts() {
        assert!("owner".parse::<RepoName>().is_err());
        assert!("/name".parse::<RepoName>().is_err());
        assert!("owner/".parse::<RepoName>().is_err());
    }

    #[test]
    fn test_repo_name_keeps_extra_slashes_in_name() {
        let repo: RepoName = "owner/name/extra".parse().expect("valid repo name");
        assert_eq!(repo.name, "name/extra");
    }

    #[test]
    fn test_issue_ref_url_and_display() {
        let issue = RepoName::new("owner", "name").issue(101);
        assert_eq!(issue.html_url(), "https://github.com/owner/name/issues/101");
        assert_eq!(issue.to_string(), "owner/name#101");
        assert_eq!(issue.repo_name(), RepoName::new("owner", "name"));
    }

    #[test]
    fn test_issue_state_deserializes_graphql_values() {
        let open: IssueState = serde_json::from_str("\"OPEN\"").expect("OPEN");
        let closed: IssueState = serde_json::from_str("\"CLOSED\"").expect("CLOSED");
        assert_eq!(open, IssueState::Open);
        assert!(closed.is_closed());
    }

    #[test]
    fn test_event_tags() {
        assert_eq!(IssueEvent::Closed.tag(), "closed");
        assert_eq!(
            IssueEvent::RenamedTitle {
                previous_title: "a".into(),
                new_title: "b".into()
            }
            .tag(),
            "renamed_title"
        );
    }
}
