//! Shared fixtures for integration tests: an in-memory database and a fake
//! issue source that records every write made against it.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use issuemirror::connect_and_migrate;
use issuemirror::source::error::Result;
use issuemirror::source::{
    Actor, CreatedComment, CreatedIssue, EventInfo, IssueData, IssueEvent, IssueRef, IssueSource,
    IssueState, RepoName, SourceError,
};
use sea_orm::DatabaseConnection;

/// Create an in-memory SQLite database with migrations applied.
pub async fn setup_test_db() -> DatabaseConnection {
    connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

/// Midnight UTC on 2000-01-`day`.
pub fn jan_2000(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, day, 0, 0, 0).unwrap()
}

pub fn event(node_id: &str, login: &str, created_at: DateTime<Utc>) -> EventInfo {
    EventInfo {
        github_id: node_id.to_string(),
        actor: Actor::new(login),
        created_at,
    }
}

pub fn issue_data(node_id: &str, title: &str, body: &str, login: &str) -> IssueData {
    IssueData {
        title: title.to_string(),
        body: body.to_string(),
        github_id: node_id.to_string(),
        created_at: jan_2000(1),
        author: Actor::new(login),
        state: IssueState::Open,
    }
}

type IssueKey = (String, i64);

#[derive(Default)]
struct FakeState {
    issues: BTreeMap<IssueKey, IssueData>,
    events: BTreeMap<IssueKey, Vec<(EventInfo, IssueEvent)>>,
    next_issue_number: i64,
    next_comment_id: i64,
    created_issues: Vec<(String, String, String)>,
    comments: Vec<(i64, String)>,
    deleted_comments: Vec<i64>,
    state_changes: Vec<(i64, bool)>,
}

/// In-memory stand-in for GitHub.
///
/// Issues and comments it creates show up in later reads, so tests can check
/// that the echo of a mirrored write is recognized.
#[derive(Default)]
pub struct FakeSource {
    state: Mutex<FakeState>,
}

fn key(repo: &RepoName, number: i64) -> IssueKey {
    (repo.to_string(), number)
}

impl FakeSource {
    pub fn new() -> Self {
        let source = Self::default();
        {
            let mut state = source.state.lock().unwrap();
            state.next_issue_number = 1000;
            state.next_comment_id = 5000;
        }
        source
    }

    pub fn add_issue(&self, repo: &str, number: i64, data: IssueData) {
        let repo: RepoName = repo.parse().unwrap();
        let mut state = self.state.lock().unwrap();
        state.issues.insert(key(&repo, number), data);
    }

    pub fn add_event(&self, repo: &str, number: i64, info: EventInfo, event: IssueEvent) {
        let repo: RepoName = repo.parse().unwrap();
        let mut state = self.state.lock().unwrap();
        state
            .events
            .entry(key(&repo, number))
            .or_default()
            .push((info, event));
    }

    pub fn set_state(&self, repo: &str, number: i64, issue_state: IssueState) {
        let repo: RepoName = repo.parse().unwrap();
        let mut state = self.state.lock().unwrap();
        if let Some(data) = state.issues.get_mut(&key(&repo, number)) {
            data.state = issue_state;
        }
    }

    /// `(repo, title, body)` of every issue opened through this source.
    pub fn created_issues(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().created_issues.clone()
    }

    /// `(issue number, body)` of every comment posted through this source.
    pub fn comments(&self) -> Vec<(i64, String)> {
        self.state.lock().unwrap().comments.clone()
    }

    pub fn deleted_comments(&self) -> Vec<i64> {
        self.state.lock().unwrap().deleted_comments.clone()
    }

    /// `(issue number, closed)` of every state change made through this source.
    pub fn state_changes(&self) -> Vec<(i64, bool)> {
        self.state.lock().unwrap().state_changes.clone()
    }

    fn change_state(&self, repo: &RepoName, issue_number: i64, closed: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let data = state
            .issues
            .get_mut(&key(repo, issue_number))
            .ok_or_else(|| SourceError::not_found(format!("{repo}#{issue_number}")))?;
        data.state = if closed {
            IssueState::Closed
        } else {
            IssueState::Open
        };
        state.state_changes.push((issue_number, closed));
        Ok(())
    }
}

#[async_trait]
impl IssueSource for FakeSource {
    fn issues<'a>(&'a self, repo: &RepoName) -> BoxStream<'a, Result<IssueRef>> {
        let repo_key = repo.to_string();
        let refs: Vec<Result<IssueRef>> = self
            .state
            .lock()
            .unwrap()
            .issues
            .keys()
            .filter(|(name, _)| *name == repo_key)
            .map(|(_, number)| Ok(repo.issue(*number)))
            .collect();
        stream::iter(refs).boxed()
    }

    async fn issue_data(&self, issue: &IssueRef) -> Result<IssueData> {
        self.state
            .lock()
            .unwrap()
            .issues
            .get(&key(&issue.repo_name(), issue.number))
            .cloned()
            .ok_or_else(|| SourceError::not_found(issue.to_string()))
    }

    fn issue_events<'a>(
        &'a self,
        issue: &IssueRef,
    ) -> BoxStream<'a, Result<(EventInfo, IssueEvent)>> {
        let mut events = self
            .state
            .lock()
            .unwrap()
            .events
            .get(&key(&issue.repo_name(), issue.number))
            .cloned()
            .unwrap_or_default();
        events.sort_by_key(|(info, _)| info.created_at);
        stream::iter(events.into_iter().map(Ok)).boxed()
    }

    async fn create_issue(
        &self,
        repo: &RepoName,
        title: &str,
        body: &str,
    ) -> Result<CreatedIssue> {
        let mut state = self.state.lock().unwrap();
        let number = state.next_issue_number;
        state.next_issue_number += 1;

        let issue = repo.issue(number);
        let created = CreatedIssue {
            url: issue.html_url(),
            number,
            node_id: format!("I_fake{number}"),
        };
        state.issues.insert(
            key(repo, number),
            IssueData {
                title: title.to_string(),
                body: body.to_string(),
                github_id: created.node_id.clone(),
                created_at: Utc::now(),
                author: Actor::new("mirror-bot"),
                state: IssueState::Open,
            },
        );
        state
            .created_issues
            .push((repo.to_string(), title.to_string(), body.to_string()));
        Ok(created)
    }

    async fn create_issue_comment(
        &self,
        repo: &RepoName,
        issue_number: i64,
        body: &str,
    ) -> Result<CreatedComment> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_comment_id;
        state.next_comment_id += 1;

        let created = CreatedComment {
            node_id: format!("IC_fake{id}"),
            id,
        };
        state.events.entry(key(repo, issue_number)).or_default().push((
            EventInfo {
                github_id: created.node_id.clone(),
                actor: Actor::new("mirror-bot"),
                created_at: Utc::now(),
            },
            IssueEvent::IssueComment {
                body: body.to_string(),
                number: id,
            },
        ));
        state.comments.push((issue_number, body.to_string()));
        Ok(created)
    }

    async fn delete_issue_comment(&self, _repo: &RepoName, comment_id: i64) -> Result<()> {
        self.state.lock().unwrap().deleted_comments.push(comment_id);
        Ok(())
    }

    async fn close_issue(&self, repo: &RepoName, issue_number: i64) -> Result<()> {
        self.change_state(repo, issue_number, true)
    }

    async fn reopen_issue(&self, repo: &RepoName, issue_number: i64) -> Result<()> {
        self.change_state(repo, issue_number, false)
    }
}
