//! Integration tests for syncing issues into the forum.
//!
//! Key scenarios tested:
//! - A fresh issue becomes a topic with its first post, in a new category
//! - Replaying a timeline creates nothing twice
//! - Close/reopen markers follow timeline order
//! - Renames retitle the topic only when the marker is new
//! - Whole repositories sync issue by issue

#![cfg(all(feature = "sqlite", feature = "migrate"))]

mod common;

use std::sync::Arc;

use common::{FakeSource, event, issue_data, jan_2000, setup_test_db};
use issuemirror::entity::category::Entity as Category;
use issuemirror::entity::forum_user::{self, Entity as ForumUser};
use issuemirror::entity::post::{self, Entity as Post};
use issuemirror::entity::post_type::PostType;
use issuemirror::entity::topic::{self, Entity as Topic};
use issuemirror::source::IssueEvent;
use issuemirror::state::nonce::{CLOSED_ACTION, RENAMED_ACTION, REOPENED_ACTION};
use issuemirror::{IssueSyncer, MirrorError, MirrorSettings};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

const REPO: &str = "owner/name";
const REPO_ID: &str = "R_kgDOrepo";

fn syncer(db: Arc<DatabaseConnection>, source: FakeSource) -> IssueSyncer<FakeSource> {
    IssueSyncer::new(db, source, MirrorSettings::default())
}

fn source_with_issue() -> FakeSource {
    let source = FakeSource::new();
    source.add_issue(
        REPO,
        101,
        issue_data("I_kwDOissue101", "Title", "Body", "coder1234"),
    );
    source
}

async fn posts_of(db: &DatabaseConnection, topic_id: Uuid) -> Vec<post::Model> {
    Post::find()
        .filter(post::Column::TopicId.eq(topic_id))
        .order_by_asc(post::Column::PostNumber)
        .all(db)
        .await
        .expect("load posts")
}

async fn topic_by_id(db: &DatabaseConnection, topic_id: Uuid) -> topic::Model {
    Topic::find_by_id(topic_id)
        .one(db)
        .await
        .expect("load topic")
        .expect("topic exists")
}

#[tokio::test]
async fn test_sync_issue_creates_topic_category_and_user() {
    let db = Arc::new(setup_test_db().await);
    let syncer = syncer(Arc::clone(&db), source_with_issue());

    let report = syncer
        .sync_issue(REPO, 101, Some(REPO_ID))
        .await
        .expect("sync should succeed");

    assert!(report.topic_created);
    assert_eq!(report.issue.to_string(), "owner/name#101");
    assert_eq!(report.events(), 0);

    let topic = topic_by_id(&*db, report.topic_id).await;
    assert_eq!(topic.title, "Title (Issue #101)");
    assert_eq!(topic.remote_node_id.as_deref(), Some("I_kwDOissue101"));
    assert_eq!(topic.remote_issue_number, Some(101));
    assert_eq!(topic.tag_names(), vec!["github-issue"]);
    assert!(!topic.closed);
    assert_eq!(topic.created_at, jan_2000(1).fixed_offset());

    let category = Category::find_by_id(topic.category_id.expect("topic has a category"))
        .one(&*db)
        .await
        .unwrap()
        .expect("category exists");
    assert_eq!(category.name, "name-issues");

    let author = ForumUser::find()
        .filter(forum_user::Column::GithubLogin.eq("coder1234"))
        .one(&*db)
        .await
        .unwrap()
        .expect("author created");
    assert_eq!(topic.user_id, author.id);

    let posts = posts_of(&*db, topic.id).await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].post_number, 1);
    assert_eq!(
        posts[0].raw,
        "Body\n\n[GitHub](https://github.com/owner/name/issues/101)"
    );
    assert_eq!(posts[0].remote_node_id, None);
}

#[tokio::test]
async fn test_sync_issue_twice_is_idempotent() {
    let db = Arc::new(setup_test_db().await);
    let source = source_with_issue();
    source.add_event(
        REPO,
        101,
        event("IC_comment1", "reviewer", jan_2000(2)),
        IssueEvent::IssueComment {
            body: "Looks good".to_string(),
            number: 9001,
        },
    );
    let syncer = syncer(Arc::clone(&db), source);

    let first = syncer.sync_issue(REPO, 101, Some(REPO_ID)).await.unwrap();
    let second = syncer.sync_issue(REPO, 101, Some(REPO_ID)).await.unwrap();

    assert!(first.topic_created);
    assert_eq!(first.posts_created, 1);
    assert!(!second.topic_created);
    assert_eq!(second.topic_id, first.topic_id);
    assert_eq!(second.posts_created, 0);
    assert_eq!(second.posts_existing, 1);

    assert_eq!(Topic::find().count(&*db).await.unwrap(), 1);
    assert_eq!(Post::find().count(&*db).await.unwrap(), 2);
    assert_eq!(Category::find().count(&*db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_comment_becomes_reply() {
    let db = Arc::new(setup_test_db().await);
    let source = source_with_issue();
    source.add_event(
        REPO,
        101,
        event("IC_comment1", "reviewer", jan_2000(3)),
        IssueEvent::IssueComment {
            body: "I can reproduce this".to_string(),
            number: 42,
        },
    );
    let syncer = syncer(Arc::clone(&db), source);

    let report = syncer.sync_issue(REPO, 101, Some(REPO_ID)).await.unwrap();
    let posts = posts_of(&*db, report.topic_id).await;

    assert_eq!(posts.len(), 2);
    let reply = &posts[1];
    assert_eq!(reply.post_number, 2);
    assert_eq!(reply.post_type, PostType::Regular);
    assert_eq!(reply.raw, "I can reproduce this");
    assert_eq!(reply.remote_node_id.as_deref(), Some("IC_comment1"));
    assert_eq!(reply.remote_comment_number, Some(42));
    assert_eq!(reply.created_at, jan_2000(3).fixed_offset());

    let reviewer = ForumUser::find()
        .filter(forum_user::Column::GithubLogin.eq("reviewer"))
        .one(&*db)
        .await
        .unwrap()
        .expect("comment author created");
    assert_eq!(reply.user_id, reviewer.id);
}

#[tokio::test]
async fn test_close_then_reopen_follows_timeline_order() {
    let db = Arc::new(setup_test_db().await);
    let source = source_with_issue();
    // Added out of order; the timeline is chronological.
    source.add_event(
        REPO,
        101,
        event("RE_reopened", "coder1234", jan_2000(3)),
        IssueEvent::Reopened,
    );
    source.add_event(
        REPO,
        101,
        event("CE_closed", "coder1234", jan_2000(2)),
        IssueEvent::Closed,
    );
    let syncer = syncer(Arc::clone(&db), source);

    let report = syncer.sync_issue(REPO, 101, Some(REPO_ID)).await.unwrap();
    assert_eq!(report.posts_created, 2);

    let topic = topic_by_id(&*db, report.topic_id).await;
    assert!(!topic.closed);

    let posts = posts_of(&*db, topic.id).await;
    let markers: Vec<(i32, PostType, Option<&str>)> = posts
        .iter()
        .map(|p| (p.post_number, p.post_type, p.action_code.as_deref()))
        .collect();
    assert_eq!(
        markers,
        vec![
            (1, PostType::Regular, None),
            (2, PostType::SmallAction, Some(CLOSED_ACTION)),
            (3, PostType::SmallAction, Some(REOPENED_ACTION)),
        ]
    );

    let replay = syncer.sync_issue(REPO, 101, Some(REPO_ID)).await.unwrap();
    assert_eq!(replay.posts_created, 0);
    assert_eq!(replay.posts_existing, 2);
    assert!(!topic_by_id(&*db, topic.id).await.closed);
    assert_eq!(posts_of(&*db, topic.id).await.len(), 3);
}

#[tokio::test]
async fn test_close_of_already_closed_topic_writes_nothing() {
    let db = Arc::new(setup_test_db().await);
    let source = source_with_issue();
    let syncer = syncer(Arc::clone(&db), source);

    let report = syncer.sync_issue(REPO, 101, Some(REPO_ID)).await.unwrap();
    let topic = topic_by_id(&*db, report.topic_id).await;
    let mut active: topic::ActiveModel = topic.into();
    active.closed = Set(true);
    active.update(&*db).await.unwrap();

    syncer.source().add_event(
        REPO,
        101,
        event("CE_closed", "coder1234", jan_2000(2)),
        IssueEvent::Closed,
    );
    let report = syncer.sync_issue(REPO, 101, Some(REPO_ID)).await.unwrap();

    assert_eq!(report.unchanged, 1);
    assert_eq!(report.posts_created, 0);
    assert!(topic_by_id(&*db, report.topic_id).await.closed);
    assert_eq!(posts_of(&*db, report.topic_id).await.len(), 1);
}

#[tokio::test]
async fn test_rename_retitles_topic_once() {
    let db = Arc::new(setup_test_db().await);
    let source = source_with_issue();
    source.add_event(
        REPO,
        101,
        event("RTE_renamed", "coder1234", jan_2000(2)),
        IssueEvent::RenamedTitle {
            previous_title: "Title".to_string(),
            new_title: "Better title".to_string(),
        },
    );
    let syncer = syncer(Arc::clone(&db), source);

    let report = syncer.sync_issue(REPO, 101, Some(REPO_ID)).await.unwrap();
    let topic = topic_by_id(&*db, report.topic_id).await;
    assert_eq!(topic.title, "Better title (Issue #101)");

    let posts = posts_of(&*db, topic.id).await;
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[1].action_code.as_deref(), Some(RENAMED_ACTION));
    assert_eq!(
        posts[1].raw,
        "The title of this issue changed from \"Title\" to \"Better title\""
    );

    // A local edit survives a replay of the same rename.
    let mut active: topic::ActiveModel = topic.into();
    active.title = Set("Edited on the forum".to_string());
    active.update(&*db).await.unwrap();

    let replay = syncer.sync_issue(REPO, 101, Some(REPO_ID)).await.unwrap();
    assert_eq!(replay.posts_existing, 1);
    assert_eq!(
        topic_by_id(&*db, replay.topic_id).await.title,
        "Edited on the forum"
    );
}

#[tokio::test]
async fn test_sync_without_repo_id_or_mapping_leaves_topic_uncategorized() {
    let db = Arc::new(setup_test_db().await);
    let syncer = syncer(Arc::clone(&db), source_with_issue());

    let report = syncer.sync_issue(REPO, 101, None).await.unwrap();
    let topic = topic_by_id(&*db, report.topic_id).await;

    assert_eq!(topic.category_id, None);
    assert_eq!(Category::find().count(&*db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_sync_issue_rejects_bad_repo_name() {
    let db = Arc::new(setup_test_db().await);
    let syncer = syncer(db, source_with_issue());

    let err = syncer
        .sync_issue("not-a-repo", 101, None)
        .await
        .expect_err("repo names need an owner");
    assert!(matches!(err, MirrorError::InvalidRepoName(_)));
}

#[tokio::test]
async fn test_sync_issue_surfaces_missing_issue() {
    let db = Arc::new(setup_test_db().await);
    let syncer = syncer(Arc::clone(&db), FakeSource::new());

    let err = syncer
        .sync_issue(REPO, 404, Some(REPO_ID))
        .await
        .expect_err("issue does not exist");
    assert!(matches!(err, MirrorError::Source(_)));
    assert_eq!(Topic::find().count(&*db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_sync_repo_syncs_every_issue() {
    let db = Arc::new(setup_test_db().await);
    let source = FakeSource::new();
    source.add_issue(REPO, 1, issue_data("I_one", "One", "First", "alice"));
    source.add_issue(REPO, 2, issue_data("I_two", "Two", "Second", "bob"));
    source.add_issue(
        "owner/other",
        1,
        issue_data("I_other", "Other", "Elsewhere", "carol"),
    );
    source.add_event(
        REPO,
        2,
        event("IC_two", "alice", jan_2000(5)),
        IssueEvent::IssueComment {
            body: "Me too".to_string(),
            number: 7,
        },
    );
    let syncer = syncer(Arc::clone(&db), source);

    let report = syncer.sync_repo(REPO, Some(REPO_ID)).await.unwrap();
    assert_eq!(report.issues, 2);
    assert_eq!(report.topics_created, 2);
    assert_eq!(report.posts_created, 1);

    let again = syncer.sync_repo(REPO, Some(REPO_ID)).await.unwrap();
    assert_eq!(again.issues, 2);
    assert_eq!(again.topics_created, 0);
    assert_eq!(again.posts_created, 0);

    assert_eq!(Topic::find().count(&*db).await.unwrap(), 2);
    assert_eq!(Category::find().count(&*db).await.unwrap(), 1);
}
