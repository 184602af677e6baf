//! Nonce-keyed, at-most-once creation of mirrored topics and posts.
//!
//! Every mirrored record carries the GitHub node id it came from in a unique
//! `remote_node_id` column. Creation always goes through
//! [`ensure_entity_with_nonce`]: take the in-process region for the record
//! kind, look the nonce up inside a transaction, and only create when it is
//! absent. If another process wins the race anyway, the unique index rejects
//! our insert and the winner's row is read back instead.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::entity::archetype::Archetype;
use crate::entity::post::{self, Entity as Post};
use crate::entity::post_type::PostType;
use crate::entity::topic::{self, Entity as Topic};
use crate::error::{MirrorError, Result, is_unique_violation};

/// Action code of the marker posted when a topic is closed.
pub const CLOSED_ACTION: &str = "closed.enabled";
/// Action code of the marker posted when a topic is reopened.
pub const REOPENED_ACTION: &str = "closed.disabled";
/// Action code of the marker posted when an issue is renamed.
pub const RENAMED_ACTION: &str = "renamed";

// ─── Locks ───────────────────────────────────────────────────────────────────

/// Named mutual-exclusion regions, one per mirrored record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    EnsureTopic,
    EnsurePost,
}

impl LockScope {
    pub fn name(self) -> &'static str {
        match self {
            LockScope::EnsureTopic => "ensure-topic-with-nonce",
            LockScope::EnsurePost => "ensure-post-with-nonce",
        }
    }
}

/// The in-process lock regions. Clones share the same regions.
#[derive(Debug, Clone, Default)]
pub struct NonceLocks {
    topic: Arc<Mutex<()>>,
    post: Arc<Mutex<()>>,
}

impl NonceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a region. It is left when the guard is dropped.
    pub async fn acquire(&self, scope: LockScope) -> OwnedMutexGuard<()> {
        let region = match scope {
            LockScope::EnsureTopic => &self.topic,
            LockScope::EnsurePost => &self.post,
        };
        Arc::clone(region).lock_owned().await
    }
}

// ─── Core primitive ──────────────────────────────────────────────────────────

/// Outcome of an ensure call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ensured<T> {
    /// The factory ran and this record is new.
    Created(T),
    /// A record with the nonce already existed and was left untouched.
    Existing(T),
}

impl<T> Ensured<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, Ensured::Created(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Ensured::Created(value) | Ensured::Existing(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Ensured::Created(value) | Ensured::Existing(value) => value,
        }
    }
}

/// A record that can be looked up by its nonce.
#[async_trait]
pub trait NonceTagged: Sized + Send {
    /// Region that serializes creation of this kind of record.
    const SCOPE: LockScope;

    async fn find_by_nonce<C>(conn: &C, nonce: &str) -> std::result::Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait + Sync;
}

#[async_trait]
impl NonceTagged for topic::Model {
    const SCOPE: LockScope = LockScope::EnsureTopic;

    async fn find_by_nonce<C>(conn: &C, nonce: &str) -> std::result::Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait + Sync,
    {
        Topic::find()
            .filter(topic::Column::RemoteNodeId.eq(nonce))
            .one(conn)
            .await
    }
}

#[async_trait]
impl NonceTagged for post::Model {
    const SCOPE: LockScope = LockScope::EnsurePost;

    async fn find_by_nonce<C>(conn: &C, nonce: &str) -> std::result::Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait + Sync,
    {
        Post::find()
            .filter(post::Column::RemoteNodeId.eq(nonce))
            .one(conn)
            .await
    }
}

/// Builds a new record tagged with a nonce.
#[async_trait]
pub trait EntityFactory: Send + Sync {
    type Entity: NonceTagged;

    /// Persist the record. Runs inside the ensure transaction, so anything
    /// else written here commits or rolls back together with it.
    async fn create(
        &self,
        txn: &DatabaseTransaction,
        nonce: &str,
    ) -> std::result::Result<Self::Entity, DbErr>;
}

/// How often an ensure runs before a unique conflict on some other key
/// (a post number taken by a concurrent writer) is surfaced.
const ENSURE_ATTEMPTS: usize = 2;

/// Result of one transactional ensure attempt.
enum Attempt<T> {
    Done(T),
    /// A unique index other than the nonce rejected the write.
    Conflict(DbErr),
}

/// Return the record tagged with `nonce`, creating it with `factory` if none
/// exists.
///
/// Losing a race for the nonce itself resolves to the winner's record. A
/// conflict on any other unique key is retried once in a fresh transaction.
pub async fn ensure_entity_with_nonce<F>(
    db: &DatabaseConnection,
    locks: &NonceLocks,
    nonce: &str,
    factory: &F,
) -> Result<Ensured<F::Entity>>
where
    F: EntityFactory,
{
    let scope = <F::Entity as NonceTagged>::SCOPE;
    let _guard = locks.acquire(scope).await;

    let mut attempt = 1;
    loop {
        match try_ensure(db, scope, nonce, factory).await? {
            Attempt::Done(ensured) => return Ok(ensured),
            Attempt::Conflict(e) if attempt < ENSURE_ATTEMPTS => {
                debug!(scope = scope.name(), nonce, error = %e, "Unique conflict, retrying");
                attempt += 1;
            }
            Attempt::Conflict(e) => return Err(e.into()),
        }
    }
}

async fn try_ensure<F>(
    db: &DatabaseConnection,
    scope: LockScope,
    nonce: &str,
    factory: &F,
) -> Result<Attempt<Ensured<F::Entity>>>
where
    F: EntityFactory,
{
    let txn = db.begin().await?;
    if let Some(existing) = F::Entity::find_by_nonce(&txn, nonce).await? {
        txn.commit().await?;
        debug!(scope = scope.name(), nonce, "Nonce already materialized");
        return Ok(Attempt::Done(Ensured::Existing(existing)));
    }

    match factory.create(&txn, nonce).await {
        Ok(created) => {
            txn.commit().await?;
            debug!(scope = scope.name(), nonce, "Materialized nonce");
            Ok(Attempt::Done(Ensured::Created(created)))
        }
        Err(e) if is_unique_violation(&e) => {
            txn.rollback().await?;
            debug!(scope = scope.name(), nonce, "Lost nonce race, re-reading");
            Ok(match F::Entity::find_by_nonce(db, nonce).await? {
                Some(existing) => Attempt::Done(Ensured::Existing(existing)),
                None => Attempt::Conflict(e),
            })
        }
        Err(e) => Err(e.into()),
    }
}

// ─── Topics ──────────────────────────────────────────────────────────────────

/// A topic together with its first post.
#[derive(Debug, Clone)]
pub struct NewTopic {
    pub category_id: Option<Uuid>,
    pub user_id: Uuid,
    pub title: String,
    pub raw: String,
    pub tags: Vec<String>,
    pub issue_number: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
impl EntityFactory for NewTopic {
    type Entity = topic::Model;

    async fn create(
        &self,
        txn: &DatabaseTransaction,
        nonce: &str,
    ) -> std::result::Result<topic::Model, DbErr> {
        let created_at = self.created_at.fixed_offset();

        let topic = topic::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(self.category_id),
            user_id: Set(self.user_id),
            title: Set(self.title.clone()),
            archetype: Set(Archetype::Regular),
            closed: Set(false),
            tags: Set(serde_json::json!(self.tags)),
            remote_node_id: Set(Some(nonce.to_string())),
            remote_issue_number: Set(self.issue_number),
            created_at: Set(created_at),
            updated_at: Set(Utc::now().fixed_offset()),
        }
        .insert(txn)
        .await?;

        post::ActiveModel {
            id: Set(Uuid::new_v4()),
            topic_id: Set(topic.id),
            user_id: Set(self.user_id),
            post_number: Set(1),
            post_type: Set(PostType::Regular),
            action_code: Set(None),
            raw: Set(self.raw.clone()),
            remote_node_id: Set(None),
            remote_comment_number: Set(None),
            created_at: Set(created_at),
            updated_at: Set(created_at),
        }
        .insert(txn)
        .await?;

        Ok(topic)
    }
}

/// Ensure the topic for `nonce` exists, creating it with its first post.
pub async fn ensure_topic_with_nonce(
    db: &DatabaseConnection,
    locks: &NonceLocks,
    nonce: &str,
    topic: &NewTopic,
) -> Result<Ensured<topic::Model>> {
    ensure_entity_with_nonce(db, locks, nonce, topic).await
}

// ─── Posts ───────────────────────────────────────────────────────────────────

/// Extra change applied in the same transaction, only when the post is new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    RetitleTopic { title: String },
}

/// A reply to an existing topic.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub topic_id: Uuid,
    pub user_id: Uuid,
    pub raw: String,
    pub post_type: PostType,
    pub action_code: Option<String>,
    pub comment_number: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub follow_up: Option<FollowUp>,
}

impl NewPost {
    /// A regular reply.
    pub fn regular(topic_id: Uuid, user_id: Uuid, raw: impl Into<String>) -> Self {
        Self {
            topic_id,
            user_id,
            raw: raw.into(),
            post_type: PostType::Regular,
            action_code: None,
            comment_number: None,
            created_at: Utc::now(),
            follow_up: None,
        }
    }

    /// A small-action marker.
    pub fn marker(
        topic_id: Uuid,
        user_id: Uuid,
        action_code: &str,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            post_type: PostType::SmallAction,
            action_code: Some(action_code.to_string()),
            ..Self::regular(topic_id, user_id, raw)
        }
    }

    pub fn with_comment_number(mut self, number: i64) -> Self {
        self.comment_number = Some(number);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_follow_up(mut self, follow_up: FollowUp) -> Self {
        self.follow_up = Some(follow_up);
        self
    }
}

/// Next free post number in a topic.
pub async fn next_post_number<C>(conn: &C, topic_id: Uuid) -> std::result::Result<i32, DbErr>
where
    C: ConnectionTrait,
{
    let last = Post::find()
        .filter(post::Column::TopicId.eq(topic_id))
        .order_by_desc(post::Column::PostNumber)
        .one(conn)
        .await?;
    Ok(last.map_or(1, |p| p.post_number + 1))
}

async fn insert_post(
    txn: &DatabaseTransaction,
    new_post: &NewPost,
    nonce: &str,
) -> std::result::Result<post::Model, DbErr> {
    let post_number = next_post_number(txn, new_post.topic_id).await?;
    let created_at = new_post.created_at.fixed_offset();

    post::ActiveModel {
        id: Set(Uuid::new_v4()),
        topic_id: Set(new_post.topic_id),
        user_id: Set(new_post.user_id),
        post_number: Set(post_number),
        post_type: Set(new_post.post_type),
        action_code: Set(new_post.action_code.clone()),
        raw: Set(new_post.raw.clone()),
        remote_node_id: Set(Some(nonce.to_string())),
        remote_comment_number: Set(new_post.comment_number),
        created_at: Set(created_at),
        updated_at: Set(created_at),
    }
    .insert(txn)
    .await
}

async fn load_topic(
    txn: &DatabaseTransaction,
    topic_id: Uuid,
) -> std::result::Result<topic::Model, DbErr> {
    Topic::find_by_id(topic_id)
        .one(txn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("topic id={topic_id}")))
}

#[async_trait]
impl EntityFactory for NewPost {
    type Entity = post::Model;

    async fn create(
        &self,
        txn: &DatabaseTransaction,
        nonce: &str,
    ) -> std::result::Result<post::Model, DbErr> {
        let post = insert_post(txn, self, nonce).await?;

        if let Some(FollowUp::RetitleTopic { title }) = &self.follow_up {
            let mut topic: topic::ActiveModel = load_topic(txn, self.topic_id).await?.into();
            topic.title = Set(title.clone());
            topic.updated_at = Set(Utc::now().fixed_offset());
            topic.update(txn).await?;
        }

        Ok(post)
    }
}

/// Ensure the post for `nonce` exists. A follow-up only runs on creation.
pub async fn ensure_post_with_nonce(
    db: &DatabaseConnection,
    locks: &NonceLocks,
    nonce: &str,
    post: &NewPost,
) -> Result<Ensured<post::Model>> {
    ensure_entity_with_nonce(db, locks, nonce, post).await
}

// ─── Closed state ────────────────────────────────────────────────────────────

/// Outcome of [`ensure_closed_state_with_nonce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// The topic changed state and a marker was posted.
    Changed(post::Model),
    /// The topic was already in the requested state. Nothing was written.
    Unchanged,
    /// The marker for this nonce already exists.
    Existing(post::Model),
}

/// Bring a topic's closed flag to `closed` and record a marker post.
///
/// Both writes share one transaction and one nonce. Replaying the same nonce
/// is a no-op, as is a request that matches the current state.
pub async fn ensure_closed_state_with_nonce(
    db: &DatabaseConnection,
    locks: &NonceLocks,
    nonce: &str,
    topic_id: Uuid,
    closed: bool,
    user_id: Uuid,
    created_at: DateTime<Utc>,
) -> Result<StateChange> {
    let _guard = locks.acquire(LockScope::EnsurePost).await;

    let mut attempt = 1;
    loop {
        match try_closed_state(db, nonce, topic_id, closed, user_id, created_at).await? {
            Attempt::Done(change) => return Ok(change),
            Attempt::Conflict(e) if attempt < ENSURE_ATTEMPTS => {
                debug!(%topic_id, nonce, error = %e, "Unique conflict, retrying");
                attempt += 1;
            }
            Attempt::Conflict(e) => return Err(e.into()),
        }
    }
}

async fn try_closed_state(
    db: &DatabaseConnection,
    nonce: &str,
    topic_id: Uuid,
    closed: bool,
    user_id: Uuid,
    created_at: DateTime<Utc>,
) -> Result<Attempt<StateChange>> {
    let txn = db.begin().await?;
    if let Some(existing) = post::Model::find_by_nonce(&txn, nonce).await? {
        txn.commit().await?;
        return Ok(Attempt::Done(StateChange::Existing(existing)));
    }

    let topic = Topic::find_by_id(topic_id)
        .one(&txn)
        .await?
        .ok_or_else(|| MirrorError::topic_not_found(topic_id))?;
    if topic.closed == closed {
        txn.commit().await?;
        debug!(%topic_id, closed, "Topic already in requested state");
        return Ok(Attempt::Done(StateChange::Unchanged));
    }

    let action = if closed { CLOSED_ACTION } else { REOPENED_ACTION };
    let marker = NewPost::marker(topic_id, user_id, action, "").with_created_at(created_at);

    let written = async {
        let mut active: topic::ActiveModel = topic.into();
        active.closed = Set(closed);
        active.updated_at = Set(Utc::now().fixed_offset());
        active.update(&txn).await?;
        insert_post(&txn, &marker, nonce).await
    }
    .await;

    match written {
        Ok(post) => {
            txn.commit().await?;
            debug!(%topic_id, closed, nonce, "Changed topic state");
            Ok(Attempt::Done(StateChange::Changed(post)))
        }
        Err(e) if is_unique_violation(&e) => {
            txn.rollback().await?;
            Ok(match post::Model::find_by_nonce(db, nonce).await? {
                Some(existing) => Attempt::Done(StateChange::Existing(existing)),
                None => Attempt::Conflict(e),
            })
        }
        Err(e) => Err(e.into()),
    }
}
