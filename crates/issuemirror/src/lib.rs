//! Issuemirror - Mirror GitHub issues into forum topics.
//!
//! This library pulls the timeline of GitHub issues and replays it onto a
//! forum database: every issue becomes a topic, every comment a post, and
//! state changes and renames become small action posts. Each mirrored record
//! carries the GitHub node id it came from, so replaying the same history any
//! number of times creates nothing twice. Forum activity can be pushed back
//! to GitHub the same way.
//!
//! # Features
//!
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to automatically run migrations on connection.
//! - `github` - The octocrab-backed GitHub transport in [`github`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use issuemirror::{connect_and_migrate, IssueSyncer, MirrorSettings};
//!
//! let db = Arc::new(connect_and_migrate("sqlite://issuemirror.db?mode=rwc").await?);
//! let source = issuemirror::github::issue_service(&token)?;
//! let syncer = IssueSyncer::new(db, source, MirrorSettings::default());
//!
//! syncer.sync_issue("owner/name", 101, Some("12345")).await?;
//! ```

pub mod db;
pub mod entity;
pub mod error;
pub mod lazy;
pub mod poster;
pub mod source;
pub mod state;
pub mod syncer;

#[cfg(feature = "github")]
pub mod retry;

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use error::MirrorError;
pub use source::{IssueSource, SourceError};
pub use syncer::{IssueSyncer, MirrorSettings};
