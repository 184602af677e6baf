use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use uuid::Uuid;

use crate::source::SourceError;
use crate::source::types::ParseRepoNameError;

/// Errors that can occur while mirroring.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Reading from or writing to GitHub failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Repository name was not `owner/name`.
    #[error(transparent)]
    InvalidRepoName(#[from] ParseRepoNameError),

    /// A local record the operation depends on is missing.
    #[error("Not found: {context}")]
    NotFound { context: String },
}

impl MirrorError {
    /// Create a NotFound error for a topic lookup.
    pub fn topic_not_found(id: Uuid) -> Self {
        Self::NotFound {
            context: format!("topic id={}", id),
        }
    }

    /// Create a NotFound error for a user lookup.
    pub fn user_not_found(id: Uuid) -> Self {
        Self::NotFound {
            context: format!("user id={}", id),
        }
    }
}

/// Whether a database error is a unique-constraint violation.
///
/// Nonce columns are unique, so this is how a lost race against a concurrent
/// writer shows up.
pub fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_messages_carry_context() {
        let id = Uuid::nil();
        assert_eq!(
            MirrorError::topic_not_found(id).to_string(),
            format!("Not found: topic id={id}")
        );
    }

    #[test]
    fn invalid_repo_name_converts() {
        let err: MirrorError = "nope"
            .parse::<crate::source::RepoName>()
            .expect_err("invalid")
            .into();
        assert!(matches!(err, MirrorError::InvalidRepoName(_)));
    }

    #[test]
    fn plain_db_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&DbErr::Custom("boom".to_string())));
        assert!(!is_unique_violation(&DbErr::RecordNotFound(
            "topic".to_string()
        )));
    }
}
