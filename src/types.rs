/*!
 * Repository Types
 * Shared error taxonomy and result alias for all backends
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Repository operation result
pub type RepoResult<T> = Result<T, RepoError>;

/// Repository errors
///
/// `find`/`contains`/`list_children`/`remove` never fail merely because
/// nothing matched; they return empty, false, or zero instead.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepoError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Unsupported resource: {0}")]
    UnsupportedResource(String),

    #[error("Unsupported pattern language: {0}")]
    UnsupportedLanguage(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Repository factory failed: {0}")]
    RepositoryFactoryError(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl RepoError {
    /// Shortcut for the common exact-lookup miss
    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        RepoError::ResourceNotFound(path.into())
    }

    pub(crate) fn invalid_path(path: impl std::fmt::Display) -> Self {
        RepoError::InvalidPath(path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RepoError::ResourceNotFound("/a/b".into());
        assert_eq!(err.to_string(), "Resource not found: /a/b");

        let err = RepoError::UnsupportedLanguage("regex".into());
        assert_eq!(err.to_string(), "Unsupported pattern language: regex");
    }

    #[test]
    fn test_error_roundtrip() {
        let err = RepoError::InvalidPath("relative".into());
        let json = serde_json::to_string(&err).unwrap();
        let back: RepoError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
