//! Account manager error types.

use pwa_metadata::MetadataError;

/// Account manager error type.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// No matching record, or credentials that do not match one.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("metadata error: {0}")]
    Metadata(MetadataError),

    #[error("core error: {0}")]
    Core(#[from] pwa_core::Error),

    #[error("mail error: {0}")]
    Mail(String),
}

impl AccountError {
    /// Whether this error reports a missing record or failed authentication.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<MetadataError> for AccountError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(what) => Self::NotFound(what),
            MetadataError::AlreadyExists(what) => Self::AlreadyExists(what),
            other => Self::Metadata(other),
        }
    }
}

/// Result type for account operations.
pub type AccountResult<T> = std::result::Result<T, AccountError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_errors_are_classified() {
        let err: AccountError = MetadataError::NotFound("inst i1".to_string()).into();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: inst i1");

        let err: AccountError = MetadataError::AlreadyExists("account bob".to_string()).into();
        assert!(matches!(err, AccountError::AlreadyExists(_)));

        let err: AccountError = MetadataError::Constraint("fk".to_string()).into();
        assert!(matches!(err, AccountError::Metadata(_)));
    }
}
