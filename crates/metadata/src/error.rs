//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl MetadataError {
    /// Classify an insert failure, turning key collisions into `AlreadyExists`
    /// and foreign-key failures into `Constraint`.
    pub(crate) fn from_insert(err: sqlx::Error, what: impl Into<String>) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation => {
                    return Self::AlreadyExists(what.into());
                }
                sqlx::error::ErrorKind::ForeignKeyViolation => {
                    return Self::Constraint(format!("{}: {}", what.into(), db_err.message()));
                }
                _ => {}
            }
        }
        Self::Database(err)
    }

    /// Whether this error reports a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
