//! Error types for the credit ledger.

use thiserror::Error;

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the store rejected the unit of work because a concurrent
    /// unit of work made an incompatible write. Only these are retried.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Database(DatabaseError::WriteConflict(_)))
    }

    /// True when a uniqueness constraint rejected an insert.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Database(DatabaseError::Duplicate(_)))
    }
}

/// Storage errors, classified the way the write path needs them
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// SQLSTATE raised when a serializable transaction cannot be ordered.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE raised when Postgres breaks a deadlock by aborting one side.
const DEADLOCK_DETECTED: &str = "40P01";

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    return Self::Duplicate(db_err.message().to_string());
                }
                match db_err.code().as_deref() {
                    Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                        Self::WriteConflict(db_err.message().to_string())
                    }
                    _ => Self::Query(err.to_string()),
                }
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::Connection(err.to_string()),
            _ => Self::Query(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(DatabaseError::from(err))
    }
}

/// Request validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("{0}")]
    Multiple(String),

    #[error("Failed to parse body: {0}")]
    MalformedBody(String),

    #[error("Request body too large: {0}")]
    BodyTooLarge(String),
}

/// Configuration errors raised while reading the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(String),

    #[error("Invalid value for {name}: {message}")]
    Invalid { name: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_classification() {
        let conflict = AppError::Database(DatabaseError::WriteConflict("40001".to_string()));
        assert!(conflict.is_conflict());
        assert!(!conflict.is_duplicate());

        let duplicate = AppError::Database(DatabaseError::Duplicate("txns_pkey".to_string()));
        assert!(duplicate.is_duplicate());
        assert!(!duplicate.is_conflict());

        let query = AppError::Database(DatabaseError::Query("boom".to_string()));
        assert!(!query.is_conflict());
        assert!(!query.is_duplicate());

        let internal = AppError::Internal("boom".to_string());
        assert!(!internal.is_conflict());
    }

    #[test]
    fn test_pool_errors_map_to_connection() {
        assert!(matches!(
            DatabaseError::from(sqlx::Error::PoolTimedOut),
            DatabaseError::Connection(_)
        ));
        assert!(matches!(
            DatabaseError::from(sqlx::Error::PoolClosed),
            DatabaseError::Connection(_)
        ));
        assert!(matches!(
            DatabaseError::from(sqlx::Error::RowNotFound),
            DatabaseError::Query(_)
        ));
    }

    #[test]
    fn test_error_display() {
        let err = AppError::Validation(ValidationError::InvalidField {
            field: "sub".to_string(),
            message: "missing or empty sub".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Validation error: Invalid field 'sub': missing or empty sub"
        );

        let err = ConfigError::Missing("DATABASE_URL".to_string());
        assert_eq!(err.to_string(), "DATABASE_URL is not set");
    }
}
