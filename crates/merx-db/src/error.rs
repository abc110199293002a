//! # Database Error Types
//!
//! Failures of the persistence layer, categorized for the mutation
//! transaction above it.
//!
//! The cart mutation joins these with the domain's business failures into
//! `MutationError`; the API layer then decides what the HTTP caller sees.
//! Two kinds matter to callers specifically:
//!
//! - [`DbError::Busy`] - the write lock was contended past the configured
//!   timeout. The transaction rolled back cleanly and the whole mutation
//!   may be retried as-is.
//! - [`DbError::ConstraintViolated`] - a schema CHECK fired. The schema
//!   backs up invariants the engine already enforces in code
//!   (`points_current >= 0`, `quantity > 0`, the product-xor-affiliate
//!   line reference), so reaching this variant means a logic bug, not bad
//!   user input.

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A unique index rejected a write (e.g. a second line for the same
    /// (cart, product, variation) key).
    #[error("Conflicting write: {constraint}")]
    Duplicate { constraint: String },

    /// A CHECK, NOT NULL, or foreign key constraint rejected a write.
    #[error("Constraint violated: {message}")]
    ConstraintViolated { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The write lock was contended past the configured busy timeout.
    ///
    /// The one retryable kind: the transaction was rolled back cleanly and
    /// the caller may replay the whole mutation.
    #[error("Database busy, retry the operation")]
    Busy,

    /// Transaction commit/rollback failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// SQLite reports lock contention with the BUSY/LOCKED result codes
/// (including their extended forms). sqlx surfaces them as a generic
/// database error, so the code is inspected here.
fn is_lock_contention(err: &dyn sqlx::error::DatabaseError) -> bool {
    matches!(
        err.code().as_deref(),
        Some("5" | "6" | "261" | "262" | "517")
    ) || err.message().contains("database is locked")
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                if is_lock_contention(db_err.as_ref()) {
                    return DbError::Busy;
                }

                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::Duplicate {
                        constraint: db_err
                            .constraint()
                            .unwrap_or_else(|| db_err.message())
                            .to_string(),
                    },
                    ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation => DbError::ConstraintViolated {
                        message: db_err.message().to_string(),
                    },
                    _ => DbError::QueryFailed(db_err.message().to_string()),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_carries_context() {
        let err = DbError::not_found("Cart line", "line-1");
        assert_eq!(err.to_string(), "Cart line not found: line-1");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_busy_message_signals_retry() {
        assert!(DbError::Busy.to_string().contains("retry"));
    }
}
