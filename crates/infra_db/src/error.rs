//! Database error types and the mapping to port errors

use thiserror::Error;

use core_kernel::PortError;

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Generic SQL error
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

/// Maps a SQLx error onto the port error surface
///
/// Unique violations (23505) become `Conflict` so domain services see the
/// same error the in-memory store raises when an invariant re-check fails.
pub(crate) fn sqlx_to_port(error: sqlx::Error) -> PortError {
    match &error {
        sqlx::Error::RowNotFound => PortError::not_found("Record", "unknown"),
        sqlx::Error::PoolTimedOut => PortError::connection("connection pool exhausted"),
        sqlx::Error::Io(_) => PortError::connection(error.to_string()),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL error codes, class 23 = integrity violations
            match db_err.code().as_deref() {
                Some("23505") => PortError::conflict(db_err.message().to_string()),
                Some("23503") | Some("23514") => {
                    PortError::conflict(db_err.message().to_string())
                }
                _ => PortError::internal(db_err.message().to_string()),
            }
        }
        _ => PortError::internal(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let port = sqlx_to_port(sqlx::Error::RowNotFound);
        assert!(port.is_not_found());
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let port = sqlx_to_port(sqlx::Error::PoolTimedOut);
        assert!(port.is_transient());
    }
}
