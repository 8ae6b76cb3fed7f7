//! Database error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Could not connect to database: {0}")]
    Connect(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl DbError {
    /// Fatal errors end the run; everything else is scoped to one row and
    /// can be counted and skipped.
    pub fn is_fatal(&self) -> bool {
        match self {
            DbError::Connect(_) | DbError::ConnectionClosed | DbError::InvalidIdentifier(_) => true,
            DbError::Postgres(e) => e.is_closed(),
            DbError::NotFound(_) | DbError::Unavailable(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_errors_are_not_fatal() {
        assert!(!DbError::NotFound("compound 7".into()).is_fatal());
        assert!(!DbError::Unavailable("lock timeout".into()).is_fatal());
    }

    #[test]
    fn test_connection_errors_are_fatal() {
        assert!(DbError::ConnectionClosed.is_fatal());
        assert!(DbError::Connect("refused".into()).is_fatal());
        assert!(DbError::InvalidIdentifier("x;y".into()).is_fatal());
    }
}
