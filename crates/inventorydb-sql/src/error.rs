use thiserror::Error;

/// Errors raised while setting up or probing a database connection.
#[derive(Debug, Error)]
pub enum SqlError {
    #[error("invalid connection string: {0}")]
    InvalidConnection(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Convenience alias for connection results.
pub type Result<T> = std::result::Result<T, SqlError>;
