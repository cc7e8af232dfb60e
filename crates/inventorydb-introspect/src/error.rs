use thiserror::Error;

const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Errors raised while reading the database catalog.
#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("invalid connection string: {0}")]
    InvalidConnection(String),
}

impl IntrospectError {
    /// Short sentence safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            IntrospectError::Db(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(INSUFFICIENT_PRIVILEGE) =>
            {
                "insufficient privilege to read the database catalog.".to_string()
            }
            IntrospectError::Db(
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_),
            ) => "could not reach the database.".to_string(),
            IntrospectError::Db(_) => "the database catalog could not be read.".to_string(),
            IntrospectError::InvalidConnection(_) => {
                "the configured DATABASE_URL is not a valid connection string.".to_string()
            }
        }
    }
}

/// Convenience alias for introspection results.
pub type Result<T> = std::result::Result<T, IntrospectError>;
