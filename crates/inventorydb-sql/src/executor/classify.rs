use std::time::Duration;

use inventorydb_core::ExecutionFailure;

const QUERY_CANCELED: &str = "57014";
const INSUFFICIENT_PRIVILEGE: &str = "42501";
const READ_ONLY_TRANSACTION: &str = "25006";

/// Map a driver failure onto the user-facing taxonomy.
///
/// `sqlstate` is the five-character Postgres error code when the server
/// reported one; `message` is the raw driver text, used only for matching.
pub fn classify(
    sqlstate: Option<&str>,
    message: &str,
    elapsed: Duration,
    bound: Duration,
) -> ExecutionFailure {
    let lowered = message.to_ascii_lowercase();

    if sqlstate == Some(QUERY_CANCELED) || elapsed >= bound || lowered.contains("statement timeout") {
        return ExecutionFailure::Timeout {
            seconds: bound.as_secs(),
        };
    }
    if sqlstate == Some(INSUFFICIENT_PRIVILEGE) || lowered.contains("permission denied") {
        return ExecutionFailure::PermissionDenied;
    }

    let label = match sqlstate {
        Some("42703") => "A referenced column does not exist.",
        Some("42P01") => "A referenced table does not exist.",
        Some("42601") => "The generated query has a syntax error.",
        Some("42803") => "The query groups or aggregates columns incorrectly.",
        Some("42883") => "The query calls a function or operator that does not exist for these types.",
        Some(READ_ONLY_TRANSACTION) => "The query attempted to modify data and was blocked.",
        Some(code) if code.starts_with("22") => "The query failed while converting data values.",
        Some(code) if code.starts_with("08") => "Could not reach the database.",
        Some("53300") => "The database has too many open connections. Please retry shortly.",
        _ => "The database rejected the query.",
    };
    ExecutionFailure::generic(label)
}

/// Classify a `sqlx` error, pulling the SQLSTATE out of server errors.
pub fn classify_error(err: &sqlx::Error, elapsed: Duration, bound: Duration) -> ExecutionFailure {
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code();
            classify(code.as_deref(), db.message(), elapsed, bound)
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Configuration(_) => {
            ExecutionFailure::generic("Could not reach the database.")
        }
        other => classify(None, &other.to_string(), elapsed, bound),
    }
}
