//! Guarded Executor: one connection per call, read-only transaction,
//! server-side statement timeout, classified failures.

mod classify;
mod decode;

use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use inventorydb_core::{ExecutionFailure, ResultSet, redact_connection_string};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor};

use crate::error::{Result, SqlError};

pub use classify::{classify, classify_error};

pub const NO_DATABASE_MESSAGE: &str =
    "Database connection not available. Please check DATABASE_URL.";

/// Extra time the client waits past the server-side bound before giving up.
const CLIENT_GRACE: Duration = Duration::from_secs(2);

/// Rows plus wall-clock time of a successful execution.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub rows: ResultSet,
    pub elapsed: Duration,
}

impl QueryOutcome {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Runs one validated statement under a time bound.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str, timeout: Duration) -> std::result::Result<QueryOutcome, ExecutionFailure>;
}

/// Opens fresh connections from parsed options. Read-only after construction.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    options: PgConnectOptions,
    display: String,
}

impl ConnectionFactory {
    pub fn from_url(url: &str) -> Result<Self> {
        let options = PgConnectOptions::from_str(url)
            .map_err(|err| SqlError::InvalidConnection(err.to_string()))?;
        Ok(Self {
            options,
            display: redact_connection_string(url).redacted,
        })
    }

    /// Redacted form of the URL, safe to log.
    pub fn display(&self) -> &str {
        &self.display
    }

    pub async fn connect(&self) -> Result<PgConnection> {
        Ok(PgConnection::connect_with(&self.options).await?)
    }

    /// `SELECT 1` round trip.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connect().await?;
        sqlx::query("SELECT 1").execute(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }
}

/// Executor against a live Postgres server.
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    factory: ConnectionFactory,
}

impl PostgresExecutor {
    pub fn new(factory: ConnectionFactory) -> Self {
        Self { factory }
    }

    async fn run(&self, sql: &str, bound: Duration) -> std::result::Result<ResultSet, sqlx::Error> {
        let mut conn = PgConnection::connect_with(&self.factory.options).await?;
        let result = run_read_only(&mut conn, sql, bound).await;
        if let Err(err) = conn.close().await {
            tracing::debug!(event = "connection_close_failed", error = %err);
        }
        result
    }
}

async fn run_read_only(
    conn: &mut PgConnection,
    sql: &str,
    bound: Duration,
) -> std::result::Result<ResultSet, sqlx::Error> {
    let mut tx = conn.begin().await?;
    sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;
    let timeout_stmt = format!("SET LOCAL statement_timeout = {}", bound.as_millis());
    sqlx::query(&timeout_stmt).execute(&mut *tx).await?;

    let statement = sql.trim().trim_end_matches(';').trim_end();
    let rows = sqlx::query(statement).fetch_all(&mut *tx).await?;
    let described = if rows.is_empty() {
        let describe = (&mut *tx).describe(statement).await?;
        decode::headers(describe.columns())
    } else {
        Vec::new()
    };

    tx.rollback().await?;
    Ok(decode::decode_rows(&rows, described))
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute(&self, sql: &str, timeout: Duration) -> std::result::Result<QueryOutcome, ExecutionFailure> {
        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout + CLIENT_GRACE, self.run(sql, timeout)).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(rows)) => {
                tracing::info!(
                    event = "query_executed",
                    rows = rows.len(),
                    elapsed_ms = elapsed.as_millis() as u64
                );
                Ok(QueryOutcome { rows, elapsed })
            }
            Ok(Err(err)) => {
                let failure = classify_error(&err, elapsed, timeout);
                tracing::warn!(
                    event = "query_failed",
                    kind = failure_kind(&failure),
                    driver_error = %err,
                    elapsed_ms = elapsed.as_millis() as u64
                );
                Err(failure)
            }
            Err(_) => {
                tracing::warn!(event = "query_failed", kind = "timeout", elapsed_ms = elapsed.as_millis() as u64);
                Err(ExecutionFailure::Timeout {
                    seconds: timeout.as_secs(),
                })
            }
        }
    }
}

fn failure_kind(failure: &ExecutionFailure) -> &'static str {
    match failure {
        ExecutionFailure::Timeout { .. } => "timeout",
        ExecutionFailure::PermissionDenied => "permission_denied",
        ExecutionFailure::Generic { .. } => "generic",
    }
}

/// Executor used when no database is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedExecutor;

#[async_trait]
impl QueryExecutor for DisconnectedExecutor {
    async fn execute(&self, _sql: &str, _timeout: Duration) -> std::result::Result<QueryOutcome, ExecutionFailure> {
        tracing::error!(event = "query_without_database");
        Err(ExecutionFailure::generic(NO_DATABASE_MESSAGE))
    }
}
