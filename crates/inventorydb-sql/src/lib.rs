//! Query synthesis, read-only safety checks and guarded execution.

pub mod discipline;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod references;
pub mod safety;
pub mod synthesizer;

pub use error::{Result, SqlError};
pub use executor::{
    ConnectionFactory, DisconnectedExecutor, NO_DATABASE_MESSAGE, PostgresExecutor, QueryExecutor,
    QueryOutcome, classify,
};
pub use safety::{FORBIDDEN_KEYWORDS, SafetyVerdict, validate};
pub use synthesizer::{SqlCandidate, check_candidate, extract_sql, synthesize};
