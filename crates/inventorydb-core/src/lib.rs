//! Core contracts shared by the inventorydb crates.
//!
//! This crate defines the schema descriptor handed to the language model,
//! the tabular result types produced by the executor, the user-facing error
//! taxonomy, and small helpers for keeping secrets out of logs.

pub mod error;
pub mod redaction;
pub mod results;
pub mod schema;
pub mod validation;

pub use error::{ExecutionFailure, PipelineError};
pub use redaction::{RedactedConnection, mask_secret, redact_connection_string};
pub use results::{CellValue, ColumnHeader, ColumnKind, ColumnStats, ResultSet};
pub use schema::{SchemaDescriptor, TableDescriptor, fallback_schema};
pub use validation::{DescriptorIssue, check_descriptor};

/// Default number of rows surfaced to the end user.
pub const DEFAULT_DISPLAY_CAP: usize = 500;

/// Default server-side statement timeout, in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 20;
