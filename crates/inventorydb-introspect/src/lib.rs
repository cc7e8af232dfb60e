//! Schema discovery for the query pipeline.
//!
//! A [`SchemaProvider`] introspects Postgres when a pool is configured and
//! hands back the static fallback schema when it is not.

pub mod adapter;
pub mod error;
pub mod options;
pub mod postgres;
pub mod provider;

pub use adapter::SchemaSource;
pub use error::{IntrospectError, Result};
pub use options::IntrospectOptions;
pub use postgres::{PostgresAdapter, introspect_postgres};
pub use provider::SchemaProvider;

pub use inventorydb_core::SchemaDescriptor;
