use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;

use inventorydb_core::{SchemaDescriptor, check_descriptor, fallback_schema};

use crate::adapter::SchemaSource;
use crate::error::{IntrospectError, Result};
use crate::options::IntrospectOptions;
use crate::postgres::PostgresAdapter;

/// Schema Provider: live introspection when a database is configured,
/// otherwise the fixed fallback schema.
#[derive(Debug, Clone)]
pub struct SchemaProvider {
    adapter: Option<PostgresAdapter>,
}

impl SchemaProvider {
    /// Provider that always answers with the fallback schema.
    pub fn fallback() -> Self {
        Self { adapter: None }
    }

    pub fn with_adapter(adapter: PostgresAdapter) -> Self {
        Self {
            adapter: Some(adapter),
        }
    }

    /// Build from an optional connection string. The pool connects lazily,
    /// so an unreachable database surfaces on the first `fetch`.
    pub fn from_url(database_url: Option<&str>, options: IntrospectOptions) -> Result<Self> {
        let Some(url) = database_url else {
            return Ok(Self::fallback());
        };

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy(url)
            .map_err(|err| IntrospectError::InvalidConnection(err.to_string()))?;

        Ok(Self::with_adapter(PostgresAdapter::new(pool, options)))
    }

    pub fn is_live(&self) -> bool {
        self.adapter.is_some()
    }
}

#[async_trait]
impl SchemaSource for SchemaProvider {
    fn engine(&self) -> &'static str {
        match &self.adapter {
            Some(adapter) => adapter.engine(),
            None => "fallback",
        }
    }

    async fn fetch(&self) -> Result<SchemaDescriptor> {
        let Some(adapter) = &self.adapter else {
            tracing::warn!(event = "schema_fallback", reason = "no database configured");
            return Ok(fallback_schema());
        };

        let descriptor = adapter.fetch().await?;
        for issue in check_descriptor(&descriptor) {
            tracing::debug!(
                event = "schema_issue",
                code = %issue.code,
                path = %issue.path,
                message = %issue.message
            );
        }
        Ok(descriptor)
    }
}
