use async_trait::async_trait;
use sqlx::PgPool;

use inventorydb_core::SchemaDescriptor;

use crate::adapter::SchemaSource;
use crate::error::Result;
use crate::options::IntrospectOptions;

mod mapper;
mod queries;

pub use mapper::{qualified_name, relkind_enabled};
pub use queries::{RawColumn, RawForeignKey, RawPrimaryKey, RawTable};

/// Adapter for PostgreSQL databases.
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
    options: IntrospectOptions,
}

impl PostgresAdapter {
    /// Create a new adapter using a pre-configured pool.
    pub fn new(pool: PgPool, options: IntrospectOptions) -> Self {
        Self { pool, options }
    }
}

#[async_trait]
impl SchemaSource for PostgresAdapter {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn fetch(&self) -> Result<SchemaDescriptor> {
        introspect_postgres(&self.pool, &self.options).await
    }
}

/// Introspect the configured namespaces of a Postgres database.
pub async fn introspect_postgres(
    pool: &PgPool,
    opts: &IntrospectOptions,
) -> Result<SchemaDescriptor> {
    let mut descriptor = SchemaDescriptor::default();

    for schema in &opts.schemas {
        let tables = queries::list_tables(pool, schema).await?;
        let columns = queries::list_columns(pool, schema).await?;
        let primary_keys = queries::list_primary_keys(pool, schema).await?;
        let foreign_keys = queries::list_foreign_keys(pool, schema).await?;

        mapper::merge_schema(
            &mut descriptor,
            schema,
            tables,
            columns,
            primary_keys,
            foreign_keys,
            opts,
        );
    }

    tracing::info!(
        event = "schema_introspected",
        tables = descriptor.tables.len(),
        schemas = ?opts.schemas
    );

    Ok(descriptor)
}
