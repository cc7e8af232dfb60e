use async_trait::async_trait;

use inventorydb_core::SchemaDescriptor;

use crate::error::Result;

/// Anything that can describe the relations a query may touch.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Returns the engine identifier (e.g. `postgres`, `fallback`).
    fn engine(&self) -> &'static str;

    /// Describe the current schema.
    async fn fetch(&self) -> Result<SchemaDescriptor>;
}
