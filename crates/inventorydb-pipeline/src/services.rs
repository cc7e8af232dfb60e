use std::sync::Arc;
use std::time::Duration;

use inventorydb_core::DEFAULT_QUERY_TIMEOUT_SECS;
use inventorydb_introspect::SchemaSource;
use inventorydb_llm::Gateway;
use inventorydb_sql::QueryExecutor;

/// Process-wide handles injected into every orchestrator.
///
/// All three are read-only after construction and safe to share across
/// concurrent requests; each request still gets its own state and its own
/// database connection.
#[derive(Clone)]
pub struct Services {
    pub schema: Arc<dyn SchemaSource>,
    pub gateway: Gateway,
    pub executor: Arc<dyn QueryExecutor>,
    pub query_timeout: Duration,
}

impl Services {
    pub fn new(
        schema: Arc<dyn SchemaSource>,
        gateway: Gateway,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            schema,
            gateway,
            executor,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}
