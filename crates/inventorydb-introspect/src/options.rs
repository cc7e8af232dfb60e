/// Options that control how introspection behaves.
#[derive(Debug, Clone)]
pub struct IntrospectOptions {
    /// Namespaces to describe. Tables outside `public` are keyed as `schema.table`.
    pub schemas: Vec<String>,
    pub include_views: bool,
    pub include_materialized_views: bool,
    pub include_foreign_tables: bool,
}

impl Default for IntrospectOptions {
    fn default() -> Self {
        Self {
            schemas: vec!["public".to_string()],
            include_views: true,
            include_materialized_views: true,
            include_foreign_tables: false,
        }
    }
}
