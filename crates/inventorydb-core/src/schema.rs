use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Description of the relations visible to the query synthesizer.
///
/// Serializes as `{"tables": {name: {...}}}`, which is the exact shape
/// embedded into model prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub tables: BTreeMap<String, TableDescriptor>,
}

/// Columns and keys of a single relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Column name to declared type.
    pub columns: BTreeMap<String, String>,
    /// First column of the primary-key constraint, if any.
    pub primary_key: Option<String>,
    /// Local column to `referenced_table.referenced_column`.
    pub foreign_keys: BTreeMap<String, String>,
}

impl SchemaDescriptor {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Case-insensitive table lookup, returning the canonical name.
    pub fn find_table(&self, name: &str) -> Option<(&str, &TableDescriptor)> {
        self.tables
            .iter()
            .find(|(table, _)| table.eq_ignore_ascii_case(name))
            .map(|(table, descriptor)| (table.as_str(), descriptor))
    }

    /// True when any table declares a column with this name.
    pub fn has_column(&self, name: &str) -> bool {
        self.tables
            .values()
            .any(|table| table.columns.keys().any(|col| col.eq_ignore_ascii_case(name)))
    }

    /// Pretty JSON used inside prompts.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{\"tables\": {}}".to_string())
    }
}

impl TableDescriptor {
    pub fn with_columns<I, N, T>(columns: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, ty)| (name.into(), ty.into()))
                .collect(),
            primary_key: None,
            foreign_keys: BTreeMap::new(),
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    pub fn foreign_key(mut self, column: impl Into<String>, target: impl Into<String>) -> Self {
        self.foreign_keys.insert(column.into(), target.into());
        self
    }
}

/// Static schema used when no database is configured.
pub fn fallback_schema() -> SchemaDescriptor {
    let mut tables = BTreeMap::new();

    tables.insert(
        "projects".to_string(),
        TableDescriptor::with_columns([
            ("project_id", "INTEGER"),
            ("project_name", "TEXT"),
            ("start_date", "DATE"),
            ("end_date", "DATE"),
            ("client_id", "INTEGER"),
            ("status", "TEXT"),
            ("budget", "NUMERIC"),
        ])
        .primary_key("project_id")
        .foreign_key("client_id", "clients.client_id"),
    );

    tables.insert(
        "clients".to_string(),
        TableDescriptor::with_columns([
            ("client_id", "INTEGER"),
            ("client_name", "TEXT"),
            ("industry", "TEXT"),
            ("contact_email", "TEXT"),
        ])
        .primary_key("client_id"),
    );

    tables.insert(
        "orders".to_string(),
        TableDescriptor::with_columns([
            ("order_id", "INTEGER"),
            ("project_id", "INTEGER"),
            ("order_date", "DATE"),
            ("amount", "NUMERIC"),
            ("status", "TEXT"),
        ])
        .primary_key("order_id")
        .foreign_key("project_id", "projects.project_id"),
    );

    SchemaDescriptor { tables }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_schema_has_expected_relations() {
        let schema = fallback_schema();
        assert_eq!(schema.table_names(), vec!["clients", "orders", "projects"]);

        let projects = &schema.tables["projects"];
        assert_eq!(projects.primary_key.as_deref(), Some("project_id"));
        assert_eq!(
            projects.foreign_keys.get("client_id").map(String::as_str),
            Some("clients.client_id")
        );
        assert!(schema.tables["clients"].foreign_keys.is_empty());
    }

    #[test]
    fn lookups_ignore_case() {
        let schema = fallback_schema();
        let (name, _) = schema.find_table("PROJECTS").expect("projects table");
        assert_eq!(name, "projects");
        assert!(schema.has_column("Order_Date"));
        assert!(!schema.has_column("total_amount"));
    }

    #[test]
    fn prompt_json_nests_tables() {
        let json = fallback_schema().to_prompt_json();
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["tables"]["orders"]["primary_key"], "order_id");
        assert_eq!(value["tables"]["clients"]["columns"]["industry"], "TEXT");
    }
}
