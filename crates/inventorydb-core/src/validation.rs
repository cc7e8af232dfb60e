use serde::{Deserialize, Serialize};

use crate::schema::SchemaDescriptor;

/// A consistency problem found in a schema descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorIssue {
    pub code: String,
    pub path: String,
    pub message: String,
}

impl DescriptorIssue {
    fn new(code: &str, path: String, message: String) -> Self {
        Self {
            code: code.to_string(),
            path,
            message,
        }
    }
}

/// Check internal consistency of a schema descriptor.
///
/// This checks:
/// - primary key columns exist
/// - foreign key columns exist locally
/// - foreign key targets use `table.column` and resolve to a known column
///
/// Targets outside the described tables are reported, not rejected; the
/// descriptor is still usable for prompting.
pub fn check_descriptor(schema: &SchemaDescriptor) -> Vec<DescriptorIssue> {
    let mut issues = Vec::new();

    for (table_name, table) in &schema.tables {
        if let Some(pk) = &table.primary_key {
            if !table.columns.contains_key(pk) {
                issues.push(DescriptorIssue::new(
                    "primary_key_missing_column",
                    format!("{table_name}.{pk}"),
                    format!("primary key column not found: {table_name}.{pk}"),
                ));
            }
        }

        for (local, target) in &table.foreign_keys {
            if !table.columns.contains_key(local) {
                issues.push(DescriptorIssue::new(
                    "foreign_key_missing_column",
                    format!("{table_name}.{local}"),
                    format!("foreign key column not found: {table_name}.{local}"),
                ));
            }

            let Some((ref_table, ref_column)) = target.split_once('.') else {
                issues.push(DescriptorIssue::new(
                    "foreign_key_bad_target",
                    format!("{table_name}.{local}"),
                    format!("foreign key target is not table.column: {target}"),
                ));
                continue;
            };

            match schema.tables.get(ref_table) {
                None => issues.push(DescriptorIssue::new(
                    "foreign_key_unknown_table",
                    format!("{table_name}.{local}"),
                    format!("referenced table not described: {ref_table}"),
                )),
                Some(referenced) if !referenced.columns.contains_key(ref_column) => {
                    issues.push(DescriptorIssue::new(
                        "foreign_key_unknown_column",
                        format!("{table_name}.{local}"),
                        format!("referenced column not found: {target}"),
                    ))
                }
                Some(_) => {}
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{TableDescriptor, fallback_schema};

    #[test]
    fn fallback_schema_is_consistent() {
        assert!(check_descriptor(&fallback_schema()).is_empty());
    }

    #[test]
    fn reports_dangling_references() {
        let mut schema = fallback_schema();
        schema.tables.insert(
            "invoices".to_string(),
            TableDescriptor::with_columns([("invoice_id", "INTEGER"), ("vendor_id", "INTEGER")])
                .primary_key("id")
                .foreign_key("vendor_id", "vendors.vendor_id")
                .foreign_key("order_ref", "orders"),
        );

        let codes: Vec<String> = check_descriptor(&schema)
            .into_iter()
            .map(|issue| issue.code)
            .collect();
        assert_eq!(
            codes,
            vec![
                "primary_key_missing_column",
                "foreign_key_missing_column",
                "foreign_key_bad_target",
                "foreign_key_unknown_table",
            ]
        );
    }
}
