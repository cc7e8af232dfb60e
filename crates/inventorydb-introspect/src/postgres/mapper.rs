use inventorydb_core::{SchemaDescriptor, TableDescriptor};

use crate::options::IntrospectOptions;

use super::queries::{RawColumn, RawForeignKey, RawPrimaryKey, RawTable};

const DEFAULT_NAMESPACE: &str = "public";

/// Name under which a relation appears in the descriptor.
pub fn qualified_name(schema: &str, table: &str) -> String {
    if schema == DEFAULT_NAMESPACE {
        table.to_string()
    } else {
        format!("{schema}.{table}")
    }
}

/// Whether a `pg_class.relkind` code is described under these options.
pub fn relkind_enabled(relkind: i8, opts: &IntrospectOptions) -> bool {
    match relkind as u8 {
        b'r' | b'p' => true,
        b'v' => opts.include_views,
        b'm' => opts.include_materialized_views,
        b'f' => opts.include_foreign_tables,
        _ => false,
    }
}

/// Fold the raw catalog rows of one namespace into the descriptor.
pub fn merge_schema(
    descriptor: &mut SchemaDescriptor,
    schema: &str,
    tables: Vec<RawTable>,
    columns: Vec<RawColumn>,
    primary_keys: Vec<RawPrimaryKey>,
    foreign_keys: Vec<RawForeignKey>,
    opts: &IntrospectOptions,
) {
    for table in tables {
        if relkind_enabled(table.relkind, opts) {
            descriptor
                .tables
                .insert(qualified_name(schema, &table.name), TableDescriptor::default());
        }
    }

    for column in columns {
        if let Some(table) = descriptor
            .tables
            .get_mut(&qualified_name(schema, &column.table_name))
        {
            table
                .columns
                .insert(column.name, column.data_type.to_uppercase());
        }
    }

    for pk in primary_keys {
        if let Some(table) = descriptor
            .tables
            .get_mut(&qualified_name(schema, &pk.table_name))
        {
            table.primary_key.get_or_insert(pk.column_name);
        }
    }

    for fk in foreign_keys {
        if let Some(table) = descriptor
            .tables
            .get_mut(&qualified_name(schema, &fk.table_name))
        {
            let target = format!(
                "{}.{}",
                qualified_name(&fk.referenced_schema, &fk.referenced_table),
                fk.referenced_column
            );
            table.foreign_keys.insert(fk.column_name, target);
        }
    }
}
