use sqlx::PgPool;

use crate::error::Result;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawTable {
    pub name: String,
    pub relkind: i8,
}

pub async fn list_tables(pool: &PgPool, schema: &str) -> Result<Vec<RawTable>> {
    let rows = sqlx::query_as::<_, RawTable>(
        r#"
        select
          c.relname::text as name,
          c.relkind as relkind
        from pg_class c
        join pg_namespace n on n.oid = c.relnamespace
        where n.nspname = $1
          and c.relkind in ('r','p','v','m','f')
        order by c.relname
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawColumn {
    pub table_name: String,
    pub name: String,
    pub data_type: String,
}

pub async fn list_columns(pool: &PgPool, schema: &str) -> Result<Vec<RawColumn>> {
    let rows = sqlx::query_as::<_, RawColumn>(
        r#"
        select
          c.relname::text as table_name,
          a.attname::text as name,
          pg_catalog.format_type(a.atttypid, a.atttypmod) as data_type
        from pg_attribute a
        join pg_class c on c.oid = a.attrelid
        join pg_namespace n on n.oid = c.relnamespace
        where n.nspname = $1
          and c.relkind in ('r','p','v','m','f')
          and a.attnum > 0
          and not a.attisdropped
        order by c.relname, a.attnum
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// First column of each primary-key constraint.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawPrimaryKey {
    pub table_name: String,
    pub column_name: String,
}

pub async fn list_primary_keys(pool: &PgPool, schema: &str) -> Result<Vec<RawPrimaryKey>> {
    let rows = sqlx::query_as::<_, RawPrimaryKey>(
        r#"
        select
          rel.relname::text as table_name,
          att.attname::text as column_name
        from pg_constraint con
        join pg_class rel on rel.oid = con.conrelid
        join pg_namespace nsp on nsp.oid = rel.relnamespace
        join pg_attribute att on att.attrelid = rel.oid and att.attnum = con.conkey[1]
        where nsp.nspname = $1
          and con.contype = 'p'
        order by rel.relname
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// One row per (local column, referenced column) pair of a foreign key.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawForeignKey {
    pub table_name: String,
    pub column_name: String,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

pub async fn list_foreign_keys(pool: &PgPool, schema: &str) -> Result<Vec<RawForeignKey>> {
    let rows = sqlx::query_as::<_, RawForeignKey>(
        r#"
        select
          src_rel.relname::text as table_name,
          src_att.attname::text as column_name,
          ref_nsp.nspname::text as referenced_schema,
          ref_rel.relname::text as referenced_table,
          ref_att.attname::text as referenced_column
        from pg_constraint con
        join pg_class src_rel on src_rel.oid = con.conrelid
        join pg_namespace src_nsp on src_nsp.oid = src_rel.relnamespace
        join pg_class ref_rel on ref_rel.oid = con.confrelid
        join pg_namespace ref_nsp on ref_nsp.oid = ref_rel.relnamespace
        join unnest(con.conkey, con.confkey) as k(src_attnum, ref_attnum) on true
        join pg_attribute src_att on src_att.attrelid = con.conrelid and src_att.attnum = k.src_attnum
        join pg_attribute ref_att on ref_att.attrelid = con.confrelid and ref_att.attnum = k.ref_attnum
        where src_nsp.nspname = $1
          and con.contype = 'f'
        order by src_rel.relname, con.conname, src_att.attnum
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
