use oxide_dal_core::SqlValue;

use super::{group_indexes, malformed, ColumnType, Index};
use crate::context::Context;
use crate::error::Result;
use crate::pool::ConnPool;

const COLUMNS_SQL: &str = "\
SELECT c.column_name::text AS column_name, \
       c.udt_name::text AS udt_name, \
       c.data_type::text AS data_type, \
       c.is_nullable::text AS is_nullable, \
       c.column_default::text AS column_default, \
       c.is_identity::text AS is_identity, \
       c.character_maximum_length::int8 AS char_length, \
       c.numeric_precision::int8 AS numeric_precision, \
       c.numeric_scale::int8 AS numeric_scale, \
       col_description(format('%I.%I', c.table_schema, c.table_name)::regclass::oid, \
                       c.ordinal_position::int) AS column_comment \
FROM information_schema.columns c \
WHERE c.table_schema = CURRENT_SCHEMA() AND c.table_name = $1 \
ORDER BY c.ordinal_position";

const KEYS_SQL: &str = "\
SELECT a.attname::text AS column_name, \
       i.indisprimary AS is_primary, \
       i.indisunique AS is_unique, \
       i.indnatts::int8 AS column_count \
FROM pg_index i \
JOIN pg_class t ON t.oid = i.indrelid \
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(i.indkey) \
WHERE t.relname = $1 AND t.relnamespace = CURRENT_SCHEMA()::regnamespace";

const INDEXES_SQL: &str = "\
SELECT ic.relname::text AS index_name, \
       i.indisprimary AS is_primary, \
       i.indisunique AS is_unique, \
       a.attname::text AS column_name, \
       pg_get_expr(i.indpred, i.indrelid) AS predicate \
FROM pg_index i \
JOIN pg_class t ON t.oid = i.indrelid \
JOIN pg_class ic ON ic.oid = i.indexrelid \
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(i.indkey) \
WHERE t.relname = $1 AND t.relnamespace = CURRENT_SCHEMA()::regnamespace \
ORDER BY ic.relname, array_position(i.indkey::int2[], a.attnum)";

fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}

pub(super) async fn current_database<C: ConnPool + ?Sized>(conn: &C, ctx: &Context) -> Result<String> {
    let row = conn
        .query_row(ctx, "SELECT CURRENT_DATABASE()::text AS name", &[])
        .await?;
    Ok(row.and_then(|r| r.text("name")).unwrap_or_default())
}

pub(super) async fn get_tables<C: ConnPool + ?Sized>(conn: &C, ctx: &Context) -> Result<Vec<String>> {
    let rows = conn
        .query(
            ctx,
            "SELECT table_name::text AS table_name FROM information_schema.tables \
             WHERE table_schema = CURRENT_SCHEMA() AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
            &[],
        )
        .await?;
    Ok(rows.iter().filter_map(|r| r.text("table_name")).collect())
}

pub(super) async fn column_types<C: ConnPool + ?Sized>(
    conn: &C,
    ctx: &Context,
    table: &str,
) -> Result<Vec<ColumnType>> {
    let keys = conn.query(ctx, KEYS_SQL, &[text(table)]).await?;
    let is_key = |column: &str, primary: bool| {
        keys.iter().any(|k| {
            k.text("column_name").as_deref() == Some(column)
                && if primary {
                    k.flag("is_primary")
                } else {
                    k.flag("is_unique") && !k.flag("is_primary") && k.int("column_count") == Some(1)
                }
        })
    };

    let rows = conn.query(ctx, COLUMNS_SQL, &[text(table)]).await?;
    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let name = row.text("column_name").ok_or_else(|| malformed(table, "column_name"))?;
        let udt = row.text("udt_name").unwrap_or_default();
        let default = row.text("column_default");
        let auto_increment = row.flag("is_identity")
            || default.as_deref().is_some_and(|d| d.starts_with("nextval("));
        let length = row.int("char_length");
        let decimal_size = if udt == "numeric" {
            row.int("numeric_precision")
                .map(|p| (p, row.int("numeric_scale").unwrap_or(0)))
        } else {
            None
        };
        let column_type = match (length, decimal_size) {
            (Some(len), _) => format!("{udt}({len})"),
            (None, Some((p, s))) => format!("{udt}({p},{s})"),
            _ => udt.clone(),
        };
        columns.push(ColumnType {
            primary_key: Some(is_key(&name, true)),
            unique: Some(is_key(&name, false)),
            nullable: Some(row.flag("is_nullable")),
            auto_increment: Some(auto_increment),
            default_value: if auto_increment { None } else { default },
            comment: row.text("column_comment"),
            database_type_name: udt,
            column_type: Some(column_type),
            length,
            decimal_size,
            name,
        });
    }
    Ok(columns)
}

pub(super) async fn get_indexes<C: ConnPool + ?Sized>(
    conn: &C,
    ctx: &Context,
    table: &str,
) -> Result<Vec<Index>> {
    let rows = conn.query(ctx, INDEXES_SQL, &[text(table)]).await?;
    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        let name = row.text("index_name").ok_or_else(|| malformed(table, "index_name"))?;
        let column = row.text("column_name").ok_or_else(|| malformed(table, "column_name"))?;
        let option = row.text("predicate").map(|p| format!("WHERE {p}"));
        entries.push((name, column, row.flag("is_primary"), row.flag("is_unique"), option));
    }
    Ok(group_indexes(table, entries))
}

pub(super) async fn has_constraint<C: ConnPool + ?Sized>(
    conn: &C,
    ctx: &Context,
    table: &str,
    name: &str,
) -> Result<bool> {
    let row = conn
        .query_row(
            ctx,
            "SELECT count(*) AS n FROM information_schema.table_constraints \
             WHERE table_schema = CURRENT_SCHEMA() AND table_name = $1 AND constraint_name = $2",
            &[text(table), text(name)],
        )
        .await?;
    Ok(row.and_then(|r| r.int("n")).unwrap_or(0) > 0)
}
