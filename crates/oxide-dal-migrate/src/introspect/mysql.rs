use oxide_dal_core::SqlValue;

use super::{group_indexes, malformed, ColumnType, Index};
use crate::context::Context;
use crate::error::Result;
use crate::pool::ConnPool;

const COLUMNS_SQL: &str = "\
SELECT COLUMN_NAME AS column_name, DATA_TYPE AS data_type, COLUMN_TYPE AS column_type, \
       IS_NULLABLE AS is_nullable, COLUMN_DEFAULT AS column_default, COLUMN_KEY AS column_key, \
       EXTRA AS extra, COLUMN_COMMENT AS column_comment, \
       CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS char_length, \
       CAST(NUMERIC_PRECISION AS SIGNED) AS numeric_precision, \
       CAST(NUMERIC_SCALE AS SIGNED) AS numeric_scale \
FROM information_schema.COLUMNS \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
ORDER BY ORDINAL_POSITION";

const INDEXES_SQL: &str = "\
SELECT INDEX_NAME AS index_name, NON_UNIQUE AS non_unique, COLUMN_NAME AS column_name \
FROM information_schema.STATISTICS \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
ORDER BY INDEX_NAME, SEQ_IN_INDEX";

fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}

pub(super) async fn current_database<C: ConnPool + ?Sized>(conn: &C, ctx: &Context) -> Result<String> {
    let row = conn.query_row(ctx, "SELECT DATABASE() AS name", &[]).await?;
    Ok(row.and_then(|r| r.text("name")).unwrap_or_default())
}

pub(super) async fn get_tables<C: ConnPool + ?Sized>(conn: &C, ctx: &Context) -> Result<Vec<String>> {
    let rows = conn
        .query(
            ctx,
            "SELECT TABLE_NAME AS table_name FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
             ORDER BY TABLE_NAME",
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
    let rows = conn.query(ctx, COLUMNS_SQL, &[text(table)]).await?;
    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let name = row.text("column_name").ok_or_else(|| malformed(table, "column_name"))?;
        let data_type = row.text("data_type").unwrap_or_default().to_ascii_lowercase();
        let key = row.text("column_key").unwrap_or_default();
        let extra = row.text("extra").unwrap_or_default().to_ascii_lowercase();
        let decimal_size = if matches!(data_type.as_str(), "decimal" | "numeric") {
            row.int("numeric_precision")
                .map(|p| (p, row.int("numeric_scale").unwrap_or(0)))
        } else {
            None
        };
        columns.push(ColumnType {
            primary_key: Some(key == "PRI"),
            unique: Some(key == "UNI"),
            auto_increment: Some(extra.contains("auto_increment")),
            nullable: Some(row.flag("is_nullable")),
            length: row.int("char_length"),
            decimal_size,
            column_type: row.text("column_type"),
            comment: row.text("column_comment").filter(|c| !c.is_empty()),
            default_value: row.text("column_default"),
            database_type_name: data_type,
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
        let primary_key = name == "PRIMARY";
        entries.push((name, column, primary_key, !row.flag("non_unique"), None));
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
            "SELECT count(*) AS n FROM information_schema.TABLE_CONSTRAINTS \
             WHERE CONSTRAINT_SCHEMA = DATABASE() AND TABLE_NAME = ? AND CONSTRAINT_NAME = ?",
            &[text(table), text(name)],
        )
        .await?;
    Ok(row.and_then(|r| r.int("n")).unwrap_or(0) > 0)
}
