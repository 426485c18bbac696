use oxide_dal_core::dialect::base_type;
use oxide_dal_core::SqlValue;

use super::{group_indexes, malformed, type_modifiers, ColumnType, Index};
use crate::context::Context;
use crate::error::Result;
use crate::pool::ConnPool;

fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}

pub(super) async fn current_database<C: ConnPool + ?Sized>(conn: &C, ctx: &Context) -> Result<String> {
    let row = conn
        .query_row(ctx, "SELECT name FROM pragma_database_list WHERE seq = 0", &[])
        .await?;
    Ok(row
        .and_then(|r| r.text("name"))
        .unwrap_or_else(|| String::from("main")))
}

pub(super) async fn get_tables<C: ConnPool + ?Sized>(conn: &C, ctx: &Context) -> Result<Vec<String>> {
    let rows = conn
        .query(
            ctx,
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            &[],
        )
        .await?;
    Ok(rows.iter().filter_map(|r| r.text("name")).collect())
}

async fn table_sql<C: ConnPool + ?Sized>(conn: &C, ctx: &Context, table: &str) -> Result<Option<String>> {
    let row = conn
        .query_row(
            ctx,
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[text(table)],
        )
        .await?;
    Ok(row.and_then(|r| r.text("sql")))
}

/// Columns covered by a single-column unique index.
async fn unique_columns<C: ConnPool + ?Sized>(conn: &C, ctx: &Context, table: &str) -> Result<Vec<String>> {
    let mut columns = Vec::new();
    for index in get_indexes(conn, ctx, table).await? {
        if index.unique && !index.primary_key && index.columns.len() == 1 {
            columns.extend(index.columns);
        }
    }
    Ok(columns)
}

pub(super) async fn column_types<C: ConnPool + ?Sized>(
    conn: &C,
    ctx: &Context,
    table: &str,
) -> Result<Vec<ColumnType>> {
    let Some(sql) = table_sql(conn, ctx, table).await? else {
        return Ok(Vec::new());
    };
    let autoincrement = sql.to_ascii_uppercase().contains("AUTOINCREMENT");
    let unique = unique_columns(conn, ctx, table).await?;

    let rows = conn
        .query(
            ctx,
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid",
            &[text(table)],
        )
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let name = row.text("name").ok_or_else(|| malformed(table, "name"))?;
        let declared = row.text("type").unwrap_or_default();
        let primary_key = row.int("pk").unwrap_or(0) > 0;
        let (length, decimal_size) = type_modifiers(&declared);
        let base = base_type(&declared);
        columns.push(ColumnType {
            auto_increment: Some(primary_key && autoincrement && base == "integer"),
            unique: Some(unique.iter().any(|c| c.eq_ignore_ascii_case(&name))),
            nullable: Some(!(row.flag("notnull") || primary_key)),
            primary_key: Some(primary_key),
            database_type_name: base,
            column_type: Some(declared),
            length,
            decimal_size,
            comment: None,
            default_value: row.text("dflt_value"),
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
    let list = conn
        .query(
            ctx,
            "SELECT il.name AS name, il.\"unique\" AS is_unique, il.origin AS origin, \
             il.partial AS partial, m.sql AS sql \
             FROM pragma_index_list(?) il \
             LEFT JOIN sqlite_master m ON m.type = 'index' AND m.name = il.name \
             ORDER BY il.seq",
            &[text(table)],
        )
        .await?;

    let mut rows = Vec::new();
    for entry in &list {
        let name = entry.text("name").ok_or_else(|| malformed(table, "index name"))?;
        let option = if entry.flag("partial") {
            entry.text("sql").and_then(|sql| partial_predicate(&sql))
        } else {
            None
        };
        let primary_key = entry.text("origin").as_deref() == Some("pk");
        let unique = entry.flag("is_unique");
        let info = conn
            .query(
                ctx,
                "SELECT name FROM pragma_index_info(?) ORDER BY seqno",
                &[text(&name)],
            )
            .await?;
        for column in info.iter().filter_map(|r| r.text("name")) {
            rows.push((name.clone(), column, primary_key, unique, option.clone()));
        }
    }
    Ok(group_indexes(table, rows))
}

/// `WHERE ...` tail of a partial index definition.
fn partial_predicate(sql: &str) -> Option<String> {
    let upper = sql.to_ascii_uppercase();
    let at = upper.rfind(" WHERE ")?;
    Some(sql[at + 1..].trim().to_string())
}

pub(super) async fn has_constraint<C: ConnPool + ?Sized>(
    conn: &C,
    ctx: &Context,
    table: &str,
    name: &str,
) -> Result<bool> {
    let Some(sql) = table_sql(conn, ctx, table).await? else {
        return Ok(false);
    };
    let upper = sql.to_ascii_uppercase();
    let wanted = name.to_ascii_uppercase();
    let declared = [
        format!("CONSTRAINT \"{wanted}\""),
        format!("CONSTRAINT `{wanted}`"),
        format!("CONSTRAINT {wanted} "),
    ];
    if declared.iter().any(|d| upper.contains(d.as_str())) {
        return Ok(true);
    }
    Ok(get_indexes(conn, ctx, table)
        .await?
        .iter()
        .any(|i| i.unique && i.name == name))
}
