//! SQLite backend.

use oxide_dal_core::SqlValue;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column as _, Row as _, Sqlite, TypeInfo as _, ValueRef as _};

use super::{impl_sqlx_backend, unbindable};
use crate::error::Result;
use crate::pool::Row;

fn build<'q>(sql: &'q str, args: &[SqlValue]) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>> {
    let mut query = sqlx::query(sql);
    for arg in args {
        query = match arg {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Blob(bytes) => query.bind(bytes.clone()),
            SqlValue::Timestamp(ts) => query.bind(*ts),
            SqlValue::Array(_) => return Err(unbindable("sqlite", arg)),
        };
    }
    Ok(query)
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        let raw = row.try_get_raw(i)?;
        if raw.is_null() {
            values.push(SqlValue::Null);
            continue;
        }
        let kind = raw.type_info().name().to_ascii_uppercase();
        let value = match kind.as_str() {
            "INTEGER" | "BOOLEAN" => SqlValue::Int(row.try_get_unchecked(i)?),
            "REAL" | "NUMERIC" => SqlValue::Float(row.try_get_unchecked(i)?),
            "BLOB" => SqlValue::Blob(row.try_get_unchecked(i)?),
            _ => SqlValue::Text(row.try_get_unchecked(i)?),
        };
        values.push(value);
    }
    Ok(Row::new(columns, values))
}

impl_sqlx_backend!(Sqlite, SqliteTx, "sqlite", None, build, decode_row);

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    use super::*;
    use crate::context::Context;
    use crate::error::MigrateError;
    use crate::pool::{ConnPool, Tx, TxBeginner, TxOptions};

    async fn setup() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_exec_and_query_round_trip() {
        let pool = setup().await;
        let ctx = Context::background();
        pool.exec(
            &ctx,
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL, data BLOB)",
            &[],
        )
        .await
        .unwrap();
        let affected = pool
            .exec(
                &ctx,
                "INSERT INTO t (name, score, data) VALUES (?, ?, ?)",
                &[
                    SqlValue::Text("ann".into()),
                    SqlValue::Float(1.5),
                    SqlValue::Blob(vec![1, 2]),
                ],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = pool
            .query(&ctx, "SELECT id, name, score, data FROM t", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].int("id"), Some(1));
        assert_eq!(rows[0].text("name").as_deref(), Some("ann"));
        assert_eq!(rows[0].get("score"), Some(&SqlValue::Float(1.5)));
        assert_eq!(rows[0].get("data"), Some(&SqlValue::Blob(vec![1, 2])));
    }

    #[tokio::test]
    async fn test_null_decodes_as_null() {
        let pool = setup().await;
        let ctx = Context::background();
        let row = pool
            .query_row(&ctx, "SELECT NULL AS nothing", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get("nothing"), Some(&SqlValue::Null));
    }

    #[tokio::test]
    async fn test_array_argument_rejected() {
        let pool = setup().await;
        let ctx = Context::background();
        let err = pool
            .query(&ctx, "SELECT ?", &[SqlValue::Array(vec![SqlValue::Int(1)])])
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Compile(_)));
    }

    #[tokio::test]
    async fn test_read_only_transaction_unsupported() {
        let pool = setup().await;
        let ctx = Context::background();
        let err = pool
            .begin_tx(&ctx, TxOptions { read_only: true })
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
    }

    #[tokio::test]
    async fn test_transaction_rollback_discards_writes() {
        let pool = setup().await;
        let ctx = Context::background();
        pool.exec(&ctx, "CREATE TABLE t (id INTEGER)", &[])
            .await
            .unwrap();

        let tx = pool.begin_tx(&ctx, TxOptions::default()).await.unwrap();
        tx.exec(&ctx, "INSERT INTO t (id) VALUES (1)", &[])
            .await
            .unwrap();
        tx.rollback(&ctx).await.unwrap();

        let rows = pool.query(&ctx, "SELECT id FROM t", &[]).await.unwrap();
        assert!(rows.is_empty());
    }
}
