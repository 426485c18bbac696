//! PostgreSQL backend.

use chrono::{DateTime, NaiveDateTime, Utc};
use oxide_dal_core::SqlValue;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column as _, Postgres, Row as _, TypeInfo as _, ValueRef as _};

use super::{impl_sqlx_backend, unbindable};
use crate::error::Result;
use crate::pool::Row;

/// Binds a homogeneous array by the kind of its first element.
fn bind_array<'q>(
    query: Query<'q, Postgres, PgArguments>,
    items: &[SqlValue],
    whole: &SqlValue,
) -> Result<Query<'q, Postgres, PgArguments>> {
    fn collect<T>(items: &[SqlValue], pick: impl Fn(&SqlValue) -> Option<T>) -> Option<Vec<T>> {
        items.iter().map(pick).collect()
    }

    let bound = match items.first() {
        Some(SqlValue::Int(_)) => collect(items, |v| match v {
            SqlValue::Int(i) => Some(*i),
            _ => None,
        })
        .map(|v| query.bind(v)),
        Some(SqlValue::Text(_)) => collect(items, |v| match v {
            SqlValue::Text(s) => Some(s.clone()),
            _ => None,
        })
        .map(|v| query.bind(v)),
        Some(SqlValue::Float(_)) => collect(items, |v| match v {
            SqlValue::Float(f) => Some(*f),
            _ => None,
        })
        .map(|v| query.bind(v)),
        Some(SqlValue::Bool(_)) => collect(items, |v| match v {
            SqlValue::Bool(b) => Some(*b),
            _ => None,
        })
        .map(|v| query.bind(v)),
        Some(SqlValue::Timestamp(_)) => collect(items, |v| match v {
            SqlValue::Timestamp(ts) => Some(*ts),
            _ => None,
        })
        .map(|v| query.bind(v)),
        _ => None,
    };
    bound.ok_or_else(|| unbindable("postgres", whole))
}

fn build<'q>(sql: &'q str, args: &[SqlValue]) -> Result<Query<'q, Postgres, PgArguments>> {
    let mut query = sqlx::query(sql);
    for arg in args {
        query = match arg {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Blob(bytes) => query.bind(bytes.clone()),
            SqlValue::Timestamp(ts) => query.bind(*ts),
            SqlValue::Array(items) => bind_array(query, items, arg)?,
        };
    }
    Ok(query)
}

fn decode_row(row: &PgRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        let raw = row.try_get_raw(i)?;
        if raw.is_null() {
            values.push(SqlValue::Null);
            continue;
        }
        let kind = raw.type_info().name().to_string();
        let value = match kind.as_str() {
            "BOOL" => SqlValue::Bool(row.try_get_unchecked(i)?),
            "INT2" => SqlValue::Int(i64::from(row.try_get_unchecked::<i16, _>(i)?)),
            "INT4" => SqlValue::Int(i64::from(row.try_get_unchecked::<i32, _>(i)?)),
            "INT8" => SqlValue::Int(row.try_get_unchecked(i)?),
            "FLOAT4" => SqlValue::Float(f64::from(row.try_get_unchecked::<f32, _>(i)?)),
            "FLOAT8" => SqlValue::Float(row.try_get_unchecked(i)?),
            "TIMESTAMP" => SqlValue::Timestamp(row.try_get_unchecked::<NaiveDateTime, _>(i)?),
            "TIMESTAMPTZ" => {
                SqlValue::Timestamp(row.try_get_unchecked::<DateTime<Utc>, _>(i)?.naive_utc())
            }
            "BYTEA" => SqlValue::Blob(row.try_get_unchecked(i)?),
            _ => SqlValue::Text(row.try_get(i)?),
        };
        values.push(value);
    }
    Ok(Row::new(columns, values))
}

impl_sqlx_backend!(
    Postgres,
    PgTx,
    "postgres",
    Some("SET TRANSACTION READ ONLY"),
    build,
    decode_row
);
