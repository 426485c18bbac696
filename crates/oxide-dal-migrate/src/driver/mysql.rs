//! MySQL / MariaDB backend.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use oxide_dal_core::SqlValue;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column as _, MySql, Row as _, TypeInfo as _, ValueRef as _};

use super::{impl_sqlx_backend, unbindable};
use crate::error::Result;
use crate::pool::Row;

fn build<'q>(sql: &'q str, args: &[SqlValue]) -> Result<Query<'q, MySql, MySqlArguments>> {
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
            SqlValue::Array(_) => return Err(unbindable("mysql", arg)),
        };
    }
    Ok(query)
}

fn decode_row(row: &MySqlRow) -> Result<Row> {
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
            "BOOLEAN" => SqlValue::Bool(row.try_get_unchecked(i)?),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
                SqlValue::Int(row.try_get_unchecked(i)?)
            }
            unsigned if unsigned.ends_with("UNSIGNED") => {
                let n: u64 = row.try_get_unchecked(i)?;
                i64::try_from(n).map_or_else(|_| SqlValue::Text(n.to_string()), SqlValue::Int)
            }
            "FLOAT" => SqlValue::Float(f64::from(row.try_get_unchecked::<f32, _>(i)?)),
            "DOUBLE" => SqlValue::Float(row.try_get_unchecked(i)?),
            "DATETIME" | "TIMESTAMP" => {
                SqlValue::Timestamp(row.try_get_unchecked::<NaiveDateTime, _>(i)?)
            }
            "DATE" => SqlValue::Text(row.try_get_unchecked::<NaiveDate, _>(i)?.to_string()),
            "TIME" => SqlValue::Text(row.try_get_unchecked::<NaiveTime, _>(i)?.to_string()),
            "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
                let bytes: Vec<u8> = row.try_get_unchecked(i)?;
                String::from_utf8(bytes).map_or_else(
                    |err| SqlValue::Blob(err.into_bytes()),
                    SqlValue::Text,
                )
            }
            _ => SqlValue::Text(row.try_get_unchecked(i)?),
        };
        values.push(value);
    }
    Ok(Row::new(columns, values))
}

impl_sqlx_backend!(MySql, MySqlTx, "mysql", None, build, decode_row);
