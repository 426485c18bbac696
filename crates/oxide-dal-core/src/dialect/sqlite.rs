//! SQLite dialect.

use super::{
    base_type, bind_question, explain_question, quote_double, Dialect, Engine, Placeholder,
    STANDARD_SAVEPOINTS,
};
use crate::expr::{raw, Expr};
use crate::schema::{DataType, Field};

/// SQLite.
///
/// Types follow SQLite's affinity rules, so string lengths are not enforced
/// and not introspected. An auto-incrementing integer primary key is declared
/// inline as `integer PRIMARY KEY AUTOINCREMENT`.
pub static SQLITE: Dialect = Dialect {
    name: "sqlite",
    engine: Engine::Sqlite,
    quote_char: '"',
    placeholder: Placeholder::Question,
    data_type_of,
    default_value_of,
    bind_var_to: bind_question,
    quote_to: quote_double,
    explain: explain_question,
    limit_offset,
    normalize_type,
    version_query: Some("SELECT sqlite_version()"),
    savepoints: Some(STANDARD_SAVEPOINTS),
    array_binding: false,
    returning: true,
};

fn data_type_of(field: &Field) -> String {
    match &field.data_type {
        DataType::Boolean => String::from("numeric"),
        DataType::SmallInt | DataType::Integer | DataType::BigInt => {
            if field.auto_increment && field.primary_key {
                String::from("integer PRIMARY KEY AUTOINCREMENT")
            } else {
                String::from("integer")
            }
        }
        DataType::Real | DataType::Double => String::from("real"),
        DataType::Decimal => match (field.precision, field.scale) {
            (Some(p), Some(s)) => format!("decimal({p},{s})"),
            (Some(p), None) => format!("decimal({p})"),
            _ => String::from("numeric"),
        },
        DataType::Char | DataType::Varchar | DataType::Text | DataType::Json | DataType::Uuid => {
            String::from("text")
        }
        DataType::Blob => String::from("blob"),
        DataType::Date | DataType::Time | DataType::Timestamp => String::from("datetime"),
        DataType::Custom(name) => name.clone(),
    }
}

/// SQLite has no `DEFAULT` keyword in VALUES, so the declared default is
/// repeated, or NULL when there is none (which also picks the next rowid).
fn default_value_of(field: &Field) -> Option<Expr> {
    let sql = field
        .default
        .as_ref()
        .map_or_else(|| String::from("NULL"), |d| d.to_sql());
    Some(raw(sql, vec![]))
}

fn limit_offset(out: &mut String, limit: Option<u64>, offset: Option<u64>) {
    match (limit, offset) {
        (Some(limit), offset) => {
            out.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = offset {
                out.push_str(&format!(" OFFSET {offset}"));
            }
        }
        (None, Some(offset)) => out.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
        (None, None) => {}
    }
}

fn normalize_type(declared: &str) -> String {
    let base = base_type(declared);
    let canonical = match base.as_str() {
        "int" | "integer" | "tinyint" | "smallint" | "mediumint" | "bigint" => "integer",
        "char" | "varchar" | "character varying" | "text" | "clob" | "json" | "uuid" => "text",
        "real" | "double" | "double precision" | "float" => "real",
        "numeric" | "decimal" | "boolean" | "bool" => "numeric",
        "date" | "time" | "datetime" | "timestamp" => "datetime",
        "blob" => "blob",
        _ => return base,
    };
    String::from(canonical)
}
