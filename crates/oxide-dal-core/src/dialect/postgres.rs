//! PostgreSQL dialect.

use super::{
    base_type, bind_dollar, explain_dollar, limit_offset_standard, quote_double, Dialect, Engine,
    Placeholder, STANDARD_SAVEPOINTS,
};
use crate::expr::{raw, Expr};
use crate::schema::{DataType, Field};

/// PostgreSQL.
///
/// Auto-increment uses the serial pseudo-types; lists bind as one array
/// parameter.
pub static POSTGRES: Dialect = Dialect {
    name: "postgres",
    engine: Engine::Postgres,
    quote_char: '"',
    placeholder: Placeholder::Dollar,
    data_type_of,
    default_value_of,
    bind_var_to: bind_dollar,
    quote_to: quote_double,
    explain: explain_dollar,
    limit_offset: limit_offset_standard,
    normalize_type,
    version_query: Some("SHOW server_version"),
    savepoints: Some(STANDARD_SAVEPOINTS),
    array_binding: true,
    returning: true,
};

fn data_type_of(field: &Field) -> String {
    let serial = field.auto_increment;
    match &field.data_type {
        DataType::Boolean => String::from("boolean"),
        DataType::SmallInt if serial => String::from("smallserial"),
        DataType::SmallInt => String::from("smallint"),
        DataType::Integer if serial => String::from("serial"),
        DataType::Integer => String::from("integer"),
        DataType::BigInt if serial => String::from("bigserial"),
        DataType::BigInt => String::from("bigint"),
        DataType::Real => String::from("real"),
        DataType::Double => String::from("double precision"),
        DataType::Decimal => match (field.precision, field.scale) {
            (Some(p), Some(s)) => format!("numeric({p},{s})"),
            (Some(p), None) => format!("numeric({p})"),
            _ => String::from("numeric"),
        },
        DataType::Char => format!("char({})", field.size.unwrap_or(1)),
        DataType::Varchar => field
            .size
            .map_or_else(|| String::from("text"), |n| format!("varchar({n})")),
        DataType::Text => String::from("text"),
        DataType::Blob => String::from("bytea"),
        DataType::Date => String::from("date"),
        DataType::Time => String::from("time"),
        DataType::Timestamp => String::from("timestamptz"),
        DataType::Json => String::from("jsonb"),
        DataType::Uuid => String::from("uuid"),
        DataType::Custom(name) => name.clone(),
    }
}

fn default_value_of(_field: &Field) -> Option<Expr> {
    Some(raw("DEFAULT", vec![]))
}

fn normalize_type(declared: &str) -> String {
    let base = base_type(declared);
    let canonical = match base.as_str() {
        "smallint" | "int2" | "smallserial" | "serial2" => "int2",
        "integer" | "int" | "int4" | "serial" | "serial4" => "int4",
        "bigint" | "int8" | "bigserial" | "serial8" => "int8",
        "boolean" | "bool" => "bool",
        "real" | "float4" => "float4",
        "double precision" | "float8" | "double" => "float8",
        "numeric" | "decimal" => "numeric",
        "character varying" | "varchar" => "varchar",
        "character" | "char" | "bpchar" => "bpchar",
        "timestamp with time zone" | "timestamptz" => "timestamptz",
        "timestamp" | "timestamp without time zone" => "timestamp",
        "time" | "time without time zone" => "time",
        "bytea" | "blob" => "bytea",
        _ => return base,
    };
    String::from(canonical)
}
