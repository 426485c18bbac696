//! SQL values and bind arguments.
//!
//! [`SqlValue`] is what ends up in a compiled statement's argument list.
//! [`Arg`] is what callers hand to the compiler: a plain value, a list for
//! membership tests, a nested expression, or a value that renders its own SQL.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::dialect::{Dialect, Engine};
use crate::expr::Expr;

/// A SQL value that can be used as a parameter.
///
/// All values are properly escaped or parameterized to prevent SQL injection.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
    /// Timestamp without time zone.
    Timestamp(NaiveDateTime),
    /// Homogeneous array, bound as one parameter by dialects with native
    /// array binding.
    Array(Vec<SqlValue>),
}

impl SqlValue {
    /// Returns the SQL representation for inline use (escaped), in the
    /// engine-neutral spelling.
    ///
    /// **Warning**: Prefer using parameterized queries instead.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        self.to_sql_literal(Engine::Generic)
    }

    /// Returns the value as a literal for `engine`.
    ///
    /// Text goes through [`quote_text`]. Blobs are `X'..'` hex literals,
    /// except on PostgreSQL where they are `'\x..'::bytea`.
    #[must_use]
    pub fn to_sql_literal(&self, engine: Engine) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            Self::Int(n) => format!("{n}"),
            Self::Float(f) => format!("{f}"),
            Self::Text(s) => quote_text(s, engine),
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                if engine == Engine::Postgres {
                    format!("'\\x{hex}'::bytea")
                } else {
                    format!("X'{hex}'")
                }
            }
            Self::Timestamp(ts) => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Self::Array(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.to_sql_literal(engine)).collect();
                format!("ARRAY[{}]", inner.join(", "))
            }
        }
    }

    /// Returns true for [`SqlValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in bind errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Timestamp(_) => "timestamp",
            Self::Array(_) => "array",
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_inline())
    }
}

/// Quotes `text` as a string literal for `engine`.
///
/// Single quotes are doubled everywhere. MySQL also reads a backslash as an
/// escape inside literals, so backslashes are doubled there.
#[must_use]
pub fn quote_text(text: &str, engine: Engine) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' if engine == Engine::MySql => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

impl ToSqlValue for i64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(self)
    }
}

impl ToSqlValue for i32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for i16 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for u32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for u16 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Timestamp(self)
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

/// Context handed to values that render their own SQL.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// The dialect being compiled for.
    pub dialect: &'a Dialect,
    /// Target table of the statement, if known.
    pub table: Option<&'a str>,
}

/// A value that produces its own SQL expression instead of a bind parameter.
///
/// The compiler asks for the expression once per occurrence and compiles the
/// result like any other expression, so the returned tree may itself contain
/// placeholders.
pub trait SqlExpression: fmt::Debug + Send + Sync {
    /// Builds the expression for the given context.
    fn to_expr(&self, ctx: &RenderContext<'_>) -> Expr;
}

/// A compiler input argument.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A plain value, bound as a placeholder (NULL is rendered inline).
    Value(SqlValue),
    /// A list of values, expanded to one placeholder per element.
    List(Vec<SqlValue>),
    /// A nested expression compiled in place.
    Expr(Box<Expr>),
    /// A value that renders its own SQL.
    Custom(Arc<dyn SqlExpression>),
    /// The dialect's default-value expression for the target column.
    Default,
}

impl Arg {
    /// Wraps a self-rendering value.
    #[must_use]
    pub fn custom(value: impl SqlExpression + 'static) -> Self {
        Self::Custom(Arc::new(value))
    }
}

impl<T: ToSqlValue> From<T> for Arg {
    fn from(value: T) -> Self {
        Self::Value(value.to_sql_value())
    }
}

impl From<Expr> for Arg {
    fn from(expr: Expr) -> Self {
        Self::Expr(Box::new(expr))
    }
}

impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Expr(a), Self::Expr(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            (Self::Default, Self::Default) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_sql_value_inline_null() {
        assert_eq!(SqlValue::Null.to_sql_inline(), "NULL");
    }

    #[test]
    fn test_sql_value_inline_bool() {
        assert_eq!(SqlValue::Bool(true).to_sql_inline(), "TRUE");
        assert_eq!(SqlValue::Bool(false).to_sql_inline(), "FALSE");
    }

    #[test]
    fn test_sql_value_inline_text_escaping() {
        assert_eq!(
            SqlValue::Text(String::from("O'Brien")).to_sql_inline(),
            "'O''Brien'"
        );
    }

    #[test]
    fn test_sql_injection_prevention() {
        let value = SqlValue::Text(String::from("'; DROP TABLE users; --"));
        assert_eq!(value.to_sql_inline(), "'''; DROP TABLE users; --'");
    }

    #[test]
    fn test_sql_value_inline_blob() {
        assert_eq!(
            SqlValue::Blob(vec![0x48, 0x45, 0x4C, 0x4C, 0x4F]).to_sql_inline(),
            "X'48454C4C4F'"
        );
    }

    #[test]
    fn test_sql_value_inline_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(
            SqlValue::Timestamp(ts).to_sql_inline(),
            "'2024-03-01 12:30:00'"
        );
    }

    #[test]
    fn test_sql_value_inline_array() {
        let value = SqlValue::Array(vec![SqlValue::Int(1), SqlValue::Text("a".into())]);
        assert_eq!(value.to_sql_inline(), "ARRAY[1, 'a']");
    }

    #[test]
    fn test_mysql_literal_doubles_backslash() {
        let value = SqlValue::Text(String::from("a\\"));
        assert_eq!(value.to_sql_literal(Engine::MySql), r"'a\\'");
        assert_eq!(value.to_sql_literal(Engine::Sqlite), r"'a\'");
        assert_eq!(quote_text(r"it's \'", Engine::MySql), r"'it''s \\'''");
    }

    #[test]
    fn test_postgres_blob_literal() {
        let value = SqlValue::Blob(vec![0xDE, 0xAD]);
        assert_eq!(value.to_sql_literal(Engine::Postgres), r"'\xDEAD'::bytea");
        assert_eq!(value.to_sql_literal(Engine::MySql), "X'DEAD'");
    }

    #[test]
    fn test_to_sql_value_conversions() {
        assert_eq!(true.to_sql_value(), SqlValue::Bool(true));
        assert_eq!(42_i32.to_sql_value(), SqlValue::Int(42));
        assert_eq!(2.5_f64.to_sql_value(), SqlValue::Float(2.5));
        assert_eq!(None::<i32>.to_sql_value(), SqlValue::Null);
        assert_eq!(Some("x").to_sql_value(), SqlValue::Text(String::from("x")));
    }

    #[test]
    fn test_arg_from_value() {
        assert_eq!(Arg::from(7_i64), Arg::Value(SqlValue::Int(7)));
        assert_eq!(Arg::from(None::<i64>), Arg::Value(SqlValue::Null));
    }
}
