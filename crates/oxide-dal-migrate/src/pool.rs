//! Connection pool abstraction.
//!
//! The runtime talks to databases only through these traits, so a pool, a
//! single connection and an open transaction are interchangeable wherever
//! statements are executed.

use std::fmt;

use async_trait::async_trait;
use oxide_dal_core::SqlValue;

use crate::context::Context;
use crate::error::Result;

/// A decoded result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Creates a row from parallel column and value lists.
    #[must_use]
    pub const fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Value of a column, matched case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|i| self.values.get(i))
    }

    /// Value at a position.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Column as text. Numbers are formatted; NULL and missing columns are
    /// `None`.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::Float(f) => Some(f.to_string()),
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::Blob(bytes) => String::from_utf8(bytes.clone()).ok(),
            SqlValue::Timestamp(ts) => Some(ts.to_string()),
            SqlValue::Null | SqlValue::Array(_) => None,
        }
    }

    /// Column as an integer. Numeric text is parsed.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Column as a flag. Accepts booleans, non-zero integers and the
    /// catalog spellings `YES`, `t`, `true` and `1`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        match self.get(name) {
            Some(SqlValue::Bool(b)) => *b,
            Some(SqlValue::Int(i)) => *i != 0,
            Some(SqlValue::Text(s)) => {
                matches!(s.to_ascii_lowercase().as_str(), "yes" | "t" | "true" | "1")
            }
            _ => false,
        }
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values, in column order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True for a row without columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Options for starting a transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxOptions {
    /// Open the transaction read-only.
    pub read_only: bool,
}

/// Anything that can run statements.
#[async_trait]
pub trait ConnPool: Send + Sync {
    /// Prepares `sql` without running it.
    async fn prepare(&self, ctx: &Context, sql: &str) -> Result<()>;

    /// Runs a statement and returns the number of affected rows.
    async fn exec(&self, ctx: &Context, sql: &str, args: &[SqlValue]) -> Result<u64>;

    /// Runs a query and returns every row.
    async fn query(&self, ctx: &Context, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>>;

    /// Runs a query and returns its first row, if any.
    async fn query_row(&self, ctx: &Context, sql: &str, args: &[SqlValue]) -> Result<Option<Row>> {
        Ok(self.query(ctx, sql, args).await?.into_iter().next())
    }
}

/// An open transaction.
#[async_trait]
pub trait Tx: ConnPool + fmt::Debug {
    /// Commits the transaction.
    async fn commit(self: Box<Self>, ctx: &Context) -> Result<()>;

    /// Rolls the transaction back.
    async fn rollback(self: Box<Self>, ctx: &Context) -> Result<()>;
}

/// Something that can start transactions.
#[async_trait]
pub trait TxBeginner: Send + Sync {
    /// Starts a transaction.
    async fn begin_tx(&self, ctx: &Context, options: TxOptions) -> Result<Box<dyn Tx>>;
}

/// A pool that runs statements and starts transactions.
pub trait Pool: ConnPool + TxBeginner {}

impl<T: ConnPool + TxBeginner> Pool for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row::new(
            vec!["Name".into(), "notnull".into(), "IS_NULLABLE".into(), "len".into()],
            vec![
                SqlValue::Text("id".into()),
                SqlValue::Int(1),
                SqlValue::Text("YES".into()),
                SqlValue::Text("42".into()),
            ],
        )
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let row = row();
        assert_eq!(row.text("name").as_deref(), Some("id"));
        assert_eq!(row.text("NAME").as_deref(), Some("id"));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_flag_spellings() {
        let row = row();
        assert!(row.flag("notnull"));
        assert!(row.flag("is_nullable"));
        assert!(!row.flag("name"));
        assert!(!row.flag("missing"));
    }

    #[test]
    fn test_int_parses_text() {
        let row = row();
        assert_eq!(row.int("len"), Some(42));
        assert_eq!(row.int("notnull"), Some(1));
        assert_eq!(row.int("name"), None);
    }
}
