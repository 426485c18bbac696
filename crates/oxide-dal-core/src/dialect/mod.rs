//! Dialect records.
//!
//! A [`Dialect`] is a fixed record of functions and flags describing one
//! database engine: how it names types, quotes identifiers, spells
//! placeholders, paginates and nests transactions. Dialects are immutable
//! statics shared by every compilation; probing a live server never mutates
//! them.

mod explain;
mod generic;
mod mysql;
mod postgres;
mod registry;
mod sqlite;

pub use explain::{explain_backslash, explain_dollar, explain_question};
pub use generic::GENERIC;
pub use mysql::MYSQL;
pub use postgres::POSTGRES;
pub use registry::DialectRegistry;
pub use sqlite::SQLITE;

use std::fmt;

use crate::error::{CompileError, QuoteError};
use crate::expr::Expr;
use crate::quote::{self, Quoter};
use crate::schema::Field;
use crate::value::SqlValue;

/// Database engine families. Catalog queries and DDL variants dispatch on
/// this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    /// SQLite.
    Sqlite,
    /// PostgreSQL.
    Postgres,
    /// MySQL / MariaDB.
    MySql,
    /// Engine-agnostic fallback without catalog support.
    Generic,
}

/// Placeholder spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `?` for every argument.
    Question,
    /// `$1`, `$2`, ...
    Dollar,
}

/// Save-point statements. Both functions receive an already quoted name.
#[derive(Clone, Copy)]
pub struct SavePoints {
    /// Creates a save-point.
    pub save: fn(&str) -> String,
    /// Rolls back to a save-point.
    pub rollback_to: fn(&str) -> String,
}

impl fmt::Debug for SavePoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SavePoints").finish_non_exhaustive()
    }
}

fn savepoint(name: &str) -> String {
    format!("SAVEPOINT {name}")
}

fn rollback_to_savepoint(name: &str) -> String {
    format!("ROLLBACK TO SAVEPOINT {name}")
}

/// Standard `SAVEPOINT` / `ROLLBACK TO SAVEPOINT` statements.
pub const STANDARD_SAVEPOINTS: SavePoints = SavePoints {
    save: savepoint,
    rollback_to: rollback_to_savepoint,
};

/// One database dialect.
#[derive(Clone, Copy)]
pub struct Dialect {
    /// Registry name.
    pub name: &'static str,
    /// Engine family.
    pub engine: Engine,
    /// Identifier quote character.
    pub quote_char: char,
    /// Placeholder spelling.
    pub placeholder: Placeholder,
    /// Native column type for a field, without constraints.
    pub data_type_of: fn(&Field) -> String,
    /// Expression inserted for a column whose value is left to the database.
    /// `None` means the dialect cannot express it.
    pub default_value_of: fn(&Field) -> Option<Expr>,
    /// Appends the placeholder for the 1-based argument position.
    pub bind_var_to: fn(&mut String, usize),
    /// Appends a quoted identifier.
    pub quote_to: fn(&mut String, &str),
    /// Inlines arguments into SQL for logging. Not injection-safe.
    pub explain: fn(&str, &[SqlValue]) -> String,
    /// Appends LIMIT/OFFSET for the given values.
    pub limit_offset: fn(&mut String, Option<u64>, Option<u64>),
    /// Canonical base type name, used to compare declared and live types.
    pub normalize_type: fn(&str) -> String,
    /// Query returning the server version, run by `Initialize`.
    pub version_query: Option<&'static str>,
    /// Save-point support.
    pub savepoints: Option<SavePoints>,
    /// Binds lists as one native array parameter.
    pub array_binding: bool,
    /// Supports `RETURNING`.
    pub returning: bool,
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("name", &self.name)
            .field("engine", &self.engine)
            .field("quote_char", &self.quote_char)
            .field("placeholder", &self.placeholder)
            .finish_non_exhaustive()
    }
}

impl Dialect {
    /// Returns the quoted form of `raw`.
    #[must_use]
    pub fn quote(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len() + 2);
        (self.quote_to)(&mut out, raw);
        out
    }

    /// Returns a validated quoter for this dialect.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::InvalidQuoteChar`] if the record is misconfigured.
    pub fn quoter(&self) -> Result<Quoter, QuoteError> {
        Quoter::new(self.quote_char)
    }

    /// Checks that the quoting function agrees with the quote character.
    ///
    /// # Errors
    ///
    /// Returns a [`QuoteError`] when the record is inconsistent.
    pub fn validate(&self) -> Result<(), QuoteError> {
        let quoter = self.quoter()?;
        let probe = "a.b";
        if self.quote(probe) != quoter.quote(probe) {
            return Err(QuoteError::InvalidQuoteChar(self.quote_char));
        }
        Ok(())
    }

    /// Returns the `SAVEPOINT` statement.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Unsupported`] when the dialect has no
    /// save-points.
    pub fn savepoint_sql(&self, name: &str) -> Result<String, CompileError> {
        let savepoints = self.savepoints.ok_or(CompileError::Unsupported {
            dialect: self.name,
            operation: "SavePoint",
        })?;
        Ok((savepoints.save)(&self.quote(name)))
    }

    /// Returns the `ROLLBACK TO SAVEPOINT` statement.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Unsupported`] when the dialect has no
    /// save-points.
    pub fn rollback_to_sql(&self, name: &str) -> Result<String, CompileError> {
        let savepoints = self.savepoints.ok_or(CompileError::Unsupported {
            dialect: self.name,
            operation: "RollbackTo",
        })?;
        Ok((savepoints.rollback_to)(&self.quote(name)))
    }

    /// Builds an `Unsupported` error for this dialect.
    #[must_use]
    pub const fn unsupported(&self, operation: &'static str) -> CompileError {
        CompileError::Unsupported {
            dialect: self.name,
            operation,
        }
    }
}

/// Appends `?`.
pub fn bind_question(out: &mut String, _position: usize) {
    out.push('?');
}

/// Appends `$n`.
pub fn bind_dollar(out: &mut String, position: usize) {
    out.push('$');
    out.push_str(&position.to_string());
}

/// Quotes with double quotes.
pub fn quote_double(out: &mut String, raw: &str) {
    quote::quote_to(out, raw, '"');
}

/// Quotes with backticks.
pub fn quote_backtick(out: &mut String, raw: &str) {
    quote::quote_to(out, raw, '`');
}

/// `LIMIT n OFFSET m`, each part optional.
pub fn limit_offset_standard(out: &mut String, limit: Option<u64>, offset: Option<u64>) {
    if let Some(limit) = limit {
        out.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = offset {
        out.push_str(&format!(" OFFSET {offset}"));
    }
}

/// Lowercased type name up to the first parenthesis, without trailing
/// column attributes such as `PRIMARY KEY` or `UNSIGNED`.
#[must_use]
pub fn base_type(declared: &str) -> String {
    const STOP_WORDS: &[&str] = &[
        "primary",
        "autoincrement",
        "auto_increment",
        "unsigned",
        "zerofill",
        "not",
        "null",
        "default",
        "unique",
    ];

    let lower = declared.to_ascii_lowercase();
    let head = lower.split('(').next().unwrap_or_default();
    head.split_whitespace()
        .take_while(|word| !STOP_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}
