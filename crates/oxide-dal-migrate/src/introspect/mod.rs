//! Live schema introspection.
//!
//! The [`Introspector`] reads tables, columns, indexes and constraints from
//! the engine's catalog and returns them in engine-neutral shapes. The
//! migrator diffs these against [`Model`](oxide_dal_core::Model)s.

mod mysql;
mod postgres;
mod sqlite;

use oxide_dal_core::{Dialect, Engine};

use crate::context::Context;
use crate::error::{MigrateError, Result};
use crate::pool::ConnPool;

/// One live column.
///
/// Each accessor returns `None` when the engine does not report that fact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnType {
    pub(crate) name: String,
    pub(crate) database_type_name: String,
    pub(crate) column_type: Option<String>,
    pub(crate) primary_key: Option<bool>,
    pub(crate) auto_increment: Option<bool>,
    pub(crate) length: Option<i64>,
    pub(crate) decimal_size: Option<(i64, i64)>,
    pub(crate) nullable: Option<bool>,
    pub(crate) unique: Option<bool>,
    pub(crate) comment: Option<String>,
    pub(crate) default_value: Option<String>,
}

impl ColumnType {
    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native type name without modifiers (`varchar`, `int8`, ...).
    #[must_use]
    pub fn database_type_name(&self) -> &str {
        &self.database_type_name
    }

    /// Full type including size (`varchar(100)`).
    #[must_use]
    pub fn column_type(&self) -> Option<&str> {
        self.column_type.as_deref()
    }

    /// Part of the primary key.
    #[must_use]
    pub const fn primary_key(&self) -> Option<bool> {
        self.primary_key
    }

    /// Auto-incrementing.
    #[must_use]
    pub const fn auto_increment(&self) -> Option<bool> {
        self.auto_increment
    }

    /// Declared length of character types.
    #[must_use]
    pub const fn length(&self) -> Option<i64> {
        self.length
    }

    /// Precision and scale of exact numerics.
    #[must_use]
    pub const fn decimal_size(&self) -> Option<(i64, i64)> {
        self.decimal_size
    }

    /// Accepts NULL.
    #[must_use]
    pub const fn nullable(&self) -> Option<bool> {
        self.nullable
    }

    /// Covered by a single-column unique index or constraint.
    #[must_use]
    pub const fn unique(&self) -> Option<bool> {
        self.unique
    }

    /// Column comment.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Default expression as the catalog stores it.
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }
}

/// One live index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    /// Table the index belongs to.
    pub table: String,
    /// Index name.
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Backs the primary key.
    pub primary_key: bool,
    /// Enforces uniqueness.
    pub unique: bool,
    /// Partial-index predicate, as `WHERE ...`.
    pub option: Option<String>,
}

/// Reads the live schema through any connection.
#[derive(Debug)]
pub struct Introspector<'a, C: ConnPool + ?Sized> {
    conn: &'a C,
    dialect: &'static Dialect,
}

impl<'a, C: ConnPool + ?Sized> Introspector<'a, C> {
    /// Creates an introspector for `dialect` over `conn`.
    #[must_use]
    pub const fn new(conn: &'a C, dialect: &'static Dialect) -> Self {
        Self { conn, dialect }
    }

    fn unsupported(&self) -> MigrateError {
        MigrateError::Unsupported {
            dialect: self.dialect.name,
            operation: "Introspection",
        }
    }

    /// Name of the connected database (`main` on SQLite).
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn current_database(&self, ctx: &Context) -> Result<String> {
        match self.dialect.engine {
            Engine::Sqlite => sqlite::current_database(self.conn, ctx).await,
            Engine::Postgres => postgres::current_database(self.conn, ctx).await,
            Engine::MySql => mysql::current_database(self.conn, ctx).await,
            Engine::Generic => Err(self.unsupported()),
        }
    }

    /// Base tables of the current database or schema, sorted.
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn get_tables(&self, ctx: &Context) -> Result<Vec<String>> {
        match self.dialect.engine {
            Engine::Sqlite => sqlite::get_tables(self.conn, ctx).await,
            Engine::Postgres => postgres::get_tables(self.conn, ctx).await,
            Engine::MySql => mysql::get_tables(self.conn, ctx).await,
            Engine::Generic => Err(self.unsupported()),
        }
    }

    /// True if the table exists.
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn has_table(&self, ctx: &Context, table: &str) -> Result<bool> {
        Ok(self.get_tables(ctx).await?.iter().any(|t| t == table))
    }

    /// Columns of `table`, in ordinal order.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::NotFound`] for a missing table and catalog
    /// query errors.
    pub async fn column_types(&self, ctx: &Context, table: &str) -> Result<Vec<ColumnType>> {
        let columns = match self.dialect.engine {
            Engine::Sqlite => sqlite::column_types(self.conn, ctx, table).await?,
            Engine::Postgres => postgres::column_types(self.conn, ctx, table).await?,
            Engine::MySql => mysql::column_types(self.conn, ctx, table).await?,
            Engine::Generic => return Err(self.unsupported()),
        };
        if columns.is_empty() {
            return Err(MigrateError::NotFound(format!("table {table}")));
        }
        Ok(columns)
    }

    /// True if `table` has a column named `column` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns catalog query errors. A missing table is not an error.
    pub async fn has_column(&self, ctx: &Context, table: &str, column: &str) -> Result<bool> {
        match self.column_types(ctx, table).await {
            Ok(columns) => Ok(columns.iter().any(|c| c.name.eq_ignore_ascii_case(column))),
            Err(MigrateError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Indexes of `table`, including those backing primary keys and unique
    /// constraints.
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn get_indexes(&self, ctx: &Context, table: &str) -> Result<Vec<Index>> {
        match self.dialect.engine {
            Engine::Sqlite => sqlite::get_indexes(self.conn, ctx, table).await,
            Engine::Postgres => postgres::get_indexes(self.conn, ctx, table).await,
            Engine::MySql => mysql::get_indexes(self.conn, ctx, table).await,
            Engine::Generic => Err(self.unsupported()),
        }
    }

    /// True if `table` has an index named `name`.
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn has_index(&self, ctx: &Context, table: &str, name: &str) -> Result<bool> {
        Ok(self
            .get_indexes(ctx, table)
            .await?
            .iter()
            .any(|i| i.name == name))
    }

    /// True if `table` has a named constraint. On SQLite, unique constraints
    /// live as unique indexes and are found under the index name.
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn has_constraint(&self, ctx: &Context, table: &str, name: &str) -> Result<bool> {
        match self.dialect.engine {
            Engine::Sqlite => sqlite::has_constraint(self.conn, ctx, table, name).await,
            Engine::Postgres => postgres::has_constraint(self.conn, ctx, table, name).await,
            Engine::MySql => mysql::has_constraint(self.conn, ctx, table, name).await,
            Engine::Generic => Err(self.unsupported()),
        }
    }
}

/// Splits the parenthesized modifiers of a declared type into a length, or a
/// precision and scale for exact numerics.
pub(crate) fn type_modifiers(declared: &str) -> (Option<i64>, Option<(i64, i64)>) {
    let Some((head, rest)) = declared.split_once('(') else {
        return (None, None);
    };
    let inner = rest.split(')').next().unwrap_or_default();
    let numbers: Vec<i64> = inner
        .split(',')
        .filter_map(|n| n.trim().parse().ok())
        .collect();
    let head = head.trim().to_ascii_lowercase();
    let exact = head.ends_with("decimal") || head.ends_with("numeric");
    match (exact, numbers.as_slice()) {
        (true, [precision]) => (None, Some((*precision, 0))),
        (true, [precision, scale]) => (None, Some((*precision, *scale))),
        (false, [length]) => (Some(*length), None),
        _ => (None, None),
    }
}

/// Groups per-column catalog rows into indexes, keeping first-seen order.
pub(crate) fn group_indexes(
    table: &str,
    rows: impl IntoIterator<Item = (String, String, bool, bool, Option<String>)>,
) -> Vec<Index> {
    let mut indexes: Vec<Index> = Vec::new();
    for (name, column, primary_key, unique, option) in rows {
        if let Some(index) = indexes.iter_mut().find(|i| i.name == name) {
            index.columns.push(column);
            continue;
        }
        indexes.push(Index {
            table: table.to_string(),
            name,
            columns: vec![column],
            primary_key,
            unique,
            option,
        });
    }
    indexes
}

/// Missing-value error for a catalog row.
pub(crate) fn malformed(table: &str, what: &str) -> MigrateError {
    MigrateError::Introspection {
        table: table.to_string(),
        reason: format!("catalog row without {what}"),
    }
}
