//! # oxide-dal-core
//!
//! The pure half of the data-access layer: everything that turns a
//! description of a query or a schema change into SQL text, without touching
//! a connection.
//!
//! This crate provides:
//! - Identifier quoting that never rejects input and preserves pre-quoted
//!   segments
//! - A clause model keyed by clause kind, with merge-on-add semantics
//! - A compiler that renders clauses in a fixed order per statement kind and
//!   translates values into each dialect's placeholder syntax
//! - Dialect records for SQLite, PostgreSQL, MySQL and a generic fallback
//! - DDL generation for tables, columns, indexes, constraints and views
//!
//! ## Building Statements
//!
//! ```rust
//! use oxide_dal_core::dialect::{MYSQL, POSTGRES};
//! use oxide_dal_core::expr::col;
//! use oxide_dal_core::statement::Statement;
//!
//! let stmt = Statement::select_from("users")
//!     .filter(col("age").gt(21).and(col("role").eq("admin").or(col("role").eq("owner"))));
//!
//! let pg = stmt.clone().build(&POSTGRES).unwrap();
//! assert_eq!(
//!     pg.sql,
//!     r#"SELECT * FROM "users" WHERE "age" > $1 AND ("role" = $2 OR "role" = $3)"#
//! );
//!
//! let my = stmt.build(&MYSQL).unwrap();
//! assert_eq!(
//!     my.sql,
//!     "SELECT * FROM `users` WHERE `age` > ? AND (`role` = ? OR `role` = ?)"
//! );
//! ```
//!
//! ## Schema Changes
//!
//! ```rust
//! use oxide_dal_core::ddl;
//! use oxide_dal_core::dialect::SQLITE;
//! use oxide_dal_core::schema::{id, varchar, Model};
//!
//! let model = Model::new("User", "users")
//!     .field(id("id"))
//!     .field(varchar("name", 100).not_null());
//!
//! let statements = ddl::create_table(&SQLITE, &model).unwrap();
//! assert_eq!(
//!     statements[0],
//!     r#"CREATE TABLE "users" ("id" integer PRIMARY KEY AUTOINCREMENT, "name" text NOT NULL)"#
//! );
//! ```

pub mod clause;
pub mod compile;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod expr;
pub mod quote;
pub mod schema;
pub mod statement;
pub mod value;

pub use clause::{Clause, ClauseKind, Clauses};
pub use compile::{compile, BindMode, Compiled, Compiler};
pub use dialect::{Dialect, DialectRegistry, Engine};
pub use error::{CompileError, QuoteError, RegistryError, Result};
pub use expr::{col, raw, Expr};
pub use quote::Quoter;
pub use schema::{Field, Model};
pub use statement::Statement;
pub use value::{Arg, SqlValue, ToSqlValue};
