//! # oxide-dal-migrate
//!
//! The connected half of the data-access layer, built on sqlx.
//!
//! This crate provides:
//! - A [`Db`] handle pairing a pool with its dialect, with plugin hosting
//! - Transactions with save-points where the dialect supports them
//! - Cancellation and deadlines through [`Context`]
//! - Catalog introspection for SQLite, PostgreSQL and MySQL
//! - An additive [`Migrator::auto_migrate`] that creates and alters, but
//!   never drops
//!
//! ## Auto-migrating
//!
//! ```rust,no_run
//! use oxide_dal_core::schema::{id, text, Model};
//! use oxide_dal_migrate::{Context, Db};
//!
//! # async fn run() -> oxide_dal_migrate::Result<()> {
//! let ctx = Context::background();
//! let db = Db::connect(&ctx, "sqlite:app.db?mode=rwc").await?;
//!
//! let users = Model::new("User", "users")
//!     .field(id("id"))
//!     .field(text("name"));
//!
//! db.migrator().auto_migrate(&ctx, &[users]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # List tables
//! oxide-dal --database sqlite:app.db tables
//!
//! # Show what a schema file would change, without changing it
//! oxide-dal migrate --schema schema.json --dry-run
//!
//! # Inline arguments into a statement for logging
//! oxide-dal --dialect postgres explain 'SELECT * FROM "t" WHERE "id" = $1' 7
//! ```

pub mod context;
pub mod db;
pub mod driver;
pub mod error;
pub mod introspect;
pub mod migrator;
pub mod pool;
pub mod schema_file;

pub use context::Context;
pub use db::{Db, Plugin, ServerInfo, Transaction};
pub use error::{MigrateError, ModelFailure, Result};
pub use introspect::{ColumnType, Index, Introspector};
pub use migrator::{Migrator, MigratorOptions};
pub use pool::{ConnPool, Pool, Row, Tx, TxBeginner, TxOptions};
