//! The database handle.
//!
//! [`Db`] pairs a connection pool with the dialect that compiles for it. It
//! runs statements, opens transactions, hosts plugins and hands out
//! migrators.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use oxide_dal_core::dialect::DialectRegistry;
use oxide_dal_core::{Compiled, Dialect, Engine, SqlValue, Statement};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::{MigrateError, Result};
use crate::migrator::{Migrator, MigratorOptions};
use crate::pool::{Pool, Row, Tx, TxOptions};

/// Default pool size for [`Db::connect`].
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Facts probed from the server during [`Db::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Version string as reported by the server.
    pub version: String,
}

/// An extension registered on a [`Db`].
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique name.
    fn name(&self) -> &str;

    /// Called once when the plugin is registered.
    async fn initialize(&self, db: &Db) -> Result<()>;
}

/// A connection pool plus its dialect.
pub struct Db {
    pool: Arc<dyn Pool>,
    dialect: &'static Dialect,
    server: OnceLock<ServerInfo>,
    plugins: RwLock<BTreeMap<String, Arc<dyn Plugin>>>,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("dialect", &self.dialect.name)
            .field("server", &self.server.get())
            .finish_non_exhaustive()
    }
}

impl Db {
    /// Wraps an existing pool. Call [`Db::initialize`] before use.
    #[must_use]
    pub fn new(pool: Arc<dyn Pool>, dialect: &'static Dialect) -> Self {
        Self {
            pool,
            dialect,
            server: OnceLock::new(),
            plugins: RwLock::new(BTreeMap::new()),
        }
    }

    /// Wraps an existing pool and initializes the handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be probed.
    pub async fn open(ctx: &Context, pool: Arc<dyn Pool>, dialect: &'static Dialect) -> Result<Self> {
        let db = Self::new(pool, dialect);
        db.initialize(ctx).await?;
        Ok(db)
    }

    /// Connects to `url`, picking the dialect from the URL scheme.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::UnknownDialect`] for unrecognized schemes and
    /// driver errors for failed connections.
    pub async fn connect(ctx: &Context, url: &str) -> Result<Self> {
        let dialect = DialectRegistry::with_builtins().for_url(url)?;
        Self::connect_with(ctx, url, dialect).await
    }

    /// Connects to `url` using an explicit dialect.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::UnknownDialect`] for dialects without a
    /// driver and driver errors for failed connections.
    pub async fn connect_with(ctx: &Context, url: &str, dialect: &'static Dialect) -> Result<Self> {
        let pool: Arc<dyn Pool> = match dialect.engine {
            Engine::Sqlite => {
                let pool = ctx
                    .run(async {
                        SqlitePoolOptions::new()
                            .max_connections(DEFAULT_MAX_CONNECTIONS)
                            .connect(url)
                            .await
                            .map_err(MigrateError::from)
                    })
                    .await?;
                Arc::new(pool)
            }
            Engine::Postgres => {
                let pool = ctx
                    .run(async {
                        PgPoolOptions::new()
                            .max_connections(DEFAULT_MAX_CONNECTIONS)
                            .connect(url)
                            .await
                            .map_err(MigrateError::from)
                    })
                    .await?;
                Arc::new(pool)
            }
            Engine::MySql => {
                let pool = ctx
                    .run(async {
                        MySqlPoolOptions::new()
                            .max_connections(DEFAULT_MAX_CONNECTIONS)
                            .connect(url)
                            .await
                            .map_err(MigrateError::from)
                    })
                    .await?;
                Arc::new(pool)
            }
            Engine::Generic => return Err(MigrateError::UnknownDialect(dialect.name.to_string())),
        };
        Self::open(ctx, pool, dialect).await
    }

    /// Probes the server once. Later calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns the error of the version query.
    pub async fn initialize(&self, ctx: &Context) -> Result<()> {
        if self.server.get().is_some() {
            return Ok(());
        }
        let version = match self.dialect.version_query {
            Some(sql) => self
                .pool
                .query_row(ctx, sql, &[])
                .await?
                .and_then(|row| match row.at(0) {
                    Some(SqlValue::Text(v)) => Some(v.clone()),
                    _ => None,
                })
                .unwrap_or_default(),
            None => String::new(),
        };
        info!(dialect = %self.dialect.name, version = %version, "Connected");
        let _ = self.server.set(ServerInfo { version });
        Ok(())
    }

    /// The dialect.
    #[must_use]
    pub const fn dialect(&self) -> &'static Dialect {
        self.dialect
    }

    /// Server facts, once initialized.
    #[must_use]
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server.get()
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &dyn Pool {
        &*self.pool
    }

    // =========================================================================
    // Plugins
    // =========================================================================

    /// Registers and initializes a plugin.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::DuplicatePlugin`] if the name is taken, or the
    /// plugin's initialization error, in which case it is not registered.
    pub async fn use_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let name = plugin.name().to_string();
        {
            let mut plugins = self.plugins.write().await;
            if plugins.contains_key(&name) {
                return Err(MigrateError::DuplicatePlugin(name));
            }
            plugins.insert(name.clone(), Arc::clone(&plugin));
        }
        if let Err(err) = plugin.initialize(self).await {
            self.plugins.write().await.remove(&name);
            return Err(err);
        }
        info!(plugin = %name, "Registered plugin");
        Ok(())
    }

    /// Looks up a plugin by name.
    pub async fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.read().await.get(name).cloned()
    }

    /// Registered plugin names, sorted.
    pub async fn plugin_names(&self) -> Vec<String> {
        self.plugins.read().await.keys().cloned().collect()
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Compiles a statement for this handle's dialect.
    ///
    /// # Errors
    ///
    /// Returns the compilation error.
    pub fn compile(&self, statement: Statement) -> Result<Compiled> {
        Ok(statement.build(self.dialect)?)
    }

    /// Renders SQL with its arguments inlined. For logs only.
    #[must_use]
    pub fn explain(&self, sql: &str, args: &[SqlValue]) -> String {
        (self.dialect.explain)(sql, args)
    }

    /// Prepares raw SQL.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn prepare(&self, ctx: &Context, sql: &str) -> Result<()> {
        self.pool.prepare(ctx, sql).await
    }

    /// Compiles and runs a statement, returning the affected row count.
    ///
    /// Batched inserts run one statement per batch inside a single
    /// transaction, so a failing batch leaves no rows from earlier batches.
    ///
    /// # Errors
    ///
    /// Returns compilation errors before anything is sent, then the first
    /// execution error.
    pub async fn exec(&self, ctx: &Context, statement: Statement) -> Result<u64> {
        let batches = statement.build_batches(self.dialect)?;
        if let [compiled] = batches.as_slice() {
            self.log(compiled);
            return self.pool.exec(ctx, &compiled.sql, &compiled.args).await;
        }

        let tx = self.begin(ctx, TxOptions::default()).await?;
        match tx.exec_batches(ctx, &batches).await {
            Ok(affected) => {
                tx.commit(ctx).await?;
                Ok(affected)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback(ctx).await {
                    warn!(error = %rollback, "Rollback of batched statement failed");
                }
                Err(err)
            }
        }
    }

    /// Compiles and runs a query.
    ///
    /// # Errors
    ///
    /// Returns compilation or execution errors.
    pub async fn query(&self, ctx: &Context, statement: Statement) -> Result<Vec<Row>> {
        let compiled = statement.build(self.dialect)?;
        self.log(&compiled);
        self.pool.query(ctx, &compiled.sql, &compiled.args).await
    }

    /// Compiles and runs a query, returning its first row.
    ///
    /// # Errors
    ///
    /// Returns compilation or execution errors.
    pub async fn query_row(&self, ctx: &Context, statement: Statement) -> Result<Option<Row>> {
        let compiled = statement.build(self.dialect)?;
        self.log(&compiled);
        self.pool.query_row(ctx, &compiled.sql, &compiled.args).await
    }

    /// Runs raw SQL without arguments.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn exec_sql(&self, ctx: &Context, sql: &str) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        self.pool.exec(ctx, sql, &[]).await
    }

    /// Runs a raw query with arguments.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn query_sql(&self, ctx: &Context, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>> {
        debug!(sql = %self.explain(sql, args), "Executing SQL");
        self.pool.query(ctx, sql, args).await
    }

    fn log(&self, compiled: &Compiled) {
        debug!(sql = %self.explain(&compiled.sql, &compiled.args), "Executing SQL");
    }

    // =========================================================================
    // Transactions and migrations
    // =========================================================================

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns driver errors, or [`MigrateError::Unsupported`] for options
    /// the backend cannot honor.
    pub async fn begin(&self, ctx: &Context, options: TxOptions) -> Result<Transaction<'_>> {
        let tx = self.pool.begin_tx(ctx, options).await?;
        debug!(dialect = %self.dialect.name, "Transaction started");
        Ok(Transaction { db: self, tx })
    }

    /// A migrator with default options.
    #[must_use]
    pub fn migrator(&self) -> Migrator<'_> {
        Migrator::new(self, MigratorOptions::default())
    }

    /// A migrator with explicit options.
    #[must_use]
    pub fn migrator_with(&self, options: MigratorOptions) -> Migrator<'_> {
        Migrator::new(self, options)
    }
}

/// An open transaction on a [`Db`]. Dropping it without committing rolls
/// back.
#[derive(Debug)]
pub struct Transaction<'a> {
    db: &'a Db,
    tx: Box<dyn Tx>,
}

impl Transaction<'_> {
    /// Compiles and runs a statement inside the transaction.
    ///
    /// # Errors
    ///
    /// Returns compilation or execution errors.
    pub async fn exec(&self, ctx: &Context, statement: Statement) -> Result<u64> {
        let batches = statement.build_batches(self.db.dialect)?;
        self.exec_batches(ctx, &batches).await
    }

    async fn exec_batches(&self, ctx: &Context, batches: &[Compiled]) -> Result<u64> {
        let mut affected = 0;
        for compiled in batches {
            self.db.log(compiled);
            affected += self.tx.exec(ctx, &compiled.sql, &compiled.args).await?;
        }
        Ok(affected)
    }

    /// Compiles and runs a query inside the transaction.
    ///
    /// # Errors
    ///
    /// Returns compilation or execution errors.
    pub async fn query(&self, ctx: &Context, statement: Statement) -> Result<Vec<Row>> {
        let compiled = statement.build(self.db.dialect)?;
        self.db.log(&compiled);
        self.tx.query(ctx, &compiled.sql, &compiled.args).await
    }

    /// Runs raw SQL without arguments inside the transaction.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn exec_sql(&self, ctx: &Context, sql: &str) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        self.tx.exec(ctx, sql, &[]).await
    }

    /// Creates a save-point.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Unsupported`] when the dialect has no
    /// save-points; nothing is sent in that case.
    pub async fn savepoint(&self, ctx: &Context, name: &str) -> Result<()> {
        let sql = self.db.dialect.savepoint_sql(name)?;
        self.exec_sql(ctx, &sql).await.map(|_| ())
    }

    /// Rolls back to a save-point.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Unsupported`] when the dialect has no
    /// save-points; nothing is sent in that case.
    pub async fn rollback_to(&self, ctx: &Context, name: &str) -> Result<()> {
        let sql = self.db.dialect.rollback_to_sql(name)?;
        self.exec_sql(ctx, &sql).await.map(|_| ())
    }

    /// Commits.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn commit(self, ctx: &Context) -> Result<()> {
        self.tx.commit(ctx).await?;
        debug!("Transaction committed");
        Ok(())
    }

    /// Rolls back.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn rollback(self, ctx: &Context) -> Result<()> {
        self.tx.rollback(ctx).await?;
        debug!("Transaction rolled back");
        Ok(())
    }
}
