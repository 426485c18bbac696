//! sqlx-backed implementations of the pool traits.
//!
//! Each backend supplies a `build` function that binds [`SqlValue`]s onto a
//! query and a `decode_row` function that turns a driver row back into a
//! [`Row`]. The trait plumbing is identical for every backend and is
//! generated by `impl_sqlx_backend!`.
//!
//! [`SqlValue`]: oxide_dal_core::SqlValue
//! [`Row`]: crate::pool::Row

/// Generates the transaction type and the `ConnPool`/`Tx`/`TxBeginner`
/// impls for one sqlx database.
///
/// `$read_only` is the statement that makes a fresh transaction read-only,
/// or `None` when the backend cannot do that.
macro_rules! impl_sqlx_backend {
    ($db:ty, $tx:ident, $dialect:literal, $read_only:expr, $build:path, $decode:path) => {
        /// An open transaction.
        pub struct $tx {
            inner: tokio::sync::Mutex<sqlx::Transaction<'static, $db>>,
        }

        impl std::fmt::Debug for $tx {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($tx)).finish_non_exhaustive()
            }
        }

        async fn run_prepare<'c, E>(executor: E, sql: &str) -> $crate::error::Result<()>
        where
            E: sqlx::Executor<'c, Database = $db>,
        {
            sqlx::Executor::prepare(executor, sql).await?;
            Ok(())
        }

        async fn run_exec<'c, E>(
            executor: E,
            sql: &str,
            args: &[oxide_dal_core::SqlValue],
        ) -> $crate::error::Result<u64>
        where
            E: sqlx::Executor<'c, Database = $db>,
        {
            let done = $build(sql, args)?.execute(executor).await?;
            Ok(done.rows_affected())
        }

        async fn run_query<'c, E>(
            executor: E,
            sql: &str,
            args: &[oxide_dal_core::SqlValue],
        ) -> $crate::error::Result<Vec<$crate::pool::Row>>
        where
            E: sqlx::Executor<'c, Database = $db>,
        {
            let rows = $build(sql, args)?.fetch_all(executor).await?;
            rows.iter().map($decode).collect()
        }

        #[async_trait::async_trait]
        impl $crate::pool::ConnPool for sqlx::Pool<$db> {
            async fn prepare(
                &self,
                ctx: &$crate::context::Context,
                sql: &str,
            ) -> $crate::error::Result<()> {
                ctx.run(run_prepare(self, sql)).await
            }

            async fn exec(
                &self,
                ctx: &$crate::context::Context,
                sql: &str,
                args: &[oxide_dal_core::SqlValue],
            ) -> $crate::error::Result<u64> {
                ctx.run(run_exec(self, sql, args)).await
            }

            async fn query(
                &self,
                ctx: &$crate::context::Context,
                sql: &str,
                args: &[oxide_dal_core::SqlValue],
            ) -> $crate::error::Result<Vec<$crate::pool::Row>> {
                ctx.run(run_query(self, sql, args)).await
            }
        }

        #[async_trait::async_trait]
        impl $crate::pool::ConnPool for $tx {
            async fn prepare(
                &self,
                ctx: &$crate::context::Context,
                sql: &str,
            ) -> $crate::error::Result<()> {
                let mut tx = self.inner.lock().await;
                ctx.run(run_prepare(&mut **tx, sql)).await
            }

            async fn exec(
                &self,
                ctx: &$crate::context::Context,
                sql: &str,
                args: &[oxide_dal_core::SqlValue],
            ) -> $crate::error::Result<u64> {
                let mut tx = self.inner.lock().await;
                ctx.run(run_exec(&mut **tx, sql, args)).await
            }

            async fn query(
                &self,
                ctx: &$crate::context::Context,
                sql: &str,
                args: &[oxide_dal_core::SqlValue],
            ) -> $crate::error::Result<Vec<$crate::pool::Row>> {
                let mut tx = self.inner.lock().await;
                ctx.run(run_query(&mut **tx, sql, args)).await
            }
        }

        #[async_trait::async_trait]
        impl $crate::pool::Tx for $tx {
            async fn commit(
                self: Box<Self>,
                ctx: &$crate::context::Context,
            ) -> $crate::error::Result<()> {
                let tx = self.inner.into_inner();
                ctx.run(async move { tx.commit().await.map_err($crate::error::MigrateError::from) })
                    .await
            }

            async fn rollback(
                self: Box<Self>,
                ctx: &$crate::context::Context,
            ) -> $crate::error::Result<()> {
                let tx = self.inner.into_inner();
                ctx.run(async move { tx.rollback().await.map_err($crate::error::MigrateError::from) })
                    .await
            }
        }

        #[async_trait::async_trait]
        impl $crate::pool::TxBeginner for sqlx::Pool<$db> {
            async fn begin_tx(
                &self,
                ctx: &$crate::context::Context,
                options: $crate::pool::TxOptions,
            ) -> $crate::error::Result<Box<dyn $crate::pool::Tx>> {
                let statement: Option<&str> = $read_only;
                let read_only = match (options.read_only, statement) {
                    (false, _) => None,
                    (true, Some(sql)) => Some(sql),
                    (true, None) => {
                        return Err($crate::error::MigrateError::Unsupported {
                            dialect: $dialect,
                            operation: "ReadOnlyTransaction",
                        });
                    }
                };
                let mut tx = ctx
                    .run(async move { self.begin().await.map_err($crate::error::MigrateError::from) })
                    .await?;
                if let Some(sql) = read_only {
                    ctx.run(run_exec(&mut *tx, sql, &[])).await?;
                }
                Ok(Box::new($tx {
                    inner: tokio::sync::Mutex::new(tx),
                }))
            }
        }
    };
}

pub(crate) use impl_sqlx_backend;

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MySqlTx;
pub use postgres::PgTx;
pub use sqlite::SqliteTx;

/// Bind error for values a backend cannot carry.
pub(crate) fn unbindable(
    dialect: &'static str,
    value: &oxide_dal_core::SqlValue,
) -> crate::error::MigrateError {
    oxide_dal_core::CompileError::Bind {
        dialect,
        reason: format!("cannot bind {} argument", value.kind()),
    }
    .into()
}
