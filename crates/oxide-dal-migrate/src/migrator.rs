//! Schema migrator.
//!
//! Every operation issues its DDL as an independent statement, outside any
//! transaction. [`Migrator::auto_migrate`] only ever adds: tables, columns,
//! indexes and constraints are created or altered, never dropped.

use std::sync::{Mutex, PoisonError};

use oxide_dal_core::ddl::{self, ViewOption};
use oxide_dal_core::schema::{ConstraintType, DataType, Field, IndexDef, Model};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::db::Db;
use crate::error::{MigrateError, ModelFailure, Result};
use crate::introspect::{ColumnType, Index, Introspector};
use crate::pool::Pool;

/// Migrator behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigratorOptions {
    /// Print and record DDL instead of executing it.
    pub dry_run: bool,
    /// Stop `auto_migrate` at the first failing model.
    pub stop_on_error: bool,
}

/// Applies schema changes through a [`Db`].
#[derive(Debug)]
pub struct Migrator<'a> {
    db: &'a Db,
    options: MigratorOptions,
    journal: Mutex<Vec<String>>,
}

impl<'a> Migrator<'a> {
    /// Creates a migrator.
    #[must_use]
    pub const fn new(db: &'a Db, options: MigratorOptions) -> Self {
        Self {
            db,
            options,
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Enables dry-run mode (SQL is printed but not executed).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.options.dry_run = enabled;
        self
    }

    /// Stops `auto_migrate` at the first failing model.
    #[must_use]
    pub const fn stop_on_error(mut self, enabled: bool) -> Self {
        self.options.stop_on_error = enabled;
        self
    }

    /// DDL issued so far, in order. In dry-run mode, the DDL that would have
    /// been issued.
    #[must_use]
    pub fn journal(&self) -> Vec<String> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn introspector(&self) -> Introspector<'a, dyn Pool + 'a> {
        Introspector::new(self.db.pool(), self.db.dialect())
    }

    async fn run_ddl(&self, ctx: &Context, sql: &str) -> Result<()> {
        debug!(sql = %sql, "Executing SQL");
        if self.options.dry_run {
            ctx.check()?;
            println!("{sql};");
        } else {
            self.db.exec_sql(ctx, sql).await?;
        }
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.to_string());
        Ok(())
    }

    // =========================================================================
    // Database and tables
    // =========================================================================

    /// Name of the connected database.
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn current_database(&self, ctx: &Context) -> Result<String> {
        self.introspector().current_database(ctx).await
    }

    /// Column type with NOT NULL, DEFAULT and comment, as used in DDL.
    #[must_use]
    pub fn full_data_type_of(&self, field: &Field) -> String {
        ddl::full_data_type_of(self.db.dialect(), field)
    }

    /// Creates a model's table with its indexes and constraints.
    ///
    /// # Errors
    ///
    /// Returns compilation or execution errors. Statements already run are
    /// not undone.
    pub async fn create_table(&self, ctx: &Context, model: &Model) -> Result<()> {
        info!(model = %model.name, table = %model.table, "Creating table");
        for sql in ddl::create_table(self.db.dialect(), model)? {
            self.run_ddl(ctx, &sql).await?;
        }
        Ok(())
    }

    /// Drops a table if it exists.
    ///
    /// # Errors
    ///
    /// Returns execution errors.
    pub async fn drop_table(&self, ctx: &Context, table: &str) -> Result<()> {
        info!(table = %table, "Dropping table");
        self.run_ddl(ctx, &ddl::drop_table(self.db.dialect(), table))
            .await
    }

    /// True if the table exists.
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn has_table(&self, ctx: &Context, table: &str) -> Result<bool> {
        self.introspector().has_table(ctx, table).await
    }

    /// Renames a table.
    ///
    /// # Errors
    ///
    /// Returns execution errors.
    pub async fn rename_table(&self, ctx: &Context, old: &str, new: &str) -> Result<()> {
        self.run_ddl(ctx, &ddl::rename_table(self.db.dialect(), old, new))
            .await
    }

    /// Base tables of the current database, sorted.
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn get_tables(&self, ctx: &Context) -> Result<Vec<String>> {
        self.introspector().get_tables(ctx).await
    }

    // =========================================================================
    // Columns
    // =========================================================================

    fn field<'m>(model: &'m Model, name: &str) -> Result<&'m Field> {
        model
            .lookup_field(name)
            .ok_or_else(|| MigrateError::NotFound(format!("field {name} on model {}", model.name)))
    }

    /// Adds the model's field `field_name` as a column.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::NotFound`] for an unknown field, then
    /// execution errors.
    pub async fn add_column(&self, ctx: &Context, model: &Model, field_name: &str) -> Result<()> {
        let field = Self::field(model, field_name)?;
        info!(table = %model.table, column = %field.name, "Adding column");
        self.run_ddl(ctx, &ddl::add_column(self.db.dialect(), &model.table, field))
            .await
    }

    /// Drops a column.
    ///
    /// # Errors
    ///
    /// Returns execution errors.
    pub async fn drop_column(&self, ctx: &Context, table: &str, column: &str) -> Result<()> {
        info!(table = %table, column = %column, "Dropping column");
        self.run_ddl(ctx, &ddl::drop_column(self.db.dialect(), table, column))
            .await
    }

    /// Alters a column to match the model's field `field_name`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::NotFound`] for an unknown field,
    /// [`MigrateError::Unsupported`] on SQLite, then execution errors.
    pub async fn alter_column(&self, ctx: &Context, model: &Model, field_name: &str) -> Result<()> {
        let field = Self::field(model, field_name)?;
        info!(table = %model.table, column = %field.name, "Altering column");
        for sql in ddl::alter_column(self.db.dialect(), &model.table, field)? {
            self.run_ddl(ctx, &sql).await?;
        }
        Ok(())
    }

    /// Brings one live column in line with its field.
    ///
    /// A field declared unique over a non-unique column gets a unique index
    /// named `idx_<table>_<column>`. Type, size, precision, nullability and
    /// literal-default drift triggers [`Migrator::alter_column`].
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Unsupported`] when drift exists but the engine
    /// cannot alter columns, then execution errors.
    pub async fn migrate_column(
        &self,
        ctx: &Context,
        model: &Model,
        field: &Field,
        live: &ColumnType,
    ) -> Result<()> {
        if live.unique() == Some(false) {
            self.ensure_unique_index(ctx, model, field).await?;
        }

        if let Some(reason) = column_drift(self.db, field, live) {
            info!(table = %model.table, column = %field.name, reason = %reason, "Column drift");
            for sql in ddl::alter_column(self.db.dialect(), &model.table, field)? {
                self.run_ddl(ctx, &sql).await?;
            }
        }
        Ok(())
    }

    /// Creates the `idx_<table>_<column>` unique index for a unique,
    /// non-key field. An existing index of that name is left alone.
    async fn ensure_unique_index(&self, ctx: &Context, model: &Model, field: &Field) -> Result<()> {
        if !field.unique || field.primary_key {
            return Ok(());
        }
        let name = format!("idx_{}_{}", model.table, field.name);
        if self.has_index(ctx, &model.table, &name).await? {
            warn!(table = %model.table, index = %name, "Index exists but is not unique, skipping");
            return Ok(());
        }
        let index = IndexDef::new(name, &[field.name.as_str()]).unique();
        let sql = ddl::create_index(self.db.dialect(), &model.table, &index)?;
        self.run_ddl(ctx, &sql).await
    }

    /// True if the table has the column.
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn has_column(&self, ctx: &Context, table: &str, column: &str) -> Result<bool> {
        self.introspector().has_column(ctx, table, column).await
    }

    /// Renames a column.
    ///
    /// # Errors
    ///
    /// Returns execution errors.
    pub async fn rename_column(&self, ctx: &Context, table: &str, old: &str, new: &str) -> Result<()> {
        self.run_ddl(ctx, &ddl::rename_column(self.db.dialect(), table, old, new))
            .await
    }

    /// Live columns of a table.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::NotFound`] for a missing table and catalog
    /// query errors.
    pub async fn column_types(&self, ctx: &Context, table: &str) -> Result<Vec<ColumnType>> {
        self.introspector().column_types(ctx, table).await
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Creates a view.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ViewQueryRequired`] without a query,
    /// [`MigrateError::Unsupported`] for options the engine lacks, then
    /// execution errors.
    pub async fn create_view(&self, ctx: &Context, name: &str, option: &ViewOption) -> Result<()> {
        if option.query.is_none() {
            return Err(MigrateError::ViewQueryRequired(name.to_string()));
        }
        info!(view = %name, "Creating view");
        for sql in ddl::create_view(self.db.dialect(), name, option)? {
            self.run_ddl(ctx, &sql).await?;
        }
        Ok(())
    }

    /// Drops a view if it exists.
    ///
    /// # Errors
    ///
    /// Returns execution errors.
    pub async fn drop_view(&self, ctx: &Context, name: &str) -> Result<()> {
        self.run_ddl(ctx, &ddl::drop_view(self.db.dialect(), name))
            .await
    }

    // =========================================================================
    // Constraints
    // =========================================================================

    /// Creates the model's constraint `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::NotFound`] for an unknown constraint,
    /// [`MigrateError::Unsupported`] for kinds SQLite cannot add, then
    /// execution errors.
    pub async fn create_constraint(&self, ctx: &Context, model: &Model, name: &str) -> Result<()> {
        let constraint = model.lookup_constraint(name).ok_or_else(|| {
            MigrateError::NotFound(format!("constraint {name} on model {}", model.name))
        })?;
        info!(table = %model.table, constraint = %name, "Creating constraint");
        let sql = ddl::create_constraint(self.db.dialect(), &model.table, constraint)?;
        self.run_ddl(ctx, &sql).await
    }

    /// Drops a named constraint.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Unsupported`] for kinds SQLite cannot drop,
    /// then execution errors.
    pub async fn drop_constraint(
        &self,
        ctx: &Context,
        table: &str,
        name: &str,
        kind: ConstraintType,
    ) -> Result<()> {
        let sql = ddl::drop_constraint(self.db.dialect(), table, name, kind)?;
        self.run_ddl(ctx, &sql).await
    }

    /// True if the table has the named constraint.
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn has_constraint(&self, ctx: &Context, table: &str, name: &str) -> Result<bool> {
        self.introspector().has_constraint(ctx, table, name).await
    }

    // =========================================================================
    // Indexes
    // =========================================================================

    /// Creates the model's index `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::NotFound`] for an unknown index, then
    /// execution errors.
    pub async fn create_index(&self, ctx: &Context, model: &Model, name: &str) -> Result<()> {
        let index = model.lookup_index(name).ok_or_else(|| {
            MigrateError::NotFound(format!("index {name} on model {}", model.name))
        })?;
        info!(table = %model.table, index = %name, "Creating index");
        let sql = ddl::create_index(self.db.dialect(), &model.table, index)?;
        self.run_ddl(ctx, &sql).await
    }

    /// Drops an index.
    ///
    /// # Errors
    ///
    /// Returns execution errors.
    pub async fn drop_index(&self, ctx: &Context, table: &str, name: &str) -> Result<()> {
        self.run_ddl(ctx, &ddl::drop_index(self.db.dialect(), table, name))
            .await
    }

    /// True if the table has the named index.
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn has_index(&self, ctx: &Context, table: &str, name: &str) -> Result<bool> {
        self.introspector().has_index(ctx, table, name).await
    }

    /// Renames an index. SQLite has no rename, so the index is recreated
    /// under the new name and the old one dropped.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::NotFound`] if SQLite has no such index,
    /// [`MigrateError::Unsupported`] on the generic dialect, then execution
    /// errors.
    pub async fn rename_index(&self, ctx: &Context, table: &str, old: &str, new: &str) -> Result<()> {
        let dialect = self.db.dialect();
        match ddl::rename_index(dialect, table, old, new) {
            Ok(sql) => self.run_ddl(ctx, &sql).await,
            Err(err) if dialect.engine == oxide_dal_core::Engine::Sqlite => {
                debug!(error = %err, "Recreating index under new name");
                let live = self
                    .get_indexes(ctx, table)
                    .await?
                    .into_iter()
                    .find(|i| i.name == old)
                    .ok_or_else(|| MigrateError::NotFound(format!("index {old} on {table}")))?;
                let index = IndexDef {
                    name: new.to_string(),
                    columns: live.columns,
                    unique: live.unique,
                    option: live.option,
                };
                let sql = ddl::create_index(dialect, table, &index)?;
                self.run_ddl(ctx, &sql).await?;
                self.drop_index(ctx, table, old).await
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Live indexes of a table.
    ///
    /// # Errors
    ///
    /// Returns catalog query errors.
    pub async fn get_indexes(&self, ctx: &Context, table: &str) -> Result<Vec<Index>> {
        self.introspector().get_indexes(ctx, table).await
    }

    // =========================================================================
    // AutoMigrate
    // =========================================================================

    /// Brings every model's table up to date, one model at a time.
    ///
    /// A failing model does not stop the others unless `stop_on_error` is
    /// set. Cancellation and deadlines stop the run immediately.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::AutoMigrate`] naming each failed model, or the
    /// interrupt error.
    pub async fn auto_migrate(&self, ctx: &Context, models: &[Model]) -> Result<()> {
        let mut failures = Vec::new();
        for model in models {
            ctx.check()?;
            info!(model = %model.name, table = %model.table, "Migrating model");
            match self.migrate_model(ctx, model).await {
                Ok(()) => {}
                Err(err) if err.is_interrupt() => return Err(err),
                Err(err) => {
                    warn!(model = %model.name, error = %err, "Model migration failed");
                    failures.push(ModelFailure {
                        model: model.name.clone(),
                        error: err,
                    });
                    if self.options.stop_on_error {
                        break;
                    }
                }
            }
        }
        if failures.is_empty() {
            info!(models = models.len(), "AutoMigrate complete");
            Ok(())
        } else {
            Err(MigrateError::AutoMigrate(failures))
        }
    }

    async fn migrate_model(&self, ctx: &Context, model: &Model) -> Result<()> {
        let table = format!("table {}", model.table);
        if !self
            .has_table(ctx, &model.table)
            .await
            .map_err(|e| failed(model, &table, e))?
        {
            return self
                .create_table(ctx, model)
                .await
                .map_err(|e| failed(model, &table, e));
        }

        let live = self
            .column_types(ctx, &model.table)
            .await
            .map_err(|e| failed(model, &table, e))?;
        for field in &model.fields {
            let object = format!("column {}", field.name);
            let existing = live.iter().find(|c| c.name().eq_ignore_ascii_case(&field.name));
            let result = match existing {
                None => match self.add_column(ctx, model, &field.name).await {
                    Ok(()) => self.ensure_unique_index(ctx, model, field).await,
                    err => err,
                },
                Some(column) => self.migrate_column(ctx, model, field, column).await,
            };
            match result {
                Err(err) if err.is_unsupported() => {
                    warn!(table = %model.table, column = %field.name, error = %err, "Leaving column drift in place");
                }
                other => other.map_err(|e| failed(model, &object, e))?,
            }
        }

        for constraint in &model.constraints {
            let object = format!("constraint {}", constraint.name);
            let present = self
                .has_constraint(ctx, &model.table, &constraint.name)
                .await
                .map_err(|e| failed(model, &object, e))?;
            if present {
                continue;
            }
            match self.create_constraint(ctx, model, &constraint.name).await {
                Err(err) if err.is_unsupported() => {
                    warn!(table = %model.table, constraint = %constraint.name, error = %err, "Skipping constraint");
                }
                other => other.map_err(|e| failed(model, &object, e))?,
            }
        }

        for index in &model.indexes {
            let object = format!("index {}", index.name);
            let present = self
                .has_index(ctx, &model.table, &index.name)
                .await
                .map_err(|e| failed(model, &object, e))?;
            if !present {
                self.create_index(ctx, model, &index.name)
                    .await
                    .map_err(|e| failed(model, &object, e))?;
            }
        }
        Ok(())
    }
}

fn failed(model: &Model, object: &str, err: MigrateError) -> MigrateError {
    if err.is_interrupt() {
        return err;
    }
    MigrateError::Migration {
        model: model.name.clone(),
        object: object.to_string(),
        source: Box::new(err),
    }
}

/// Describes why `live` no longer matches `field`, or `None` if it does.
fn column_drift(db: &Db, field: &Field, live: &ColumnType) -> Option<String> {
    let dialect = db.dialect();
    let wanted = (dialect.normalize_type)(&(dialect.data_type_of)(field));
    let actual = (dialect.normalize_type)(live.column_type().unwrap_or(live.database_type_name()));
    if wanted != actual {
        return Some(format!("type {actual} -> {wanted}"));
    }

    if matches!(field.data_type, DataType::Char | DataType::Varchar) {
        if let (Some(size), Some(length)) = (field.size, live.length()) {
            if i64::from(size) != length {
                return Some(format!("length {length} -> {size}"));
            }
        }
    }

    if let (Some(precision), Some((p, s))) = (field.precision, live.decimal_size()) {
        let scale = field.scale.unwrap_or(0);
        if i64::from(precision) != p || i64::from(scale) != s {
            return Some(format!("precision ({p},{s}) -> ({precision},{scale})"));
        }
    }

    if !field.primary_key {
        if let Some(nullable) = live.nullable() {
            if nullable != field.nullable {
                return Some(format!("nullable {nullable} -> {}", field.nullable));
            }
        }
    }

    if let Some(default) = field.default.as_ref().filter(|d| !d.is_expression()) {
        let wanted = normalize_default(&default.to_sql());
        let actual = live.default_value().and_then(normalize_default);
        if wanted != actual {
            return Some(format!(
                "default {} -> {}",
                actual.as_deref().unwrap_or("none"),
                wanted.as_deref().unwrap_or("none")
            ));
        }
    }
    None
}

/// Canonical form of a literal default as catalogs print it: parentheses,
/// casts and quotes removed, booleans as `1`/`0`, NULL as `None`.
fn normalize_default(raw: &str) -> Option<String> {
    let mut s = raw.trim();
    while s.len() >= 2 && s.starts_with('(') && s.ends_with(')') {
        s = s[1..s.len() - 1].trim();
    }
    if let Some(rest) = s.strip_prefix('\'') {
        let end = rest.rfind('\'').unwrap_or(rest.len());
        return Some(rest[..end].replace("''", "'"));
    }
    let bare = s.split("::").next().unwrap_or_default().trim().to_ascii_lowercase();
    match bare.as_str() {
        "" | "null" => None,
        "true" => Some(String::from("1")),
        "false" => Some(String::from("0")),
        _ => Some(bare),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_default() {
        assert_eq!(normalize_default("'abc'::character varying").as_deref(), Some("abc"));
        assert_eq!(normalize_default("'it''s'").as_deref(), Some("it's"));
        assert_eq!(normalize_default("((0))").as_deref(), Some("0"));
        assert_eq!(normalize_default("TRUE").as_deref(), Some("1"));
        assert_eq!(normalize_default("false").as_deref(), Some("0"));
        assert_eq!(normalize_default("NULL"), None);
        assert_eq!(normalize_default("42::bigint").as_deref(), Some("42"));
    }
}
