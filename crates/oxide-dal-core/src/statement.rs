//! Statements: clauses plus the per-statement options that shape compilation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::clause::{Assignment, Clause, ClauseKind, Clauses, Join, OrderBy, TableRef};
use crate::compile::{BindMode, Compiled, Compiler};
use crate::dialect::Dialect;
use crate::error::{CompileError, Result};
use crate::expr::{col, Expr};
use crate::schema::Model;
use crate::value::Arg;

/// Upper bound on scope rounds. A scope may register further scopes; once
/// this many rounds have run with scopes still pending the statement fails.
pub const MAX_SCOPE_ROUNDS: usize = 32;

/// A deferred modification applied to a statement right before compilation.
pub type Scope = Arc<dyn Fn(&mut Statement) + Send + Sync>;

/// Typed per-statement options.
#[derive(Clone, Default)]
pub struct StatementVars {
    /// Pending scopes, applied in registration order.
    pub scopes: Vec<Scope>,
    /// Table-name overrides, such as a custom join table for an association.
    pub join_tables: BTreeMap<String, String>,
    /// Rows per INSERT when batching.
    pub batch_size: Option<usize>,
    /// Allow UPDATE and DELETE without WHERE.
    pub allow_global_update: bool,
}

impl fmt::Debug for StatementVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementVars")
            .field("scopes", &self.scopes.len())
            .field("join_tables", &self.join_tables)
            .field("batch_size", &self.batch_size)
            .field("allow_global_update", &self.allow_global_update)
            .finish()
    }
}

/// A statement under construction.
///
/// # Example
///
/// ```
/// use oxide_dal_core::dialect::POSTGRES;
/// use oxide_dal_core::expr::col;
/// use oxide_dal_core::statement::Statement;
///
/// let compiled = Statement::select_from("users")
///     .columns(&["id", "name"])
///     .filter(col("active").eq(true))
///     .limit(10)
///     .build(&POSTGRES)
///     .unwrap();
/// assert_eq!(
///     compiled.sql,
///     r#"SELECT "id", "name" FROM "users" WHERE "active" = $1 LIMIT 10"#
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Statement {
    /// Target table; falls back to the model's table.
    pub table: Option<String>,
    /// Model supplying the table and column metadata.
    pub model: Option<Arc<Model>>,
    /// Clause set.
    pub clauses: Clauses,
    /// Options.
    pub vars: StatementVars,
}

impl Statement {
    /// Creates an empty statement.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a statement bound to a model.
    #[must_use]
    pub fn for_model(model: Arc<Model>) -> Self {
        Self {
            model: Some(model),
            ..Self::default()
        }
    }

    /// SELECT from a table.
    #[must_use]
    pub fn select_from(table: impl Into<String>) -> Self {
        Self::new().table(table)
    }

    /// INSERT into a table.
    #[must_use]
    pub fn insert_into(table: impl Into<String>) -> Self {
        Self::new().table(table).clause(Clause::Insert(None))
    }

    /// UPDATE a table.
    #[must_use]
    pub fn update(table: impl Into<String>) -> Self {
        Self::new().table(table).clause(Clause::Update(None))
    }

    /// DELETE from a table.
    #[must_use]
    pub fn delete_from(table: impl Into<String>) -> Self {
        Self::new().table(table).clause(Clause::Delete(None))
    }

    /// A raw statement with `?` placeholders.
    #[must_use]
    pub fn raw(sql: impl Into<String>, args: Vec<Arg>) -> Self {
        Self::new().clause(Clause::Raw {
            sql: sql.into(),
            args,
        })
    }

    /// Sets the target table.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Adds a clause, merging with an existing clause of the same kind.
    #[must_use]
    pub fn clause(mut self, clause: Clause) -> Self {
        self.clauses.add(clause);
        self
    }

    /// Selects columns.
    #[must_use]
    pub fn columns(self, columns: &[&str]) -> Self {
        self.clause(Clause::select(columns))
    }

    /// Selects distinct rows.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        match self.clauses.get_mut(ClauseKind::Select) {
            Some(Clause::Select { distinct, .. }) => *distinct = true,
            _ => self.clauses.add(Clause::Select {
                distinct: true,
                columns: Vec::new(),
            }),
        }
        self
    }

    /// Adds a WHERE condition; conditions are ANDed.
    #[must_use]
    pub fn filter(self, expr: Expr) -> Self {
        self.clause(Clause::filter(expr))
    }

    /// Adds a join.
    #[must_use]
    pub fn join(self, join: Join) -> Self {
        self.clause(Clause::Join(vec![join]))
    }

    /// Adds GROUP BY columns.
    #[must_use]
    pub fn group_by(self, columns: &[&str]) -> Self {
        let exprs = columns.iter().map(|c| Expr::Column(col(c))).collect();
        self.clause(Clause::GroupBy(exprs))
    }

    /// Adds a HAVING condition.
    #[must_use]
    pub fn having(self, expr: Expr) -> Self {
        self.clause(Clause::Having(vec![expr]))
    }

    /// Adds an ORDER BY item.
    #[must_use]
    pub fn order_by(self, order: OrderBy) -> Self {
        self.clause(Clause::OrderBy(vec![order]))
    }

    /// Sets LIMIT.
    #[must_use]
    pub fn limit(self, limit: i64) -> Self {
        self.clause(Clause::Limit(Some(limit)))
    }

    /// Sets OFFSET.
    #[must_use]
    pub fn offset(self, offset: i64) -> Self {
        self.clause(Clause::Offset(Some(offset)))
    }

    /// Adds one row of values for INSERT.
    #[must_use]
    pub fn values(self, columns: &[&str], row: Vec<Arg>) -> Self {
        self.clause(Clause::Values {
            columns: columns.iter().map(ToString::to_string).collect(),
            rows: vec![row],
        })
    }

    /// Adds a SET assignment for UPDATE.
    #[must_use]
    pub fn set(self, column: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.clause(Clause::Set(vec![Assignment::new(column, value)]))
    }

    /// Requests RETURNING columns; an empty list returns every column.
    #[must_use]
    pub fn returning(self, columns: &[&str]) -> Self {
        self.clause(Clause::Returning(
            columns.iter().map(ToString::to_string).collect(),
        ))
    }

    /// Registers a scope.
    #[must_use]
    pub fn scope(mut self, scope: impl Fn(&mut Self) + Send + Sync + 'static) -> Self {
        self.vars.scopes.push(Arc::new(scope));
        self
    }

    /// Registers a scope from inside another scope.
    pub fn add_scope(&mut self, scope: Scope) {
        self.vars.scopes.push(scope);
    }

    /// Sets the INSERT batch size.
    #[must_use]
    pub const fn batch_size(mut self, size: usize) -> Self {
        self.vars.batch_size = Some(size);
        self
    }

    /// Replaces a table name wherever it appears in FROM or JOIN.
    #[must_use]
    pub fn join_table(mut self, table: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.vars.join_tables.insert(table.into(), replacement.into());
        self
    }

    /// Allows UPDATE and DELETE without WHERE.
    #[must_use]
    pub const fn allow_global_update(mut self) -> Self {
        self.vars.allow_global_update = true;
        self
    }

    /// Applies pending scopes, including scopes registered by scopes.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::ScopeOverflow`] when scopes are still pending
    /// after [`MAX_SCOPE_ROUNDS`] rounds.
    pub fn drain_scopes(&mut self) -> Result<()> {
        for _ in 0..MAX_SCOPE_ROUNDS {
            let pending = std::mem::take(&mut self.vars.scopes);
            if pending.is_empty() {
                return Ok(());
            }
            for scope in pending {
                scope(self);
            }
        }
        if self.vars.scopes.is_empty() {
            Ok(())
        } else {
            Err(CompileError::ScopeOverflow {
                rounds: MAX_SCOPE_ROUNDS,
            })
        }
    }

    fn compiler<'a>(&'a self, dialect: &'a Dialect) -> Compiler<'a> {
        Compiler::new(dialect)
            .model(self.model.as_deref())
            .default_table(self.table.as_deref())
            .table_overrides(&self.vars.join_tables)
            .allow_global_update(self.vars.allow_global_update)
    }

    /// Applies scopes and compiles with placeholders.
    ///
    /// # Errors
    ///
    /// Returns scope and compilation errors.
    pub fn build(mut self, dialect: &Dialect) -> Result<Compiled> {
        self.drain_scopes()?;
        self.compiler(dialect).compile(&self.clauses)
    }

    /// Applies scopes and compiles with inline literals.
    ///
    /// # Errors
    ///
    /// Returns scope and compilation errors.
    pub fn build_inline(mut self, dialect: &Dialect) -> Result<String> {
        self.drain_scopes()?;
        self.compiler(dialect)
            .bind_mode(BindMode::Inline)
            .compile(&self.clauses)
            .map(|c| c.sql)
    }

    /// Applies scopes and compiles, splitting INSERT rows into statements of
    /// at most `batch_size` rows. Without a batch size, or for other
    /// statement kinds, a single statement is returned.
    ///
    /// # Errors
    ///
    /// Fails for a batch size of zero, and for scope and compilation errors.
    pub fn build_batches(mut self, dialect: &Dialect) -> Result<Vec<Compiled>> {
        self.drain_scopes()?;
        let Some(size) = self.vars.batch_size else {
            return Ok(vec![self.compiler(dialect).compile(&self.clauses)?]);
        };
        if size == 0 {
            return Err(CompileError::InvalidClause {
                clause: "VALUES",
                reason: String::from("batch size must be positive"),
            });
        }
        let Some(Clause::Values { columns, rows }) = self.clauses.get(ClauseKind::Values) else {
            return Ok(vec![self.compiler(dialect).compile(&self.clauses)?]);
        };
        if rows.len() <= size {
            return Ok(vec![self.compiler(dialect).compile(&self.clauses)?]);
        }

        let compiler = self.compiler(dialect);
        rows.chunks(size)
            .map(|chunk| {
                let mut batch = self.clauses.clone();
                batch.remove(ClauseKind::Values);
                batch.add(Clause::Values {
                    columns: columns.clone(),
                    rows: chunk.to_vec(),
                });
                compiler.compile(&batch)
            })
            .collect()
    }
}

impl From<TableRef> for Statement {
    fn from(table: TableRef) -> Self {
        Self::new().clause(Clause::From(vec![table]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MYSQL, POSTGRES, SQLITE};
    use crate::expr::raw;
    use crate::schema::{id, varchar};
    use crate::value::SqlValue;

    #[test]
    fn test_select_builder() {
        let compiled = Statement::select_from("users")
            .columns(&["id"])
            .filter(col("age").gt_eq(18))
            .filter(col("name").like("a%"))
            .order_by(OrderBy::asc("id"))
            .limit(5)
            .offset(10)
            .build(&SQLITE)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT \"id\" FROM \"users\" WHERE \"age\" >= ? AND \"name\" LIKE ? \
             ORDER BY \"id\" LIMIT 5 OFFSET 10"
        );
        assert_eq!(compiled.args.len(), 2);
    }

    #[test]
    fn test_distinct() {
        let compiled = Statement::select_from("t")
            .columns(&["a"])
            .distinct()
            .build(&SQLITE)
            .unwrap();
        assert_eq!(compiled.sql, "SELECT DISTINCT \"a\" FROM \"t\"");
    }

    #[test]
    fn test_model_statement() {
        let model = Arc::new(
            Model::new("User", "users")
                .field(id("id"))
                .field(varchar("name", 100)),
        );
        let compiled = Statement::for_model(model)
            .filter(col("id").eq(1))
            .build(&MYSQL)
            .unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM `users` WHERE `id` = ?");
    }

    #[test]
    fn test_scope_applies_before_compilation() {
        let compiled = Statement::select_from("posts")
            .scope(|s| s.clauses.add(Clause::filter(col("deleted_at").is_null())))
            .build(&SQLITE)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"posts\" WHERE \"deleted_at\" IS NULL"
        );
    }

    #[test]
    fn test_nested_scopes() {
        let compiled = Statement::select_from("posts")
            .scope(|s| {
                s.clauses.add(Clause::filter(col("a").eq(1)));
                s.add_scope(Arc::new(|s: &mut Statement| {
                    s.clauses.add(Clause::filter(col("b").eq(2)));
                }));
            })
            .build(&POSTGRES)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"posts\" WHERE \"a\" = $1 AND \"b\" = $2"
        );
    }

    fn respawn(s: &mut Statement) {
        s.add_scope(Arc::new(respawn));
    }

    #[test]
    fn test_self_registering_scope_overflows() {
        let err = Statement::select_from("t")
            .scope(respawn)
            .build(&SQLITE)
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::ScopeOverflow {
                rounds: MAX_SCOPE_ROUNDS
            }
        );
    }

    #[test]
    fn test_insert_and_batches() {
        let stmt = Statement::insert_into("users")
            .values(&["name"], vec!["a".into()])
            .values(&["name"], vec!["b".into()])
            .values(&["name"], vec!["c".into()])
            .batch_size(2);
        let batches = stmt.build_batches(&POSTGRES).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(
            batches[0].sql,
            "INSERT INTO \"users\" (\"name\") VALUES ($1), ($2)"
        );
        assert_eq!(batches[1].sql, "INSERT INTO \"users\" (\"name\") VALUES ($1)");
        assert_eq!(batches[1].args, vec![SqlValue::Text("c".into())]);
    }

    #[test]
    fn test_zero_batch_size_is_invalid() {
        let stmt = Statement::insert_into("users")
            .values(&["name"], vec!["a".into()])
            .batch_size(0);
        assert!(stmt.build_batches(&SQLITE).is_err());
    }

    #[test]
    fn test_join_table_override() {
        let compiled = Statement::select_from("users")
            .join(Join::inner(
                "user_languages",
                raw("user_languages.user_id = users.id", vec![]),
            ))
            .join_table("user_languages", "user_speaks")
            .build(&SQLITE)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"users\" INNER JOIN \"user_speaks\" ON user_languages.user_id = users.id"
        );
    }

    #[test]
    fn test_update_and_delete() {
        let update = Statement::update("users")
            .set("name", "x")
            .filter(col("id").eq(1))
            .build(&SQLITE)
            .unwrap();
        assert_eq!(update.sql, "UPDATE \"users\" SET \"name\" = ? WHERE \"id\" = ?");

        let delete = Statement::delete_from("users").build(&SQLITE).unwrap_err();
        assert_eq!(
            delete,
            CompileError::MissingWhereClause {
                statement: "DELETE"
            }
        );

        let delete = Statement::delete_from("users")
            .allow_global_update()
            .build(&SQLITE)
            .unwrap();
        assert_eq!(delete.sql, "DELETE FROM \"users\"");
    }

    #[test]
    fn test_build_inline() {
        let sql = Statement::select_from("t")
            .filter(col("a").eq("x"))
            .build_inline(&MYSQL)
            .unwrap();
        assert_eq!(sql, "SELECT * FROM `t` WHERE `a` = 'x'");
    }

    #[test]
    fn test_raw() {
        let compiled = Statement::raw("SELECT ? + ?", vec![1.into(), 2.into()])
            .build(&POSTGRES)
            .unwrap();
        assert_eq!(compiled.sql, "SELECT $1 + $2");
    }
}
