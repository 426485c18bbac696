//! Clause compilation.
//!
//! [`Compiler`] walks a [`Clauses`] set in the fixed order of its statement
//! kind and produces SQL text plus an ordered argument list. Identifiers go
//! through the dialect's quoting function, values through its placeholder
//! function. Any error discards the whole output.
//!
//! Statement orders:
//! - query: SELECT, FROM, JOIN, WHERE, GROUP BY, HAVING, ORDER BY, LIMIT/OFFSET
//! - insert: INSERT INTO, VALUES, RETURNING
//! - update: UPDATE, SET, WHERE, RETURNING
//! - delete: DELETE FROM, WHERE, RETURNING

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::clause::{Assignment, Clause, ClauseKind, Clauses, Join, JoinKind, OrderBy, TableRef};
use crate::dialect::Dialect;
use crate::error::{CompileError, Result};
use crate::expr::{CompareOp, Column, Expr};
use crate::schema::{DataType, Field, Model};
use crate::value::{Arg, RenderContext, SqlExpression, SqlValue};

/// Nesting limit for self-rendering values that return further
/// self-rendering values.
pub const MAX_RENDER_DEPTH: usize = 16;

static LOGICAL_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(and|or)\b").expect("valid keyword regex"));

/// How values reach the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindMode {
    /// Placeholders plus an argument list.
    #[default]
    Placeholders,
    /// Escaped literals, for statements that cannot carry parameters (DDL,
    /// view definitions).
    Inline,
}

/// Compiled SQL and its arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compiled {
    /// SQL text.
    pub sql: String,
    /// Arguments in placeholder order.
    pub args: Vec<SqlValue>,
}

/// Statement kinds, derived from the clauses present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT.
    Query,
    /// INSERT.
    Insert,
    /// UPDATE.
    Update,
    /// DELETE.
    Delete,
}

impl StatementKind {
    const fn name(self) -> &'static str {
        match self {
            Self::Query => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    const fn allows(self, kind: ClauseKind) -> bool {
        use ClauseKind as K;
        match self {
            Self::Query => matches!(
                kind,
                K::Select
                    | K::From
                    | K::Join
                    | K::Where
                    | K::GroupBy
                    | K::Having
                    | K::OrderBy
                    | K::Limit
                    | K::Offset
            ),
            Self::Insert => matches!(kind, K::Insert | K::Values | K::Returning),
            Self::Update => matches!(kind, K::Update | K::Set | K::Where | K::Returning),
            Self::Delete => matches!(kind, K::Delete | K::Where | K::Returning),
        }
    }

    /// Determines the statement kind of a clause set.
    ///
    /// # Errors
    ///
    /// Fails when several statement kinds are mixed or a clause does not
    /// belong to the statement kind.
    pub fn of(clauses: &Clauses) -> Result<Self> {
        let mut kinds = Vec::new();
        for (clause, kind) in [
            (ClauseKind::Insert, Self::Insert),
            (ClauseKind::Update, Self::Update),
            (ClauseKind::Delete, Self::Delete),
        ] {
            if clauses.contains(clause) {
                kinds.push(kind);
            }
        }
        let kind = match kinds.as_slice() {
            [] => Self::Query,
            [kind] => *kind,
            [first, second, ..] => {
                return Err(CompileError::invalid(
                    second.name(),
                    format!("cannot be combined with {}", first.name()),
                ))
            }
        };

        if let Some(bad) = clauses.kinds().find(|k| !kind.allows(*k)) {
            return Err(CompileError::invalid(
                bad.name(),
                format!("not valid in a {} statement", kind.name()),
            ));
        }
        Ok(kind)
    }
}

/// Compiles `clauses` for `dialect`, using `model` for the default table and
/// column metadata.
///
/// # Errors
///
/// Returns a [`CompileError`] for malformed clause combinations; no SQL is
/// produced in that case.
pub fn compile(clauses: &Clauses, dialect: &Dialect, model: Option<&Model>) -> Result<Compiled> {
    Compiler::new(dialect).model(model).compile(clauses)
}

/// Configurable compiler.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    dialect: &'a Dialect,
    model: Option<&'a Model>,
    default_table: Option<&'a str>,
    table_overrides: Option<&'a BTreeMap<String, String>>,
    allow_global_update: bool,
    mode: BindMode,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler for a dialect.
    #[must_use]
    pub const fn new(dialect: &'a Dialect) -> Self {
        Self {
            dialect,
            model: None,
            default_table: None,
            table_overrides: None,
            allow_global_update: false,
            mode: BindMode::Placeholders,
        }
    }

    /// Sets the model.
    #[must_use]
    pub const fn model(mut self, model: Option<&'a Model>) -> Self {
        self.model = model;
        self
    }

    /// Sets the table used when no FROM/target is given. Takes precedence
    /// over the model's table.
    #[must_use]
    pub const fn default_table(mut self, table: Option<&'a str>) -> Self {
        self.default_table = table;
        self
    }

    /// Sets table-name overrides applied to FROM and JOIN tables.
    #[must_use]
    pub const fn table_overrides(mut self, overrides: &'a BTreeMap<String, String>) -> Self {
        self.table_overrides = Some(overrides);
        self
    }

    /// Allows UPDATE and DELETE without WHERE.
    #[must_use]
    pub const fn allow_global_update(mut self, allow: bool) -> Self {
        self.allow_global_update = allow;
        self
    }

    /// Sets the bind mode.
    #[must_use]
    pub const fn bind_mode(mut self, mode: BindMode) -> Self {
        self.mode = mode;
        self
    }

    fn fallback_table(&self) -> Option<&'a str> {
        self.default_table
            .or_else(|| self.model.map(|m| m.table.as_str()))
    }

    /// Compiles a clause set.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] for malformed clause combinations.
    pub fn compile(&self, clauses: &Clauses) -> Result<Compiled> {
        let mut w = SqlWriter::new(self.dialect, self.mode);
        w.table = self.fallback_table();
        w.model = self.model;

        if let Some(Clause::Raw { sql, args }) = clauses.get(ClauseKind::Raw) {
            if let Some(other) = clauses.kinds().find(|k| *k != ClauseKind::Raw) {
                return Err(CompileError::invalid(
                    other.name(),
                    "cannot be combined with a raw statement",
                ));
            }
            w.write_raw(sql, args)?;
            return Ok(w.finish());
        }

        match StatementKind::of(clauses)? {
            StatementKind::Query => self.query(&mut w, clauses)?,
            StatementKind::Insert => self.insert(&mut w, clauses)?,
            StatementKind::Update => self.update(&mut w, clauses)?,
            StatementKind::Delete => self.delete(&mut w, clauses)?,
        }
        Ok(w.finish())
    }

    fn query(&self, w: &mut SqlWriter<'a>, clauses: &Clauses) -> Result<()> {
        w.push("SELECT ");
        match clauses.get(ClauseKind::Select) {
            Some(Clause::Select { distinct, columns }) => {
                if *distinct {
                    w.push("DISTINCT ");
                }
                if columns.is_empty() {
                    w.push("*");
                } else {
                    w.write_list(columns, |w, e| w.write_expr(e, Prec::Top))?;
                }
            }
            _ => w.push("*"),
        }

        let tables = match clauses.get(ClauseKind::From) {
            Some(Clause::From(tables)) if !tables.is_empty() => tables.clone(),
            _ => self
                .fallback_table()
                .map(|t| vec![TableRef::new(t)])
                .unwrap_or_default(),
        };
        if tables.is_empty() {
            if !clauses.contains(ClauseKind::Select) {
                return Err(CompileError::invalid("FROM", "no table to select from"));
            }
        } else {
            w.push(" FROM ");
            w.write_list(&tables, |w, t| {
                self.write_table(w, t);
                Ok(())
            })?;
        }

        if let Some(Clause::Join(joins)) = clauses.get(ClauseKind::Join) {
            for join in joins {
                self.write_join(w, join)?;
            }
        }

        if let Some(expr) = clauses.where_expr() {
            w.push(" WHERE ");
            w.write_expr(&expr, Prec::Top)?;
        }

        let grouped = match clauses.get(ClauseKind::GroupBy) {
            Some(Clause::GroupBy(exprs)) => {
                if exprs.is_empty() {
                    return Err(CompileError::invalid("GROUP BY", "no expressions"));
                }
                w.push(" GROUP BY ");
                w.write_list(exprs, |w, e| w.write_expr(e, Prec::Top))?;
                true
            }
            _ => false,
        };

        if let Some(Clause::Having(exprs)) = clauses.get(ClauseKind::Having) {
            if !grouped {
                return Err(CompileError::invalid("HAVING", "requires GROUP BY"));
            }
            let expr = crate::expr::all(exprs.iter().cloned());
            if !expr.is_empty() {
                w.push(" HAVING ");
                w.write_expr(&expr, Prec::Top)?;
            }
        }

        if let Some(Clause::OrderBy(items)) = clauses.get(ClauseKind::OrderBy) {
            if items.is_empty() {
                return Err(CompileError::invalid("ORDER BY", "no expressions"));
            }
            w.push(" ORDER BY ");
            w.write_list(items, |w, item: &OrderBy| {
                w.write_expr(&item.expr, Prec::Top)?;
                if item.desc {
                    w.push(" DESC");
                }
                Ok(())
            })?;
        }

        let limit = row_count(clauses, ClauseKind::Limit)?;
        let offset = row_count(clauses, ClauseKind::Offset)?;
        (self.dialect.limit_offset)(&mut w.sql, limit, offset);
        Ok(())
    }

    fn insert(&self, w: &mut SqlWriter<'a>, clauses: &Clauses) -> Result<()> {
        let table = self.target(clauses, ClauseKind::Insert)?;
        let Some(Clause::Values { columns, rows }) = clauses.get(ClauseKind::Values) else {
            return Err(CompileError::invalid("VALUES", "INSERT requires values"));
        };
        if columns.is_empty() {
            return Err(CompileError::invalid("VALUES", "no columns"));
        }
        if rows.is_empty() {
            return Err(CompileError::invalid("VALUES", "no rows"));
        }
        if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(CompileError::invalid(
                "VALUES",
                format!("row has {} values for {} columns", row.len(), columns.len()),
            ));
        }

        w.push("INSERT INTO ");
        self.write_table(w, &table);
        w.push(" (");
        w.write_list(columns, |w, c| {
            w.quote(c);
            Ok(())
        })?;
        w.push(") VALUES ");
        w.write_list(rows, |w, row: &Vec<Arg>| {
            w.push("(");
            let mut first = true;
            for (column, arg) in columns.iter().zip(row) {
                if !first {
                    w.push(", ");
                }
                first = false;
                w.bind_for_column(arg, column)?;
            }
            w.push(")");
            Ok(())
        })?;
        self.returning(w, clauses)
    }

    fn update(&self, w: &mut SqlWriter<'a>, clauses: &Clauses) -> Result<()> {
        let table = self.target(clauses, ClauseKind::Update)?;
        let assignments = match clauses.get(ClauseKind::Set) {
            Some(Clause::Set(assignments)) if !assignments.is_empty() => assignments,
            _ => return Err(CompileError::invalid("SET", "UPDATE requires assignments")),
        };
        let filter = self.required_where(clauses, "UPDATE")?;

        w.push("UPDATE ");
        self.write_table(w, &table);
        w.push(" SET ");
        w.write_list(assignments, |w, a: &Assignment| {
            w.quote(&a.column);
            w.push(" = ");
            w.bind_for_column(&a.value, &a.column)
        })?;
        if let Some(expr) = filter {
            w.push(" WHERE ");
            w.write_expr(&expr, Prec::Top)?;
        }
        self.returning(w, clauses)
    }

    fn delete(&self, w: &mut SqlWriter<'a>, clauses: &Clauses) -> Result<()> {
        let table = self.target(clauses, ClauseKind::Delete)?;
        let filter = self.required_where(clauses, "DELETE")?;

        w.push("DELETE FROM ");
        self.write_table(w, &table);
        if let Some(expr) = filter {
            w.push(" WHERE ");
            w.write_expr(&expr, Prec::Top)?;
        }
        self.returning(w, clauses)
    }

    fn target(&self, clauses: &Clauses, kind: ClauseKind) -> Result<TableRef> {
        let explicit = match clauses.get(kind) {
            Some(Clause::Insert(t) | Clause::Update(t) | Clause::Delete(t)) => t.clone(),
            _ => None,
        };
        explicit
            .or_else(|| self.fallback_table().map(TableRef::new))
            .ok_or_else(|| CompileError::invalid(kind.name(), "no target table"))
    }

    fn required_where(&self, clauses: &Clauses, statement: &'static str) -> Result<Option<Expr>> {
        let filter = clauses.where_expr();
        if filter.is_none() && !self.allow_global_update {
            return Err(CompileError::MissingWhereClause { statement });
        }
        Ok(filter)
    }

    fn returning(&self, w: &mut SqlWriter<'a>, clauses: &Clauses) -> Result<()> {
        let Some(Clause::Returning(columns)) = clauses.get(ClauseKind::Returning) else {
            return Ok(());
        };
        if !self.dialect.returning {
            return Err(self.dialect.unsupported("RETURNING"));
        }
        w.push(" RETURNING ");
        if columns.is_empty() {
            w.push("*");
            return Ok(());
        }
        w.write_list(columns, |w, c| {
            w.quote(c);
            Ok(())
        })
    }

    fn write_table(&self, w: &mut SqlWriter<'a>, table: &TableRef) {
        let name = self
            .table_overrides
            .and_then(|o| o.get(&table.name))
            .unwrap_or(&table.name);
        w.quote(name);
        if let Some(alias) = &table.alias {
            w.push(" AS ");
            w.quote(alias);
        }
    }

    fn write_join(&self, w: &mut SqlWriter<'a>, join: &Join) -> Result<()> {
        w.push(" ");
        w.push(join.kind.as_sql());
        w.push(" ");
        self.write_table(w, &join.table);
        match (&join.on, join.using.is_empty()) {
            (Some(on), _) => {
                w.push(" ON ");
                w.write_expr(on, Prec::Top)?;
            }
            (None, false) => {
                w.push(" USING (");
                w.write_list(&join.using, |w, c| {
                    w.quote(c);
                    Ok(())
                })?;
                w.push(")");
            }
            (None, true) if join.kind == JoinKind::Cross => {}
            (None, true) => {
                return Err(CompileError::invalid("JOIN", "missing ON or USING"));
            }
        }
        Ok(())
    }
}

fn row_count(clauses: &Clauses, kind: ClauseKind) -> Result<Option<u64>> {
    let value = match clauses.get(kind) {
        Some(Clause::Limit(v) | Clause::Offset(v)) => *v,
        _ => return Ok(None),
    };
    let value = value.ok_or_else(|| CompileError::invalid(kind.name(), "missing value"))?;
    u64::try_from(value)
        .map(Some)
        .map_err(|_| CompileError::invalid(kind.name(), format!("negative value {value}")))
}

/// Precedence context of the node being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prec {
    Top,
    And,
    Or,
    Not,
    Operand,
}

/// Output buffer plus the bind-variable translator.
pub struct SqlWriter<'a> {
    dialect: &'a Dialect,
    sql: String,
    args: Vec<SqlValue>,
    mode: BindMode,
    depth: usize,
    table: Option<&'a str>,
    model: Option<&'a Model>,
}

impl<'a> SqlWriter<'a> {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new(dialect: &'a Dialect, mode: BindMode) -> Self {
        Self {
            dialect,
            sql: String::new(),
            args: Vec::new(),
            mode,
            depth: 0,
            table: None,
            model: None,
        }
    }

    /// Consumes the writer.
    #[must_use]
    pub fn finish(self) -> Compiled {
        Compiled {
            sql: self.sql,
            args: self.args,
        }
    }

    /// Appends raw text.
    pub fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    /// Appends a quoted identifier.
    pub fn quote(&mut self, ident: &str) {
        (self.dialect.quote_to)(&mut self.sql, ident);
    }

    fn write_list<T>(
        &mut self,
        items: &[T],
        mut write: impl FnMut(&mut Self, &T) -> Result<()>,
    ) -> Result<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            write(self, item)?;
        }
        Ok(())
    }

    /// Writes one value: a placeholder plus an argument, or a literal.
    ///
    /// NULL is always written as a literal.
    pub fn bind_value(&mut self, value: &SqlValue) {
        if value.is_null() || self.mode == BindMode::Inline {
            self.sql.push_str(&value.to_sql_literal(self.dialect.engine));
        } else {
            self.args.push(value.clone());
            (self.dialect.bind_var_to)(&mut self.sql, self.args.len());
        }
    }

    /// Writes an argument.
    ///
    /// # Errors
    ///
    /// Fails for [`Arg::Default`] outside VALUES, and for errors in nested
    /// expressions.
    pub fn bind(&mut self, arg: &Arg) -> Result<()> {
        match arg {
            Arg::Value(value) => {
                self.bind_value(value);
                Ok(())
            }
            Arg::List(values) => {
                self.push("(");
                self.write_value_list(values);
                self.push(")");
                Ok(())
            }
            Arg::Expr(expr) => self.write_expr(expr, Prec::Operand),
            Arg::Custom(value) => self.write_custom(value),
            Arg::Default => Err(CompileError::invalid(
                "VALUES",
                "DEFAULT is only valid for a target column",
            )),
        }
    }

    fn bind_for_column(&mut self, arg: &Arg, column: &str) -> Result<()> {
        if !matches!(arg, Arg::Default) {
            return self.bind(arg);
        }
        let field = self
            .model
            .and_then(|m| m.lookup_field(column))
            .cloned()
            .unwrap_or_else(|| Field::new(column, DataType::Text));
        let expr = (self.dialect.default_value_of)(&field)
            .ok_or_else(|| self.dialect.unsupported("DefaultValueOf"))?;
        self.write_expr(&expr, Prec::Operand)
    }

    fn write_value_list(&mut self, values: &[SqlValue]) {
        if values.is_empty() {
            self.push("NULL");
            return;
        }
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.bind_value(value);
        }
    }

    fn write_custom(&mut self, value: &Arc<dyn SqlExpression>) -> Result<()> {
        if self.depth >= MAX_RENDER_DEPTH {
            return Err(CompileError::Bind {
                dialect: self.dialect.name,
                reason: format!("self-rendering values nested deeper than {MAX_RENDER_DEPTH}"),
            });
        }
        let ctx = RenderContext {
            dialect: self.dialect,
            table: self.table,
        };
        let expr = value.to_expr(&ctx);
        self.depth += 1;
        let result = self.write_expr(&expr, Prec::Operand);
        self.depth -= 1;
        result
    }

    fn write_column(&mut self, column: &Column) {
        if let Some(table) = &column.table {
            self.quote(table);
            self.push(".");
        }
        if column.name == "*" {
            self.push("*");
        } else {
            self.quote(&column.name);
        }
    }

    /// Writes a raw fragment, binding one argument per `?` outside string
    /// literals.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::ArgumentCount`] when placeholders and
    /// arguments disagree.
    pub fn write_raw(&mut self, sql: &str, args: &[Arg]) -> Result<()> {
        let expected = count_placeholders(sql);
        if expected != args.len() {
            return Err(CompileError::ArgumentCount {
                expected,
                got: args.len(),
            });
        }

        let mut next = args.iter();
        let mut in_string = false;
        for c in sql.chars() {
            match c {
                '\'' => {
                    in_string = !in_string;
                    self.sql.push(c);
                }
                '?' if !in_string => {
                    if let Some(arg) = next.next() {
                        self.bind(arg)?;
                    }
                }
                _ => self.sql.push(c),
            }
        }
        Ok(())
    }

    fn write_expr(&mut self, expr: &Expr, parent: Prec) -> Result<()> {
        match expr {
            Expr::Column(column) => self.write_column(column),
            Expr::Value(arg) => self.bind(arg)?,
            Expr::Raw { sql, args } => {
                let wrap = parent == Prec::Not
                    || (matches!(parent, Prec::And | Prec::Or) && LOGICAL_KEYWORD.is_match(sql));
                self.wrapped(wrap, |w| w.write_raw(sql, args))?;
            }
            Expr::Compare { left, op, right } => {
                self.wrapped(parent == Prec::Operand, |w| {
                    w.write_expr(left, Prec::Operand)?;
                    match (op, right.as_ref()) {
                        (CompareOp::Eq, Expr::Value(Arg::Value(SqlValue::Null))) => {
                            w.push(" IS NULL");
                        }
                        (
                            CompareOp::NotEq,
                            Expr::Value(Arg::Value(SqlValue::Null)),
                        ) => w.push(" IS NOT NULL"),
                        _ => {
                            w.push(" ");
                            w.push(op.as_sql());
                            w.push(" ");
                            w.write_expr(right, Prec::Operand)?;
                        }
                    }
                    Ok(())
                })?;
            }
            Expr::And(items) => self.write_group(items, " AND ", Prec::And, parent)?,
            Expr::Or(items) => self.write_group(items, " OR ", Prec::Or, parent)?,
            Expr::Not(inner) => {
                self.wrapped(matches!(parent, Prec::Not | Prec::Operand), |w| {
                    w.push("NOT ");
                    w.write_expr(inner, Prec::Not)
                })?;
            }
            Expr::InList {
                expr,
                values,
                negated,
            } => {
                self.wrapped(parent == Prec::Operand, |w| {
                    // Nothing is excluded by an empty list, not even NULL.
                    if *negated && values.is_empty() {
                        w.push("1 = 1");
                        return Ok(());
                    }
                    w.write_expr(expr, Prec::Operand)?;
                    w.write_in_list(values, *negated);
                    Ok(())
                })?;
            }
            Expr::IsNull { expr, negated } => {
                self.wrapped(parent == Prec::Operand, |w| {
                    w.write_expr(expr, Prec::Operand)?;
                    w.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
                    Ok(())
                })?;
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                self.wrapped(parent == Prec::Operand, |w| {
                    w.write_expr(expr, Prec::Operand)?;
                    w.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                    w.bind(low)?;
                    w.push(" AND ");
                    w.bind(high)
                })?;
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                self.wrapped(parent == Prec::Operand, |w| {
                    w.write_expr(expr, Prec::Operand)?;
                    w.push(if *negated { " NOT LIKE " } else { " LIKE " });
                    w.bind(pattern)
                })?;
            }
            Expr::Func { name, args } => {
                self.push(name);
                self.push("(");
                self.write_list(args, |w, e| w.write_expr(e, Prec::Top))?;
                self.push(")");
            }
        }
        Ok(())
    }

    fn wrapped(&mut self, wrap: bool, write: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        if wrap {
            self.push("(");
        }
        write(self)?;
        if wrap {
            self.push(")");
        }
        Ok(())
    }

    fn write_group(&mut self, items: &[Expr], sep: &str, own: Prec, parent: Prec) -> Result<()> {
        let items: Vec<&Expr> = items.iter().filter(|e| !e.is_empty()).collect();
        match items.as_slice() {
            [] => Ok(()),
            [single] => self.write_expr(single, parent),
            _ => {
                let wrap = match own {
                    Prec::Or => matches!(parent, Prec::And | Prec::Not | Prec::Operand),
                    _ => matches!(parent, Prec::Not | Prec::Operand),
                };
                self.wrapped(wrap, |w| {
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            w.push(sep);
                        }
                        w.write_expr(item, own)?;
                    }
                    Ok(())
                })
            }
        }
    }

    fn write_in_list(&mut self, values: &[SqlValue], negated: bool) {
        let native = self.dialect.array_binding
            && self.mode == BindMode::Placeholders
            && is_homogeneous(values);
        if native {
            self.push(if negated { " <> ALL(" } else { " = ANY(" });
            self.bind_value(&SqlValue::Array(values.to_vec()));
            self.push(")");
            return;
        }
        self.push(if negated { " NOT IN (" } else { " IN (" });
        self.write_value_list(values);
        self.push(")");
    }
}

/// True when every value is non-NULL and of the same scalar kind.
fn is_homogeneous(values: &[SqlValue]) -> bool {
    let Some(first) = values.first() else {
        return false;
    };
    !first.is_null()
        && !matches!(first, SqlValue::Array(_))
        && values.iter().all(|v| v.kind() == first.kind())
}

fn count_placeholders(sql: &str) -> usize {
    let mut in_string = false;
    let mut count = 0;
    for c in sql.chars() {
        match c {
            '\'' => in_string = !in_string,
            '?' if !in_string => count += 1,
            _ => {}
        }
    }
    count
}
