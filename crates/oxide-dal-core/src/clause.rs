//! The clause model.
//!
//! A query is a mapping from [`ClauseKind`] to [`Clause`]. Adding a clause of
//! a kind that is already present merges or overrides according to the kind:
//! WHERE and HAVING conditions are AND-combined; JOIN, GROUP BY, ORDER BY,
//! SET and VALUES rows accumulate; everything else is replaced.

use std::collections::BTreeMap;

use crate::expr::{all, Column, Expr};
use crate::value::Arg;

/// Clause kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClauseKind {
    /// `INSERT INTO`
    Insert,
    /// `UPDATE`
    Update,
    /// `DELETE FROM`
    Delete,
    /// `SELECT`
    Select,
    /// `FROM`
    From,
    /// `JOIN`
    Join,
    /// `SET`
    Set,
    /// `VALUES`
    Values,
    /// `WHERE`
    Where,
    /// `GROUP BY`
    GroupBy,
    /// `HAVING`
    Having,
    /// `ORDER BY`
    OrderBy,
    /// `LIMIT`
    Limit,
    /// `OFFSET`
    Offset,
    /// `RETURNING`
    Returning,
    /// A raw statement replacing all other clauses.
    Raw,
}

impl ClauseKind {
    /// Returns the SQL keyword for error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Select => "SELECT",
            Self::From => "FROM",
            Self::Join => "JOIN",
            Self::Set => "SET",
            Self::Values => "VALUES",
            Self::Where => "WHERE",
            Self::GroupBy => "GROUP BY",
            Self::Having => "HAVING",
            Self::OrderBy => "ORDER BY",
            Self::Limit => "LIMIT",
            Self::Offset => "OFFSET",
            Self::Returning => "RETURNING",
            Self::Raw => "RAW",
        }
    }
}

/// A table reference with an optional alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Table name, possibly schema-qualified.
    pub name: String,
    /// Alias.
    pub alias: Option<String>,
}

impl TableRef {
    /// Creates a table reference.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// Sets the alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    /// `INNER JOIN`
    #[default]
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `CROSS JOIN`
    Cross,
}

impl JoinKind {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

/// One join.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join type.
    pub kind: JoinKind,
    /// Joined table.
    pub table: TableRef,
    /// ON condition.
    pub on: Option<Expr>,
    /// USING columns, used when `on` is absent.
    pub using: Vec<String>,
}

impl Join {
    /// Creates an inner join.
    #[must_use]
    pub fn inner(table: impl Into<TableRef>, on: Expr) -> Self {
        Self {
            kind: JoinKind::Inner,
            table: table.into(),
            on: Some(on),
            using: Vec::new(),
        }
    }

    /// Creates a left join.
    #[must_use]
    pub fn left(table: impl Into<TableRef>, on: Expr) -> Self {
        Self {
            kind: JoinKind::Left,
            ..Self::inner(table, on)
        }
    }
}

/// An ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// Sort expression.
    pub expr: Expr,
    /// Descending order.
    pub desc: bool,
}

impl OrderBy {
    /// Ascending order on a column.
    #[must_use]
    pub fn asc(column: &str) -> Self {
        Self {
            expr: Expr::Column(crate::expr::col(column)),
            desc: false,
        }
    }

    /// Descending order on a column.
    #[must_use]
    pub fn desc(column: &str) -> Self {
        Self {
            expr: Expr::Column(crate::expr::col(column)),
            desc: true,
        }
    }
}

/// A `column = value` assignment in UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Target column.
    pub column: String,
    /// New value.
    pub value: Arg,
}

impl Assignment {
    /// Creates an assignment.
    #[must_use]
    pub fn new(column: impl Into<String>, value: impl Into<Arg>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// A single clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `INSERT INTO table`; `None` uses the model's table.
    Insert(Option<TableRef>),
    /// `UPDATE table`; `None` uses the model's table.
    Update(Option<TableRef>),
    /// `DELETE FROM table`; `None` uses the model's table.
    Delete(Option<TableRef>),
    /// Select list; empty means `*`.
    Select {
        /// `SELECT DISTINCT`.
        distinct: bool,
        /// Selected expressions.
        columns: Vec<Expr>,
    },
    /// FROM tables; empty uses the model's table.
    From(Vec<TableRef>),
    /// Joins, in order.
    Join(Vec<Join>),
    /// Assignments for UPDATE.
    Set(Vec<Assignment>),
    /// Column list and rows for INSERT.
    Values {
        /// Column names.
        columns: Vec<String>,
        /// Rows; each must have one argument per column.
        rows: Vec<Vec<Arg>>,
    },
    /// WHERE conditions, AND-combined.
    Where(Vec<Expr>),
    /// GROUP BY expressions.
    GroupBy(Vec<Expr>),
    /// HAVING conditions, AND-combined.
    Having(Vec<Expr>),
    /// ORDER BY items.
    OrderBy(Vec<OrderBy>),
    /// Row limit; `None` is a LIMIT without a value and fails to compile.
    Limit(Option<i64>),
    /// Row offset; `None` is an OFFSET without a value and fails to compile.
    Offset(Option<i64>),
    /// RETURNING columns.
    Returning(Vec<String>),
    /// A complete raw statement with `?` placeholders.
    Raw {
        /// SQL text.
        sql: String,
        /// Arguments.
        args: Vec<Arg>,
    },
}

impl Clause {
    /// Returns the kind of this clause.
    #[must_use]
    pub const fn kind(&self) -> ClauseKind {
        match self {
            Self::Insert(_) => ClauseKind::Insert,
            Self::Update(_) => ClauseKind::Update,
            Self::Delete(_) => ClauseKind::Delete,
            Self::Select { .. } => ClauseKind::Select,
            Self::From(_) => ClauseKind::From,
            Self::Join(_) => ClauseKind::Join,
            Self::Set(_) => ClauseKind::Set,
            Self::Values { .. } => ClauseKind::Values,
            Self::Where(_) => ClauseKind::Where,
            Self::GroupBy(_) => ClauseKind::GroupBy,
            Self::Having(_) => ClauseKind::Having,
            Self::OrderBy(_) => ClauseKind::OrderBy,
            Self::Limit(_) => ClauseKind::Limit,
            Self::Offset(_) => ClauseKind::Offset,
            Self::Returning(_) => ClauseKind::Returning,
            Self::Raw { .. } => ClauseKind::Raw,
        }
    }

    /// Selects the given columns.
    #[must_use]
    pub fn select(columns: &[&str]) -> Self {
        Self::Select {
            distinct: false,
            columns: columns
                .iter()
                .map(|c| Expr::Column(Column {
                    table: None,
                    name: String::from(*c),
                }))
                .collect(),
        }
    }

    /// FROM a single table.
    #[must_use]
    pub fn from_table(table: impl Into<TableRef>) -> Self {
        Self::From(vec![table.into()])
    }

    /// A single WHERE condition.
    #[must_use]
    pub fn filter(expr: Expr) -> Self {
        Self::Where(vec![expr])
    }

    /// Merges `other` into `self`. Both must have the same kind.
    fn merge(&mut self, other: Self) {
        match (self, other) {
            (Self::Where(a), Self::Where(b))
            | (Self::Having(a), Self::Having(b))
            | (Self::GroupBy(a), Self::GroupBy(b)) => a.extend(b),
            (Self::Join(a), Self::Join(b)) => a.extend(b),
            (Self::OrderBy(a), Self::OrderBy(b)) => a.extend(b),
            (Self::Set(a), Self::Set(b)) => a.extend(b),
            (
                Self::Values { columns, rows },
                Self::Values {
                    columns: other_columns,
                    rows: other_rows,
                },
            ) if *columns == other_columns => rows.extend(other_rows),
            (this, other) => *this = other,
        }
    }
}

/// The clauses of one statement, keyed by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clauses {
    map: BTreeMap<ClauseKind, Clause>,
}

impl Clauses {
    /// Creates an empty clause set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a clause, merging with an existing clause of the same kind.
    pub fn add(&mut self, clause: Clause) {
        let kind = clause.kind();
        match self.map.get_mut(&kind) {
            Some(existing) => existing.merge(clause),
            None => {
                self.map.insert(kind, clause);
            }
        }
    }

    /// Adds a clause, builder style.
    #[must_use]
    pub fn with(mut self, clause: Clause) -> Self {
        self.add(clause);
        self
    }

    /// Returns the clause of the given kind.
    #[must_use]
    pub fn get(&self, kind: ClauseKind) -> Option<&Clause> {
        self.map.get(&kind)
    }

    /// Returns the clause of the given kind, mutably.
    pub fn get_mut(&mut self, kind: ClauseKind) -> Option<&mut Clause> {
        self.map.get_mut(&kind)
    }

    /// Removes and returns the clause of the given kind.
    pub fn remove(&mut self, kind: ClauseKind) -> Option<Clause> {
        self.map.remove(&kind)
    }

    /// Returns true if a clause of the given kind is present.
    #[must_use]
    pub fn contains(&self, kind: ClauseKind) -> bool {
        self.map.contains_key(&kind)
    }

    /// Iterates clause kinds in their canonical order.
    pub fn kinds(&self) -> impl Iterator<Item = ClauseKind> + '_ {
        self.map.keys().copied()
    }

    /// Returns true if no clause is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Combined WHERE condition, if any.
    #[must_use]
    pub fn where_expr(&self) -> Option<Expr> {
        match self.map.get(&ClauseKind::Where) {
            Some(Clause::Where(exprs)) => {
                let expr = all(exprs.iter().cloned());
                (!expr.is_empty()).then_some(expr)
            }
            _ => None,
        }
    }
}

impl FromIterator<Clause> for Clauses {
    fn from_iter<I: IntoIterator<Item = Clause>>(iter: I) -> Self {
        let mut clauses = Self::new();
        for clause in iter {
            clauses.add(clause);
        }
        clauses
    }
}
