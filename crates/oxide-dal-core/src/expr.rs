//! Expression trees.
//!
//! Expressions are plain data: they describe a predicate or a value without
//! committing to any SQL text. The compiler turns them into dialect-specific
//! SQL, which is where parenthesization and placeholder numbering happen.

use std::ops;

use crate::value::{Arg, SqlValue, ToSqlValue};

/// Creates a column reference.
#[must_use]
pub fn col(name: &str) -> Column {
    Column {
        table: None,
        name: String::from(name),
    }
}

/// Creates a raw SQL fragment with `?` placeholders.
///
/// **Warning**: Only use this for SQL fragments that don't contain user input.
#[must_use]
pub fn raw(sql: impl Into<String>, args: Vec<Arg>) -> Expr {
    Expr::Raw {
        sql: sql.into(),
        args,
    }
}

/// Combines expressions with AND.
#[must_use]
pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    let mut items = Vec::new();
    for expr in exprs {
        flatten_into(&mut items, expr, true);
    }
    Expr::And(items)
}

/// Combines expressions with OR.
#[must_use]
pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    let mut items = Vec::new();
    for expr in exprs {
        flatten_into(&mut items, expr, false);
    }
    Expr::Or(items)
}

fn flatten_into(items: &mut Vec<Expr>, expr: Expr, and: bool) {
    match expr {
        Expr::And(inner) if and => items.extend(inner),
        Expr::Or(inner) if !and => items.extend(inner),
        Expr::And(inner) | Expr::Or(inner) if inner.is_empty() => {}
        other => items.push(other),
    }
}

/// A column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Optional table qualifier.
    pub table: Option<String>,
    /// Column name; `*` selects every column.
    pub name: String,
}

impl Column {
    /// Creates a qualified column reference.
    #[must_use]
    pub fn qualified(table: &str, name: &str) -> Self {
        Self {
            table: Some(String::from(table)),
            name: String::from(name),
        }
    }

    fn compare(self, op: CompareOp, value: impl Into<Arg>) -> Expr {
        Expr::Compare {
            left: Box::new(Expr::Column(self)),
            op,
            right: Box::new(Expr::Value(value.into())),
        }
    }

    /// Creates an equality expression.
    #[must_use]
    pub fn eq(self, value: impl Into<Arg>) -> Expr {
        self.compare(CompareOp::Eq, value)
    }

    /// Creates an inequality expression.
    #[must_use]
    pub fn not_eq(self, value: impl Into<Arg>) -> Expr {
        self.compare(CompareOp::NotEq, value)
    }

    /// Creates a less-than expression.
    #[must_use]
    pub fn lt(self, value: impl Into<Arg>) -> Expr {
        self.compare(CompareOp::Lt, value)
    }

    /// Creates a less-than-or-equal expression.
    #[must_use]
    pub fn lt_eq(self, value: impl Into<Arg>) -> Expr {
        self.compare(CompareOp::LtEq, value)
    }

    /// Creates a greater-than expression.
    #[must_use]
    pub fn gt(self, value: impl Into<Arg>) -> Expr {
        self.compare(CompareOp::Gt, value)
    }

    /// Creates a greater-than-or-equal expression.
    #[must_use]
    pub fn gt_eq(self, value: impl Into<Arg>) -> Expr {
        self.compare(CompareOp::GtEq, value)
    }

    /// Creates an IS NULL expression.
    #[must_use]
    pub fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(Expr::Column(self)),
            negated: false,
        }
    }

    /// Creates an IS NOT NULL expression.
    #[must_use]
    pub fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(Expr::Column(self)),
            negated: true,
        }
    }

    /// Creates a LIKE expression.
    #[must_use]
    pub fn like(self, pattern: impl Into<Arg>) -> Expr {
        Expr::Like {
            expr: Box::new(Expr::Column(self)),
            pattern: pattern.into(),
            negated: false,
        }
    }

    /// Creates a NOT LIKE expression.
    #[must_use]
    pub fn not_like(self, pattern: impl Into<Arg>) -> Expr {
        Expr::Like {
            expr: Box::new(Expr::Column(self)),
            pattern: pattern.into(),
            negated: true,
        }
    }

    /// Creates a BETWEEN expression.
    #[must_use]
    pub fn between(self, low: impl Into<Arg>, high: impl Into<Arg>) -> Expr {
        Expr::Between {
            expr: Box::new(Expr::Column(self)),
            low: low.into(),
            high: high.into(),
            negated: false,
        }
    }

    /// Creates an IN expression.
    #[must_use]
    pub fn in_list<T: ToSqlValue>(self, values: Vec<T>) -> Expr {
        Expr::InList {
            expr: Box::new(Expr::Column(self)),
            values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
            negated: false,
        }
    }

    /// Creates a NOT IN expression.
    #[must_use]
    pub fn not_in_list<T: ToSqlValue>(self, values: Vec<T>) -> Expr {
        Expr::InList {
            expr: Box::new(Expr::Column(self)),
            values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
            negated: true,
        }
    }
}

impl From<Column> for Expr {
    fn from(column: Column) -> Self {
        Self::Column(column)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl CompareOp {
    /// Returns the SQL operator.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column reference.
    Column(Column),
    /// A bound argument.
    Value(Arg),
    /// A raw SQL fragment; each `?` outside string literals takes one argument.
    Raw {
        /// SQL text.
        sql: String,
        /// Arguments for the `?` placeholders, in order.
        args: Vec<Arg>,
    },
    /// A binary comparison.
    Compare {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: CompareOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Conjunction; empty renders nothing.
    And(Vec<Expr>),
    /// Disjunction; empty renders nothing.
    Or(Vec<Expr>),
    /// Negation.
    Not(Box<Expr>),
    /// Membership test against a list of values.
    InList {
        /// Tested expression.
        expr: Box<Expr>,
        /// Candidate values.
        values: Vec<SqlValue>,
        /// NOT IN.
        negated: bool,
    },
    /// NULL test.
    IsNull {
        /// Tested expression.
        expr: Box<Expr>,
        /// IS NOT NULL.
        negated: bool,
    },
    /// Range test.
    Between {
        /// Tested expression.
        expr: Box<Expr>,
        /// Lower bound.
        low: Arg,
        /// Upper bound.
        high: Arg,
        /// NOT BETWEEN.
        negated: bool,
    },
    /// Pattern match.
    Like {
        /// Tested expression.
        expr: Box<Expr>,
        /// Pattern.
        pattern: Arg,
        /// NOT LIKE.
        negated: bool,
    },
    /// A function call such as `COUNT(*)`.
    Func {
        /// Function name, emitted verbatim.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Creates a bound value expression.
    #[must_use]
    pub fn value(value: impl Into<Arg>) -> Self {
        Self::Value(value.into())
    }

    /// Creates a function call expression.
    #[must_use]
    pub fn func(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Func {
            name: name.into(),
            args,
        }
    }

    /// Creates `*`.
    #[must_use]
    pub fn star() -> Self {
        Self::Column(col("*"))
    }

    /// Combines with another expression using AND.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        all([self, other])
    }

    /// Combines with another expression using OR.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        any([self, other])
    }

    /// Returns true if the expression renders no SQL.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(items) | Self::Or(items) => items.iter().all(Self::is_empty),
            _ => false,
        }
    }

    /// Returns true for nodes that render as a single comparison-like term.
    ///
    /// `NOT` skips its parentheses around these.
    #[must_use]
    pub const fn is_simple(&self) -> bool {
        !matches!(
            self,
            Self::And(_) | Self::Or(_) | Self::Not(_) | Self::Raw { .. }
        )
    }
}

impl ops::Not for Expr {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_flattens() {
        let expr = col("a").eq(1).and(col("b").eq(2)).and(col("c").eq(3));
        match expr {
            Expr::And(items) => assert_eq!(items.len(), 3),
            other => panic!("expected AND, got {other:?}"),
        }
    }

    #[test]
    fn test_or_inside_and_is_kept_nested() {
        let expr = col("a").eq(1).and(col("b").eq(2).or(col("c").eq(3)));
        match expr {
            Expr::And(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[1], Expr::Or(_)));
            }
            other => panic!("expected AND, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_groups_are_dropped() {
        let expr = all([Expr::And(vec![]), col("a").is_null()]);
        assert_eq!(expr, Expr::And(vec![col("a").is_null()]));
        assert!(all(Vec::new()).is_empty());
    }

    #[test]
    fn test_double_negation_cancels() {
        let expr = col("a").eq(1);
        assert_eq!(!!expr.clone(), expr);
    }

    #[test]
    fn test_is_simple() {
        assert!(col("a").eq(1).is_simple());
        assert!(col("a").in_list(vec![1, 2]).is_simple());
        assert!(!col("a").eq(1).or(col("b").eq(2)).is_simple());
        assert!(!raw("a = 1", vec![]).is_simple());
    }
}
