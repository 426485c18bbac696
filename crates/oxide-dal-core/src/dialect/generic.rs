//! Engine-agnostic dialect.
//!
//! Useful for compiling SQL without a target engine, and as the dialect
//! without optional capabilities: no save-points, no catalog, no RETURNING.

use super::{
    base_type, bind_question, explain_question, limit_offset_standard, quote_backtick, Dialect,
    Engine, Placeholder,
};
use crate::expr::{raw, Expr};
use crate::schema::{DataType, Field};

/// The generic dialect.
pub static GENERIC: Dialect = Dialect {
    name: "generic",
    engine: Engine::Generic,
    quote_char: '`',
    placeholder: Placeholder::Question,
    data_type_of,
    default_value_of,
    bind_var_to: bind_question,
    quote_to: quote_backtick,
    explain: explain_question,
    limit_offset: limit_offset_standard,
    normalize_type: base_type,
    version_query: None,
    savepoints: None,
    array_binding: false,
    returning: false,
};

fn data_type_of(field: &Field) -> String {
    match (&field.data_type, field.size, field.precision) {
        (DataType::Char | DataType::Varchar, Some(n), _) => format!("{}({n})", field.data_type),
        (DataType::Decimal, _, Some(p)) => {
            format!("DECIMAL({p},{})", field.scale.unwrap_or(0))
        }
        (data_type, _, _) => data_type.to_string(),
    }
}

fn default_value_of(_field: &Field) -> Option<Expr> {
    Some(raw("DEFAULT", vec![]))
}
