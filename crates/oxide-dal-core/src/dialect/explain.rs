//! Argument inlining for logs.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::Engine;
use crate::value::SqlValue;

static DOLLAR_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("valid placeholder regex"));

/// Replaces sequential `?` placeholders outside string literals with
/// inlined arguments. Placeholders without a matching argument are kept.
#[must_use]
pub fn explain_question(sql: &str, args: &[SqlValue]) -> String {
    inline_question(sql, args, Engine::Generic)
}

/// [`explain_question`] for MySQL, where a backslash escapes the next
/// character inside a literal and inlined text doubles its backslashes.
#[must_use]
pub fn explain_backslash(sql: &str, args: &[SqlValue]) -> String {
    inline_question(sql, args, Engine::MySql)
}

fn inline_question(sql: &str, args: &[SqlValue], engine: Engine) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut next = args.iter();
    let mut in_string = false;
    let mut escaped = false;

    for c in sql.chars() {
        match c {
            _ if escaped => {
                escaped = false;
                out.push(c);
            }
            '\\' if in_string && engine == Engine::MySql => {
                escaped = true;
                out.push(c);
            }
            '\'' => {
                in_string = !in_string;
                out.push(c);
            }
            '?' if !in_string => match next.next() {
                Some(value) => out.push_str(&value.to_sql_literal(engine)),
                None => out.push(c),
            },
            _ => out.push(c),
        }
    }
    out
}

/// Replaces numbered `$n` placeholders with inlined arguments.
/// Placeholders without a matching argument are kept.
#[must_use]
pub fn explain_dollar(sql: &str, args: &[SqlValue]) -> String {
    DOLLAR_PLACEHOLDER
        .replace_all(sql, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| args.get(i))
                .map_or_else(|| caps[0].to_string(), |v| v.to_sql_literal(Engine::Postgres))
        })
        .into_owned()
}
