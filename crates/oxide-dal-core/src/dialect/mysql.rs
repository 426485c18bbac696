//! MySQL dialect.

use super::{
    base_type, bind_question, explain_backslash, quote_backtick, Dialect, Engine, Placeholder,
    STANDARD_SAVEPOINTS,
};
use crate::expr::{raw, Expr};
use crate::schema::{DataType, Field};

/// MySQL and MariaDB.
pub static MYSQL: Dialect = Dialect {
    name: "mysql",
    engine: Engine::MySql,
    quote_char: '`',
    placeholder: Placeholder::Question,
    data_type_of,
    default_value_of,
    bind_var_to: bind_question,
    quote_to: quote_backtick,
    explain: explain_backslash,
    limit_offset,
    normalize_type,
    version_query: Some("SELECT VERSION()"),
    savepoints: Some(STANDARD_SAVEPOINTS),
    array_binding: false,
    returning: false,
};

/// Largest LIMIT MySQL accepts; used when only OFFSET is given.
const MAX_LIMIT: u64 = u64::MAX;

fn data_type_of(field: &Field) -> String {
    let base = match &field.data_type {
        DataType::Boolean => String::from("boolean"),
        DataType::SmallInt => String::from("smallint"),
        DataType::Integer => String::from("int"),
        DataType::BigInt => String::from("bigint"),
        DataType::Real => String::from("float"),
        DataType::Double => String::from("double"),
        DataType::Decimal => match (field.precision, field.scale) {
            (Some(p), Some(s)) => format!("decimal({p},{s})"),
            (Some(p), None) => format!("decimal({p})"),
            _ => String::from("decimal"),
        },
        DataType::Char => format!("char({})", field.size.unwrap_or(1)),
        DataType::Varchar => format!("varchar({})", field.size.unwrap_or(255)),
        DataType::Text => String::from("longtext"),
        DataType::Blob => String::from("longblob"),
        DataType::Date => String::from("date"),
        DataType::Time => String::from("time"),
        DataType::Timestamp => String::from("datetime(3)"),
        DataType::Json => String::from("json"),
        DataType::Uuid => String::from("char(36)"),
        DataType::Custom(name) => name.clone(),
    };
    if field.auto_increment {
        format!("{base} AUTO_INCREMENT")
    } else {
        base
    }
}

fn default_value_of(_field: &Field) -> Option<Expr> {
    Some(raw("DEFAULT", vec![]))
}

fn limit_offset(out: &mut String, limit: Option<u64>, offset: Option<u64>) {
    match (limit, offset) {
        (Some(limit), offset) => {
            out.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = offset {
                out.push_str(&format!(" OFFSET {offset}"));
            }
        }
        (None, Some(offset)) => out.push_str(&format!(" LIMIT {MAX_LIMIT} OFFSET {offset}")),
        (None, None) => {}
    }
}

fn normalize_type(declared: &str) -> String {
    let base = base_type(declared);
    let canonical = match base.as_str() {
        "boolean" | "bool" | "tinyint" => "tinyint",
        "integer" | "int" => "int",
        "double" | "double precision" | "real" => "double",
        "numeric" | "decimal" => "decimal",
        "character varying" | "varchar" => "varchar",
        "character" | "char" => "char",
        _ => return base,
    };
    String::from(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{boolean, id, varchar};

    #[test]
    fn test_data_types() {
        assert_eq!(data_type_of(&id("id")), "bigint AUTO_INCREMENT");
        assert_eq!(data_type_of(&varchar("name", 50)), "varchar(50)");
        assert_eq!(data_type_of(&Field::new("n", DataType::Varchar)), "varchar(255)");
    }

    #[test]
    fn test_limit_offset() {
        let mut out = String::new();
        limit_offset(&mut out, None, Some(5));
        assert_eq!(out, " LIMIT 18446744073709551615 OFFSET 5");
    }

    #[test]
    fn test_boolean_is_tinyint() {
        assert_eq!(normalize_type(&data_type_of(&boolean("b"))), "tinyint");
        assert_eq!(normalize_type("bigint AUTO_INCREMENT"), "bigint");
    }
}
