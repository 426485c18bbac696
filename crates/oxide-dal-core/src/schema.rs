//! Desired-schema description.
//!
//! A [`Model`] describes one table as the application expects it: its fields,
//! indexes and constraints. Models are normalized input; nothing here looks at
//! a live database. All types deserialize from JSON so that schema files can
//! be fed straight to the migrator.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::dialect::Engine;
use crate::value::quote_text;

/// Semantic column types.
///
/// Each dialect maps these to its own native type names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Boolean.
    Boolean,
    /// Small integer (16-bit).
    SmallInt,
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Floating point (single precision).
    Real,
    /// Floating point (double precision).
    Double,
    /// Exact decimal; precision and scale come from the field.
    Decimal,
    /// Fixed-length string; length comes from the field.
    Char,
    /// Variable-length string; length comes from the field.
    Varchar,
    /// Unbounded text.
    Text,
    /// Binary large object.
    Blob,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Date and time.
    Timestamp,
    /// JSON document.
    Json,
    /// UUID.
    Uuid,
    /// Database-specific type name, emitted verbatim.
    Custom(String),
}

impl DataType {
    /// Returns true for integer types.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::SmallInt | Self::Integer | Self::BigInt)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("BOOLEAN"),
            Self::SmallInt => f.write_str("SMALLINT"),
            Self::Integer => f.write_str("INTEGER"),
            Self::BigInt => f.write_str("BIGINT"),
            Self::Real => f.write_str("REAL"),
            Self::Double => f.write_str("DOUBLE"),
            Self::Decimal => f.write_str("DECIMAL"),
            Self::Char => f.write_str("CHAR"),
            Self::Varchar => f.write_str("VARCHAR"),
            Self::Text => f.write_str("TEXT"),
            Self::Blob => f.write_str("BLOB"),
            Self::Date => f.write_str("DATE"),
            Self::Time => f.write_str("TIME"),
            Self::Timestamp => f.write_str("TIMESTAMP"),
            Self::Json => f.write_str("JSON"),
            Self::Uuid => f.write_str("UUID"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Boolean default.
    Boolean(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// Raw SQL expression (e.g., `CURRENT_TIMESTAMP`).
    Expression(String),
}

impl DefaultValue {
    /// Returns the SQL representation of the default value.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.to_sql_for(Engine::Generic)
    }

    /// Returns the default as written in DDL for `engine`.
    #[must_use]
    pub fn to_sql_for(&self, engine: Engine) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Boolean(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => quote_text(s, engine),
            Self::Expression(expr) => expr.clone(),
        }
    }

    /// Returns true for raw expressions, whose live text cannot be compared
    /// reliably.
    #[must_use]
    pub const fn is_expression(&self) -> bool {
        matches!(self, Self::Expression(_))
    }
}

const fn default_true() -> bool {
    true
}

/// One column of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Semantic type.
    pub data_type: DataType,
    /// Whether NULL is allowed.
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Default value.
    #[serde(default)]
    pub default: Option<DefaultValue>,
    /// Length for character and binary types.
    #[serde(default)]
    pub size: Option<u32>,
    /// Precision for decimal types.
    #[serde(default)]
    pub precision: Option<u16>,
    /// Scale for decimal types.
    #[serde(default)]
    pub scale: Option<u16>,
    /// Part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Auto-incrementing.
    #[serde(default)]
    pub auto_increment: bool,
    /// Unique on its own.
    #[serde(default)]
    pub unique: bool,
    /// Column comment.
    #[serde(default)]
    pub comment: Option<String>,
}

impl Field {
    /// Creates a nullable field.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
            size: None,
            precision: None,
            scale: None,
            primary_key: false,
            auto_increment: false,
            unique: false,
            comment: None,
        }
    }

    /// Marks the field as NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the field as (part of) the primary key. Implies NOT NULL.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Marks the field as auto-incrementing.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Marks the field as unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Sets the length.
    #[must_use]
    pub const fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub const fn decimal(mut self, precision: u16, scale: u16) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Shorthand for an auto-incrementing BIGINT primary key.
#[must_use]
pub fn id(name: impl Into<String>) -> Field {
    Field::new(name, DataType::BigInt)
        .primary_key()
        .auto_increment()
}

/// Shorthand for a VARCHAR field.
#[must_use]
pub fn varchar(name: impl Into<String>, size: u32) -> Field {
    Field::new(name, DataType::Varchar).size(size)
}

/// Shorthand for a TEXT field.
#[must_use]
pub fn text(name: impl Into<String>) -> Field {
    Field::new(name, DataType::Text)
}

/// Shorthand for a BIGINT field.
#[must_use]
pub fn bigint(name: impl Into<String>) -> Field {
    Field::new(name, DataType::BigInt)
}

/// Shorthand for a BOOLEAN field.
#[must_use]
pub fn boolean(name: impl Into<String>) -> Field {
    Field::new(name, DataType::Boolean)
}

/// Shorthand for a TIMESTAMP field.
#[must_use]
pub fn timestamp(name: impl Into<String>) -> Field {
    Field::new(name, DataType::Timestamp)
}

/// An index on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// UNIQUE index.
    #[serde(default)]
    pub unique: bool,
    /// Trailing option emitted verbatim after the column list
    /// (e.g. a partial-index `WHERE` clause).
    #[serde(default)]
    pub option: Option<String>,
}

impl IndexDef {
    /// Creates a non-unique index.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| String::from(*c)).collect(),
            unique: false,
            option: None,
        }
    }

    /// Makes the index unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the trailing option.
    #[must_use]
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.option = Some(option.into());
        self
    }
}

/// Foreign key referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyAction {
    /// No action.
    NoAction,
    /// Restrict deletion/update.
    Restrict,
    /// Cascade the operation.
    Cascade,
    /// Set to NULL.
    SetNull,
    /// Set to default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// The body of a named constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// CHECK (expression).
    Check(String),
    /// UNIQUE (columns).
    Unique(Vec<String>),
    /// FOREIGN KEY (columns) REFERENCES table (columns).
    ForeignKey {
        /// Local columns.
        columns: Vec<String>,
        /// Referenced table.
        references_table: String,
        /// Referenced columns.
        references_columns: Vec<String>,
        /// Action on delete.
        #[serde(default)]
        on_delete: Option<ForeignKeyAction>,
        /// Action on update.
        #[serde(default)]
        on_update: Option<ForeignKeyAction>,
    },
}

/// Constraint categories, used where only the category matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    /// CHECK constraint.
    Check,
    /// UNIQUE constraint.
    Unique,
    /// FOREIGN KEY constraint.
    ForeignKey,
}

impl ConstraintKind {
    /// Returns the category.
    #[must_use]
    pub const fn constraint_type(&self) -> ConstraintType {
        match self {
            Self::Check(_) => ConstraintType::Check,
            Self::Unique(_) => ConstraintType::Unique,
            Self::ForeignKey { .. } => ConstraintType::ForeignKey,
        }
    }
}

/// A named constraint on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDef {
    /// Constraint name.
    pub name: String,
    /// Constraint body.
    pub kind: ConstraintKind,
}

impl ConstraintDef {
    /// Creates a CHECK constraint.
    #[must_use]
    pub fn check(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::Check(expression.into()),
        }
    }

    /// Creates a UNIQUE constraint.
    #[must_use]
    pub fn unique(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::Unique(columns.iter().map(|c| String::from(*c)).collect()),
        }
    }

    /// Creates a FOREIGN KEY constraint.
    #[must_use]
    pub fn foreign_key(
        name: impl Into<String>,
        columns: &[&str],
        references_table: impl Into<String>,
        references_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::ForeignKey {
                columns: columns.iter().map(|c| String::from(*c)).collect(),
                references_table: references_table.into(),
                references_columns: references_columns
                    .iter()
                    .map(|c| String::from(*c))
                    .collect(),
                on_delete: None,
                on_update: None,
            },
        }
    }

    /// Sets the ON DELETE action of a foreign key. No-op for other kinds.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        if let ConstraintKind::ForeignKey { on_delete, .. } = &mut self.kind {
            *on_delete = Some(action);
        }
        self
    }
}

/// The desired shape of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Logical model name, used in error reports.
    pub name: String,
    /// Table name.
    pub table: String,
    /// Fields, in column order.
    pub fields: Vec<Field>,
    /// Indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
    /// Named constraints.
    #[serde(default)]
    pub constraints: Vec<ConstraintDef>,
}

impl Model {
    /// Creates an empty model.
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields: Vec::new(),
            indexes: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a constraint.
    #[must_use]
    pub fn constraint(mut self, constraint: ConstraintDef) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Looks up a field by column name (case-insensitive).
    #[must_use]
    pub fn lookup_field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn lookup_index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Looks up a constraint by name.
    #[must_use]
    pub fn lookup_constraint(&self, name: &str) -> Option<&ConstraintDef> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Returns the primary key fields.
    pub fn primary_keys(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.primary_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_implies_not_null() {
        let field = id("id");
        assert!(field.primary_key);
        assert!(field.auto_increment);
        assert!(!field.nullable);
    }

    #[test]
    fn test_default_value_to_sql() {
        assert_eq!(DefaultValue::String("it's".into()).to_sql(), "'it''s'");
        assert_eq!(DefaultValue::Integer(3).to_sql(), "3");
        assert_eq!(
            DefaultValue::Expression("CURRENT_TIMESTAMP".into()).to_sql(),
            "CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_model_lookup() {
        let model = Model::new("User", "users")
            .field(id("id"))
            .field(varchar("Email", 255))
            .index(IndexDef::new("idx_users_email", &["Email"]).unique());
        assert!(model.lookup_field("email").is_some());
        assert!(model.lookup_index("idx_users_email").is_some());
        assert_eq!(model.primary_keys().count(), 1);
    }

    #[test]
    fn test_model_from_json() {
        let json = r#"{
            "name": "User",
            "table": "users",
            "fields": [
                {"name": "id", "data_type": "big_int", "primary_key": true, "nullable": false},
                {"name": "email", "data_type": "varchar", "size": 120, "unique": true},
                {"name": "score", "data_type": {"custom": "citext"}, "default": {"integer": 0}}
            ],
            "constraints": [
                {"name": "chk_score", "kind": {"check": "score >= 0"}}
            ]
        }"#;
        let model: Model = serde_json::from_str(json).unwrap();
        assert_eq!(model.fields.len(), 3);
        assert!(model.fields[1].nullable);
        assert_eq!(model.fields[1].size, Some(120));
        assert_eq!(
            model.fields[2].data_type,
            DataType::Custom("citext".to_string())
        );
        assert_eq!(model.fields[2].default, Some(DefaultValue::Integer(0)));
        assert!(model.indexes.is_empty());
        assert_eq!(
            model.constraints[0].kind.constraint_type(),
            ConstraintType::Check
        );
    }
}
