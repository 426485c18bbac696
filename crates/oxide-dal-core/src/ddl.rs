//! DDL generation.
//!
//! Each function renders the statement(s) for one schema change on one
//! dialect. Engines that lack an operation return
//! [`CompileError::Unsupported`]; the migrator decides whether that is fatal.

use crate::dialect::{Dialect, Engine};
use crate::error::{CompileError, Result};
use crate::schema::{ConstraintDef, ConstraintKind, ConstraintType, Field, IndexDef, Model};
use crate::statement::Statement;
use crate::value::quote_text;

/// Options for creating a view.
#[derive(Debug, Clone, Default)]
pub struct ViewOption {
    /// `CREATE OR REPLACE`. On SQLite the view is dropped first.
    pub replace: bool,
    /// Trailing check option, emitted verbatim (e.g. `WITH CASCADED CHECK OPTION`).
    pub check_option: Option<String>,
    /// Defining query. Required.
    pub query: Option<Statement>,
}

impl ViewOption {
    /// Creates options for a view over `query`.
    #[must_use]
    pub fn new(query: Statement) -> Self {
        Self {
            replace: false,
            check_option: None,
            query: Some(query),
        }
    }

    /// Replaces an existing view.
    #[must_use]
    pub const fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Sets the check option.
    #[must_use]
    pub fn check_option(mut self, option: impl Into<String>) -> Self {
        self.check_option = Some(option.into());
        self
    }
}

/// Column type plus NOT NULL, DEFAULT and (MySQL) COMMENT.
///
/// Uniqueness and primary keys are not included; [`create_table`] adds them
/// and the migrator maintains unique columns through indexes.
#[must_use]
pub fn full_data_type_of(dialect: &Dialect, field: &Field) -> String {
    let mut sql = (dialect.data_type_of)(field);
    let inline_pk = sql.to_ascii_uppercase().contains("PRIMARY KEY");
    if !field.nullable && !inline_pk {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &field.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default.to_sql_for(dialect.engine));
    }
    if dialect.engine == Engine::MySql {
        if let Some(comment) = &field.comment {
            sql.push_str(" COMMENT ");
            sql.push_str(&quote_text(comment, dialect.engine));
        }
    }
    sql
}

fn quote_list(dialect: &Dialect, names: &[String]) -> String {
    names
        .iter()
        .map(|n| dialect.quote(n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn constraint_body(dialect: &Dialect, kind: &ConstraintKind) -> String {
    match kind {
        ConstraintKind::Check(expression) => format!("CHECK ({expression})"),
        ConstraintKind::Unique(columns) => format!("UNIQUE ({})", quote_list(dialect, columns)),
        ConstraintKind::ForeignKey {
            columns,
            references_table,
            references_columns,
            on_delete,
            on_update,
        } => {
            let mut sql = format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                quote_list(dialect, columns),
                dialect.quote(references_table),
                quote_list(dialect, references_columns)
            );
            if let Some(action) = on_delete {
                sql.push_str(" ON DELETE ");
                sql.push_str(action.as_sql());
            }
            if let Some(action) = on_update {
                sql.push_str(" ON UPDATE ");
                sql.push_str(action.as_sql());
            }
            sql
        }
    }
}

fn constraint_definition(dialect: &Dialect, constraint: &ConstraintDef) -> String {
    format!(
        "CONSTRAINT {} {}",
        dialect.quote(&constraint.name),
        constraint_body(dialect, &constraint.kind)
    )
}

/// CREATE TABLE for a model, followed by its index statements and, on
/// PostgreSQL, column comments.
///
/// # Errors
///
/// Fails for a model without fields and for invalid index definitions.
pub fn create_table(dialect: &Dialect, model: &Model) -> Result<Vec<String>> {
    if model.fields.is_empty() {
        return Err(CompileError::InvalidClause {
            clause: "CREATE TABLE",
            reason: format!("model {} has no fields", model.name),
        });
    }

    let mut parts = Vec::with_capacity(model.fields.len() + model.constraints.len() + 1);
    let mut primary_keys = Vec::new();
    for field in &model.fields {
        let full = full_data_type_of(dialect, field);
        if field.primary_key && !full.to_ascii_uppercase().contains("PRIMARY KEY") {
            primary_keys.push(field.name.clone());
        }
        let mut part = format!("{} {full}", dialect.quote(&field.name));
        if field.unique && !field.primary_key {
            part.push_str(" UNIQUE");
        }
        parts.push(part);
    }
    if !primary_keys.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", quote_list(dialect, &primary_keys)));
    }
    for constraint in &model.constraints {
        parts.push(constraint_definition(dialect, constraint));
    }

    let table = dialect.quote(&model.table);
    let mut statements = vec![format!("CREATE TABLE {table} ({})", parts.join(", "))];
    for index in &model.indexes {
        statements.push(create_index(dialect, &model.table, index)?);
    }
    if dialect.engine == Engine::Postgres {
        for field in &model.fields {
            if let Some(comment) = &field.comment {
                statements.push(format!(
                    "COMMENT ON COLUMN {table}.{} IS {}",
                    dialect.quote(&field.name),
                    quote_text(comment, dialect.engine)
                ));
            }
        }
    }
    Ok(statements)
}

/// DROP TABLE IF EXISTS; cascades on PostgreSQL.
#[must_use]
pub fn drop_table(dialect: &Dialect, table: &str) -> String {
    let mut sql = format!("DROP TABLE IF EXISTS {}", dialect.quote(table));
    if dialect.engine == Engine::Postgres {
        sql.push_str(" CASCADE");
    }
    sql
}

/// Renames a table.
#[must_use]
pub fn rename_table(dialect: &Dialect, old: &str, new: &str) -> String {
    match dialect.engine {
        Engine::MySql => format!("RENAME TABLE {} TO {}", dialect.quote(old), dialect.quote(new)),
        _ => format!(
            "ALTER TABLE {} RENAME TO {}",
            dialect.quote(old),
            dialect.quote(new)
        ),
    }
}

/// Adds a column.
#[must_use]
pub fn add_column(dialect: &Dialect, table: &str, field: &Field) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        dialect.quote(table),
        dialect.quote(&field.name),
        full_data_type_of(dialect, field)
    )
}

/// Drops a column.
#[must_use]
pub fn drop_column(dialect: &Dialect, table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        dialect.quote(table),
        dialect.quote(column)
    )
}

/// Changes a column to match `field`.
///
/// # Errors
///
/// Returns [`CompileError::Unsupported`] on SQLite, which cannot alter
/// columns in place.
pub fn alter_column(dialect: &Dialect, table: &str, field: &Field) -> Result<Vec<String>> {
    let table = dialect.quote(table);
    let column = dialect.quote(&field.name);
    match dialect.engine {
        Engine::Sqlite => Err(dialect.unsupported("AlterColumn")),
        Engine::MySql => Ok(vec![format!(
            "ALTER TABLE {table} MODIFY COLUMN {column} {}",
            full_data_type_of(dialect, field)
        )]),
        Engine::Postgres => {
            // serial types exist only at creation; alter to the plain integer type
            let plain = Field {
                auto_increment: false,
                ..field.clone()
            };
            let data_type = (dialect.data_type_of)(&plain);
            let prefix = format!("ALTER TABLE {table} ALTER COLUMN {column}");
            let mut statements = vec![format!(
                "{prefix} TYPE {data_type} USING {column}::{data_type}"
            )];
            if !field.primary_key {
                statements.push(if field.nullable {
                    format!("{prefix} DROP NOT NULL")
                } else {
                    format!("{prefix} SET NOT NULL")
                });
            }
            if !field.auto_increment {
                statements.push(match &field.default {
                    Some(default) => {
                        format!("{prefix} SET DEFAULT {}", default.to_sql_for(dialect.engine))
                    }
                    None => format!("{prefix} DROP DEFAULT"),
                });
            }
            Ok(statements)
        }
        Engine::Generic => Ok(vec![format!(
            "ALTER TABLE {table} ALTER COLUMN {column} TYPE {}",
            (dialect.data_type_of)(field)
        )]),
    }
}

/// Renames a column.
#[must_use]
pub fn rename_column(dialect: &Dialect, table: &str, old: &str, new: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        dialect.quote(table),
        dialect.quote(old),
        dialect.quote(new)
    )
}

/// Creates an index.
///
/// # Errors
///
/// Fails for an index without columns.
pub fn create_index(dialect: &Dialect, table: &str, index: &IndexDef) -> Result<String> {
    if index.columns.is_empty() {
        return Err(CompileError::InvalidClause {
            clause: "CREATE INDEX",
            reason: format!("index {} has no columns", index.name),
        });
    }
    let mut sql = String::from("CREATE ");
    if index.unique {
        sql.push_str("UNIQUE ");
    }
    sql.push_str(&format!(
        "INDEX {} ON {} ({})",
        dialect.quote(&index.name),
        dialect.quote(table),
        quote_list(dialect, &index.columns)
    ));
    if let Some(option) = &index.option {
        sql.push(' ');
        sql.push_str(option);
    }
    Ok(sql)
}

/// Drops an index.
#[must_use]
pub fn drop_index(dialect: &Dialect, table: &str, name: &str) -> String {
    match dialect.engine {
        Engine::MySql => format!("DROP INDEX {} ON {}", dialect.quote(name), dialect.quote(table)),
        _ => format!("DROP INDEX {}", dialect.quote(name)),
    }
}

/// Renames an index.
///
/// # Errors
///
/// Returns [`CompileError::Unsupported`] on engines without an in-place
/// rename.
pub fn rename_index(dialect: &Dialect, table: &str, old: &str, new: &str) -> Result<String> {
    match dialect.engine {
        Engine::Postgres => Ok(format!(
            "ALTER INDEX {} RENAME TO {}",
            dialect.quote(old),
            dialect.quote(new)
        )),
        Engine::MySql => Ok(format!(
            "ALTER TABLE {} RENAME INDEX {} TO {}",
            dialect.quote(table),
            dialect.quote(old),
            dialect.quote(new)
        )),
        Engine::Sqlite | Engine::Generic => Err(dialect.unsupported("RenameIndex")),
    }
}

/// Adds a named constraint to an existing table.
///
/// SQLite cannot add constraints after creation; a UNIQUE constraint is
/// emulated with a unique index of the same name.
///
/// # Errors
///
/// Returns [`CompileError::Unsupported`] for SQLite CHECK and FOREIGN KEY.
pub fn create_constraint(dialect: &Dialect, table: &str, constraint: &ConstraintDef) -> Result<String> {
    if dialect.engine == Engine::Sqlite {
        return match &constraint.kind {
            ConstraintKind::Unique(columns) => create_index(
                dialect,
                table,
                &IndexDef {
                    name: constraint.name.clone(),
                    columns: columns.clone(),
                    unique: true,
                    option: None,
                },
            ),
            _ => Err(dialect.unsupported("CreateConstraint")),
        };
    }
    Ok(format!(
        "ALTER TABLE {} ADD {}",
        dialect.quote(table),
        constraint_definition(dialect, constraint)
    ))
}

/// Drops a named constraint.
///
/// # Errors
///
/// Returns [`CompileError::Unsupported`] for SQLite CHECK and FOREIGN KEY.
pub fn drop_constraint(
    dialect: &Dialect,
    table: &str,
    name: &str,
    kind: ConstraintType,
) -> Result<String> {
    let quoted_table = dialect.quote(table);
    let quoted = dialect.quote(name);
    match (dialect.engine, kind) {
        (Engine::Sqlite, ConstraintType::Unique) => Ok(drop_index(dialect, table, name)),
        (Engine::Sqlite, _) => Err(dialect.unsupported("DropConstraint")),
        (Engine::MySql, ConstraintType::ForeignKey) => {
            Ok(format!("ALTER TABLE {quoted_table} DROP FOREIGN KEY {quoted}"))
        }
        (Engine::MySql, ConstraintType::Check) => {
            Ok(format!("ALTER TABLE {quoted_table} DROP CHECK {quoted}"))
        }
        (Engine::MySql, ConstraintType::Unique) => {
            Ok(format!("ALTER TABLE {quoted_table} DROP INDEX {quoted}"))
        }
        _ => Ok(format!("ALTER TABLE {quoted_table} DROP CONSTRAINT {quoted}")),
    }
}

/// Creates a view. The query is compiled with inline literals.
///
/// # Errors
///
/// Fails without a query, for a check option on SQLite, and for query
/// compilation errors.
pub fn create_view(dialect: &Dialect, name: &str, option: &ViewOption) -> Result<Vec<String>> {
    let query = option.query.clone().ok_or_else(|| CompileError::InvalidClause {
        clause: "CREATE VIEW",
        reason: String::from("a defining query is required"),
    })?;
    if dialect.engine == Engine::Sqlite && option.check_option.is_some() {
        return Err(dialect.unsupported("ViewCheckOption"));
    }
    let body = query.build_inline(dialect)?;
    let quoted = dialect.quote(name);

    let mut statements = Vec::with_capacity(2);
    let create = if option.replace && dialect.engine == Engine::Sqlite {
        statements.push(drop_view(dialect, name));
        "CREATE VIEW"
    } else if option.replace {
        "CREATE OR REPLACE VIEW"
    } else {
        "CREATE VIEW"
    };
    let mut sql = format!("{create} {quoted} AS {body}");
    if let Some(check) = &option.check_option {
        sql.push(' ');
        sql.push_str(check);
    }
    statements.push(sql);
    Ok(statements)
}

/// Drops a view if it exists.
#[must_use]
pub fn drop_view(dialect: &Dialect, name: &str) -> String {
    format!("DROP VIEW IF EXISTS {}", dialect.quote(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{GENERIC, MYSQL, POSTGRES, SQLITE};
    use crate::expr::col;
    use crate::schema::{id, text, varchar, DataType, DefaultValue, ForeignKeyAction};

    fn users() -> Model {
        Model::new("User", "users")
            .field(id("id"))
            .field(varchar("email", 120).not_null().unique())
            .field(text("bio").comment("About"))
            .field(
                Field::new("active", DataType::Boolean)
                    .not_null()
                    .default_value(DefaultValue::Boolean(true)),
            )
            .index(IndexDef::new("idx_users_bio", &["bio"]))
    }

    #[test]
    fn test_create_table_sqlite() {
        let statements = create_table(&SQLITE, &users()).unwrap();
        assert_eq!(
            statements[0],
            "CREATE TABLE \"users\" (\"id\" integer PRIMARY KEY AUTOINCREMENT, \
             \"email\" text NOT NULL UNIQUE, \"bio\" text, \
             \"active\" numeric NOT NULL DEFAULT TRUE)"
        );
        assert_eq!(
            statements[1],
            "CREATE INDEX \"idx_users_bio\" ON \"users\" (\"bio\")"
        );
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_create_table_postgres() {
        let statements = create_table(&POSTGRES, &users()).unwrap();
        assert!(statements[0].starts_with("CREATE TABLE \"users\" (\"id\" bigserial NOT NULL, "));
        assert!(statements[0].ends_with(", PRIMARY KEY (\"id\"))"));
        assert_eq!(
            statements[2],
            "COMMENT ON COLUMN \"users\".\"bio\" IS 'About'"
        );
    }

    #[test]
    fn test_create_table_mysql_comment() {
        let statements = create_table(&MYSQL, &users()).unwrap();
        assert!(statements[0].contains("`bio` longtext COMMENT 'About'"));
        assert!(statements[0].contains("`id` bigint AUTO_INCREMENT NOT NULL"));
    }

    #[test]
    fn test_mysql_default_and_comment_escape_backslash() {
        let field = varchar("path", 20)
            .default_value(DefaultValue::String(String::from("C:\\")))
            .comment("ends in \\");
        let sql = full_data_type_of(&MYSQL, &field);
        assert!(sql.contains(r"DEFAULT 'C:\\'"), "{sql}");
        assert!(sql.ends_with(r"COMMENT 'ends in \\'"), "{sql}");
        assert!(full_data_type_of(&SQLITE, &field).contains(r"DEFAULT 'C:\'"));
    }

    #[test]
    fn test_create_table_constraints() {
        let model = Model::new("Post", "posts")
            .field(id("id"))
            .field(Field::new("user_id", DataType::BigInt))
            .constraint(
                ConstraintDef::foreign_key("fk_posts_user", &["user_id"], "users", &["id"])
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .constraint(ConstraintDef::check("chk_user", "user_id > 0"));
        let sql = &create_table(&POSTGRES, &model).unwrap()[0];
        assert!(sql.contains(
            "CONSTRAINT \"fk_posts_user\" FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\") ON DELETE CASCADE"
        ));
        assert!(sql.contains("CONSTRAINT \"chk_user\" CHECK (user_id > 0)"));
    }

    #[test]
    fn test_create_table_without_fields() {
        assert!(create_table(&SQLITE, &Model::new("Empty", "empty")).is_err());
    }

    #[test]
    fn test_drop_and_rename_table() {
        assert_eq!(drop_table(&SQLITE, "t"), "DROP TABLE IF EXISTS \"t\"");
        assert_eq!(drop_table(&POSTGRES, "t"), "DROP TABLE IF EXISTS \"t\" CASCADE");
        assert_eq!(rename_table(&MYSQL, "a", "b"), "RENAME TABLE `a` TO `b`");
        assert_eq!(rename_table(&SQLITE, "a", "b"), "ALTER TABLE \"a\" RENAME TO \"b\"");
    }

    #[test]
    fn test_columns() {
        assert_eq!(
            add_column(&SQLITE, "users", &varchar("email", 100)),
            "ALTER TABLE \"users\" ADD COLUMN \"email\" text"
        );
        assert_eq!(
            drop_column(&MYSQL, "users", "email"),
            "ALTER TABLE `users` DROP COLUMN `email`"
        );
        assert_eq!(
            rename_column(&POSTGRES, "users", "a", "b"),
            "ALTER TABLE \"users\" RENAME COLUMN \"a\" TO \"b\""
        );
    }

    #[test]
    fn test_alter_column() {
        let field = varchar("name", 200).not_null();
        assert_eq!(
            alter_column(&SQLITE, "users", &field),
            Err(CompileError::Unsupported {
                dialect: "sqlite",
                operation: "AlterColumn"
            })
        );
        assert_eq!(
            alter_column(&MYSQL, "users", &field).unwrap(),
            vec!["ALTER TABLE `users` MODIFY COLUMN `name` varchar(200) NOT NULL"]
        );
        assert_eq!(
            alter_column(&POSTGRES, "users", &field).unwrap(),
            vec![
                "ALTER TABLE \"users\" ALTER COLUMN \"name\" TYPE varchar(200) USING \"name\"::varchar(200)",
                "ALTER TABLE \"users\" ALTER COLUMN \"name\" SET NOT NULL",
                "ALTER TABLE \"users\" ALTER COLUMN \"name\" DROP DEFAULT",
            ]
        );
        assert_eq!(
            alter_column(&POSTGRES, "users", &id("id")).unwrap(),
            vec!["ALTER TABLE \"users\" ALTER COLUMN \"id\" TYPE bigint USING \"id\"::bigint"]
        );
    }

    #[test]
    fn test_indexes() {
        let index = IndexDef::new("idx_a", &["a", "b"]).unique();
        assert_eq!(
            create_index(&POSTGRES, "t", &index).unwrap(),
            "CREATE UNIQUE INDEX \"idx_a\" ON \"t\" (\"a\", \"b\")"
        );
        let partial = IndexDef::new("idx_p", &["a"]).option("WHERE a > 0");
        assert_eq!(
            create_index(&SQLITE, "t", &partial).unwrap(),
            "CREATE INDEX \"idx_p\" ON \"t\" (\"a\") WHERE a > 0"
        );
        assert!(create_index(&SQLITE, "t", &IndexDef::new("x", &[])).is_err());
        assert_eq!(drop_index(&MYSQL, "t", "i"), "DROP INDEX `i` ON `t`");
        assert_eq!(drop_index(&SQLITE, "t", "i"), "DROP INDEX \"i\"");
    }

    #[test]
    fn test_rename_index() {
        assert_eq!(
            rename_index(&POSTGRES, "t", "a", "b").unwrap(),
            "ALTER INDEX \"a\" RENAME TO \"b\""
        );
        assert_eq!(
            rename_index(&MYSQL, "t", "a", "b").unwrap(),
            "ALTER TABLE `t` RENAME INDEX `a` TO `b`"
        );
        assert!(rename_index(&SQLITE, "t", "a", "b").is_err());
    }

    #[test]
    fn test_constraints() {
        let unique = ConstraintDef::unique("uq_email", &["email"]);
        assert_eq!(
            create_constraint(&SQLITE, "users", &unique).unwrap(),
            "CREATE UNIQUE INDEX \"uq_email\" ON \"users\" (\"email\")"
        );
        assert_eq!(
            create_constraint(&POSTGRES, "users", &unique).unwrap(),
            "ALTER TABLE \"users\" ADD CONSTRAINT \"uq_email\" UNIQUE (\"email\")"
        );
        assert!(create_constraint(&SQLITE, "users", &ConstraintDef::check("c", "1 = 1")).is_err());

        assert_eq!(
            drop_constraint(&MYSQL, "p", "fk", ConstraintType::ForeignKey).unwrap(),
            "ALTER TABLE `p` DROP FOREIGN KEY `fk`"
        );
        assert_eq!(
            drop_constraint(&POSTGRES, "p", "fk", ConstraintType::ForeignKey).unwrap(),
            "ALTER TABLE \"p\" DROP CONSTRAINT \"fk\""
        );
        assert_eq!(
            drop_constraint(&SQLITE, "users", "uq_email", ConstraintType::Unique).unwrap(),
            "DROP INDEX \"uq_email\""
        );
    }

    #[test]
    fn test_views() {
        let query = Statement::select_from("users").filter(col("active").eq(true));
        let option = ViewOption::new(query.clone())
            .replace()
            .check_option("WITH CASCADED CHECK OPTION");
        assert_eq!(
            create_view(&POSTGRES, "active_users", &option).unwrap(),
            vec![
                "CREATE OR REPLACE VIEW \"active_users\" AS SELECT * FROM \"users\" \
                 WHERE \"active\" = TRUE WITH CASCADED CHECK OPTION"
            ]
        );
        assert!(create_view(&SQLITE, "v", &option).is_err());
        assert_eq!(
            create_view(&SQLITE, "v", &ViewOption::new(query).replace()).unwrap(),
            vec![
                "DROP VIEW IF EXISTS \"v\"",
                "CREATE VIEW \"v\" AS SELECT * FROM \"users\" WHERE \"active\" = TRUE",
            ]
        );
        assert!(create_view(&GENERIC, "v", &ViewOption::default()).is_err());
        assert_eq!(drop_view(&MYSQL, "v"), "DROP VIEW IF EXISTS `v`");
    }
}
