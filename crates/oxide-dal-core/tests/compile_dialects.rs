//! Cross-dialect compilation tests.
//!
//! The same clause sets are compiled for every built-in dialect and checked
//! for quoting, placeholder numbering and clause order.

use oxide_dal_core::clause::{Clause, Clauses, Join, OrderBy, TableRef};
use oxide_dal_core::dialect::{DialectRegistry, GENERIC, MYSQL, POSTGRES, SQLITE};
use oxide_dal_core::expr::{col, raw, Expr};
use oxide_dal_core::quote::{quote, split_identifier};
use oxide_dal_core::statement::Statement;
use oxide_dal_core::{compile, CompileError, Dialect, RegistryError, SqlValue};

fn builtins() -> [&'static Dialect; 4] {
    [&SQLITE, &POSTGRES, &MYSQL, &GENERIC]
}

// =============================================================================
// Identifier quoting
// =============================================================================

#[test]
fn test_quoting_round_trip_all_dialects() {
    for dialect in builtins() {
        let q = dialect.quote_char;
        for raw in ["users", "public.users", "we\"ird", "back`tick", "", "a..b"] {
            let quoted = quote(raw, q);
            assert!(quoted.ends_with(q), "{quoted} for {}", dialect.name);
            let segments = split_identifier(&quoted, q).unwrap();
            assert_eq!(segments.join("."), raw, "{} on {}", raw, dialect.name);
        }
    }
}

#[test]
fn test_prequoted_segments_pass_through() {
    assert_eq!(SQLITE.quote("\"public\".users"), "\"public\".\"users\"");
    assert_eq!(MYSQL.quote("`db`.`t`"), "`db`.`t`");
}

#[test]
fn test_dialect_quote_matches_quoter() {
    for dialect in builtins() {
        let quoter = dialect.quoter().unwrap();
        assert_eq!(dialect.quote("a.b\"c`d"), quoter.quote("a.b\"c`d"));
    }
}

// =============================================================================
// Placeholders and ordering
// =============================================================================

#[test]
fn test_placeholder_counts_match_args() {
    let stmt = Statement::select_from("orders")
        .filter(col("status").in_list(vec!["paid", "shipped"]))
        .filter(col("total").between(10, 100))
        .filter(raw("note LIKE ?", vec!["%gift%".into()]));

    for dialect in builtins() {
        let compiled = stmt.clone().build(dialect).unwrap();
        let markers = if dialect.name == "postgres" {
            compiled.sql.matches('$').count()
        } else {
            compiled.sql.matches('?').count()
        };
        assert_eq!(markers, compiled.args.len(), "{}", dialect.name);
    }
}

#[test]
fn test_postgres_numbers_are_sequential() {
    let compiled = Statement::update("accounts")
        .set("balance", 10)
        .set("owner", "ann")
        .filter(col("id").eq(3))
        .filter(col("locked").eq(false))
        .build(&POSTGRES)
        .unwrap();
    assert_eq!(
        compiled.sql,
        "UPDATE \"accounts\" SET \"balance\" = $1, \"owner\" = $2 \
         WHERE \"id\" = $3 AND \"locked\" = $4"
    );
    assert_eq!(
        compiled.args,
        vec![
            SqlValue::Int(10),
            SqlValue::Text("ann".into()),
            SqlValue::Int(3),
            SqlValue::Bool(false),
        ]
    );
}

#[test]
fn test_join_query_all_dialects() {
    let clauses = Clauses::new()
        .with(Clause::select(&["u.name"]))
        .with(Clause::from_table(TableRef::new("users").alias("u")))
        .with(Clause::Join(vec![Join::left(
            TableRef::new("posts").alias("p"),
            raw("p.user_id = u.id", vec![]),
        )]))
        .with(Clause::OrderBy(vec![OrderBy::asc("u.name")]))
        .with(Clause::Limit(Some(3)));

    assert_eq!(
        compile(&clauses, &MYSQL, None).unwrap().sql,
        "SELECT `u`.`name` FROM `users` AS `u` LEFT JOIN `posts` AS `p` ON p.user_id = u.id \
         ORDER BY `u`.`name` LIMIT 3"
    );
    assert_eq!(
        compile(&clauses, &SQLITE, None).unwrap().sql,
        "SELECT \"u\".\"name\" FROM \"users\" AS \"u\" LEFT JOIN \"posts\" AS \"p\" \
         ON p.user_id = u.id ORDER BY \"u\".\"name\" LIMIT 3"
    );
}

#[test]
fn test_failed_compile_produces_no_sql() {
    let clauses = Clauses::new()
        .with(Clause::from_table("t"))
        .with(Clause::filter(col("a").eq(1)))
        .with(Clause::Limit(None));
    for dialect in builtins() {
        assert!(matches!(
            compile(&clauses, dialect, None),
            Err(CompileError::InvalidClause { clause: "LIMIT", .. })
        ));
    }
}

#[test]
fn test_nested_boolean_shapes() {
    let filter = Expr::and(
        col("a").eq(1),
        Expr::or(col("b").eq(2), !Expr::and(col("c").eq(3), col("d").eq(4))),
    );
    let compiled = Statement::select_from("t").filter(filter).build(&SQLITE).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT * FROM \"t\" WHERE \"a\" = ? AND (\"b\" = ? OR NOT (\"c\" = ? AND \"d\" = ?))"
    );
}

#[test]
fn test_empty_lists_all_dialects() {
    for dialect in builtins() {
        let q = dialect.quote_char;
        let none = Statement::select_from("t")
            .filter(col("id").in_list(Vec::<i64>::new()))
            .build(dialect)
            .unwrap();
        assert!(none.sql.ends_with(&format!("WHERE {q}id{q} IN (NULL)")), "{}", none.sql);
        assert!(none.args.is_empty());

        let all = Statement::select_from("t")
            .filter(col("a").eq(1))
            .filter(col("id").not_in_list(Vec::<i64>::new()))
            .build(dialect)
            .unwrap();
        assert!(all.sql.ends_with(" AND 1 = 1"), "{}", all.sql);
        assert!(!all.sql.contains("NOT IN"), "{}", all.sql);
        assert_eq!(all.args, vec![SqlValue::Int(1)]);

        let negated = Statement::select_from("t")
            .filter(!col("id").not_in_list(Vec::<i64>::new()))
            .build_inline(dialect)
            .unwrap();
        assert!(negated.ends_with("WHERE NOT 1 = 1"), "{negated}");
    }
}

#[test]
fn test_inline_text_cannot_escape_literal() {
    let sql = Statement::select_from("users")
        .filter(col("name").eq("a\\"))
        .filter(col("role").eq(" OR 1=1 -- "))
        .build_inline(&MYSQL)
        .unwrap();
    assert_eq!(
        sql,
        r"SELECT * FROM `users` WHERE `name` = 'a\\' AND `role` = ' OR 1=1 -- '"
    );

    let sql = Statement::select_from("users")
        .filter(col("name").eq("a\\"))
        .build_inline(&POSTGRES)
        .unwrap();
    assert_eq!(sql, r#"SELECT * FROM "users" WHERE "name" = 'a\'"#);
}

#[test]
fn test_inline_blob_per_dialect() {
    let blob = SqlValue::Blob(vec![0xCA, 0xFE]);
    let postgres = Statement::select_from("files")
        .filter(col("hash").eq(blob.clone()))
        .build_inline(&POSTGRES)
        .unwrap();
    assert!(postgres.ends_with(r"= '\xCAFE'::bytea"), "{postgres}");

    let sqlite = Statement::select_from("files")
        .filter(col("hash").eq(blob))
        .build_inline(&SQLITE)
        .unwrap();
    assert!(sqlite.ends_with("= X'CAFE'"), "{sqlite}");
}

// =============================================================================
// Dialect capabilities
// =============================================================================

#[test]
fn test_savepoints_absent_on_generic() {
    assert_eq!(
        GENERIC.savepoint_sql("sp1"),
        Err(CompileError::Unsupported {
            dialect: "generic",
            operation: "SavePoint"
        })
    );
    assert_eq!(
        GENERIC.rollback_to_sql("sp1"),
        Err(CompileError::Unsupported {
            dialect: "generic",
            operation: "RollbackTo"
        })
    );
    assert_eq!(SQLITE.savepoint_sql("sp1").unwrap(), "SAVEPOINT \"sp1\"");
    assert_eq!(
        MYSQL.rollback_to_sql("sp1").unwrap(),
        "ROLLBACK TO SAVEPOINT `sp1`"
    );
}

#[test]
fn test_explain_inlines_arguments() {
    let compiled = Statement::select_from("users")
        .filter(col("name").eq("o'neil"))
        .filter(col("age").gt(30))
        .build(&POSTGRES)
        .unwrap();
    assert_eq!(
        (POSTGRES.explain)(&compiled.sql, &compiled.args),
        "SELECT * FROM \"users\" WHERE \"name\" = 'o''neil' AND \"age\" > 30"
    );
}

#[test]
fn test_registry_rejects_duplicates() {
    let mut registry = DialectRegistry::with_builtins();
    let err = registry.register(&POSTGRES).unwrap_err();
    assert_eq!(err, RegistryError::Duplicate("postgres".into()));
}
