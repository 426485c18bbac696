//! AutoMigrate and migrator operations against in-memory SQLite.

use std::sync::Arc;
use std::time::Duration;

use oxide_dal_core::ddl::ViewOption;
use oxide_dal_core::dialect::SQLITE;
use oxide_dal_core::schema::{id, text, varchar, ConstraintDef, IndexDef, Model};
use oxide_dal_core::{col, Statement};
use oxide_dal_migrate::{Context, Db, MigrateError};
use sqlx::sqlite::SqlitePoolOptions;

async fn setup() -> Db {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    Db::open(&Context::background(), Arc::new(pool), &SQLITE)
        .await
        .unwrap()
}

fn users() -> Model {
    Model::new("User", "users")
        .field(id("id"))
        .field(text("name"))
        .field(text("email"))
}

async fn count(db: &Db, sql: &str) -> i64 {
    let rows = db.query_sql(&Context::background(), sql, &[]).await.unwrap();
    rows[0].int("n").unwrap()
}

#[tokio::test]
async fn test_creates_missing_tables() {
    let db = setup().await;
    let ctx = Context::background();
    let migrator = db.migrator();

    migrator.auto_migrate(&ctx, &[users()]).await.unwrap();

    assert_eq!(migrator.get_tables(&ctx).await.unwrap(), vec!["users"]);
    let columns = migrator.column_types(&ctx, "users").await.unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["id", "name", "email"]);
    assert_eq!(columns[0].primary_key(), Some(true));
    assert_eq!(columns[0].auto_increment(), Some(true));
}

#[tokio::test]
async fn test_adds_missing_column_without_dropping() {
    let db = setup().await;
    let ctx = Context::background();
    db.exec_sql(
        &ctx,
        "CREATE TABLE users (id integer PRIMARY KEY AUTOINCREMENT, name text, legacy text)",
    )
    .await
    .unwrap();

    let migrator = db.migrator();
    migrator.auto_migrate(&ctx, &[users()]).await.unwrap();

    let journal = migrator.journal();
    assert_eq!(journal, vec![r#"ALTER TABLE "users" ADD COLUMN "email" text"#]);
    assert!(journal.iter().all(|sql| !sql.contains("DROP")));
    assert!(migrator.has_column(&ctx, "users", "email").await.unwrap());
    assert!(migrator.has_column(&ctx, "users", "legacy").await.unwrap());
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let db = setup().await;
    let ctx = Context::background();
    let model = users()
        .field(varchar("handle", 40).unique())
        .index(IndexDef::new("idx_users_name", &["name"]));

    db.migrator().auto_migrate(&ctx, &[model.clone()]).await.unwrap();

    let again = db.migrator();
    again.auto_migrate(&ctx, &[model]).await.unwrap();
    assert!(again.journal().is_empty(), "{:?}", again.journal());
}

#[tokio::test]
async fn test_unique_field_gets_unique_index() {
    let db = setup().await;
    let ctx = Context::background();
    db.exec_sql(&ctx, "CREATE TABLE users (id integer PRIMARY KEY AUTOINCREMENT, name text, email text)")
        .await
        .unwrap();

    let model = Model::new("User", "users")
        .field(id("id"))
        .field(text("name"))
        .field(text("email").unique());
    let migrator = db.migrator();
    migrator.auto_migrate(&ctx, &[model]).await.unwrap();

    let indexes = migrator.get_indexes(&ctx, "users").await.unwrap();
    let index = indexes.iter().find(|i| i.name == "idx_users_email").unwrap();
    assert!(index.unique);
    assert_eq!(index.columns, vec!["email"]);

    let columns = migrator.column_types(&ctx, "users").await.unwrap();
    assert_eq!(columns[2].unique(), Some(true));
}

#[tokio::test]
async fn test_added_unique_column_is_unique_after_one_run() {
    let db = setup().await;
    let ctx = Context::background();
    db.exec_sql(&ctx, "CREATE TABLE users (id integer PRIMARY KEY AUTOINCREMENT, name text)")
        .await
        .unwrap();

    let model = Model::new("User", "users")
        .field(id("id"))
        .field(text("name"))
        .field(varchar("email", 40).unique());
    let migrator = db.migrator();
    migrator.auto_migrate(&ctx, &[model]).await.unwrap();

    assert_eq!(migrator.journal().len(), 2, "{:?}", migrator.journal());
    let columns = migrator.column_types(&ctx, "users").await.unwrap();
    let email = columns.iter().find(|c| c.name() == "email").unwrap();
    assert_eq!(email.unique(), Some(true));

    db.exec_sql(&ctx, "INSERT INTO users (name, email) VALUES ('ann', 'a@example.com')")
        .await
        .unwrap();
    let duplicate = db
        .exec_sql(&ctx, "INSERT INTO users (name, email) VALUES ('bob', 'a@example.com')")
        .await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_failing_model_does_not_stop_others() {
    let db = setup().await;
    let ctx = Context::background();
    let a = Model::new("A", "a").field(id("id"));
    let b = Model::new("B", "b")
        .field(id("id"))
        .index(IndexDef::new("idx_b_ghost", &["ghost"]));
    let c = Model::new("C", "c").field(id("id"));

    let migrator = db.migrator();
    let err = migrator.auto_migrate(&ctx, &[a, b, c]).await.unwrap_err();

    let MigrateError::AutoMigrate(failures) = err else {
        panic!("expected AutoMigrate");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].model, "B");
    assert!(migrator.has_table(&ctx, "a").await.unwrap());
    assert!(migrator.has_table(&ctx, "c").await.unwrap());
}

#[tokio::test]
async fn test_stop_on_error_skips_remaining_models() {
    let db = setup().await;
    let ctx = Context::background();
    let b = Model::new("B", "b")
        .field(id("id"))
        .index(IndexDef::new("idx_b_ghost", &["ghost"]));
    let c = Model::new("C", "c").field(id("id"));

    let migrator = db.migrator().stop_on_error(true);
    let err = migrator.auto_migrate(&ctx, &[b, c]).await.unwrap_err();

    assert!(matches!(err, MigrateError::AutoMigrate(ref f) if f.len() == 1));
    assert!(!migrator.has_table(&ctx, "c").await.unwrap());
}

#[tokio::test]
async fn test_canceled_context_stops_run() {
    let db = setup().await;
    let ctx = Context::background();
    ctx.cancel();

    let err = db.migrator().auto_migrate(&ctx, &[users()]).await.unwrap_err();
    assert!(matches!(err, MigrateError::Canceled));
    assert!(!db.migrator().has_table(&Context::background(), "users").await.unwrap());
}

#[tokio::test]
async fn test_expired_deadline_stops_run() {
    let db = setup().await;
    let ctx = Context::background().with_timeout(Duration::ZERO);

    let err = db.migrator().auto_migrate(&ctx, &[users()]).await.unwrap_err();
    assert!(matches!(err, MigrateError::DeadlineExceeded));
}

#[tokio::test]
async fn test_dry_run_records_without_executing() {
    let db = setup().await;
    let ctx = Context::background();

    let migrator = db.migrator().dry_run(true);
    migrator.auto_migrate(&ctx, &[users()]).await.unwrap();

    let journal = migrator.journal();
    assert_eq!(journal.len(), 1);
    assert!(journal[0].starts_with(r#"CREATE TABLE "users""#));
    assert!(!migrator.has_table(&ctx, "users").await.unwrap());
}

#[tokio::test]
async fn test_constraints_on_sqlite() {
    let db = setup().await;
    let ctx = Context::background();
    let model = users().constraint(ConstraintDef::unique("uq_users_email", &["email"]));

    let migrator = db.migrator();
    migrator.auto_migrate(&ctx, &[model]).await.unwrap();
    assert!(migrator.has_constraint(&ctx, "users", "uq_users_email").await.unwrap());
    assert!(!migrator.has_constraint(&ctx, "users", "uq_missing").await.unwrap());

    // CHECK cannot be added to an existing SQLite table; the run still succeeds.
    let checked = users().constraint(ConstraintDef::check("ck_users_name", "length(name) > 0"));
    migrator.auto_migrate(&ctx, &[checked]).await.unwrap();
    assert!(!migrator.has_constraint(&ctx, "users", "ck_users_name").await.unwrap());

    let err = migrator
        .create_constraint(&ctx, &users(), "uq_missing")
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::NotFound(_)));
}

#[tokio::test]
async fn test_index_lifecycle() {
    let db = setup().await;
    let ctx = Context::background();
    let model = users().index(IndexDef::new("idx_users_name", &["name"]));

    let migrator = db.migrator();
    migrator.create_table(&ctx, &users()).await.unwrap();
    migrator.create_index(&ctx, &model, "idx_users_name").await.unwrap();
    assert!(migrator.has_index(&ctx, "users", "idx_users_name").await.unwrap());

    migrator
        .rename_index(&ctx, "users", "idx_users_name", "idx_users_by_name")
        .await
        .unwrap();
    assert!(!migrator.has_index(&ctx, "users", "idx_users_name").await.unwrap());
    let indexes = migrator.get_indexes(&ctx, "users").await.unwrap();
    let renamed = indexes.iter().find(|i| i.name == "idx_users_by_name").unwrap();
    assert_eq!(renamed.columns, vec!["name"]);
    assert!(!renamed.unique);

    migrator
        .drop_index(&ctx, "users", "idx_users_by_name")
        .await
        .unwrap();
    assert!(!migrator.has_index(&ctx, "users", "idx_users_by_name").await.unwrap());
}

#[tokio::test]
async fn test_partial_index_round_trips_predicate() {
    let db = setup().await;
    let ctx = Context::background();
    let model = users().index(IndexDef::new("idx_users_named", &["name"]).option("WHERE name IS NOT NULL"));

    let migrator = db.migrator();
    migrator.auto_migrate(&ctx, &[model]).await.unwrap();
    let indexes = migrator.get_indexes(&ctx, "users").await.unwrap();
    let index = indexes.iter().find(|i| i.name == "idx_users_named").unwrap();
    assert_eq!(index.option.as_deref(), Some("WHERE name IS NOT NULL"));
}

#[tokio::test]
async fn test_columns_and_tables() {
    let db = setup().await;
    let ctx = Context::background();
    let migrator = db.migrator();
    migrator.create_table(&ctx, &users()).await.unwrap();

    migrator.rename_column(&ctx, "users", "name", "full_name").await.unwrap();
    assert!(migrator.has_column(&ctx, "users", "full_name").await.unwrap());
    assert!(!migrator.has_column(&ctx, "users", "name").await.unwrap());

    migrator.drop_column(&ctx, "users", "email").await.unwrap();
    assert!(!migrator.has_column(&ctx, "users", "email").await.unwrap());

    migrator.rename_table(&ctx, "users", "people").await.unwrap();
    assert!(migrator.has_table(&ctx, "people").await.unwrap());
    assert!(!migrator.has_column(&ctx, "users", "id").await.unwrap());

    let err = migrator.column_types(&ctx, "users").await.unwrap_err();
    assert!(matches!(err, MigrateError::NotFound(_)));

    migrator.drop_table(&ctx, "people").await.unwrap();
    assert!(migrator.get_tables(&ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_views() {
    let db = setup().await;
    let ctx = Context::background();
    let migrator = db.migrator();
    migrator.create_table(&ctx, &users()).await.unwrap();
    db.exec(
        &ctx,
        Statement::insert_into("users")
            .values(&["name", "email"], vec!["ann".into(), "ann@example.com".into()]),
    )
    .await
    .unwrap();

    let query = Statement::select_from("users").filter(col("name").eq("ann"));
    migrator
        .create_view(&ctx, "anns", &ViewOption::new(query.clone()))
        .await
        .unwrap();
    assert_eq!(count(&db, "SELECT count(*) AS n FROM anns").await, 1);

    migrator
        .create_view(&ctx, "anns", &ViewOption::new(query).replace())
        .await
        .unwrap();

    let empty = ViewOption {
        replace: false,
        check_option: None,
        query: None,
    };
    let err = migrator.create_view(&ctx, "broken", &empty).await.unwrap_err();
    assert!(matches!(err, MigrateError::ViewQueryRequired(name) if name == "broken"));

    migrator.drop_view(&ctx, "anns").await.unwrap();
    assert!(db.query_sql(&ctx, "SELECT * FROM anns", &[]).await.is_err());
}

#[tokio::test]
async fn test_current_database_and_full_type() {
    let db = setup().await;
    let ctx = Context::background();
    let migrator = db.migrator();
    assert_eq!(migrator.current_database(&ctx).await.unwrap(), "main");
    assert_eq!(migrator.full_data_type_of(&varchar("code", 8).not_null()), "text NOT NULL");
}
