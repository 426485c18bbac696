//! oxide-dal CLI
//!
//! Command-line tool for inspecting a live schema and auto-migrating it.

use std::fmt::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use oxide_dal_core::{Dialect, DialectRegistry, SqlValue};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use oxide_dal_migrate::{schema_file, Context, Db};

/// Relational data-access layer tooling.
#[derive(Parser)]
#[command(name = "oxide-dal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Dialect name (taken from the URL scheme if not specified).
    #[arg(long)]
    dialect: Option<String>,

    /// Abort after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List base tables.
    Tables,

    /// Show the live columns of a table.
    Columns {
        /// Table name.
        table: String,
    },

    /// Show the live indexes of a table.
    Indexes {
        /// Table name.
        table: String,
    },

    /// Bring the database up to date with a schema file (additive only).
    Migrate {
        /// JSON schema file.
        #[arg(short, long)]
        schema: PathBuf,

        /// Stop at the first model that fails.
        #[arg(long)]
        stop_on_error: bool,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Inline arguments into a statement for display.
    Explain {
        /// SQL with placeholders.
        sql: String,

        /// Arguments, in placeholder order.
        args: Vec<String>,
    },
}

impl Cli {
    fn dialect(&self) -> anyhow::Result<&'static Dialect> {
        let registry = DialectRegistry::with_builtins();
        let dialect = match &self.dialect {
            Some(name) => registry.get(name)?,
            None => registry.for_url(&self.database)?,
        };
        Ok(dialect)
    }

    fn context(&self) -> Context {
        let token = CancellationToken::new();
        let on_signal = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, canceling");
                on_signal.cancel();
            }
        });
        let ctx = Context::from_token(token);
        match self.timeout_secs {
            Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
            None => ctx,
        }
    }
}

/// Reads a command-line argument as the narrowest value it parses to.
fn parse_arg(raw: &str) -> SqlValue {
    if let Ok(n) = raw.parse::<i64>() {
        return SqlValue::Int(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return SqlValue::Float(f);
    }
    match raw {
        "true" => SqlValue::Bool(true),
        "false" => SqlValue::Bool(false),
        "null" | "NULL" => SqlValue::Null,
        _ => SqlValue::Text(raw.to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let dialect = cli.dialect()?;
    let ctx = cli.context();

    match cli.command {
        Commands::Explain { sql, args } => {
            let args: Vec<SqlValue> = args.iter().map(|a| parse_arg(a)).collect();
            println!("{}", (dialect.explain)(&sql, &args));
        }

        Commands::Tables => {
            let db = Db::connect_with(&ctx, &cli.database, dialect).await?;
            for table in db.migrator().get_tables(&ctx).await? {
                println!("{table}");
            }
        }

        Commands::Columns { table } => {
            let db = Db::connect_with(&ctx, &cli.database, dialect).await?;
            for column in db.migrator().column_types(&ctx, &table).await? {
                let mut line = format!(
                    "{:<24} {}",
                    column.name(),
                    column.column_type().unwrap_or(column.database_type_name())
                );
                if column.primary_key() == Some(true) {
                    line.push_str(" PRIMARY KEY");
                }
                if column.nullable() == Some(false) {
                    line.push_str(" NOT NULL");
                }
                if column.unique() == Some(true) {
                    line.push_str(" UNIQUE");
                }
                if let Some(default) = column.default_value() {
                    write!(line, " DEFAULT {default}")?;
                }
                println!("{line}");
            }
        }

        Commands::Indexes { table } => {
            let db = Db::connect_with(&ctx, &cli.database, dialect).await?;
            for index in db.migrator().get_indexes(&ctx, &table).await? {
                let kind = if index.primary_key {
                    "primary"
                } else if index.unique {
                    "unique"
                } else {
                    "index"
                };
                let mut line = format!("{:<32} {kind:<8} ({})", index.name, index.columns.join(", "));
                if let Some(option) = &index.option {
                    line.push(' ');
                    line.push_str(option);
                }
                println!("{line}");
            }
        }

        Commands::Migrate {
            schema,
            stop_on_error,
            dry_run,
        } => {
            let models = schema_file::load(&schema)?;
            info!(models = models.len(), schema = %schema.display(), "Loaded schema");
            let db = Db::connect_with(&ctx, &cli.database, dialect).await?;
            let migrator = db.migrator().dry_run(dry_run).stop_on_error(stop_on_error);
            migrator.auto_migrate(&ctx, &models).await?;
            if !dry_run {
                info!(statements = migrator.journal().len(), "Migration applied");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arg() {
        assert_eq!(parse_arg("42"), SqlValue::Int(42));
        assert_eq!(parse_arg("1.5"), SqlValue::Float(1.5));
        assert_eq!(parse_arg("true"), SqlValue::Bool(true));
        assert_eq!(parse_arg("NULL"), SqlValue::Null);
        assert_eq!(parse_arg("bob"), SqlValue::Text(String::from("bob")));
    }

    #[test]
    fn test_dialect_from_url_or_flag() {
        let cli = Cli::parse_from(["oxide-dal", "--database", "postgres://localhost/app", "tables"]);
        assert_eq!(cli.dialect().unwrap().name, "postgres");

        let cli = Cli::parse_from(["oxide-dal", "--dialect", "mariadb", "tables"]);
        assert_eq!(cli.dialect().unwrap().name, "mysql");
    }

    #[test]
    fn test_unknown_dialect_rejected() {
        let cli = Cli::parse_from(["oxide-dal", "--database", "oracle://x", "tables"]);
        assert!(cli.dialect().is_err());
    }
}
