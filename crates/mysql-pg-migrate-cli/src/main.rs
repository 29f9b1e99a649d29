//! mysql-pg-migrate CLI - MySQL to PostgreSQL schema and data migration.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use mysql_pg_migrate::{
    Config, ConsoleProgress, MigrateError, MigrationConfig, Migrator, NullProgress, ProgressSink,
    RunMode, SourceConfig, TargetConfig,
};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "mysql-pg-migrate")]
#[command(about = "Migrate schema and data from MySQL to PostgreSQL")]
#[command(version)]
struct Cli {
    /// MySQL username
    mysql_user: String,

    /// MySQL password
    mysql_password: String,

    /// MySQL host
    mysql_host: String,

    /// MySQL database name
    mysql_name: String,

    /// PostgreSQL username
    postgres_user: String,

    /// PostgreSQL password
    postgres_password: String,

    /// PostgreSQL host
    postgres_host: String,

    /// PostgreSQL database name
    postgres_name: String,

    /// Continue a previous migration, keeping rows already copied
    #[arg(short = 'c', long = "con")]
    con: bool,

    /// Use CSV for migration (accepted, not implemented)
    #[arg(short = 'u', long = "use-csv")]
    use_csv: bool,

    /// Repair primary keys, sequences and datatype widths only
    #[arg(short = 'r', long = "repair", conflicts_with = "info")]
    repair: bool,

    /// Report source tables missing on the target; performs no changes
    #[arg(short = 'i', long = "info")]
    info: bool,

    /// PostgreSQL TLS mode: disable, require, verify-ca, verify-full
    #[arg(long = "pg-sslmode", default_value = "disable")]
    pg_sslmode: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Print the run summary as JSON to stdout
    #[arg(long)]
    output_json: bool,
}

impl Cli {
    fn run_mode(&self) -> RunMode {
        if self.repair {
            RunMode::RepairOnly
        } else if self.info {
            RunMode::Info
        } else if self.con {
            RunMode::Continue
        } else {
            RunMode::Normal
        }
    }

    fn into_config(self) -> Config {
        Config {
            source: SourceConfig {
                host: self.mysql_host,
                port: 3306,
                database: self.mysql_name,
                user: self.mysql_user,
                password: self.mysql_password,
            },
            target: TargetConfig {
                host: self.postgres_host,
                port: 5432,
                database: self.postgres_name,
                user: self.postgres_user,
                password: self.postgres_password,
                ssl_mode: self.pg_sslmode,
            },
            migration: MigrationConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(MigrateError::Config)?;

    if cli.use_csv {
        warn!("--use-csv is accepted but CSV transfer is not implemented");
    }

    let mode = cli.run_mode();
    let output_json = cli.output_json;
    let progress: Arc<dyn ProgressSink> = if output_json {
        Arc::new(NullProgress)
    } else {
        Arc::new(ConsoleProgress)
    };

    let migrator = Migrator::connect(cli.into_config(), mode, progress).await?;
    let summary = migrator.run().await?;

    if output_json {
        println!("{}", summary.to_json()?);
    } else {
        info!(
            "finished: {}/{} tables in {:.1}s",
            summary.tables_migrated, summary.tables_total, summary.duration_seconds
        );
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("invalid verbosity '{}'", other)),
    };

    match format {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init(),
        "text" => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init(),
        other => return Err(format!("invalid log format '{}'", other)),
    }

    Ok(())
}
