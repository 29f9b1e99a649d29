//! # mysql-pg-migrate
//!
//! MySQL to PostgreSQL migration library: schema translation, dependency-
//! ordered table creation, idempotent bulk data transfer, and post-load
//! identity repair.
//!
//! The engine never needs a pre-staged target schema. It resolves
//! foreign-key creation order with a fixed-point loop (including
//! self-referencing tables), skips tables that already hold data so
//! interrupted runs can continue, and finishes by repairing primary keys,
//! sequences and varchar widths on the target.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mysql_pg_migrate::{Config, ConsoleProgress, Migrator, RunMode};
//!
//! # async fn run(config: Config) -> mysql_pg_migrate::Result<()> {
//! let migrator = Migrator::connect(config, RunMode::Normal, Arc::new(ConsoleProgress)).await?;
//! let summary = migrator.run().await?;
//! println!("migrated {} tables", summary.tables_migrated);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod copy;
pub mod core;
pub mod driver;
pub mod error;
pub mod progress;
pub mod repair;
pub mod source;
pub mod target;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, RunMode, SourceConfig, TargetConfig};
pub use driver::{MigrationState, MigrationSummary, Migrator};
pub use error::{MigrateError, Result};
pub use progress::{ConsoleProgress, NullProgress, ProgressSink};
pub use source::MysqlSource;
pub use target::PgTarget;
