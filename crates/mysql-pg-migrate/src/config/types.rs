//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (MySQL).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (MySQL) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(skip_serializing, default)]
    pub password: String,
}

/// Target database (PostgreSQL) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(skip_serializing, default)]
    pub password: String,

    /// TLS mode: disable, require, verify-ca, verify-full.
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

/// Run mode selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Full migration: schema, data, then global repair.
    Normal,
    /// Like Normal, but keeps rows surviving from a previous partial run.
    Continue,
    /// Identity/width repair only; no schema or data migration.
    RepairOnly,
    /// Read-only report of source tables missing on the target.
    Info,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per data batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Source tables whose data is never copied.
    #[serde(default)]
    pub clean_source_tables: Vec<String>,

    /// Target tables emptied before a normal (non-continue) run.
    #[serde(default)]
    pub clean_target_tables: Vec<String>,

    /// Tables exempt from dependency deferral because they reference
    /// themselves.
    #[serde(default)]
    pub self_referencing_tables: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            clean_source_tables: Vec::new(),
            clean_target_tables: Vec::new(),
            self_referencing_tables: Vec::new(),
        }
    }
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_pg_port() -> u16 {
    5432
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_batch_size() -> usize {
    1000
}
