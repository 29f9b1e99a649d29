//! Configuration validation.

use super::types::Config;
use crate::error::{MigrateError, Result};

const VALID_SSL_MODES: &[&str] = &["disable", "require", "verify-ca", "verify-full"];

/// Validate a configuration before any connection is opened.
pub fn validate(config: &Config) -> Result<()> {
    require(&config.source.host, "source host")?;
    require(&config.source.database, "source database")?;
    require(&config.source.user, "source user")?;
    require(&config.target.host, "target host")?;
    require(&config.target.database, "target database")?;
    require(&config.target.user, "target user")?;

    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "batch_size must be greater than zero".to_string(),
        ));
    }

    if !VALID_SSL_MODES.contains(&config.target.ssl_mode.as_str()) {
        return Err(MigrateError::Config(format!(
            "Invalid ssl_mode '{}'. Valid options: {}",
            config.target.ssl_mode,
            VALID_SSL_MODES.join(", ")
        )));
    }

    Ok(())
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MigrateError::Config(format!("{} must not be empty", what)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, MigrationConfig, SourceConfig, TargetConfig};

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                host: "localhost".into(),
                port: 3306,
                database: "app".into(),
                user: "root".into(),
                password: "secret".into(),
            },
            target: TargetConfig {
                host: "localhost".into(),
                port: 5432,
                database: "app".into(),
                user: "postgres".into(),
                password: "secret".into(),
                ssl_mode: "disable".into(),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_host_rejected() {
        let mut config = valid_config();
        config.source.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = valid_config();
        config.migration.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_ssl_mode_rejected() {
        let mut config = valid_config();
        config.target.ssl_mode = "maybe".into();
        assert!(config.validate().is_err());
    }
}
