//! Configuration types and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;

impl Config {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_config_password_not_serialized() {
        let config = SourceConfig {
            host: "localhost".into(),
            port: 3306,
            database: "app".into(),
            user: "root".into(),
            password: "secret_password".into(),
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(
            !json.contains("secret_password"),
            "Password was serialized: {}",
            json
        );
    }

    #[test]
    fn test_target_config_password_not_serialized() {
        let config = TargetConfig {
            host: "localhost".into(),
            port: 5432,
            database: "app".into(),
            user: "postgres".into(),
            password: "super_secret".into(),
            ssl_mode: "disable".into(),
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(
            !json.contains("super_secret"),
            "Password was serialized: {}",
            json
        );
    }

    #[test]
    fn test_migration_config_defaults() {
        let config = MigrationConfig::default();
        assert_eq!(config.batch_size, 1000);
        assert!(config.self_referencing_tables.is_empty());
    }
}
