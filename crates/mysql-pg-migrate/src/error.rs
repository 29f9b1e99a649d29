//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (missing fields, invalid values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Schema extraction failed
    #[error("Schema extraction failed: {0}")]
    SchemaExtraction(String),

    /// A source column declares a type outside the supported set
    #[error("Unsupported column type '{data_type}' on {table}.{column}")]
    UnsupportedType {
        table: String,
        column: String,
        data_type: String,
    },

    /// The fixed-point loop made no progress while tables remain unmigrated
    #[error(
        "Migration stalled after {migrated} of {total} tables: remaining tables have \
         cyclic or unsatisfiable foreign-key dependencies"
    )]
    Stalled { migrated: usize, total: usize },

    /// Sequence repair could not determine the identity column of a table
    #[error("Cannot resolve identity column for table {0}")]
    IdentityUnresolved(String),

    /// IO error (console writes, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) => 2,
            MigrateError::Stalled { .. } => 3,
            MigrateError::IdentityUnresolved(_) => 4,
            _ => 1,
        }
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("bad".into()).exit_code(), 2);
        assert_eq!(
            MigrateError::Stalled {
                migrated: 1,
                total: 3
            }
            .exit_code(),
            3
        );
        assert_eq!(
            MigrateError::IdentityUnresolved("users".into()).exit_code(),
            4
        );
        assert_eq!(
            MigrateError::SchemaExtraction("boom".into()).exit_code(),
            1
        );
    }

    #[test]
    fn test_stalled_message_names_counts() {
        let err = MigrateError::Stalled {
            migrated: 4,
            total: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("4 of 7"));
    }
}
