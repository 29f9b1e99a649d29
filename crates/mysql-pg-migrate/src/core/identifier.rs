//! Identifier validation, quoting and target-name derivation.
//!
//! SQL identifiers cannot be bound as statement parameters, so every
//! dynamically built statement goes through these helpers: validate for
//! suspicious patterns, quote per dialect, and cap derived names at the
//! target engine's limit.

use crate::error::{MigrateError, Result};

/// PostgreSQL identifier length limit in bytes.
pub const PG_MAX_IDENTIFIER: usize = 63;

/// Maximum accepted source identifier length (MySQL allows 64).
const MAX_SOURCE_IDENTIFIER: usize = 64;

/// Validate an identifier read from a catalog.
///
/// Rejects empty names, names containing null bytes, and names longer than
/// any supported engine allows.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::SchemaExtraction(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::SchemaExtraction(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_SOURCE_IDENTIFIER {
        return Err(MigrateError::SchemaExtraction(format!(
            "identifier exceeds {} bytes: {:?}",
            MAX_SOURCE_IDENTIFIER, name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier, doubling embedded double quotes.
pub fn quote_pg(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a MySQL identifier, doubling embedded backticks.
pub fn quote_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Derive the target-side name for a source object: lower-cased and
/// truncated to the PostgreSQL identifier limit on a char boundary.
pub fn pg_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    truncate_ident(&lowered)
}

/// Truncate an identifier to [`PG_MAX_IDENTIFIER`] bytes without splitting
/// a multi-byte character.
pub fn truncate_ident(name: &str) -> String {
    if name.len() <= PG_MAX_IDENTIFIER {
        return name.to_string();
    }
    let mut end = PG_MAX_IDENTIFIER;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("column with spaces").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("table\0name").is_err());
        assert!(validate_identifier(&"a".repeat(65)).is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_quote_pg() {
        assert_eq!(quote_pg("users"), "\"users\"");
        assert_eq!(quote_pg("ta\"ble"), "\"ta\"\"ble\"");
    }

    #[test]
    fn test_quote_mysql() {
        assert_eq!(quote_mysql("users"), "`users`");
        assert_eq!(quote_mysql("ta`ble"), "`ta``ble`");
    }

    #[test]
    fn test_pg_name_lowercases_and_truncates() {
        assert_eq!(pg_name("AuthUser"), "authuser");

        let long = "x".repeat(80);
        assert_eq!(pg_name(&long).len(), PG_MAX_IDENTIFIER);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 63 bytes would land mid-character for two-byte chars
        let name = "é".repeat(40); // 80 bytes
        let truncated = truncate_ident(&name);
        assert!(truncated.len() <= PG_MAX_IDENTIFIER);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}
