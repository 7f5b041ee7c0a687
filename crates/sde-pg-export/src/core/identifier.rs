//! Identifier validation and quoting for dynamically built SQL.
//!
//! Table, column and schema names cannot be bound as statement parameters, so
//! every name that reaches DDL or a source query goes through here.

use crate::error::{ExportError, Result};

/// Maximum identifier length accepted on either side.
/// - PostgreSQL: 63 bytes (longer names are truncated by the server)
/// - SQL Server: 128 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Reject empty identifiers, null bytes and over-long names.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ExportError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(ExportError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ExportError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Validate a name that is emitted without quotes (the destination schema).
///
/// Only ASCII letters, digits, `_` and `$` are allowed, and it must not start
/// with a digit.
pub fn validate_bare_identifier(name: &str) -> Result<()> {
    validate_identifier(name)?;
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if !valid {
        return Err(ExportError::Config(format!(
            "'{}' is not a plain identifier",
            name
        )));
    }
    Ok(())
}

/// Quote a PostgreSQL identifier, doubling embedded double quotes.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a SQL Server identifier with brackets, doubling closing brackets.
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("ROADS").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("a\0b").is_err());
        assert!(validate_identifier(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_bare_identifier() {
        assert!(validate_bare_identifier("public").is_ok());
        assert!(validate_bare_identifier("gis_2024").is_ok());
        assert!(validate_bare_identifier("2gis").is_err());
        assert!(validate_bare_identifier("public; DROP").is_err());
        assert!(validate_bare_identifier("\"public\"").is_err());
    }

    #[test]
    fn test_quote_pg() {
        assert_eq!(quote_pg("name").unwrap(), "\"name\"");
        assert_eq!(quote_pg("a\"b").unwrap(), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_mssql() {
        assert_eq!(quote_mssql("SHAPE").unwrap(), "[SHAPE]");
        assert_eq!(quote_mssql("a]b").unwrap(), "[a]]b]");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("public"), "'public'");
        assert_eq!(quote_literal("o'neil"), "'o''neil'");
    }
}
