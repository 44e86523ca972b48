//! Input validation utilities for the data-access layer.
//!
//! Table and column names reach SQL text through string assembly, so every
//! identifier is validated here before it is quoted into a statement.

use crate::error::{Error, Result};

/// Maximum identifier length accepted by PostgreSQL (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validates a table or column name
///
/// Accepts ASCII letters, digits and underscores, not starting with a digit.
///
/// # Examples
/// ```
/// use crudbase::validation::validate_identifier;
///
/// validate_identifier("created_at").unwrap();
/// assert!(validate_identifier("name; DROP TABLE users").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("Identifier cannot be empty".to_string()));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(Error::Validation(format!(
            "Identifier '{}' is too long (max {} characters)",
            name, MAX_IDENTIFIER_LENGTH
        )));
    }

    let mut chars = name.chars();
    if chars.next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(Error::Validation(format!(
            "Identifier '{}' cannot start with a digit",
            name
        )));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::Validation(format!(
            "Identifier '{}' contains invalid characters",
            name
        )));
    }

    Ok(())
}

/// Validates an identifier and wraps it in double quotes.
pub fn quote_identifier(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}

/// Validates a Postgres type name used in a `::type` cast.
///
/// Type names come from `information_schema` and may carry a leading
/// underscore (array types) or spaces (`timestamp with time zone`).
pub fn validate_type_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LENGTH
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ');

    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!("Invalid type name '{}'", name)))
    }
}
