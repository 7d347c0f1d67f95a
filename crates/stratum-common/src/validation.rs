use crate::error::{Error, Result};

/// PostgreSQL truncates identifiers beyond 63 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Validation for SQL identifiers that end up interpolated into statements.
pub struct IdentifierValidator;

impl IdentifierValidator {
    /// Accept `[A-Za-z_][A-Za-z0-9_]*`, at most 63 characters.
    pub fn validate_table_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::Config("table name cannot be empty".into()));
        }
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(Error::Config(format!("table name {name:?} too long")));
        }
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(Error::Config(format!(
                "table name {name:?} cannot start with a digit"
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::Config(format!(
                "table name {name:?} may only contain letters, digits and underscores"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::IdentifierValidator;

    #[test]
    fn accepts_plain_identifiers() {
        for name in ["schema_migration", "_versions", "SchemaInfo2"] {
            assert!(IdentifierValidator::validate_table_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        for name in ["", "1table", "schema-migration", "a b", "t;--", "\"quoted\""] {
            assert!(IdentifierValidator::validate_table_name(name).is_err(), "{name:?}");
        }
    }

    #[test]
    fn enforces_length_limit() {
        assert!(IdentifierValidator::validate_table_name(&"a".repeat(63)).is_ok());
        assert!(IdentifierValidator::validate_table_name(&"a".repeat(64)).is_err());
    }
}
