use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stratum_common::{Error, IdentifierValidator, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub migrations: MigrationsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stratum.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Directory holding `<version>_<name>/up.sql` migrations.
    pub dir: PathBuf,
    /// Table recording applied versions.
    pub table: String,
    /// Old single-row version table, read once when `table` is first created.
    pub legacy_table: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("migrations"),
            table: "schema_migration".to_string(),
            legacy_table: "schema_info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        IdentifierValidator::validate_table_name(&self.migrations.table)?;
        IdentifierValidator::validate_table_name(&self.migrations.legacy_table)?;
        if self.migrations.table == self.migrations.legacy_table {
            return Err(Error::Config(format!(
                "version table and legacy table are both {:?}",
                self.migrations.table
            )));
        }
        Ok(())
    }

    /// Resolve relative paths against `base`, usually the config file's directory.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.database.path.is_relative() {
            self.database.path = base.join(&self.database.path);
        }
        if self.migrations.dir.is_relative() {
            self.migrations.dir = base.join(&self.migrations.dir);
        }
    }
}
