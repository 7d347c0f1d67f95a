use stratum_common::{Error, IdentifierValidator, Result, Version};
use tracing::{info, warn};

use crate::handle::DatabaseHandle;

pub const DEFAULT_TABLE: &str = "schema_migration";
pub const DEFAULT_LEGACY_TABLE: &str = "schema_info";

/// Persistent record of which migration versions have been applied.
///
/// One row per applied version, stored in normalized form. The table is
/// created on first use; if a legacy single-integer `schema_info` table is
/// present at that point, every version from 0 up to its value is recorded
/// as applied.
///
/// Table names are interpolated into SQL, so [`VersionStore::new`] only
/// accepts plain identifiers. Version strings are digit-only by
/// construction and are inlined as literals.
#[derive(Debug, Clone)]
pub struct VersionStore {
    table: String,
    legacy_table: String,
}

impl Default for VersionStore {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            legacy_table: DEFAULT_LEGACY_TABLE.to_string(),
        }
    }
}

impl VersionStore {
    pub fn new(table: impl Into<String>, legacy_table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        let legacy_table = legacy_table.into();
        IdentifierValidator::validate_table_name(&table)?;
        IdentifierValidator::validate_table_name(&legacy_table)?;
        Ok(Self {
            table,
            legacy_table,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn legacy_table(&self) -> &str {
        &self.legacy_table
    }

    /// Highest applied version by natural order, or 0 when nothing is
    /// applied. Bootstraps the table when it does not exist yet; bootstrap
    /// failures are logged and reported as version 0.
    pub fn current_version(&self, db: &mut dyn DatabaseHandle) -> Result<Version> {
        if !db.table_exists(&self.table).map_err(store_access)? {
            if let Err(e) = self.bootstrap(db) {
                warn!("version store bootstrap failed, treating database as unmigrated: {e}");
                return Ok(Version::zero());
            }
        }

        Ok(self
            .applied_versions(db)?
            .pop()
            .unwrap_or_else(Version::zero))
    }

    /// All applied versions in ascending natural order.
    pub fn applied_versions(&self, db: &mut dyn DatabaseHandle) -> Result<Vec<Version>> {
        let rows = db
            .query_column(&format!("SELECT version FROM {}", self.table))
            .map_err(store_access)?;

        let mut versions = rows
            .iter()
            .map(|raw| {
                Version::new(raw.trim()).map_err(|_| {
                    Error::StoreAccess(format!(
                        "table {} holds a malformed version {raw:?}",
                        self.table
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    pub fn is_applied(&self, db: &mut dyn DatabaseHandle, version: &Version) -> Result<bool> {
        let found = db
            .query_scalar(&format!(
                "SELECT version FROM {} WHERE version = '{version}'",
                self.table
            ))
            .map_err(store_access)?;
        Ok(found.is_some())
    }

    /// Mark `version` as applied. A no-op when it already is. Call inside the
    /// transaction that runs the migration's `up`.
    pub fn record_applied(&self, db: &mut dyn DatabaseHandle, version: &Version) -> Result<()> {
        if self.is_applied(db, version)? {
            return Ok(());
        }
        db.execute(&format!(
            "INSERT INTO {} (version) VALUES ('{version}')",
            self.table
        ))
        .map_err(store_access)?;
        Ok(())
    }

    /// Remove `version` from the applied set. Call inside the transaction
    /// that runs the migration's `down`.
    pub fn record_unapplied(&self, db: &mut dyn DatabaseHandle, version: &Version) -> Result<()> {
        db.execute(&format!(
            "DELETE FROM {} WHERE version = '{version}'",
            self.table
        ))
        .map_err(store_access)?;
        Ok(())
    }

    /// The applied version immediately below `current`.
    pub fn previous_applied(
        &self,
        db: &mut dyn DatabaseHandle,
        current: &Version,
    ) -> Result<Version> {
        self.applied_versions(db)?
            .into_iter()
            .rev()
            .find(|v| v < current)
            .ok_or_else(|| Error::NoPriorVersion(current.to_string()))
    }

    /// Create the version table and adopt the legacy marker as one
    /// transaction. On failure nothing is left behind, so the next call
    /// retries from scratch.
    fn bootstrap(&self, db: &mut dyn DatabaseHandle) -> Result<()> {
        info!("creating version table {}", self.table);
        db.begin()?;
        let outcome = self
            .create_and_backfill(db)
            .and_then(|count| db.commit().map(|()| count));
        match outcome {
            Ok(count) => {
                if count > 0 {
                    info!(
                        "backfilled {count} version(s) from legacy table {}",
                        self.legacy_table
                    );
                }
                Ok(())
            }
            Err(e) => {
                if let Err(rb) = db.rollback() {
                    warn!("failed to roll back version table bootstrap: {rb}");
                }
                Err(e)
            }
        }
    }

    fn create_and_backfill(&self, db: &mut dyn DatabaseHandle) -> Result<usize> {
        db.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (version TEXT NOT NULL UNIQUE)",
            self.table
        ))?;
        if !db.table_exists(&self.legacy_table)? {
            return Ok(0);
        }
        self.backfill_legacy(db)
    }

    fn backfill_legacy(&self, db: &mut dyn DatabaseHandle) -> Result<usize> {
        let Some(raw) =
            db.query_scalar(&format!("SELECT version FROM {}", self.legacy_table))?
        else {
            return Ok(0);
        };
        let legacy = Version::new(raw.trim())?;

        let mut count = 0;
        let mut version = Version::zero();
        loop {
            db.execute(&format!(
                "INSERT INTO {} (version) VALUES ('{version}')",
                self.table
            ))?;
            count += 1;
            if version == legacy {
                break;
            }
            version = version.next();
        }
        Ok(count)
    }
}

fn store_access(e: Error) -> Error {
    match e {
        Error::Database(msg) => Error::StoreAccess(msg),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteHandle;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn fresh_database_bootstraps_empty() {
        let mut db = SqliteHandle::in_memory().unwrap();
        let store = VersionStore::default();

        assert!(store.current_version(&mut db).unwrap().is_zero());
        assert!(db.table_exists(DEFAULT_TABLE).unwrap());
        assert!(store.applied_versions(&mut db).unwrap().is_empty());
    }

    #[test]
    fn legacy_table_is_backfilled_from_zero() {
        let mut db = SqliteHandle::in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE schema_info (version INTEGER);
             INSERT INTO schema_info VALUES (3);",
        )
        .unwrap();
        let store = VersionStore::default();

        assert_eq!(store.current_version(&mut db).unwrap(), v("3"));
        for n in ["0", "1", "2", "3"] {
            assert!(store.is_applied(&mut db, &v(n)).unwrap(), "{n} applied");
        }
        assert!(!store.is_applied(&mut db, &v("4")).unwrap());
    }

    #[test]
    fn legacy_table_is_left_untouched() {
        let mut db = SqliteHandle::in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE schema_info (version INTEGER);
             INSERT INTO schema_info VALUES (2);",
        )
        .unwrap();
        VersionStore::default().current_version(&mut db).unwrap();

        assert_eq!(
            db.query_column("SELECT version FROM schema_info").unwrap(),
            vec!["2"]
        );
    }

    #[test]
    fn empty_legacy_table_starts_empty() {
        let mut db = SqliteHandle::in_memory().unwrap();
        db.execute_batch("CREATE TABLE schema_info (version INTEGER)")
            .unwrap();
        let store = VersionStore::default();

        assert!(store.current_version(&mut db).unwrap().is_zero());
        assert!(store.applied_versions(&mut db).unwrap().is_empty());
    }

    #[test]
    fn unusable_legacy_value_degrades_to_zero() {
        let mut db = SqliteHandle::in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE schema_info (version TEXT);
             INSERT INTO schema_info VALUES ('not-a-number');",
        )
        .unwrap();
        let store = VersionStore::default();

        assert!(store.current_version(&mut db).unwrap().is_zero());
        assert!(!db.table_exists(DEFAULT_TABLE).unwrap());
        assert!(!db.in_transaction());
    }

    #[test]
    fn failed_bootstrap_is_retried_on_next_call() {
        let mut db = SqliteHandle::in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE schema_info (version TEXT);
             INSERT INTO schema_info VALUES ('x3');",
        )
        .unwrap();
        let store = VersionStore::default();
        assert!(store.current_version(&mut db).unwrap().is_zero());

        db.execute_batch("UPDATE schema_info SET version = '3'")
            .unwrap();
        assert_eq!(store.current_version(&mut db).unwrap(), v("3"));
        assert_eq!(
            store.applied_versions(&mut db).unwrap(),
            vec![v("0"), v("1"), v("2"), v("3")]
        );
    }

    #[test]
    fn current_version_uses_natural_order() {
        let mut db = SqliteHandle::in_memory().unwrap();
        let store = VersionStore::default();
        store.current_version(&mut db).unwrap();

        store.record_applied(&mut db, &v("9")).unwrap();
        store.record_applied(&mut db, &v("10")).unwrap();
        assert_eq!(store.current_version(&mut db).unwrap(), v("10"));
    }

    #[test]
    fn record_applied_is_idempotent_and_normalized() {
        let mut db = SqliteHandle::in_memory().unwrap();
        let store = VersionStore::default();
        store.current_version(&mut db).unwrap();

        store.record_applied(&mut db, &v("007")).unwrap();
        store.record_applied(&mut db, &v("7")).unwrap();

        assert_eq!(
            db.query_column("SELECT version FROM schema_migration")
                .unwrap(),
            vec!["7"]
        );
    }

    #[test]
    fn record_unapplied_removes_version() {
        let mut db = SqliteHandle::in_memory().unwrap();
        let store = VersionStore::default();
        store.current_version(&mut db).unwrap();

        store.record_applied(&mut db, &v("5")).unwrap();
        store.record_unapplied(&mut db, &v("005")).unwrap();
        assert!(!store.is_applied(&mut db, &v("5")).unwrap());
    }

    #[test]
    fn previous_applied_finds_next_lower_version() {
        let mut db = SqliteHandle::in_memory().unwrap();
        let store = VersionStore::default();
        store.current_version(&mut db).unwrap();
        for n in ["10", "20", "30"] {
            store.record_applied(&mut db, &v(n)).unwrap();
        }

        assert_eq!(store.previous_applied(&mut db, &v("30")).unwrap(), v("20"));
        assert_eq!(store.previous_applied(&mut db, &v("20")).unwrap(), v("10"));
        assert!(matches!(
            store.previous_applied(&mut db, &v("10")),
            Err(Error::NoPriorVersion(_))
        ));
    }

    #[test]
    fn new_rejects_unsafe_table_names() {
        assert!(matches!(
            VersionStore::new("versions; DROP TABLE users", DEFAULT_LEGACY_TABLE),
            Err(Error::Config(_))
        ));
        assert!(VersionStore::new(DEFAULT_TABLE, "1legacy").is_err());

        let store = VersionStore::new("app_versions", "app_version").unwrap();
        assert_eq!(store.table(), "app_versions");
        assert_eq!(store.legacy_table(), "app_version");
    }

    #[test]
    fn malformed_rows_surface_as_store_errors() {
        let mut db = SqliteHandle::in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE schema_migration (version TEXT NOT NULL UNIQUE);
             INSERT INTO schema_migration VALUES ('abc');",
        )
        .unwrap();

        assert!(matches!(
            VersionStore::default().current_version(&mut db),
            Err(Error::StoreAccess(_))
        ));
    }

    #[test]
    fn custom_table_names() {
        let mut db = SqliteHandle::in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE old_version (version INTEGER);
             INSERT INTO old_version VALUES (1);",
        )
        .unwrap();
        let store = VersionStore::new("app_versions", "old_version").unwrap();

        assert_eq!(store.current_version(&mut db).unwrap(), v("1"));
        assert!(db.table_exists("app_versions").unwrap());
        assert!(!db.table_exists(DEFAULT_TABLE).unwrap());
    }
}
