use stratum_common::{Direction, Error, Result, Version};
use stratum_db::{DatabaseHandle, VersionStore};
use tracing::{debug, info, warn};

use crate::source::Catalog;
use crate::unit::MigrationUnit;

/// Drives a database from its recorded version to a target version.
///
/// The catalog is fixed for the lifetime of the migrator. Every step runs in
/// its own transaction together with the version-store update, so a failed
/// step leaves no trace while earlier steps of the same batch stay applied.
pub struct Migrator<D: DatabaseHandle> {
    db: D,
    catalog: Catalog,
    store: VersionStore,
}

/// Applied state of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: Version,
    pub name: String,
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub current: Version,
    pub migrations: Vec<MigrationStatus>,
    /// Applied versions with no catalog entry.
    pub orphaned: Vec<Version>,
}

impl StatusReport {
    pub fn pending(&self) -> usize {
        self.migrations.iter().filter(|m| !m.applied).count()
    }
}

impl<D: DatabaseHandle> Migrator<D> {
    pub fn new(db: D, catalog: Catalog, store: VersionStore) -> Self {
        Self { db, catalog, store }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn database(&mut self) -> &mut D {
        &mut self.db
    }

    pub fn into_database(self) -> D {
        self.db
    }

    pub fn current_version(&mut self) -> Result<Version> {
        self.store.current_version(&mut self.db)
    }

    /// Migrate up or down to `target`, defaulting to the newest catalog
    /// version. Returns the number of steps executed.
    pub fn migrate(&mut self, target: Option<&Version>) -> Result<usize> {
        let max = self.catalog.max_version();
        let target = target.cloned().unwrap_or_else(|| max.clone());
        if target > max {
            return Err(Error::InvalidTarget {
                target: target.to_string(),
                max: max.to_string(),
            });
        }

        let current = self.current_version()?;
        if target < current {
            info!("migrating down from {current} to {target}");
            self.migrate_down(&target)
        } else {
            info!("migrating up from {current} to {target}");
            self.migrate_up(&target)
        }
    }

    /// Like [`Migrator::migrate`], with the target given as user input.
    pub fn migrate_to(&mut self, raw: &str) -> Result<usize> {
        let raw = raw.trim();
        let negative = raw
            .strip_prefix('-')
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
        if negative {
            return Err(Error::InvalidTarget {
                target: raw.to_string(),
                max: self.catalog.max_version().to_string(),
            });
        }

        let target: Version = raw.parse()?;
        self.migrate(Some(&target))
    }

    /// Migrate down to the applied version just below the current one.
    ///
    /// Every applied catalog version above that target is undone. There is
    /// no step count; to go back further, migrate to an explicit version.
    pub fn rollback(&mut self) -> Result<usize> {
        let current = self.current_version()?;
        let previous = self.store.previous_applied(&mut self.db, &current)?;
        info!("rolling back from {current} to {previous}");
        self.migrate(Some(&previous))
    }

    /// Apply a single version. Returns `false` if it was already applied.
    pub fn apply_one(&mut self, version: &Version) -> Result<bool> {
        self.current_version()?;
        if self.store.is_applied(&mut self.db, version)? {
            return Ok(false);
        }
        self.run_step(version, Direction::Up)?;
        Ok(true)
    }

    /// Undo a single version. Returns `false` if it was not applied.
    pub fn undo_one(&mut self, version: &Version) -> Result<bool> {
        self.current_version()?;
        if !self.store.is_applied(&mut self.db, version)? {
            return Ok(false);
        }
        self.run_step(version, Direction::Down)?;
        Ok(true)
    }

    pub fn status(&mut self) -> Result<StatusReport> {
        let current = self.current_version()?;
        let applied = self.store.applied_versions(&mut self.db)?;

        let migrations = self
            .catalog
            .versions()
            .map(|version| MigrationStatus {
                version: version.clone(),
                name: self.catalog.name(version).unwrap_or_default().to_string(),
                applied: applied.binary_search(version).is_ok(),
            })
            .collect();
        let orphaned = applied
            .into_iter()
            .filter(|v| !self.catalog.contains(v))
            .collect();

        Ok(StatusReport {
            current,
            migrations,
            orphaned,
        })
    }

    fn migrate_up(&mut self, target: &Version) -> Result<usize> {
        let candidates: Vec<Version> = self
            .catalog
            .versions()
            .filter(|v| *v <= target)
            .cloned()
            .collect();

        let mut count = 0;
        for version in candidates {
            if self.store.is_applied(&mut self.db, &version)? {
                debug!("{version} already applied, skipping");
                continue;
            }
            self.run_step(&version, Direction::Up)?;
            count += 1;
        }
        Ok(count)
    }

    fn migrate_down(&mut self, target: &Version) -> Result<usize> {
        let candidates: Vec<Version> = self
            .catalog
            .versions()
            .rev()
            .filter(|v| *v > target)
            .cloned()
            .collect();

        let mut count = 0;
        for version in candidates {
            if !self.store.is_applied(&mut self.db, &version)? {
                debug!("{version} not applied, skipping");
                continue;
            }
            self.run_step(&version, Direction::Down)?;
            count += 1;
        }
        Ok(count)
    }

    fn run_step(&mut self, version: &Version, direction: Direction) -> Result<()> {
        let unit = self.catalog.load(version)?;
        let name = self.catalog.name(version).unwrap_or_default();
        let db: &mut dyn DatabaseHandle = &mut self.db;

        info!("running {direction} for {name}");
        db.begin()?;
        let outcome = execute_step(unit, &self.store, db, version, direction).and_then(|()| {
            // Deferred constraints are checked here, so a failed commit is a
            // failed step and the transaction is still open.
            db.commit().map_err(|e| step_failure(version, direction, &e))
        });
        match outcome {
            Ok(()) => {
                info!("{direction} complete for {name}");
                Ok(())
            }
            Err(e) => {
                if let Err(rb) = db.rollback() {
                    warn!("failed to roll back {name}: {rb}");
                }
                Err(e)
            }
        }
    }
}

fn execute_step(
    unit: &dyn MigrationUnit,
    store: &VersionStore,
    db: &mut dyn DatabaseHandle,
    version: &Version,
    direction: Direction,
) -> Result<()> {
    let outcome = match direction {
        Direction::Up => unit.up(db),
        Direction::Down => unit.down(db),
    };
    outcome.map_err(|e| step_failure(version, direction, &e))?;

    match direction {
        Direction::Up => store.record_applied(db, version),
        Direction::Down => store.record_unapplied(db, version),
    }
}

fn step_failure(version: &Version, direction: Direction, cause: &Error) -> Error {
    Error::MigrationExecution {
        version: version.to_string(),
        direction,
        reason: cause.to_string(),
    }
}
