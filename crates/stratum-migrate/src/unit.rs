use stratum_common::{Error, Result};
use stratum_db::DatabaseHandle;

/// Forward and backward logic for one migration version.
///
/// Both entry points run inside a transaction opened by the runner and
/// should not begin or commit transactions themselves.
pub trait MigrationUnit {
    fn up(&self, db: &mut dyn DatabaseHandle) -> Result<()>;

    fn down(&self, db: &mut dyn DatabaseHandle) -> Result<()>;
}

/// A migration written as plain SQL scripts.
#[derive(Debug, Clone)]
pub struct SqlMigration {
    up: String,
    down: Option<String>,
}

impl SqlMigration {
    pub fn new(up: impl Into<String>, down: Option<String>) -> Self {
        Self {
            up: up.into(),
            down,
        }
    }

    pub fn reversible(up: impl Into<String>, down: impl Into<String>) -> Self {
        Self::new(up, Some(down.into()))
    }

    /// A migration that cannot be undone; running `down` fails.
    pub fn irreversible(up: impl Into<String>) -> Self {
        Self::new(up, None)
    }
}

impl MigrationUnit for SqlMigration {
    fn up(&self, db: &mut dyn DatabaseHandle) -> Result<()> {
        db.execute_batch(&self.up)
    }

    fn down(&self, db: &mut dyn DatabaseHandle) -> Result<()> {
        match &self.down {
            Some(sql) => db.execute_batch(sql),
            None => Err(Error::Other("migration has no down script".into())),
        }
    }
}

/// Adapts a pair of closures into a [`MigrationUnit`].
pub struct FnMigration<U, D> {
    up: U,
    down: D,
}

impl<U, D> FnMigration<U, D>
where
    U: Fn(&mut dyn DatabaseHandle) -> Result<()>,
    D: Fn(&mut dyn DatabaseHandle) -> Result<()>,
{
    pub fn new(up: U, down: D) -> Self {
        Self { up, down }
    }
}

impl<U, D> MigrationUnit for FnMigration<U, D>
where
    U: Fn(&mut dyn DatabaseHandle) -> Result<()>,
    D: Fn(&mut dyn DatabaseHandle) -> Result<()>,
{
    fn up(&self, db: &mut dyn DatabaseHandle) -> Result<()> {
        (self.up)(db)
    }

    fn down(&self, db: &mut dyn DatabaseHandle) -> Result<()> {
        (self.down)(db)
    }
}
