use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stratum_common::{Error, Result, Version};
use tracing::debug;

use crate::unit::{MigrationUnit, SqlMigration};

/// One discovered migration: its version, identifier and executable unit.
#[derive(Clone)]
pub struct MigrationDefinition {
    pub version: Version,
    pub name: String,
    pub unit: Arc<dyn MigrationUnit>,
}

impl MigrationDefinition {
    /// Build a definition from an identifier like `20240101120000_create_users`.
    pub fn new(name: impl Into<String>, unit: Arc<dyn MigrationUnit>) -> Result<Self> {
        let name = name.into();
        Ok(Self {
            version: Version::parse(&name)?,
            name,
            unit,
        })
    }
}

/// Anything that can enumerate migration definitions.
pub trait MigrationSource {
    fn discover(&self) -> Result<Vec<MigrationDefinition>>;
}

/// Migrations compiled into the binary.
#[derive(Default)]
pub struct StaticSource {
    entries: Vec<(String, Arc<dyn MigrationUnit>)>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, unit: impl MigrationUnit + 'static) -> Self {
        let unit: Arc<dyn MigrationUnit> = Arc::new(unit);
        self.entries.push((name.into(), unit));
        self
    }
}

impl MigrationSource for StaticSource {
    fn discover(&self) -> Result<Vec<MigrationDefinition>> {
        self.entries
            .iter()
            .map(|(name, unit)| MigrationDefinition::new(name.clone(), Arc::clone(unit)))
            .collect()
    }
}

/// Reads migrations from a directory tree:
///
/// ```text
/// migrations/
/// ├── 20240101120000_create_users/
/// │   ├── up.sql
/// │   └── down.sql
/// └── 20240102090000_add_email/
///     └── up.sql
/// ```
///
/// A sub-directory without `up.sql` is ignored. `down.sql` is optional; a
/// migration without it is irreversible.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_migration(&self, path: &Path) -> Result<MigrationDefinition> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::MalformedVersion(path.display().to_string()))?;

        let up = fs::read_to_string(path.join("up.sql"))?;
        let down_path = path.join("down.sql");
        let down = if down_path.is_file() {
            Some(fs::read_to_string(&down_path)?)
        } else {
            None
        };

        MigrationDefinition::new(name, Arc::new(SqlMigration::new(up, down)))
    }
}

impl MigrationSource for DirectorySource {
    fn discover(&self) -> Result<Vec<MigrationDefinition>> {
        if !self.dir.exists() {
            debug!("migrations directory {} not found", self.dir.display());
            return Ok(Vec::new());
        }

        let mut definitions = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_dir() && path.join("up.sql").is_file() {
                definitions.push(self.read_migration(&path)?);
            }
        }
        debug!(
            "discovered {} migration(s) in {}",
            definitions.len(),
            self.dir.display()
        );
        Ok(definitions)
    }
}

/// Immutable catalog of migrations keyed and ordered by [`Version`].
///
/// Iteration is always in ascending natural order, independent of the order
/// the source produced definitions in.
#[derive(Default)]
pub struct Catalog {
    entries: BTreeMap<Version, MigrationDefinition>,
}

impl Catalog {
    pub fn from_source(source: &dyn MigrationSource) -> Result<Self> {
        Self::from_definitions(source.discover()?)
    }

    pub fn from_definitions(definitions: Vec<MigrationDefinition>) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for definition in definitions {
            match entries.entry(definition.version.clone()) {
                Entry::Occupied(existing) => {
                    let existing: &MigrationDefinition = existing.get();
                    return Err(Error::DuplicateVersion {
                        version: definition.version.to_string(),
                        first: existing.name.clone(),
                        second: definition.name,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(definition);
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn versions(&self) -> impl DoubleEndedIterator<Item = &Version> {
        self.entries.keys()
    }

    pub fn max_version(&self) -> Version {
        self.entries
            .keys()
            .next_back()
            .cloned()
            .unwrap_or_else(Version::zero)
    }

    pub fn min_version(&self) -> Version {
        self.entries
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(Version::zero)
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.entries.contains_key(version)
    }

    pub fn load(&self, version: &Version) -> Result<&dyn MigrationUnit> {
        self.entries
            .get(version)
            .map(|d| d.unit.as_ref())
            .ok_or_else(|| Error::UnknownVersion(version.to_string()))
    }

    pub fn name(&self, version: &Version) -> Option<&str> {
        self.entries.get(version).map(|d| d.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> SqlMigration {
        SqlMigration::reversible("SELECT 1", "SELECT 1")
    }

    fn versions(catalog: &Catalog) -> Vec<&str> {
        catalog.versions().map(Version::as_str).collect()
    }

    #[test]
    fn catalog_sorts_by_natural_order() {
        let source = StaticSource::new()
            .with("100_c", noop())
            .with("9_a", noop())
            .with("20_b", noop());
        let catalog = Catalog::from_source(&source).unwrap();

        assert_eq!(versions(&catalog), vec!["9", "20", "100"]);
        assert_eq!(catalog.min_version().as_str(), "9");
        assert_eq!(catalog.max_version().as_str(), "100");
        assert_eq!(catalog.name(&"20".parse().unwrap()), Some("20_b"));
    }

    #[test]
    fn empty_catalog_bounds_are_zero() {
        let catalog = Catalog::default();
        assert!(catalog.is_empty());
        assert!(catalog.max_version().is_zero());
        assert!(catalog.min_version().is_zero());
    }

    #[test]
    fn duplicate_normalized_versions_are_rejected() {
        let source = StaticSource::new()
            .with("007_first", noop())
            .with("7_second", noop());

        match Catalog::from_source(&source) {
            Err(Error::DuplicateVersion {
                version,
                first,
                second,
            }) => {
                assert_eq!(version, "7");
                assert_eq!(first, "007_first");
                assert_eq!(second, "7_second");
            }
            other => panic!("expected duplicate error, got {:?}", other.err()),
        }
    }

    #[test]
    fn malformed_names_fail_discovery() {
        let source = StaticSource::new().with("create_users", noop());
        assert!(matches!(
            Catalog::from_source(&source),
            Err(Error::MalformedVersion(_))
        ));
    }

    #[test]
    fn load_unknown_version_fails() {
        let catalog = Catalog::from_source(&StaticSource::new().with("1_a", noop())).unwrap();
        assert!(catalog.load(&"1".parse().unwrap()).is_ok());
        assert!(matches!(
            catalog.load(&"2".parse().unwrap()),
            Err(Error::UnknownVersion(v)) if v == "2"
        ));
    }

    #[test]
    fn directory_source_reads_migration_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir(root.join("20240102000000_add_email")).unwrap();
        fs::write(
            root.join("20240102000000_add_email/up.sql"),
            "ALTER TABLE users ADD COLUMN email TEXT;",
        )
        .unwrap();

        fs::create_dir(root.join("20240101000000_create_users")).unwrap();
        fs::write(
            root.join("20240101000000_create_users/up.sql"),
            "CREATE TABLE users (id INTEGER PRIMARY KEY);",
        )
        .unwrap();
        fs::write(
            root.join("20240101000000_create_users/down.sql"),
            "DROP TABLE users;",
        )
        .unwrap();

        // Ignored: no up.sql, and a plain file.
        fs::create_dir(root.join("drafts")).unwrap();
        fs::write(root.join("README.md"), "notes").unwrap();

        let catalog = Catalog::from_source(&DirectorySource::new(root)).unwrap();
        assert_eq!(
            versions(&catalog),
            vec!["20240101000000", "20240102000000"]
        );
    }

    #[test]
    fn directory_source_rejects_non_numeric_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("init_schema")).unwrap();
        fs::write(dir.path().join("init_schema/up.sql"), "SELECT 1;").unwrap();

        assert!(matches!(
            DirectorySource::new(dir.path()).discover(),
            Err(Error::MalformedVersion(_))
        ));
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path().join("nope"));
        assert!(source.discover().unwrap().is_empty());
    }
}
