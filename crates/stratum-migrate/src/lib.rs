pub mod runner;
pub mod source;
pub mod unit;

pub use runner::{MigrationStatus, Migrator, StatusReport};
pub use source::{Catalog, DirectorySource, MigrationDefinition, MigrationSource, StaticSource};
pub use unit::{FnMigration, MigrationUnit, SqlMigration};
