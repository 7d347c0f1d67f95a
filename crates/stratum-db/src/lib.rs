pub mod handle;
pub mod sqlite;
pub mod version_store;

pub use handle::DatabaseHandle;
pub use sqlite::SqliteHandle;
pub use version_store::{DEFAULT_LEGACY_TABLE, DEFAULT_TABLE, VersionStore};
