pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{AppConfig, DatabaseConfig, MigrationsConfig};
pub use stratum_common::IdentifierValidator;
