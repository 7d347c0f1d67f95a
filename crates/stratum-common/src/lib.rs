pub mod error;
pub mod validation;
pub mod version;

pub use error::{Error, Result};
pub use validation::IdentifierValidator;
pub use version::{Direction, Version};
