use thiserror::Error;

use crate::version::Direction;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed version: {0:?} is not a decimal digit string")]
    MalformedVersion(String),

    #[error("unknown version: {0} is not in the migration catalog")]
    UnknownVersion(String),

    #[error("duplicate version: {version} is defined by both {first} and {second}")]
    DuplicateVersion {
        version: String,
        first: String,
        second: String,
    },

    #[error("invalid target version {target}: must be between 0 and {max}")]
    InvalidTarget { target: String, max: String },

    #[error("no applied version precedes {0}")]
    NoPriorVersion(String),

    #[error("migration {version} failed while running {direction}: {reason}")]
    MigrationExecution {
        version: String,
        direction: Direction,
        reason: String,
    },

    #[error("version store error: {0}")]
    StoreAccess(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The migration version this error is about, if any.
    pub fn version(&self) -> Option<&str> {
        match self {
            Error::MalformedVersion(v)
            | Error::UnknownVersion(v)
            | Error::NoPriorVersion(v)
            | Error::DuplicateVersion { version: v, .. }
            | Error::InvalidTarget { target: v, .. }
            | Error::MigrationExecution { version: v, .. } => Some(v),
            _ => None,
        }
    }
}
