use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A migration version: an arbitrary-length decimal digit string.
///
/// Only the normalized form (leading zeros stripped, at least one digit kept)
/// is stored, so `"007"`, `"7"` and `"0000007"` build identical values.
/// Ordering is by numeric magnitude and never goes through a machine integer,
/// which keeps 14-digit timestamps and longer identifiers exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

/// Which way a migration step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

impl Version {
    /// Build a version from a bare digit string.
    pub fn new(digits: &str) -> Result<Self> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::MalformedVersion(digits.to_string()));
        }
        Ok(Self(normalize(digits).to_string()))
    }

    /// Extract the version token from a migration identifier such as
    /// `20240101120000_create_users` or `007_seed.sql`.
    ///
    /// The token is everything before the first `_` of the name, once any
    /// extension has been dropped.
    pub fn parse(name: &str) -> Result<Self> {
        let stem = name.split('.').next().unwrap_or(name);
        let token = stem.split('_').next().unwrap_or(stem);
        Self::new(token).map_err(|_| Error::MalformedVersion(name.to_string()))
    }

    pub fn zero() -> Self {
        Self("0".to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == "0"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Successor of this version, used when backfilling integer ranges.
    pub fn next(&self) -> Self {
        let mut digits = self.0.clone().into_bytes();
        for d in digits.iter_mut().rev() {
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                return Self(String::from_utf8_lossy(&digits).into_owned());
            }
        }
        digits.insert(0, b'1');
        Self(String::from_utf8_lossy(&digits).into_owned())
    }
}

/// Strip leading zeros, keeping at least one digit.
pub fn normalize(raw: &str) -> &str {
    let trimmed = raw.trim_start_matches('0');
    if trimmed.is_empty() && !raw.is_empty() {
        &raw[raw.len() - 1..]
    } else {
        trimmed
    }
}

/// Natural-order comparison of two digit strings, ignoring leading zeros.
pub fn compare(a: &str, b: &str) -> Ordering {
    let (a, b) = (normalize(a), normalize(b));
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s.trim())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for Version {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}
