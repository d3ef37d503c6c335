//! Migration Definitions - Core types shared by the context, stores and migrators

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{DataMigrateError, DataMigrateResult};

/// Label used in status rows for applied versions that have no file on disk
pub const NO_FILE_LABEL: &str = "********** NO FILE **********";

/// Numeric migration version
///
/// The canonical form is the number rendered with at least three digits,
/// the same form the version table stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationVersion(u64);

impl MigrationVersion {
    /// Version of "nothing applied"
    pub const ZERO: MigrationVersion = MigrationVersion(0);

    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Normalize a raw version string using its leading digits
    pub fn parse(raw: &str) -> DataMigrateResult<Self> {
        let trimmed = raw.trim();
        let digits: &str = match trimmed.find(|c: char| !c.is_ascii_digit()) {
            Some(end) => &trimmed[..end],
            None => trimmed,
        };

        if digits.is_empty() {
            return Err(DataMigrateError::InvalidVersion(raw.to_string()));
        }

        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| DataMigrateError::InvalidVersion(raw.to_string()))
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl From<u64> for MigrationVersion {
    fn from(version: u64) -> Self {
        Self(version)
    }
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    /// Apply the migration (run UP statements)
    Up,
    /// Revert the migration (run DOWN statements)
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// A migration file known by its parsed filename
///
/// The body is only read when the migration is executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationProxy {
    pub version: MigrationVersion,
    pub name: String,
    pub scope: String,
    pub filename: PathBuf,
}

/// Whether a migration has been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationState {
    Up,
    Down,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Up => write!(f, "up"),
            MigrationState::Down => write!(f, "down"),
        }
    }
}

/// One row of `migrations_status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub status: MigrationState,
    pub version: MigrationVersion,
    pub name: String,
}

impl MigrationStatus {
    /// Whether the row stands for an applied version with no file on disk
    pub fn is_missing_file(&self) -> bool {
        self.name == NO_FILE_LABEL
    }
}

/// Result of running migrations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRunResult {
    /// Direction the migrations ran in
    pub direction: MigrationDirection,
    /// Versions that were executed, in execution order
    pub versions: Vec<MigrationVersion>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn empty(direction: MigrationDirection) -> Self {
        Self {
            direction,
            versions: Vec::new(),
            execution_time_ms: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.versions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_canonical_form() {
        assert_eq!(MigrationVersion::new(1).to_string(), "001");
        assert_eq!(MigrationVersion::new(42).to_string(), "042");
        assert_eq!(
            MigrationVersion::new(20240101120000).to_string(),
            "20240101120000"
        );
    }

    #[test]
    fn test_version_parse_normalizes() {
        assert_eq!(MigrationVersion::parse("001").unwrap(), MigrationVersion::new(1));
        assert_eq!(MigrationVersion::parse(" 7 ").unwrap(), MigrationVersion::new(7));
        assert_eq!(MigrationVersion::parse("12abc").unwrap(), MigrationVersion::new(12));
        assert!(matches!(
            MigrationVersion::parse("abc"),
            Err(DataMigrateError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_versions_order_numerically() {
        let mut versions = vec![
            MigrationVersion::new(1000),
            MigrationVersion::new(999),
            MigrationVersion::new(3),
        ];
        versions.sort();
        assert_eq!(
            versions,
            vec![
                MigrationVersion::new(3),
                MigrationVersion::new(999),
                MigrationVersion::new(1000)
            ]
        );
    }
}
