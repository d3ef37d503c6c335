//! Migration filename parsing
//!
//! Files are named `<version>_<name>[.<scope>].<ext>`, for example
//! `20240101120000_backfill_user_slugs.sql` or
//! `20240101120000_backfill_user_slugs.primary.sql`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use super::definitions::MigrationVersion;
use crate::error::{DataMigrateError, DataMigrateResult};

static MIGRATION_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+)_([_a-z0-9]*)\.?([_a-z0-9]*)?\.([A-Za-z0-9]+)$")
        .expect("migration filename pattern is valid")
});

/// The typed parts of a migration filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFilename {
    pub version: MigrationVersion,
    pub name: String,
    pub scope: String,
}

impl MigrationFilename {
    /// Parse a migration file path, checking it carries the expected extension
    pub fn parse(path: &Path, extension: &str) -> DataMigrateResult<Self> {
        let illegal = || DataMigrateError::IllegalMigrationName {
            path: path.to_path_buf(),
        };

        let basename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(illegal)?;

        let captures = MIGRATION_FILENAME.captures(basename).ok_or_else(illegal)?;
        if &captures[4] != extension {
            return Err(illegal());
        }

        let version = MigrationVersion::parse(&captures[1]).map_err(|_| illegal())?;
        let scope = captures
            .get(3)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        Ok(Self {
            version,
            name: captures[2].to_string(),
            scope,
        })
    }

    /// Label shown in status listings
    pub fn humanized(&self) -> String {
        humanize(&format!("{}{}", self.name, self.scope))
    }
}

/// Turn `backfill_user_slugs` into `Backfill user slugs`
///
/// Leading underscores and a trailing `_id` are dropped, so `author_id`
/// becomes `Author`.
pub fn humanize(text: &str) -> String {
    let text = text.trim_start_matches('_');
    let text = text.strip_suffix("_id").unwrap_or(text);
    let spaced = text.replace('_', " ");
    let lowered = spaced.trim().to_lowercase();

    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether a file name follows the numeric-prefix listing convention
///
/// This is deliberately looser than [`MigrationFilename::parse`]: files that
/// look like migrations get listed and then rejected by the parser.
pub fn matches_listing_pattern(file_name: &str, extension: &str) -> bool {
    let Some(stem) = file_name
        .strip_suffix(extension)
        .and_then(|s| s.strip_suffix('.'))
    else {
        return false;
    };

    let mut chars = stem.chars();
    match chars.next() {
        Some(first) if first.is_ascii_digit() => chars.as_str().contains('_'),
        _ => false,
    }
}
