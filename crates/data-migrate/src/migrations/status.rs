//! Applied-vs-pending status of data migrations

use std::path::PathBuf;

use super::definitions::{MigrationState, MigrationStatus, MigrationVersion, NO_FILE_LABEL};
use super::filename::MigrationFilename;
use crate::error::DataMigrateResult;

/// Join migration files with the applied versions
///
/// Each file yields one row, `up` if its version was applied. Every applied
/// version is consumed by at most one file; the ones left over are reported
/// as `up` with [`NO_FILE_LABEL`]. Rows come back sorted by version, with
/// missing-file rows ahead of file rows sharing the same version.
pub fn compute_status(
    files: &[PathBuf],
    extension: &str,
    applied: Vec<MigrationVersion>,
    normalize: impl Fn(&str) -> DataMigrateResult<MigrationVersion>,
) -> DataMigrateResult<Vec<MigrationStatus>> {
    let mut remaining = applied;

    let mut file_rows = Vec::with_capacity(files.len());
    for file in files {
        let parsed = MigrationFilename::parse(file, extension)?;
        let version = normalize(&parsed.version.to_string())?;

        let status = match remaining.iter().position(|v| *v == version) {
            Some(index) => {
                remaining.remove(index);
                MigrationState::Up
            }
            None => MigrationState::Down,
        };

        file_rows.push(MigrationStatus {
            status,
            version,
            name: parsed.humanized(),
        });
    }

    if !remaining.is_empty() {
        tracing::warn!(
            "{} applied data migration(s) have no file on disk",
            remaining.len()
        );
    }

    let mut rows: Vec<MigrationStatus> = remaining
        .into_iter()
        .map(|version| MigrationStatus {
            status: MigrationState::Up,
            version,
            name: NO_FILE_LABEL.to_string(),
        })
        .collect();
    rows.extend(file_rows);
    rows.sort_by_key(|row| row.version);

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataMigrateError;

    fn versions(values: &[u64]) -> Vec<MigrationVersion> {
        values.iter().copied().map(MigrationVersion::new).collect()
    }

    fn files(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("db/data").join(n)).collect()
    }

    #[test]
    fn test_status_joins_files_and_applied_versions() {
        let rows = compute_status(
            &files(&["3_third.sql", "1_first.sql", "2_second.sql"]),
            "sql",
            versions(&[1, 3, 5]),
            MigrationVersion::parse,
        )
        .unwrap();

        let summary: Vec<_> = rows
            .iter()
            .map(|r| (r.status, r.version.value(), r.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (MigrationState::Up, 1, "First"),
                (MigrationState::Down, 2, "Second"),
                (MigrationState::Up, 3, "Third"),
                (MigrationState::Up, 5, NO_FILE_LABEL),
            ]
        );
        assert!(rows[3].is_missing_file());
    }

    #[test]
    fn test_applied_version_with_file_appears_once() {
        let rows = compute_status(
            &files(&["7_only.sql"]),
            "sql",
            versions(&[7]),
            MigrationVersion::parse,
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, MigrationState::Up);
        assert_eq!(rows[0].name, "Only");
    }

    #[test]
    fn test_empty_inputs() {
        let rows = compute_status(&[], "sql", Vec::new(), MigrationVersion::parse).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_illegal_name_fails_instead_of_skipping() {
        let result = compute_status(
            &files(&["1_first.sql", "abc_foo.sql"]),
            "sql",
            Vec::new(),
            MigrationVersion::parse,
        );
        assert!(matches!(
            result,
            Err(DataMigrateError::IllegalMigrationName { .. })
        ));
    }

    #[test]
    fn test_duplicate_file_versions_consume_one_applied_entry() {
        let rows = compute_status(
            &files(&["4_one.sql", "4_two.sql"]),
            "sql",
            versions(&[4]),
            MigrationVersion::parse,
        )
        .unwrap();

        let states: Vec<_> = rows.iter().map(|r| r.status).collect();
        assert_eq!(states, vec![MigrationState::Up, MigrationState::Down]);
    }
}
