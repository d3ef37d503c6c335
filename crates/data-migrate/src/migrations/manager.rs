//! Migration Manager - File system operations for data migrations
//!
//! Lists migration files under the configured paths, reads their bodies and
//! creates new migration files from a template.

use chrono::Utc;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::path::PathBuf;
use walkdir::WalkDir;

use super::definitions::{MigrationDirection, MigrationProxy};
use super::filename::{matches_listing_pattern, MigrationFilename};
use crate::config::DataMigrateConfig;
use crate::error::{DataMigrateError, DataMigrateResult};

/// Parsed body of a migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationBody {
    pub up_sql: String,
    pub down_sql: String,
}

impl MigrationBody {
    /// SQL for the given direction
    pub fn sql(&self, direction: MigrationDirection) -> &str {
        match direction {
            MigrationDirection::Up => &self.up_sql,
            MigrationDirection::Down => &self.down_sql,
        }
    }
}

/// Migration manager for listing, loading and creating migration files
#[derive(Debug, Clone)]
pub struct MigrationManager {
    config: DataMigrateConfig,
}

impl MigrationManager {
    pub fn new(config: DataMigrateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DataMigrateConfig {
        &self.config
    }

    /// List every migration-looking file under the configured paths, recursively
    ///
    /// Paths are visited in configuration order. Files found under more than
    /// one path are listed once per path.
    pub fn migration_files(&self) -> DataMigrateResult<Vec<PathBuf>> {
        let mut files = Vec::new();

        for root in self.config.get_migrations_paths() {
            if !root.exists() {
                tracing::debug!("Skipping missing migrations path {}", root.display());
                continue;
            }

            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry?;
                // Follows symlinks, so linked migration files are listed too
                if !entry.path().is_file() {
                    continue;
                }

                let listed = entry
                    .file_name()
                    .to_str()
                    .map_or(false, |name| matches_listing_pattern(name, self.config.get_extension()));
                if listed {
                    files.push(entry.into_path());
                }
            }
        }

        tracing::debug!("Found {} data migration file(s)", files.len());
        Ok(files)
    }

    /// Parse every listed file into a migration, sorted by version
    pub fn load_migrations(&self) -> DataMigrateResult<Vec<MigrationProxy>> {
        let mut migrations = self
            .migration_files()?
            .into_iter()
            .map(|path| {
                let parsed = MigrationFilename::parse(&path, self.config.get_extension())?;
                Ok(MigrationProxy {
                    version: parsed.version,
                    name: parsed.name,
                    scope: parsed.scope,
                    filename: path,
                })
            })
            .collect::<DataMigrateResult<Vec<_>>>()?;

        migrations.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(migrations)
    }

    /// Create a new migration file in the first configured path
    pub async fn create_migration(&self, name: &str) -> DataMigrateResult<PathBuf> {
        let slug = name.trim().replace([' ', '-'], "_").to_lowercase();
        if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DataMigrateError::Migration(format!(
                "Migration name can only contain letters, numbers, spaces, hyphens, and underscores: {}",
                name
            )));
        }

        let directory = self
            .config
            .get_migrations_paths()
            .first()
            .ok_or_else(|| DataMigrateError::Configuration("No migrations path configured".to_string()))?;
        tokio::fs::create_dir_all(directory).await?;

        let version = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let filename = format!("{}_{}.{}", version, slug, self.config.get_extension());
        let filepath = directory.join(filename);

        tokio::fs::write(&filepath, migration_template(name, &version)).await?;
        tracing::info!("Created data migration {}", filepath.display());

        Ok(filepath)
    }
}

/// Split a migration body into its UP and DOWN sections
///
/// Section markers are comment lines reading exactly `-- Up` or `-- Down`
/// (case-insensitive, surrounding whitespace ignored). Other comment lines,
/// such as `-- update flags back`, and blank lines are dropped.
pub fn parse_migration_content(content: &str) -> MigrationBody {
    let mut up_sql = Vec::new();
    let mut down_sql = Vec::new();
    let mut current = None;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(direction) = section_marker(trimmed) {
            current = Some(direction);
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }

        match current {
            Some(MigrationDirection::Up) => up_sql.push(line),
            Some(MigrationDirection::Down) => down_sql.push(line),
            None => {}
        }
    }

    MigrationBody {
        up_sql: up_sql.join("\n").trim().to_string(),
        down_sql: down_sql.join("\n").trim().to_string(),
    }
}

fn section_marker(line: &str) -> Option<MigrationDirection> {
    let mut words = line.split_whitespace();
    if words.next() != Some("--") {
        return None;
    }

    let direction = match words.next().map(str::to_lowercase).as_deref() {
        Some("up") => MigrationDirection::Up,
        Some("down") => MigrationDirection::Down,
        _ => return None,
    };

    words.next().is_none().then_some(direction)
}

/// Split SQL into executable statements
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    if sql.trim().is_empty() {
        return Vec::new();
    }

    match Parser::parse_sql(&GenericDialect {}, sql) {
        Ok(statements) => statements.into_iter().map(|stmt| format!("{};", stmt)).collect(),
        Err(e) => {
            tracing::warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| format!("{};", s))
                .collect()
        }
    }
}

fn migration_template(name: &str, version: &str) -> String {
    format!(
        "-- Data migration: {}\n\
         -- Version: {}\n\
         -- Created: {}\n\n\
         -- Up\n\
         -- Add your data changes here\n\n\n\
         -- Down\n\
         -- Add statements that revert the data changes here\n\n",
        name,
        version,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataMigrateConfigBuilder;
    use crate::migrations::definitions::MigrationVersion;
    use std::fs;
    use tempfile::TempDir;

    fn manager_for(paths: Vec<PathBuf>) -> MigrationManager {
        let config = DataMigrateConfigBuilder::new()
            .migrations_paths(paths)
            .build()
            .expect("Failed to build config");
        MigrationManager::new(config)
    }

    #[test]
    fn test_migration_files_lists_recursively() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("archive");
        fs::create_dir_all(&nested).unwrap();

        fs::write(temp_dir.path().join("2_second.sql"), "").unwrap();
        fs::write(nested.join("1_first.sql"), "").unwrap();
        fs::write(temp_dir.path().join("README.md"), "").unwrap();
        fs::write(temp_dir.path().join("notes_1.sql"), "").unwrap();

        let manager = manager_for(vec![temp_dir.path().to_path_buf()]);
        let mut files = manager.migration_files().unwrap();
        files.sort();

        assert_eq!(files, vec![temp_dir.path().join("2_second.sql"), nested.join("1_first.sql")]);
    }

    #[test]
    fn test_migration_files_across_paths_keeps_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("1_first.sql"), "").unwrap();

        let manager = manager_for(vec![
            temp_dir.path().to_path_buf(),
            temp_dir.path().to_path_buf(),
            temp_dir.path().join("missing"),
        ]);
        assert_eq!(manager.migration_files().unwrap().len(), 2);
    }

    #[test]
    fn test_load_migrations_sorts_by_version() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("10_later.sql"), "").unwrap();
        fs::write(temp_dir.path().join("9_earlier.sql"), "").unwrap();

        let manager = manager_for(vec![temp_dir.path().to_path_buf()]);
        let migrations = manager.load_migrations().unwrap();

        let versions: Vec<_> = migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![MigrationVersion::new(9), MigrationVersion::new(10)]);
        assert_eq!(migrations[0].name, "earlier");
    }

    #[test]
    fn test_load_migrations_rejects_illegal_name() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("1_Bad-Name.sql"), "").unwrap();

        let manager = manager_for(vec![temp_dir.path().to_path_buf()]);
        assert!(matches!(
            manager.load_migrations(),
            Err(DataMigrateError::IllegalMigrationName { .. })
        ));
    }

    #[test]
    fn test_parse_migration_content() {
        let content = "-- Data migration: test\n-- Up\nUPDATE users SET active = true;\n\n-- Down\nUPDATE users SET active = false;";
        let body = parse_migration_content(content);
        assert_eq!(body.up_sql, "UPDATE users SET active = true;");
        assert_eq!(body.down_sql, "UPDATE users SET active = false;");
        assert_eq!(body.sql(MigrationDirection::Down), body.down_sql);
    }

    #[test]
    fn test_comments_resembling_markers_stay_in_section() {
        let content = "-- Up\n-- update flags for spam accounts\nUPDATE users SET flagged = true;\n-- Down\n-- update flags back\n-- downgrade flagged users\nUPDATE users SET flagged = false;\n";
        let body = parse_migration_content(content);
        assert_eq!(body.up_sql, "UPDATE users SET flagged = true;");
        assert_eq!(body.down_sql, "UPDATE users SET flagged = false;");
    }

    #[test]
    fn test_section_markers() {
        assert_eq!(section_marker("-- Up"), Some(MigrationDirection::Up));
        assert_eq!(section_marker("--   DOWN  "), Some(MigrationDirection::Down));
        assert_eq!(section_marker("-- Down migration"), None);
        assert_eq!(section_marker("-- update flags back"), None);
        assert_eq!(section_marker("-- downgrade"), None);
        assert_eq!(section_marker("--Up"), None);
        assert_eq!(section_marker("UPDATE up SET x = 1;"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_migration_files_follows_symlinked_files() {
        let temp_dir = TempDir::new().unwrap();
        let shared = TempDir::new().unwrap();
        let target = shared.path().join("shared_body.sql");
        fs::write(&target, "-- Up\nUPDATE t SET v = 1;\n").unwrap();
        std::os::unix::fs::symlink(&target, temp_dir.path().join("5_linked.sql")).unwrap();

        let manager = manager_for(vec![temp_dir.path().to_path_buf()]);
        assert_eq!(
            manager.migration_files().unwrap(),
            vec![temp_dir.path().join("5_linked.sql")]
        );
    }

    #[test]
    fn test_split_sql_statements() {
        let statements =
            split_sql_statements("UPDATE users SET active = true; DELETE FROM sessions WHERE id = 1");
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("UPDATE users"));
        assert!(statements[1].starts_with("DELETE FROM sessions"));
        assert!(split_sql_statements("   ").is_empty());
    }

    #[tokio::test]
    async fn test_create_migration() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("db").join("data");
        let manager = manager_for(vec![root.clone()]);

        let path = manager.create_migration("Backfill user slugs").await.unwrap();
        assert!(path.starts_with(&root));

        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.ends_with("_backfill_user_slugs.sql"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("-- Data migration: Backfill user slugs"));

        let migrations = manager.load_migrations().unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].name, "backfill_user_slugs");
    }

    #[tokio::test]
    async fn test_create_migration_rejects_bad_names() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_for(vec![temp_dir.path().to_path_buf()]);
        assert!(manager.create_migration("drop; table").await.is_err());
        assert!(manager.create_migration("   ").await.is_err());
    }
}
