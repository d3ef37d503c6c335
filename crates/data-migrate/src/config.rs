//! Data migration configuration and builder

use serde::{Deserialize, Serialize};
use service_builder::builder;
use std::env;
use std::path::PathBuf;

/// Where data migrations live and how they are tracked
#[derive(Debug, Clone, Serialize, Deserialize)]
#[builder]
pub struct DataMigrateConfig {
    /// Directories searched (recursively) for migration files
    #[builder(default = "vec![PathBuf::from(\"db/data\")]", getter)]
    pub migrations_paths: Vec<PathBuf>,

    /// Table recording applied data migration versions
    #[builder(default = "\"data_migrations\".to_string()", getter)]
    pub migrations_table: String,

    /// Extension of migration files, without the dot
    #[builder(default = "\"sql\".to_string()", getter)]
    pub extension: String,
}

impl Default for DataMigrateConfig {
    fn default() -> Self {
        Self {
            migrations_paths: vec![PathBuf::from("db/data")],
            migrations_table: "data_migrations".to_string(),
            extension: "sql".to_string(),
        }
    }
}

impl DataMigrateConfig {
    /// Defaults overridden by `DATA_MIGRATIONS_PATHS`, `DATA_MIGRATIONS_TABLE`
    /// and `DATA_MIGRATIONS_EXTENSION`
    ///
    /// `DATA_MIGRATIONS_PATHS` holds one or more paths separated by `,` or `:`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(paths) = env::var("DATA_MIGRATIONS_PATHS") {
            let paths: Vec<PathBuf> = paths
                .split(|c: char| c == ',' || c == ':')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect();
            if !paths.is_empty() {
                config.migrations_paths = paths;
            }
        }

        if let Ok(table) = env::var("DATA_MIGRATIONS_TABLE") {
            if !table.trim().is_empty() {
                config.migrations_table = table.trim().to_string();
            }
        }

        if let Ok(extension) = env::var("DATA_MIGRATIONS_EXTENSION") {
            let extension = extension.trim().trim_start_matches('.');
            if !extension.is_empty() {
                config.extension = extension.to_string();
            }
        }

        config
    }
}

impl DataMigrateConfigBuilder {
    /// Search a single directory
    pub fn migrations_path(self, path: impl Into<PathBuf>) -> Self {
        self.migrations_paths(vec![path.into()])
    }
}
