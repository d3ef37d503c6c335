//! Version table access
//!
//! A [`SchemaMigrationStore`] knows which data migration versions have been
//! applied and executes a migration body together with its version
//! bookkeeping.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;

use super::definitions::{MigrationDirection, MigrationProxy, MigrationVersion};
use crate::error::{DataMigrateError, DataMigrateResult};

/// Persistence of applied data migration versions
#[async_trait]
pub trait SchemaMigrationStore: Send + Sync {
    /// Whether the version table exists
    async fn table_exists(&self) -> DataMigrateResult<bool>;

    /// Create the version table if it is missing
    async fn create_table(&self) -> DataMigrateResult<()>;

    /// Raw applied versions as stored
    async fn versions(&self) -> DataMigrateResult<Vec<String>>;

    /// Applied versions in canonical form, empty when the table is missing
    async fn normalized_versions(&self) -> DataMigrateResult<Vec<MigrationVersion>> {
        if !self.table_exists().await? {
            return Ok(Vec::new());
        }

        self.versions()
            .await?
            .iter()
            .map(|raw| self.normalize_version(raw))
            .collect()
    }

    /// Canonical form of a raw version string
    fn normalize_version(&self, raw: &str) -> DataMigrateResult<MigrationVersion> {
        MigrationVersion::parse(raw)
    }

    /// Execute `statements` and record (up) or forget (down) the version, atomically
    async fn apply(
        &self,
        migration: &MigrationProxy,
        direction: MigrationDirection,
        statements: &[String],
    ) -> DataMigrateResult<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    table_created: bool,
    versions: BTreeSet<MigrationVersion>,
    executed: Vec<String>,
}

/// In-memory version store
///
/// Statements are recorded rather than executed. Useful for tests and for
/// dry runs that only need the bookkeeping.
#[derive(Debug, Default)]
pub struct MemorySchemaStore {
    state: Mutex<MemoryState>,
    missing_database: bool,
}

impl MemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose version table already holds `versions`
    pub fn with_versions(versions: impl IntoIterator<Item = u64>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock();
            state.table_created = true;
            state.versions = versions.into_iter().map(MigrationVersion::new).collect();
        }
        store
    }

    /// A store that behaves as if its database does not exist
    pub fn missing_database() -> Self {
        Self {
            missing_database: true,
            ..Self::default()
        }
    }

    /// Applied versions, ascending
    pub fn applied(&self) -> Vec<MigrationVersion> {
        self.state.lock().versions.iter().copied().collect()
    }

    /// Every statement passed to `apply`, in order
    pub fn executed_statements(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    fn check_database(&self) -> DataMigrateResult<()> {
        if self.missing_database {
            return Err(DataMigrateError::NoDatabase("memory".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaMigrationStore for MemorySchemaStore {
    async fn table_exists(&self) -> DataMigrateResult<bool> {
        self.check_database()?;
        Ok(self.state.lock().table_created)
    }

    async fn create_table(&self) -> DataMigrateResult<()> {
        self.check_database()?;
        self.state.lock().table_created = true;
        Ok(())
    }

    async fn versions(&self) -> DataMigrateResult<Vec<String>> {
        self.check_database()?;
        Ok(self
            .state
            .lock()
            .versions
            .iter()
            .map(|v| v.to_string())
            .collect())
    }

    async fn apply(
        &self,
        migration: &MigrationProxy,
        direction: MigrationDirection,
        statements: &[String],
    ) -> DataMigrateResult<()> {
        self.check_database()?;
        let mut state = self.state.lock();
        state.table_created = true;
        state.executed.extend(statements.iter().cloned());

        match direction {
            MigrationDirection::Up => {
                state.versions.insert(migration.version);
            }
            MigrationDirection::Down => {
                state.versions.remove(&migration.version);
            }
        }
        Ok(())
    }
}
