//! Migration Context - entry point for listing, inspecting and running data migrations
//!
//! The context owns no execution logic of its own. It discovers migration
//! files, asks the [`SchemaMigrationStore`] what has been applied and hands a
//! [`MigrationPlan`] to its [`Migrator`] for anything that changes data.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use super::definitions::{
    MigrationDirection, MigrationProxy, MigrationRunResult, MigrationStatus, MigrationVersion,
};
use super::manager::MigrationManager;
use super::migrator::{DataMigrator, MigrationPlan, Migrator};
use super::status::compute_status;
use super::store::SchemaMigrationStore;
use crate::config::DataMigrateConfig;
use crate::error::{DataMigrateError, DataMigrateResult};

/// Data migrations under the configured paths, tracked by one store
pub struct MigrationContext {
    manager: MigrationManager,
    store: Arc<dyn SchemaMigrationStore>,
    migrator: Arc<dyn Migrator>,
}

impl MigrationContext {
    /// Create a context that executes migrations with a [`DataMigrator`]
    pub fn new(config: DataMigrateConfig, store: Arc<dyn SchemaMigrationStore>) -> Self {
        let migrator = Arc::new(DataMigrator::new(store.clone()));
        Self::with_migrator(config, store, migrator)
    }

    /// Create a context with a custom migrator
    pub fn with_migrator(
        config: DataMigrateConfig,
        store: Arc<dyn SchemaMigrationStore>,
        migrator: Arc<dyn Migrator>,
    ) -> Self {
        Self {
            manager: MigrationManager::new(config),
            store,
            migrator,
        }
    }

    pub fn config(&self) -> &DataMigrateConfig {
        self.manager.config()
    }

    pub fn migrations_paths(&self) -> &[PathBuf] {
        self.config().get_migrations_paths()
    }

    pub fn store(&self) -> &Arc<dyn SchemaMigrationStore> {
        &self.store
    }

    /// Every file under the migrations paths following the numeric-prefix convention
    pub fn migration_files(&self) -> DataMigrateResult<Vec<PathBuf>> {
        self.manager.migration_files()
    }

    /// All migrations sorted by version; fails on the first illegal filename
    pub fn migrations(&self) -> DataMigrateResult<Vec<MigrationProxy>> {
        self.manager.load_migrations()
    }

    pub fn any_migrations(&self) -> DataMigrateResult<bool> {
        Ok(!self.migrations()?.is_empty())
    }

    /// Apply pending migrations up to and including `target_version`
    pub async fn up(
        &self,
        target_version: Option<MigrationVersion>,
    ) -> DataMigrateResult<MigrationRunResult> {
        self.up_with(target_version, |_| true).await
    }

    /// Like [`up`](Self::up), only considering migrations accepted by `predicate`
    pub async fn up_with<F>(
        &self,
        target_version: Option<MigrationVersion>,
        predicate: F,
    ) -> DataMigrateResult<MigrationRunResult>
    where
        F: Fn(&MigrationProxy) -> bool,
    {
        self.migrate_selected(MigrationDirection::Up, target_version, predicate)
            .await
    }

    /// Revert applied migrations newer than `target_version` (all of them when `None`)
    pub async fn down(
        &self,
        target_version: Option<MigrationVersion>,
    ) -> DataMigrateResult<MigrationRunResult> {
        self.down_with(target_version, |_| true).await
    }

    /// Like [`down`](Self::down), only considering migrations accepted by `predicate`
    pub async fn down_with<F>(
        &self,
        target_version: Option<MigrationVersion>,
        predicate: F,
    ) -> DataMigrateResult<MigrationRunResult>
    where
        F: Fn(&MigrationProxy) -> bool,
    {
        self.migrate_selected(MigrationDirection::Down, target_version, predicate)
            .await
    }

    /// Run the single migration `target_version` in `direction`
    pub async fn run(
        &self,
        direction: MigrationDirection,
        target_version: MigrationVersion,
    ) -> DataMigrateResult<MigrationRunResult> {
        let plan = MigrationPlan::new(direction, self.migrations()?, Some(target_version));
        self.migrator.run(&plan).await
    }

    /// Move to `target_version`: down when it is below the current version, up otherwise
    pub async fn migrate(
        &self,
        target_version: Option<MigrationVersion>,
    ) -> DataMigrateResult<MigrationRunResult> {
        let Some(target) = target_version else {
            return self.up(None).await;
        };

        let current = self.latest_applied().await?;
        if current.is_zero() && target.is_zero() {
            Ok(MigrationRunResult::empty(MigrationDirection::Up))
        } else if current > target {
            self.down(Some(target)).await
        } else {
            self.up(Some(target)).await
        }
    }

    /// Apply the next `steps` migrations
    pub async fn forward(&self, steps: usize) -> DataMigrateResult<MigrationRunResult> {
        self.move_by(MigrationDirection::Up, steps).await
    }

    /// Revert the last `steps` migrations
    pub async fn rollback(&self, steps: usize) -> DataMigrateResult<MigrationRunResult> {
        self.move_by(MigrationDirection::Down, steps).await
    }

    /// Latest applied version, zero when nothing has been applied
    ///
    /// Returns `Ok(None)` when the database itself does not exist, so callers
    /// have to decide what an unknown version means for them.
    pub async fn current_version(&self) -> DataMigrateResult<Option<MigrationVersion>> {
        match self.latest_applied().await {
            Ok(version) => Ok(Some(version)),
            Err(DataMigrateError::NoDatabase(reason)) => {
                tracing::debug!("Data migration database is missing: {}", reason);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Status of every migration file plus applied versions whose file is gone
    pub async fn migrations_status(&self) -> DataMigrateResult<Vec<MigrationStatus>> {
        let applied = self.store.normalized_versions().await?;
        let files = self.migration_files()?;

        compute_status(&files, self.config().get_extension(), applied, |raw| {
            self.store.normalize_version(raw)
        })
    }

    /// Migrations not yet applied, in version order
    pub async fn pending_migrations(&self) -> DataMigrateResult<Vec<MigrationProxy>> {
        let applied: HashSet<MigrationVersion> =
            self.store.normalized_versions().await?.into_iter().collect();

        Ok(self
            .migrations()?
            .into_iter()
            .filter(|m| !applied.contains(&m.version))
            .collect())
    }

    pub async fn needs_migration(&self) -> DataMigrateResult<bool> {
        Ok(!self.pending_migrations().await?.is_empty())
    }

    /// Create a timestamped migration file in the first migrations path
    pub async fn create_migration(&self, name: &str) -> DataMigrateResult<PathBuf> {
        self.manager.create_migration(name).await
    }

    async fn latest_applied(&self) -> DataMigrateResult<MigrationVersion> {
        Ok(self
            .store
            .normalized_versions()
            .await?
            .into_iter()
            .max()
            .unwrap_or(MigrationVersion::ZERO))
    }

    async fn migrate_selected<F>(
        &self,
        direction: MigrationDirection,
        target_version: Option<MigrationVersion>,
        predicate: F,
    ) -> DataMigrateResult<MigrationRunResult>
    where
        F: Fn(&MigrationProxy) -> bool,
    {
        let selected: Vec<MigrationProxy> = self
            .migrations()?
            .into_iter()
            .filter(|m| predicate(m))
            .collect();

        match target_version {
            Some(target) => tracing::debug!(
                "Running {} data migration(s) {} to {}",
                selected.len(),
                direction,
                target
            ),
            None => tracing::debug!("Running {} data migration(s) {}", selected.len(), direction),
        }

        let plan = MigrationPlan::new(direction, selected, target_version);
        self.migrator.migrate(&plan).await
    }

    /// Step `steps` migrations away from the current one
    ///
    /// With nothing applied the first step lands on the first migration in
    /// `direction` order. Stepping past either end targets version zero.
    async fn move_by(
        &self,
        direction: MigrationDirection,
        steps: usize,
    ) -> DataMigrateResult<MigrationRunResult> {
        if steps == 0 {
            return Ok(MigrationRunResult::empty(direction));
        }

        let current = self.latest_applied().await?;
        let plan = MigrationPlan::new(direction, self.migrations()?, None);

        let finish_index = if current.is_zero() {
            Some(steps - 1)
        } else {
            let current_migration = self
                .migrator
                .current_migration(&plan)
                .await?
                .ok_or(DataMigrateError::UnknownMigrationVersion(current))?;
            plan.index_of(current_migration.version)
                .and_then(|index| index.checked_add(steps))
        };

        let target = finish_index
            .and_then(|index| plan.migrations().get(index))
            .map(|m| m.version)
            .unwrap_or(MigrationVersion::ZERO);
        tracing::debug!(
            "Stepping {} {} from {} targets {}",
            direction,
            steps,
            current,
            target
        );

        match direction {
            MigrationDirection::Up => self.up(Some(target)).await,
            MigrationDirection::Down => self.down(Some(target)).await,
        }
    }
}
