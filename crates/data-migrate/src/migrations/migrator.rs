//! Migration execution
//!
//! A [`MigrationPlan`] fixes the direction, the ordered migrations and an
//! optional target version for a single call. A [`Migrator`] executes plans;
//! [`DataMigrator`] is the implementation that reads migration bodies from
//! disk and hands them to a [`SchemaMigrationStore`].

use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use super::definitions::{MigrationDirection, MigrationProxy, MigrationRunResult, MigrationVersion};
use super::manager::{parse_migration_content, split_sql_statements};
use super::store::SchemaMigrationStore;
use crate::error::{DataMigrateError, DataMigrateResult};

/// Direction, ordered migrations and target for one migrator call
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    direction: MigrationDirection,
    migrations: Vec<MigrationProxy>,
    target_version: Option<MigrationVersion>,
}

impl MigrationPlan {
    /// Migrations are ordered ascending for `Up` and descending for `Down`
    pub fn new(
        direction: MigrationDirection,
        mut migrations: Vec<MigrationProxy>,
        target_version: Option<MigrationVersion>,
    ) -> Self {
        migrations.sort_by(|a, b| a.version.cmp(&b.version));
        if direction == MigrationDirection::Down {
            migrations.reverse();
        }

        Self {
            direction,
            migrations,
            target_version,
        }
    }

    pub fn direction(&self) -> MigrationDirection {
        self.direction
    }

    /// Migrations in execution order
    pub fn migrations(&self) -> &[MigrationProxy] {
        &self.migrations
    }

    pub fn target_version(&self) -> Option<MigrationVersion> {
        self.target_version
    }

    /// The migration matching the target version, if any
    pub fn target(&self) -> Option<&MigrationProxy> {
        let target = self.target_version?;
        self.migrations.iter().find(|m| m.version == target)
    }

    /// Position of a version in execution order
    pub fn index_of(&self, version: MigrationVersion) -> Option<usize> {
        self.migrations.iter().position(|m| m.version == version)
    }

    /// A non-zero target that matches no migration
    fn has_invalid_target(&self) -> bool {
        matches!(self.target_version, Some(v) if !v.is_zero()) && self.target().is_none()
    }

    fn validate(&self) -> DataMigrateResult<()> {
        let mut versions = HashSet::new();
        let mut names = HashSet::new();

        for migration in &self.migrations {
            if !versions.insert(migration.version) {
                return Err(DataMigrateError::DuplicateMigrationVersion(migration.version));
            }
            if !names.insert(migration.name.as_str()) {
                return Err(DataMigrateError::DuplicateMigrationName(migration.name.clone()));
            }
        }
        Ok(())
    }
}

/// Executes migration plans
#[async_trait]
pub trait Migrator: Send + Sync {
    /// Run every runnable migration of the plan, respecting its target
    async fn migrate(&self, plan: &MigrationPlan) -> DataMigrateResult<MigrationRunResult>;

    /// Run only the migration matching the plan's target
    async fn run(&self, plan: &MigrationPlan) -> DataMigrateResult<MigrationRunResult>;

    /// The plan's migration matching the latest applied version
    async fn current_migration<'a>(
        &self,
        plan: &'a MigrationPlan,
    ) -> DataMigrateResult<Option<&'a MigrationProxy>>;
}

/// Migrator reading SQL bodies from disk and applying them through a store
pub struct DataMigrator {
    store: Arc<dyn SchemaMigrationStore>,
}

impl DataMigrator {
    pub fn new(store: Arc<dyn SchemaMigrationStore>) -> Self {
        Self { store }
    }

    async fn applied(&self) -> DataMigrateResult<BTreeSet<MigrationVersion>> {
        Ok(self.store.normalized_versions().await?.into_iter().collect())
    }

    /// Migrations `migrate` would execute, in order
    fn runnable<'a>(
        plan: &'a MigrationPlan,
        applied: &BTreeSet<MigrationVersion>,
    ) -> Vec<&'a MigrationProxy> {
        let target = plan.target_version.unwrap_or(MigrationVersion::ZERO);

        plan.migrations
            .iter()
            .filter(|m| match plan.direction {
                MigrationDirection::Up => {
                    !applied.contains(&m.version) && (target.is_zero() || m.version <= target)
                }
                MigrationDirection::Down => applied.contains(&m.version) && m.version > target,
            })
            .collect()
    }

    async fn execute(
        &self,
        migration: &MigrationProxy,
        direction: MigrationDirection,
    ) -> DataMigrateResult<()> {
        let content = tokio::fs::read_to_string(&migration.filename).await?;
        let body = parse_migration_content(&content);
        let statements = split_sql_statements(body.sql(direction));

        match direction {
            MigrationDirection::Up => tracing::info!(
                "Migrating data {} {} ({} statement(s))",
                migration.version,
                migration.name,
                statements.len()
            ),
            MigrationDirection::Down => tracing::info!(
                "Reverting data {} {} ({} statement(s))",
                migration.version,
                migration.name,
                statements.len()
            ),
        }

        self.store.apply(migration, direction, &statements).await
    }
}

#[async_trait]
impl Migrator for DataMigrator {
    async fn migrate(&self, plan: &MigrationPlan) -> DataMigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        plan.validate()?;

        if plan.has_invalid_target() {
            return Err(DataMigrateError::UnknownMigrationVersion(
                plan.target_version.unwrap_or_default(),
            ));
        }

        let applied = self.applied().await?;
        let runnable = Self::runnable(plan, &applied);
        tracing::debug!(
            "{} of {} data migration(s) runnable {}",
            runnable.len(),
            plan.migrations.len(),
            plan.direction
        );

        let mut versions = Vec::with_capacity(runnable.len());
        for migration in runnable {
            self.execute(migration, plan.direction).await?;
            versions.push(migration.version);
        }

        Ok(MigrationRunResult {
            direction: plan.direction,
            versions,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    async fn run(&self, plan: &MigrationPlan) -> DataMigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        plan.validate()?;

        let migration = plan.target().ok_or_else(|| {
            DataMigrateError::UnknownMigrationVersion(plan.target_version.unwrap_or_default())
        })?;

        let applied = self.applied().await?.contains(&migration.version);
        let needed = match plan.direction {
            MigrationDirection::Up => !applied,
            MigrationDirection::Down => applied,
        };
        if !needed {
            tracing::debug!(
                "Data migration {} already {}, nothing to run",
                migration.version,
                plan.direction
            );
            return Ok(MigrationRunResult::empty(plan.direction));
        }

        self.execute(migration, plan.direction).await?;

        Ok(MigrationRunResult {
            direction: plan.direction,
            versions: vec![migration.version],
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    async fn current_migration<'a>(
        &self,
        plan: &'a MigrationPlan,
    ) -> DataMigrateResult<Option<&'a MigrationProxy>> {
        let current = self.applied().await?.into_iter().max();
        Ok(current.and_then(|version| plan.migrations.iter().find(|m| m.version == version)))
    }
}
