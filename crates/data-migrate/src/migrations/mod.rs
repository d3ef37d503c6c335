//! Data migration system
//!
//! Files are discovered by [`manager`], joined with the version table by
//! [`status`] and executed through the [`migrator::Migrator`] seam.

pub mod context;
pub mod definitions;
pub mod filename;
pub mod manager;
pub mod migrator;
pub mod postgres;
pub mod status;
pub mod store;

pub use context::MigrationContext;
pub use definitions::*;
pub use filename::{humanize, MigrationFilename};
pub use manager::{parse_migration_content, split_sql_statements, MigrationBody, MigrationManager};
pub use migrator::{DataMigrator, MigrationPlan, Migrator};
pub use postgres::PgSchemaStore;
pub use status::compute_status;
pub use store::{MemorySchemaStore, SchemaMigrationStore};
