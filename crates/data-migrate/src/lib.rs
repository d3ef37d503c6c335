//! # elif-data-migrate: Data migrations for elif.rs
//!
//! Data migrations are versioned SQL files that change data rather than
//! schema. They live next to the application (by default under `db/data`),
//! are named `<version>_<name>.sql` and are tracked in their own version
//! table, separate from schema migrations.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use elif_data_migrate::{DataMigrateConfig, MigrationContext, PgSchemaStore};
//!
//! # async fn example() -> elif_data_migrate::DataMigrateResult<()> {
//! let config = DataMigrateConfig::from_env();
//! let store = PgSchemaStore::connect_lazy("postgres://localhost/app", &config)?;
//! let context = MigrationContext::new(config, Arc::new(store));
//!
//! for row in context.migrations_status().await? {
//!     println!("{:>4}  {}  {}", row.status, row.version, row.name);
//! }
//! context.up(None).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod migrations;

pub use config::*;
pub use error::*;
pub use migrations::*;
