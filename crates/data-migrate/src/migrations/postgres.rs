//! Postgres version store
//!
//! Each migration runs in its own transaction together with the insert or
//! delete of its version row.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::definitions::{MigrationDirection, MigrationProxy};
use super::store::SchemaMigrationStore;
use crate::config::DataMigrateConfig;
use crate::error::{DataMigrateError, DataMigrateResult};

/// Version store backed by a Postgres table
#[derive(Debug, Clone)]
pub struct PgSchemaStore {
    pool: PgPool,
    table: String,
}

impl PgSchemaStore {
    pub fn new(pool: PgPool, config: &DataMigrateConfig) -> DataMigrateResult<Self> {
        validate_table_name(config.get_migrations_table())?;
        Ok(Self {
            pool,
            table: config.get_migrations_table().clone(),
        })
    }

    /// Connect lazily so a missing database surfaces on first use
    pub fn connect_lazy(database_url: &str, config: &DataMigrateConfig) -> DataMigrateResult<Self> {
        let pool = PgPool::connect_lazy(database_url)?;
        Self::new(pool, config)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                version VARCHAR(255) NOT NULL PRIMARY KEY\n\
            );",
            self.table
        )
    }

    fn versions_sql(&self) -> String {
        format!("SELECT version FROM {} ORDER BY version", self.table)
    }

    fn insert_version_sql(&self) -> String {
        format!("INSERT INTO {} (version) VALUES ($1)", self.table)
    }

    fn delete_version_sql(&self) -> String {
        format!("DELETE FROM {} WHERE version = $1", self.table)
    }
}

#[async_trait]
impl SchemaMigrationStore for PgSchemaStore {
    async fn table_exists(&self) -> DataMigrateResult<bool> {
        let (schema, name) = match self.table.split_once('.') {
            Some((schema, name)) => (Some(schema), name),
            None => (None, self.table.as_str()),
        };

        let row = sqlx::query(
            "SELECT EXISTS (\
                SELECT 1 FROM information_schema.tables \
                WHERE table_schema = COALESCE($1, current_schema()) AND table_name = $2\
            ) AS present",
        )
        .bind(schema)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("present")?)
    }

    async fn create_table(&self) -> DataMigrateResult<()> {
        sqlx::query(&self.create_table_sql())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn versions(&self) -> DataMigrateResult<Vec<String>> {
        let rows = sqlx::query(&self.versions_sql())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("version").map_err(DataMigrateError::from))
            .collect()
    }

    async fn apply(
        &self,
        migration: &MigrationProxy,
        direction: MigrationDirection,
        statements: &[String],
    ) -> DataMigrateResult<()> {
        self.create_table().await?;

        let mut transaction = self.pool.begin().await?;

        for statement in statements {
            sqlx::query(statement)
                .execute(&mut *transaction)
                .await
                .map_err(|e| {
                    DataMigrateError::Migration(format!(
                        "Failed to execute data migration {} ({}): {}",
                        migration.version, direction, e
                    ))
                })?;
        }

        let bookkeeping = match direction {
            MigrationDirection::Up => self.insert_version_sql(),
            MigrationDirection::Down => self.delete_version_sql(),
        };
        sqlx::query(&bookkeeping)
            .bind(migration.version.to_string())
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;
        Ok(())
    }
}

/// Table names are interpolated into SQL, so only plain identifiers are allowed
fn validate_table_name(table: &str) -> DataMigrateResult<()> {
    let valid = !table.is_empty()
        && table.matches('.').count() <= 1
        && table
            .split('.')
            .all(|part| {
                let mut chars = part.chars();
                matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            });

    if valid {
        Ok(())
    } else {
        Err(DataMigrateError::Configuration(format!(
            "Invalid data migrations table name: {}",
            table
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataMigrateConfigBuilder;

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("data_migrations").is_ok());
        assert!(validate_table_name("app.data_migrations").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1table").is_err());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name("data; DROP TABLE users").is_err());
    }

    #[tokio::test]
    async fn test_sql_generation() {
        let config = DataMigrateConfig::default();
        let store = PgSchemaStore::connect_lazy("postgres://localhost/app_test", &config).unwrap();

        assert!(store
            .create_table_sql()
            .contains("CREATE TABLE IF NOT EXISTS data_migrations"));
        assert_eq!(
            store.versions_sql(),
            "SELECT version FROM data_migrations ORDER BY version"
        );
        assert_eq!(
            store.insert_version_sql(),
            "INSERT INTO data_migrations (version) VALUES ($1)"
        );
        assert_eq!(
            store.delete_version_sql(),
            "DELETE FROM data_migrations WHERE version = $1"
        );
    }

    #[tokio::test]
    async fn test_rejects_unsafe_table_name() {
        let config = DataMigrateConfigBuilder::new()
            .migrations_table("x; DROP TABLE users".to_string())
            .build()
            .expect("Failed to build config");
        assert!(matches!(
            PgSchemaStore::connect_lazy("postgres://localhost/app_test", &config),
            Err(DataMigrateError::Configuration(_))
        ));
    }
}
