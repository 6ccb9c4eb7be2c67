//! Embedded schema migrations.
//!
//! Applied versions are recorded in `schema_migrations`; a migration runs once.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

/// Failure applying or inspecting migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to execute migration {version}: {source}")]
    ExecutionError {
        version: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("Failed to get schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
}

/// A schema change embedded in the binary.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Applied in ascending order
    pub version: i64,
    /// Recorded alongside the version
    pub description: &'static str,
    /// SQL run in one transaction
    pub sql: &'static str,
}

/// Applies [`Migration`]s and tracks which have run.
pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    /// Migrator working on `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply every migration newer than the recorded version; returns how many ran.
    pub async fn run_embedded_migrations(&self, migrations: &[Migration]) -> Result<usize, MigrationError> {
        self.ensure_migrations_table().await?;
        let current_version = self.get_current_version().await?;
        let pending: Vec<&Migration> = migrations.iter().filter(|m| m.version > current_version).collect();

        for migration in &pending {
            self.apply_migration(migration).await?;
            info!(version = migration.version, description = migration.description, "Applied migration");
        }

        Ok(pending.len())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MigrationError::ExecutionError { version: 0, source: e })?;
        Ok(())
    }

    /// Highest applied version, 0 on a fresh database.
    pub async fn get_current_version(&self) -> Result<i64, MigrationError> {
        let (version,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(MigrationError::VersionCheckError)?;
        Ok(version)
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), MigrationError> {
        let failed = |source| MigrationError::ExecutionError {
            version: migration.version,
            source,
        };
        let mut tx = self.pool.begin().await.map_err(failed)?;
        sqlx::raw_sql(migration.sql).execute(&mut *tx).await.map_err(failed)?;
        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        tx.commit().await.map_err(failed)
    }
}

/// Suite run and test case run tables.
pub fn initial_schema_migration() -> Migration {
    Migration {
        version: 1,
        description: "Suite runs and test case runs",
        sql: include_str!("../../../migrations/001_initial_schema.sql"),
    }
}

/// Adds `branch` to the test case run key so equal run ids on two branches coexist.
pub fn branch_scoped_test_case_runs_migration() -> Migration {
    Migration {
        version: 2,
        description: "Key test case runs by branch",
        sql: include_str!("../../../migrations/002_branch_scoped_test_case_runs.sql"),
    }
}

/// Every migration shipped with this build, oldest first.
pub fn all_embedded_migrations() -> Vec<Migration> {
    vec![initial_schema_migration(), branch_scoped_test_case_runs_migration()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_test_pool;

    #[tokio::test]
    async fn test_migrations_run_once() {
        let pool = create_test_pool().await.unwrap();
        let migrator = Migrator::new(pool.clone());

        assert_eq!(migrator.run_embedded_migrations(&all_embedded_migrations()).await.unwrap(), 2);
        assert_eq!(migrator.get_current_version().await.unwrap(), 2);
        assert_eq!(migrator.run_embedded_migrations(&all_embedded_migrations()).await.unwrap(), 0);

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('suite_runs', 'test_case_runs')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 2);
    }

    #[tokio::test]
    async fn test_branch_key_migration_keeps_existing_rows() {
        let pool = create_test_pool().await.unwrap();
        let migrator = Migrator::new(pool.clone());
        migrator.run_embedded_migrations(&[initial_schema_migration()]).await.unwrap();
        sqlx::query(
            "INSERT INTO test_case_runs (org, project, suite, run_id, branch, test_package, test_class, test_case, result)
             VALUES ('acme', 'db', 'ci', 3, 'main', 'org.acme', 'WalTest', 'replay', 'FAIL')",
        )
        .execute(&pool)
        .await
        .unwrap();

        assert_eq!(migrator.run_embedded_migrations(&all_embedded_migrations()).await.unwrap(), 1);

        sqlx::query(
            "INSERT INTO test_case_runs (org, project, suite, run_id, branch, test_package, test_class, test_case, result)
             VALUES ('acme', 'db', 'ci', 3, 'feature/x', 'org.acme', 'WalTest', 'replay', 'PASS')",
        )
        .execute(&pool)
        .await
        .unwrap();
        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM test_case_runs WHERE run_id = 3")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }
}
