use std::time::Instant;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::log::Migration;
use super::migrator::{AppliedMigration, MigrationBackend};
use crate::error::StoreResult;

/// Migration backend over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgBackend {
    db: PgPool,
}

impl PgBackend {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MigrationBackend for PgBackend {
    async fn ensure_history(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS "_schema_history" (
                "version"     BIGINT PRIMARY KEY,
                "name"        TEXT NOT NULL,
                "checksum"    TEXT NOT NULL,
                "appliedAt"   TIMESTAMPTZ NOT NULL DEFAULT now(),
                "executionMs" BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn applied(&self) -> StoreResult<Vec<AppliedMigration>> {
        let rows = sqlx::query_as::<_, AppliedMigration>(
            r#"
            SELECT "version", "name", "checksum", "appliedAt", "executionMs"
            FROM "_schema_history"
            ORDER BY "version"
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn apply(&self, migration: &Migration) -> StoreResult<AppliedMigration> {
        let started = Instant::now();
        let mut tx = self.db.begin().await?;

        for stmt in migration.statements() {
            debug!(version = migration.version, sql = %stmt, "executing");
            sqlx::query(&stmt).execute(&mut *tx).await?;
        }

        let elapsed_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let record = sqlx::query_as::<_, AppliedMigration>(
            r#"
            INSERT INTO "_schema_history" ("version", "name", "checksum", "executionMs")
            VALUES ($1, $2, $3, $4)
            RETURNING "version", "name", "checksum", "appliedAt", "executionMs"
            "#,
        )
        .bind(migration.version)
        .bind(migration.name)
        .bind(migration.checksum())
        .bind(elapsed_ms)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }
}
