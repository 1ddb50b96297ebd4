use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::log::{migrations, Migration};
use crate::error::{StoreError, StoreResult};

/// A row of the migration history table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub checksum: String,
    pub applied_at: OffsetDateTime,
    pub execution_ms: i64,
}

/// Where migrations are recorded and executed.
#[async_trait]
pub trait MigrationBackend: Send + Sync {
    /// Creates the history table if it does not exist yet.
    async fn ensure_history(&self) -> StoreResult<()>;

    /// Applied migrations, in any order.
    async fn applied(&self) -> StoreResult<Vec<AppliedMigration>>;

    /// Runs every statement of `migration` and records it in the history,
    /// all in one transaction.
    async fn apply(&self, migration: &Migration) -> StoreResult<AppliedMigration>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MigrationState {
    Applied { applied_at: OffsetDateTime },
    Pending,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub name: &'static str,
    #[serde(flatten)]
    pub state: MigrationState,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct MigrationReport {
    pub newly_applied: Vec<i64>,
    pub already_applied: usize,
}

pub struct Migrator {
    log: Vec<Migration>,
}

impl Migrator {
    pub fn new() -> StoreResult<Self> {
        Self::with_log(migrations())
    }

    pub fn with_log(log: Vec<Migration>) -> StoreResult<Self> {
        for pair in log.windows(2) {
            if pair[0].version >= pair[1].version {
                return Err(StoreError::InvalidLog(format!(
                    "version {} ({}) is not greater than {} ({})",
                    pair[1].version, pair[1].name, pair[0].version, pair[0].name
                )));
            }
        }
        for (i, m) in log.iter().enumerate() {
            if log[..i].iter().any(|other| other.name == m.name) {
                return Err(StoreError::InvalidLog(format!("duplicate name {}", m.name)));
            }
        }
        Ok(Self { log })
    }

    pub fn log(&self) -> &[Migration] {
        &self.log
    }

    /// Applies every pending migration in order. Stops at the first failure;
    /// migrations applied before it stay applied.
    #[instrument(skip_all)]
    pub async fn run<B: MigrationBackend + ?Sized>(&self, backend: &B) -> StoreResult<MigrationReport> {
        backend.ensure_history().await?;
        let applied = self.verified_history(backend).await?;
        let last = applied.last().map(|a| a.version).unwrap_or(i64::MIN);

        let mut report = MigrationReport {
            already_applied: applied.len(),
            ..Default::default()
        };
        for migration in self.log.iter().filter(|m| m.version > last) {
            if let Some(op) = migration.ops.iter().find(|op| op.requires_empty_table()) {
                warn!(
                    version = migration.version,
                    table = op.table(),
                    "migration adds a required column without default; it fails if the table has rows"
                );
            }
            let done = backend
                .apply(migration)
                .await
                .map_err(|e| StoreError::MigrationFailed {
                    version: migration.version,
                    name: migration.name.to_string(),
                    source: Box::new(e),
                })?;
            info!(
                version = done.version,
                name = %done.name,
                execution_ms = done.execution_ms,
                "migration applied"
            );
            report.newly_applied.push(done.version);
        }

        if report.newly_applied.is_empty() {
            info!(applied = report.already_applied, "schema up to date");
        }
        Ok(report)
    }

    pub async fn status<B: MigrationBackend + ?Sized>(&self, backend: &B) -> StoreResult<Vec<MigrationStatus>> {
        backend.ensure_history().await?;
        let applied = self.verified_history(backend).await?;
        Ok(self
            .log
            .iter()
            .map(|m| MigrationStatus {
                version: m.version,
                name: m.name,
                state: applied
                    .iter()
                    .find(|a| a.version == m.version)
                    .map(|a| MigrationState::Applied {
                        applied_at: a.applied_at,
                    })
                    .unwrap_or(MigrationState::Pending),
            })
            .collect())
    }

    /// Reads the history and checks it against the log: every recorded
    /// migration must be known with an unchanged checksum, and the recorded
    /// versions must be a prefix of the log.
    async fn verified_history<B: MigrationBackend + ?Sized>(
        &self,
        backend: &B,
    ) -> StoreResult<Vec<AppliedMigration>> {
        let mut applied = backend.applied().await?;
        applied.sort_by_key(|a| a.version);

        for record in &applied {
            let known = self
                .log
                .iter()
                .find(|m| m.version == record.version)
                .ok_or(StoreError::UnknownMigration {
                    version: record.version,
                })?;
            if known.checksum() != record.checksum {
                return Err(StoreError::ChecksumMismatch {
                    version: known.version,
                    name: known.name.to_string(),
                });
            }
        }

        if let Some(latest) = applied.last() {
            if let Some(missing) = self
                .log
                .iter()
                .filter(|m| m.version < latest.version)
                .find(|m| !applied.iter().any(|a| a.version == m.version))
            {
                return Err(StoreError::HistoryGap {
                    missing: missing.version,
                    later: latest.version,
                });
            }
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ops::{Column, ColumnType, SchemaOp};
    use std::sync::Mutex;

    /// History kept in memory; `fail_on` makes one version's apply fail.
    #[derive(Default)]
    struct FakeBackend {
        history: Mutex<Vec<AppliedMigration>>,
        fail_on: Option<i64>,
        bootstrapped: Mutex<bool>,
    }

    impl FakeBackend {
        fn versions(&self) -> Vec<i64> {
            self.history.lock().unwrap().iter().map(|a| a.version).collect()
        }

        fn record(&self, version: i64, name: &str, checksum: String) {
            self.history.lock().unwrap().push(AppliedMigration {
                version,
                name: name.into(),
                checksum,
                applied_at: OffsetDateTime::UNIX_EPOCH,
                execution_ms: 0,
            });
        }
    }

    #[async_trait]
    impl MigrationBackend for FakeBackend {
        async fn ensure_history(&self) -> StoreResult<()> {
            *self.bootstrapped.lock().unwrap() = true;
            Ok(())
        }

        async fn applied(&self) -> StoreResult<Vec<AppliedMigration>> {
            Ok(self.history.lock().unwrap().clone())
        }

        async fn apply(&self, migration: &Migration) -> StoreResult<AppliedMigration> {
            if self.fail_on == Some(migration.version) {
                return Err(StoreError::NotNullViolation {
                    table: "Feedback".into(),
                    column: "healthinessScore".into(),
                });
            }
            let done = AppliedMigration {
                version: migration.version,
                name: migration.name.into(),
                checksum: migration.checksum(),
                applied_at: OffsetDateTime::now_utc(),
                execution_ms: 1,
            };
            self.history.lock().unwrap().push(done.clone());
            Ok(done)
        }
    }

    fn tiny(version: i64, name: &'static str) -> Migration {
        Migration {
            version,
            name,
            ops: vec![SchemaOp::AddColumn {
                table: "T",
                column: Column::optional(name, ColumnType::Text),
            }],
        }
    }

    #[tokio::test]
    async fn applies_every_migration_in_order() {
        let backend = FakeBackend::default();
        let migrator = Migrator::new().unwrap();
        let report = migrator.run(&backend).await.unwrap();
        assert!(*backend.bootstrapped.lock().unwrap());
        assert_eq!(report.newly_applied, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(report.already_applied, 0);
        assert_eq!(backend.versions(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let backend = FakeBackend::default();
        let migrator = Migrator::new().unwrap();
        migrator.run(&backend).await.unwrap();
        let again = migrator.run(&backend).await.unwrap();
        assert!(again.newly_applied.is_empty());
        assert_eq!(again.already_applied, 6);
        assert_eq!(backend.versions().len(), 6);
    }

    #[tokio::test]
    async fn only_appended_migrations_run_later() {
        let backend = FakeBackend::default();
        Migrator::with_log(vec![tiny(1, "a"), tiny(2, "b")])
            .unwrap()
            .run(&backend)
            .await
            .unwrap();
        let report = Migrator::with_log(vec![tiny(1, "a"), tiny(2, "b"), tiny(3, "c")])
            .unwrap()
            .run(&backend)
            .await
            .unwrap();
        assert_eq!(report.newly_applied, vec![3]);
    }

    #[tokio::test]
    async fn modified_migration_is_rejected() {
        let backend = FakeBackend::default();
        backend.record(1, "a", "0000".into());
        let err = Migrator::with_log(vec![tiny(1, "a"), tiny(2, "b")])
            .unwrap()
            .run(&backend)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ChecksumMismatch { version: 1, .. }));
        assert_eq!(backend.versions(), vec![1]);
    }

    #[tokio::test]
    async fn unknown_applied_version_is_rejected() {
        let backend = FakeBackend::default();
        backend.record(9, "future", "x".into());
        let err = Migrator::with_log(vec![tiny(1, "a")])
            .unwrap()
            .run(&backend)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownMigration { version: 9 }));
    }

    #[tokio::test]
    async fn gap_in_history_is_rejected() {
        let backend = FakeBackend::default();
        let b = tiny(2, "b");
        backend.record(2, "b", b.checksum());
        let err = Migrator::with_log(vec![tiny(1, "a"), b])
            .unwrap()
            .run(&backend)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::HistoryGap { missing: 1, later: 2 }));
    }

    #[tokio::test]
    async fn failure_stops_the_run_and_keeps_earlier_migrations() {
        let backend = FakeBackend {
            fail_on: Some(3),
            ..Default::default()
        };
        let err = Migrator::new().unwrap().run(&backend).await.unwrap_err();
        match err {
            StoreError::MigrationFailed { version, ref name, .. } => {
                assert_eq!(version, 3);
                assert_eq!(name, "feedback_structured_scores");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.versions(), vec![1, 2]);
    }

    #[tokio::test]
    async fn status_marks_applied_and_pending() {
        let backend = FakeBackend::default();
        let first = tiny(1, "a");
        backend.record(1, "a", first.checksum());
        let status = Migrator::with_log(vec![first, tiny(2, "b")])
            .unwrap()
            .status(&backend)
            .await
            .unwrap();
        assert!(matches!(status[0].state, MigrationState::Applied { .. }));
        assert!(matches!(status[1].state, MigrationState::Pending));
    }

    #[test]
    fn log_must_be_strictly_ordered_and_uniquely_named() {
        assert!(matches!(
            Migrator::with_log(vec![tiny(2, "a"), tiny(1, "b")]),
            Err(StoreError::InvalidLog(_))
        ));
        assert!(matches!(
            Migrator::with_log(vec![tiny(1, "a"), tiny(2, "a")]),
            Err(StoreError::InvalidLog(_))
        ));
    }
}
