use sqlx::error::ErrorKind;
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;

/// Errors returned by the store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("null value in column \"{column}\" of relation \"{table}\" violates not-null constraint")]
    NotNullViolation { table: String, column: String },

    #[error("foreign key constraint \"{constraint}\" violated")]
    ForeignKeyViolation { constraint: String },

    #[error("unique constraint \"{constraint}\" violated")]
    UniqueViolation { constraint: String },

    #[error("check constraint \"{constraint}\" violated")]
    CheckViolation { constraint: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("invalid migration log: {0}")]
    InvalidLog(String),

    #[error("migration {version} ({name}) was modified after it was applied")]
    ChecksumMismatch { version: i64, name: String },

    #[error("database has migration {version} applied, which this build does not know")]
    UnknownMigration { version: i64 },

    #[error("migration {missing} is not applied but later migration {later} is")]
    HistoryGap { missing: i64, later: i64 },

    #[error("migration {version} ({name}) failed: {source}")]
    MigrationFailed {
        version: i64,
        name: String,
        #[source]
        source: Box<StoreError>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Name of the constraint or column that was violated, if this is a
    /// constraint violation.
    pub fn violated(&self) -> Option<&str> {
        match self {
            StoreError::NotNullViolation { column, .. } => Some(column),
            StoreError::ForeignKeyViolation { constraint }
            | StoreError::UniqueViolation { constraint }
            | StoreError::CheckViolation { constraint } => Some(constraint),
            StoreError::MigrationFailed { source, .. } => source.violated(),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let Some(db) = err.as_database_error() else {
            return StoreError::Database(err);
        };

        let constraint = db.constraint().unwrap_or_default().to_string();
        match db.kind() {
            ErrorKind::NotNullViolation => {
                let (table, column) = db
                    .try_downcast_ref::<PgDatabaseError>()
                    .map(|pg| {
                        (
                            pg.table().unwrap_or_default().to_string(),
                            pg.column().unwrap_or_default().to_string(),
                        )
                    })
                    .unwrap_or_default();
                StoreError::NotNullViolation { table, column }
            }
            ErrorKind::ForeignKeyViolation => StoreError::ForeignKeyViolation { constraint },
            ErrorKind::UniqueViolation => StoreError::UniqueViolation { constraint },
            ErrorKind::CheckViolation => StoreError::CheckViolation { constraint },
            _ => StoreError::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_stay_opaque() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
        assert_eq!(err.violated(), None);
    }

    #[test]
    fn not_null_message_names_table_and_column() {
        let err = StoreError::NotNullViolation {
            table: "TrainingRecord".into(),
            column: "explanation".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"explanation\""));
        assert!(msg.contains("\"TrainingRecord\""));
        assert_eq!(err.violated(), Some("explanation"));
    }

    #[test]
    fn migration_failure_exposes_inner_violation() {
        let err = StoreError::MigrationFailed {
            version: 3,
            name: "feedback_structured_scores".into(),
            source: Box::new(StoreError::NotNullViolation {
                table: "Feedback".into(),
                column: "healthinessScore".into(),
            }),
        };
        assert_eq!(err.violated(), Some("healthinessScore"));
        assert!(err.to_string().starts_with("migration 3 (feedback_structured_scores) failed"));
    }
}
