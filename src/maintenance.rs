use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use crate::error::StoreResult;

/// Rows removed per table by [`erase_all_data`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErasedCounts {
    pub feedback: u64,
    pub training_records: u64,
    pub recipes: u64,
    pub users: u64,
}

impl ErasedCounts {
    pub fn total(&self) -> u64 {
        self.feedback + self.training_records + self.recipes + self.users
    }
}

/// Children before parents, so the restricting foreign keys never fire.
const ERASE_ORDER: [&str; 4] = ["Feedback", "TrainingRecord", "Recipe", "User"];

async fn delete_all(conn: &mut PgConnection, table: &str) -> StoreResult<u64> {
    let done = sqlx::query(&format!(r#"DELETE FROM "{table}""#))
        .execute(conn)
        .await?;
    Ok(done.rows_affected())
}

/// Deletes every row of the store's tables in one transaction. Intended for
/// development databases.
#[instrument(skip_all)]
pub async fn erase_all_data(db: &PgPool) -> StoreResult<ErasedCounts> {
    let mut tx = db.begin().await?;
    let mut counts = [0u64; 4];
    for (slot, table) in counts.iter_mut().zip(ERASE_ORDER) {
        *slot = delete_all(&mut *tx, table).await?;
    }
    tx.commit().await?;

    let [feedback, training_records, recipes, users] = counts;
    let erased = ErasedCounts {
        feedback,
        training_records,
        recipes,
        users,
    };
    info!(
        feedback,
        training_records,
        recipes,
        users,
        "all store data erased"
    );
    Ok(erased)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependents_are_erased_before_users() {
        let pos = |t| ERASE_ORDER.iter().position(|x| *x == t).unwrap();
        assert!(pos("Feedback") < pos("User"));
        assert_eq!(ERASE_ORDER.last(), Some(&"User"));
    }

    #[test]
    fn totals_and_serializes_counts() {
        let counts = ErasedCounts {
            feedback: 3,
            training_records: 5,
            recipes: 1,
            users: 2,
        };
        assert_eq!(counts.total(), 11);
        let json = serde_json::to_value(counts).unwrap();
        assert_eq!(json["trainingRecords"], 5);
    }
}
