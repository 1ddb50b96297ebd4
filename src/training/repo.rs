use std::collections::HashSet;

use sqlx::{types::Json, PgConnection, PgPool};
use uuid::Uuid;

use super::repo_types::{HistoryItem, PageRequest, TrainingRecord};
use crate::error::StoreResult;
use crate::feedback::FeedbackScores;

const RECORD_COLUMNS: &str = r#""id", "userId", "userProfileSnapshot", "recommendationId",
    "recommendationName", "group", "liked", "healthinessScore", "tastinessScore",
    "intentToTryScore", "explanation", "createdAt""#;

pub struct InsertRecord<'a> {
    pub user_id: &'a str,
    pub snapshot: &'a serde_json::Value,
    pub recommendation_id: &'a str,
    pub recommendation_name: &'a str,
    pub group: Option<&'a str>,
    pub explanation: &'a str,
}

/// Insert a training record on an existing connection or transaction.
pub async fn insert_in(conn: &mut PgConnection, rec: &InsertRecord<'_>) -> StoreResult<TrainingRecord> {
    let row = sqlx::query_as::<_, TrainingRecord>(&format!(
        r#"
        INSERT INTO "TrainingRecord"
            ("id", "userId", "userProfileSnapshot", "recommendationId", "recommendationName",
             "group", "explanation")
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {RECORD_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(rec.user_id)
    .bind(Json(rec.snapshot))
    .bind(rec.recommendation_id)
    .bind(rec.recommendation_name)
    .bind(rec.group)
    .bind(rec.explanation)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

/// Most recent record for this user and recommendation, locked for update.
pub async fn latest_for_update(
    conn: &mut PgConnection,
    user_id: &str,
    recommendation_id: &str,
) -> StoreResult<Option<TrainingRecord>> {
    let row = sqlx::query_as::<_, TrainingRecord>(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM "TrainingRecord"
        WHERE "userId" = $1 AND "recommendationId" = $2
        ORDER BY "createdAt" DESC, "id" DESC
        LIMIT 1
        FOR UPDATE
        "#
    ))
    .bind(user_id)
    .bind(recommendation_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn set_feedback(
    conn: &mut PgConnection,
    record_id: &str,
    scores: &FeedbackScores,
) -> StoreResult<TrainingRecord> {
    let row = sqlx::query_as::<_, TrainingRecord>(&format!(
        r#"
        UPDATE "TrainingRecord"
        SET "liked" = $2, "healthinessScore" = $3, "tastinessScore" = $4, "intentToTryScore" = $5
        WHERE "id" = $1
        RETURNING {RECORD_COLUMNS}
        "#
    ))
    .bind(record_id)
    .bind(scores.liked)
    .bind(scores.healthiness_score.get())
    .bind(scores.tastiness_score.get())
    .bind(scores.intent_to_try_score.get())
    .fetch_one(conn)
    .await?;
    Ok(row)
}

/// Records of a user that carry feedback, newest first.
pub async fn history(db: &PgPool, user_id: &str, page: PageRequest) -> StoreResult<Vec<HistoryItem>> {
    let rows = sqlx::query_as::<_, HistoryItem>(
        r#"
        SELECT "recommendationName", "createdAt", "liked",
               "healthinessScore", "tastinessScore", "intentToTryScore"
        FROM "TrainingRecord"
        WHERE "userId" = $1 AND "liked" IS NOT NULL
        ORDER BY "createdAt" DESC, "id" DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(page.page_size)
    .bind(page.offset())
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn count_history(db: &PgPool, user_id: &str) -> StoreResult<i64> {
    let n = sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*) FROM "TrainingRecord" WHERE "userId" = $1 AND "liked" IS NOT NULL"#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(n)
}

pub async fn seen_recommendation_ids(db: &PgPool, user_id: &str) -> StoreResult<HashSet<String>> {
    let ids = sqlx::query_scalar::<_, String>(
        r#"SELECT DISTINCT "recommendationId" FROM "TrainingRecord" WHERE "userId" = $1"#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(ids.into_iter().collect())
}

pub async fn list_recent(db: &PgPool, limit: i64) -> StoreResult<Vec<TrainingRecord>> {
    let rows = sqlx::query_as::<_, TrainingRecord>(&format!(
        r#"SELECT {RECORD_COLUMNS} FROM "TrainingRecord" ORDER BY "createdAt" DESC, "id" DESC LIMIT $1"#
    ))
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
