use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::repo_types::{Feedback, NewFeedback};
use crate::error::StoreResult;

const FEEDBACK_COLUMNS: &str = r#""id", "liked", "healthinessScore", "tastinessScore",
    "intentToTryScore", "recommendationId", "userId", "createdAt""#;

impl Feedback {
    pub async fn create(db: &PgPool, new: &NewFeedback) -> StoreResult<Feedback> {
        let mut conn = db.acquire().await?;
        Self::create_in(&mut conn, new).await
    }

    /// Insert on an existing connection or transaction.
    pub async fn create_in(conn: &mut PgConnection, new: &NewFeedback) -> StoreResult<Feedback> {
        let row = sqlx::query_as::<_, Feedback>(&format!(
            r#"
            INSERT INTO "Feedback"
                ("id", "liked", "healthinessScore", "tastinessScore", "intentToTryScore",
                 "recommendationId", "userId")
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {FEEDBACK_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(new.scores.liked)
        .bind(new.scores.healthiness_score.get())
        .bind(new.scores.tastiness_score.get())
        .bind(new.scores.intent_to_try_score.get())
        .bind(&new.recommendation_id)
        .bind(&new.user_id)
        .fetch_one(conn)
        .await?;
        Ok(row)
    }

    pub async fn list_by_user(
        db: &PgPool,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Feedback>> {
        let rows = sqlx::query_as::<_, Feedback>(&format!(
            r#"
            SELECT {FEEDBACK_COLUMNS}
            FROM "Feedback"
            WHERE "userId" = $1
            ORDER BY "createdAt" DESC, "id" DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}
