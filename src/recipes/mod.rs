use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// A stored recommendation result.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub preferences: String,
    pub recommendation: String,
    pub created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecipe {
    pub preferences: String,
    pub recommendation: String,
}

impl Recipe {
    /// Inserts a recipe; `createdAt` is assigned by the database.
    pub async fn create(db: &PgPool, new: &NewRecipe) -> StoreResult<Recipe> {
        if new.recommendation.trim().is_empty() {
            return Err(StoreError::Invalid("recommendation must not be empty".into()));
        }
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            INSERT INTO "Recipe" ("id", "preferences", "recommendation")
            VALUES ($1, $2, $3)
            RETURNING "id", "preferences", "recommendation", "createdAt"
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&new.preferences)
        .bind(&new.recommendation)
        .fetch_one(db)
        .await?;
        Ok(recipe)
    }

    pub async fn get(db: &PgPool, id: &str) -> StoreResult<Recipe> {
        sqlx::query_as::<_, Recipe>(
            r#"SELECT "id", "preferences", "recommendation", "createdAt" FROM "Recipe" WHERE "id" = $1"#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("recipe {id}")))
    }

    pub async fn list_recent(db: &PgPool, limit: i64) -> StoreResult<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT "id", "preferences", "recommendation", "createdAt"
            FROM "Recipe"
            ORDER BY "createdAt" DESC, "id" DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}
