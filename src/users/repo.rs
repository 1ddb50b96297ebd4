use sqlx::{types::Json, Encode, PgPool, Postgres, QueryBuilder, Type};
use uuid::Uuid;

use super::repo_types::{ExperimentGroup, NewUser, ProfileUpdate, User};
use crate::error::{StoreError, StoreResult};

const USER_COLUMNS: &str = r#""id", "email", "passwordHash", "name", "group", "onboardingCompleted",
    "age", "gender", "height", "heightUnit", "weight", "weightUnit", "activityLevel",
    "dietaryProfile", "likedIngredients", "dislikedIngredients", "favoriteCuisines",
    "otherCuisine", "createdAt""#;

impl User {
    /// Find a user by id.
    pub async fn find_by_id(db: &PgPool, id: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "User" WHERE "id" = $1"#
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a user by (already normalized) email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "User" WHERE "email" = $1"#
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn list_all(db: &PgPool) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "User" ORDER BY "createdAt", "id""#
        ))
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    /// Insert a new user with a fresh text id.
    pub async fn create(db: &PgPool, new: &NewUser, group: ExperimentGroup) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO "User" ("id", "email", "passwordHash", "name", "group")
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.name)
        .bind(group.as_str())
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Writes only the fields present in `update`; an explicit null clears
    /// the column.
    pub async fn update_profile(db: &PgPool, id: &str, update: &ProfileUpdate) -> StoreResult<User> {
        let mut qb = QueryBuilder::<Postgres>::new(
            r#"UPDATE "User" SET "onboardingCompleted" = "onboardingCompleted" OR "#,
        );
        qb.push_bind(update.completes_onboarding());
        set_field(&mut qb, "name", &update.name);
        set_field(&mut qb, "age", &update.age);
        set_field(&mut qb, "gender", &update.gender);
        set_field(&mut qb, "height", &update.height);
        set_field(&mut qb, "heightUnit", &update.height_unit);
        set_field(&mut qb, "weight", &update.weight);
        set_field(&mut qb, "weightUnit", &update.weight_unit);
        set_field(&mut qb, "activityLevel", &update.activity_level);
        let dietary = update
            .dietary_profile
            .as_ref()
            .map(|p| p.clone().map(Json));
        set_field(&mut qb, "dietaryProfile", &dietary);
        set_field(&mut qb, "likedIngredients", &update.liked_ingredients);
        set_field(&mut qb, "dislikedIngredients", &update.disliked_ingredients);
        set_field(&mut qb, "favoriteCuisines", &update.favorite_cuisines);
        set_field(&mut qb, "otherCuisine", &update.other_cuisine);
        qb.push(r#" WHERE "id" = "#)
            .push_bind(id.to_string())
            .push(format!(" RETURNING {USER_COLUMNS}"));

        let user = qb.build_query_as::<User>().fetch_optional(db).await?;
        user.ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    pub async fn set_group(db: &PgPool, id: &str, group: ExperimentGroup) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"UPDATE "User" SET "group" = $2 WHERE "id" = $1 RETURNING {USER_COLUMNS}"#
        ))
        .bind(id)
        .bind(group.as_str())
        .fetch_optional(db)
        .await?;
        user.ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    /// Fails with a foreign key violation while feedback still references the user.
    pub async fn delete(db: &PgPool, id: &str) -> StoreResult<()> {
        let result = sqlx::query(r#"DELETE FROM "User" WHERE "id" = $1"#)
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }
}

fn set_field<'a, T>(qb: &mut QueryBuilder<'a, Postgres>, column: &str, field: &Option<Option<T>>)
where
    T: 'a + Clone + Encode<'a, Postgres> + Type<Postgres> + Send,
{
    if let Some(value) = field {
        qb.push(format!(r#", "{column}" = "#)).push_bind(value.clone());
    }
}
