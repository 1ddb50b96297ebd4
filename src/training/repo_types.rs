use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::PrimitiveDateTime;

use crate::users::{DietaryProfile, User};

/// The parts of a user's profile the recommender looked at, frozen at
/// recommendation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub activity_level: Option<String>,
    pub dietary_profile: Option<DietaryProfile>,
    pub liked_ingredients: Option<Vec<String>>,
    pub disliked_ingredients: Option<Vec<String>>,
    pub favorite_cuisines: Option<Vec<String>>,
}

impl From<&User> for ProfileSnapshot {
    fn from(user: &User) -> Self {
        Self {
            age: user.age,
            gender: user.gender.clone(),
            height: user.height,
            weight: user.weight,
            activity_level: user.activity_level.clone(),
            dietary_profile: user.dietary_profile.as_ref().map(|p| p.0.clone()),
            liked_ingredients: user.liked_ingredients.clone(),
            disliked_ingredients: user.disliked_ingredients.clone(),
            favorite_cuisines: user.favorite_cuisines.clone(),
        }
    }
}

/// Training record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct TrainingRecord {
    pub id: String,
    pub user_id: String,
    pub user_profile_snapshot: Json<serde_json::Value>,
    pub recommendation_id: String,
    pub recommendation_name: String,
    pub group: Option<String>,
    pub liked: Option<bool>,
    pub healthiness_score: Option<i32>,
    pub tastiness_score: Option<i32>,
    pub intent_to_try_score: Option<i32>,
    pub explanation: String,
    pub created_at: PrimitiveDateTime,
}

impl TrainingRecord {
    pub fn has_feedback(&self) -> bool {
        self.liked.is_some()
    }
}

/// One recommendation shown to a user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationOutcome {
    pub recommendation_id: String,
    pub recommendation_name: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct HistoryItem {
    #[serde(rename = "foodName")]
    pub recommendation_name: String,
    #[serde(rename = "recommendedOn")]
    pub created_at: PrimitiveDateTime,
    pub liked: Option<bool>,
    pub healthiness_score: Option<i32>,
    pub tastiness_score: Option<i32>,
    pub intent_to_try_score: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub history: Vec<HistoryItem>,
    pub total_items: i64,
    pub page: i64,
    pub page_size: i64,
}

pub const MAX_PAGE_SIZE: i64 = 100;

/// Page request clamped to `page >= 1` and `1..=MAX_PAGE_SIZE` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Saturates instead of overflowing for absurd page numbers.
    pub fn offset(self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::DietaryItem;
    use time::macros::datetime;

    fn user() -> User {
        User {
            id: "u1".into(),
            email: "ada@example.com".into(),
            password_hash: Some("hash".into()),
            name: Some("Ada".into()),
            group: Some("transparency".into()),
            onboarding_completed: true,
            age: Some(36),
            gender: Some("female".into()),
            height: Some(170.0),
            height_unit: Some("cm".into()),
            weight: Some(60.5),
            weight_unit: Some("kg".into()),
            activity_level: Some("moderately active".into()),
            dietary_profile: Some(Json(DietaryProfile {
                dietary_restrictions: Some(DietaryItem {
                    selected: vec!["Vegan".into()],
                    other: String::new(),
                }),
                ..Default::default()
            })),
            liked_ingredients: Some(vec!["lentils".into()]),
            disliked_ingredients: None,
            favorite_cuisines: Some(vec!["Indian".into()]),
            other_cuisine: Some("Ethiopian".into()),
            created_at: datetime!(2025-07-01 12:00:00),
        }
    }

    #[test]
    fn snapshot_keeps_recommender_inputs_only() {
        let snapshot = ProfileSnapshot::from(&user());
        assert_eq!(snapshot.age, Some(36));
        assert_eq!(snapshot.liked_ingredients, Some(vec!["lentils".to_string()]));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("email").is_none());
        assert!(json.get("name").is_none());
        assert_eq!(json["dietaryProfile"]["dietaryRestrictions"]["selected"][0], "Vegan");
        assert_eq!(json["activityLevel"], "moderately active");
    }

    #[test]
    fn page_request_is_clamped() {
        assert_eq!(PageRequest::new(0, 10), PageRequest { page: 1, page_size: 10 });
        assert_eq!(PageRequest::new(3, 1000).page_size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(2, 0).page_size, 1);
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
        assert_eq!(PageRequest::default().offset(), 0);
    }

    #[test]
    fn huge_page_numbers_saturate() {
        assert_eq!(PageRequest::new(i64::MAX, MAX_PAGE_SIZE).offset(), i64::MAX);
        assert_eq!(PageRequest::new(i64::MIN, 10).offset(), 0);
    }

    #[test]
    fn history_items_serialize_under_their_public_names() {
        let item = HistoryItem {
            recommendation_name: "Lentil Soup".into(),
            created_at: datetime!(2025-07-02 08:30:00),
            liked: Some(true),
            healthiness_score: Some(4),
            tastiness_score: Some(3),
            intent_to_try_score: Some(5),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["foodName"], "Lentil Soup");
        assert!(json.get("recommendedOn").is_some());
        assert_eq!(json["tastinessScore"], 3);
    }
}
