use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{types::Json, FromRow};
use time::PrimitiveDateTime;

/// A/B arm a user is assigned to at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentGroup {
    Control,
    Transparency,
}

impl ExperimentGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            ExperimentGroup::Control => "control",
            ExperimentGroup::Transparency => "transparency",
        }
    }

    /// Picks one of the two arms uniformly at random.
    pub fn assign() -> Self {
        Self::assign_with(&mut rand::thread_rng())
    }

    pub fn assign_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            ExperimentGroup::Control
        } else {
            ExperimentGroup::Transparency
        }
    }
}

impl fmt::Display for ExperimentGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "control" => Ok(ExperimentGroup::Control),
            "transparency" => Ok(ExperimentGroup::Transparency),
            other => Err(format!(
                "invalid group {other:?}, must be 'control' or 'transparency'"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DietaryItem {
    #[serde(default)]
    pub selected: Vec<String>,
    #[serde(default)]
    pub other: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietaryProfile {
    pub dietary_restrictions: Option<DietaryItem>,
    pub food_allergies: Option<DietaryItem>,
    pub health_conditions: Option<DietaryItem>,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // absent for federated sign-ins
    pub name: Option<String>,
    pub group: Option<String>,
    pub onboarding_completed: bool,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub height_unit: Option<String>,
    pub weight: Option<f64>,
    pub weight_unit: Option<String>,
    pub activity_level: Option<String>,
    pub dietary_profile: Option<Json<DietaryProfile>>,
    pub liked_ingredients: Option<Vec<String>>,
    pub disliked_ingredients: Option<Vec<String>>,
    pub favorite_cuisines: Option<Vec<String>>,
    pub other_cuisine: Option<String>,
    pub created_at: PrimitiveDateTime,
}

impl User {
    pub fn experiment_group(&self) -> Option<ExperimentGroup> {
        self.group.as_deref().and_then(|g| g.parse().ok())
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub name: Option<String>,
}

/// Partial profile update. The outer `Option` says whether a field was
/// sent at all; `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub age: Option<Option<i32>>,
    #[serde(default, deserialize_with = "present")]
    pub gender: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub height: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub height_unit: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub weight: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub weight_unit: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub activity_level: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub dietary_profile: Option<Option<DietaryProfile>>,
    #[serde(default, deserialize_with = "ingredient_list")]
    pub liked_ingredients: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "ingredient_list")]
    pub disliked_ingredients: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    pub favorite_cuisines: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    pub other_cuisine: Option<Option<String>>,
}

impl ProfileUpdate {
    /// Sending taste preferences, even empty ones, completes onboarding.
    pub fn completes_onboarding(&self) -> bool {
        self.liked_ingredients.is_some() || self.disliked_ingredients.is_some()
    }
}

/// Only called for keys that are present, so `null` becomes `Some(None)`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Accepts either a JSON list or a comma-separated string.
fn ingredient_list<'de, D>(deserializer: D) -> Result<Option<Option<Vec<String>>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    Ok(Some(raw.map(|raw| match raw {
        Raw::List(items) => items,
        Raw::Csv(s) => split_csv(&s),
    })))
}

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
