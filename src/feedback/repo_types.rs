use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;

pub const SCORE_MIN: i32 = 1;
pub const SCORE_MAX: i32 = 5;

/// A rating on the 1..=5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Score(i32);

impl Score {
    pub fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for Score {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if (SCORE_MIN..=SCORE_MAX).contains(&value) {
            Ok(Score(value))
        } else {
            Err(format!("score {value} out of range {SCORE_MIN}..={SCORE_MAX}"))
        }
    }
}

impl From<Score> for i32 {
    fn from(score: Score) -> Self {
        score.0
    }
}

/// A user's reaction to one recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackScores {
    pub liked: bool,
    pub healthiness_score: Score,
    pub tastiness_score: Score,
    pub intent_to_try_score: Score,
}

/// Feedback record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct Feedback {
    pub id: String,
    pub liked: bool,
    pub healthiness_score: i32,
    pub tastiness_score: i32,
    pub intent_to_try_score: i32,
    pub recommendation_id: String,
    pub user_id: String,
    pub created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub user_id: String,
    pub recommendation_id: String,
    pub scores: FeedbackScores,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_outside_one_to_five_are_rejected() {
        assert!(Score::try_from(0).is_err());
        assert!(Score::try_from(6).is_err());
        assert_eq!(Score::try_from(1).unwrap().get(), 1);
        assert_eq!(Score::try_from(5).unwrap().get(), 5);
    }

    #[test]
    fn feedback_scores_deserialize_with_validation() {
        let ok: FeedbackScores = serde_json::from_str(
            r#"{"liked": true, "healthinessScore": 4, "tastinessScore": 2, "intentToTryScore": 5}"#,
        )
        .unwrap();
        assert!(ok.liked);
        assert_eq!(ok.tastiness_score.get(), 2);

        let err = serde_json::from_str::<FeedbackScores>(
            r#"{"liked": false, "healthinessScore": 9, "tastinessScore": 2, "intentToTryScore": 5}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn missing_score_is_an_error() {
        let err = serde_json::from_str::<FeedbackScores>(
            r#"{"liked": true, "healthinessScore": 3, "tastinessScore": 3}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("intentToTryScore"));
    }
}
