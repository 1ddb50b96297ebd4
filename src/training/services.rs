use std::collections::HashSet;

use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use super::repo::{self, InsertRecord};
use super::repo_types::{
    HistoryPage, PageRequest, ProfileSnapshot, RecommendationOutcome, TrainingRecord,
};
use crate::error::{StoreError, StoreResult};
use crate::feedback::{Feedback, FeedbackScores, NewFeedback};
use crate::users::User;

fn check_outcomes(outcomes: &[RecommendationOutcome]) -> StoreResult<()> {
    for outcome in outcomes {
        if outcome.recommendation_id.trim().is_empty() {
            return Err(StoreError::Invalid("recommendation id must not be empty".into()));
        }
        if outcome.explanation.trim().is_empty() {
            return Err(StoreError::Invalid(format!(
                "explanation for {} must not be empty",
                outcome.recommendation_id
            )));
        }
    }
    Ok(())
}

/// Stores one training record per outcome, all in one transaction. Every
/// record carries the user's profile as it is right now.
#[instrument(skip(db, user, outcomes), fields(user_id = %user.id, count = outcomes.len()))]
pub async fn record_recommendations(
    db: &PgPool,
    user: &User,
    outcomes: &[RecommendationOutcome],
) -> StoreResult<Vec<TrainingRecord>> {
    check_outcomes(outcomes)?;
    let snapshot = serde_json::to_value(ProfileSnapshot::from(user))?;

    let mut tx = db.begin().await?;
    let mut records = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let rec = InsertRecord {
            user_id: &user.id,
            snapshot: &snapshot,
            recommendation_id: &outcome.recommendation_id,
            recommendation_name: &outcome.recommendation_name,
            group: user.group.as_deref(),
            explanation: &outcome.explanation,
        };
        records.push(repo::insert_in(&mut *tx, &rec).await?);
    }
    tx.commit().await?;

    info!("training records stored");
    Ok(records)
}

/// Stores the feedback and copies it onto the latest training record for
/// the same recommendation.
#[instrument(skip(db, scores))]
pub async fn submit_feedback(
    db: &PgPool,
    user_id: &str,
    recommendation_id: &str,
    scores: FeedbackScores,
) -> StoreResult<(Feedback, TrainingRecord)> {
    let mut tx = db.begin().await?;

    let Some(latest) = repo::latest_for_update(&mut *tx, user_id, recommendation_id).await? else {
        warn!("no training record for feedback");
        return Err(StoreError::NotFound(format!(
            "training record for recommendation {recommendation_id}"
        )));
    };

    let new = NewFeedback {
        user_id: user_id.to_string(),
        recommendation_id: recommendation_id.to_string(),
        scores,
    };
    let feedback = Feedback::create_in(&mut *tx, &new).await?;
    let record = repo::set_feedback(&mut *tx, &latest.id, &new.scores).await?;
    tx.commit().await?;

    debug!(record_id = %record.id, "feedback linked to training record");
    Ok((feedback, record))
}

#[instrument(skip(db))]
pub async fn history(db: &PgPool, user_id: &str, page: PageRequest) -> StoreResult<HistoryPage> {
    let history = repo::history(db, user_id, page).await?;
    let total_items = repo::count_history(db, user_id).await?;
    Ok(HistoryPage {
        history,
        total_items,
        page: page.page,
        page_size: page.page_size,
    })
}

pub async fn seen_recommendation_ids(db: &PgPool, user_id: &str) -> StoreResult<HashSet<String>> {
    repo::seen_recommendation_ids(db, user_id).await
}

pub async fn list_recent(db: &PgPool, limit: i64) -> StoreResult<Vec<TrainingRecord>> {
    repo::list_recent(db, limit).await
}
