use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use super::repo_types::{ExperimentGroup, NewUser, ProfileUpdate, User};
use crate::error::{StoreError, StoreResult};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Creates a user in a random experiment group. The caller hashes the
/// password, if there is one.
#[instrument(skip(db, email, password_hash))]
pub async fn register_user(
    db: &PgPool,
    email: &str,
    password_hash: Option<String>,
    name: Option<String>,
) -> StoreResult<User> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(StoreError::Invalid(format!("invalid email {email:?}")));
    }

    let group = ExperimentGroup::assign();
    let new = NewUser {
        email,
        password_hash,
        name,
    };
    let user = User::create(db, &new, group).await?;
    info!(user_id = %user.id, %group, "user created");
    Ok(user)
}

#[instrument(skip(db, update))]
pub async fn update_profile(db: &PgPool, user_id: &str, update: &ProfileUpdate) -> StoreResult<User> {
    let user = User::update_profile(db, user_id, update).await?;
    if update.completes_onboarding() {
        info!(%user_id, "onboarding completed");
    }
    Ok(user)
}

/// Moves a user to another experiment group, given by name.
#[instrument(skip(db))]
pub async fn change_group(db: &PgPool, user_id: &str, group: &str) -> StoreResult<User> {
    let group: ExperimentGroup = group.parse().map_err(StoreError::Invalid)?;
    let user = User::set_group(db, user_id, group).await?;
    info!(%user_id, %group, "experiment group changed");
    Ok(user)
}
