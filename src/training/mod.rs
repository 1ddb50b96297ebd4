pub mod repo;
pub mod repo_types;
pub mod services;

pub use repo_types::{
    HistoryItem, HistoryPage, PageRequest, ProfileSnapshot, RecommendationOutcome, TrainingRecord,
    MAX_PAGE_SIZE,
};
