//! PostgreSQL persistence layer of the NutriRecom nutrition recommender:
//! schema migrations plus typed access to users, feedback, recipes and
//! training records.

pub mod config;
pub mod db;
pub mod error;
pub mod feedback;
pub mod maintenance;
pub mod recipes;
pub mod schema;
pub mod training;
pub mod users;

pub use config::StoreConfig;
pub use db::Store;
pub use error::{StoreError, StoreResult};
