//! Error types for the repository

use chrono::NaiveDate;
use research_core::RunStatus;
use thiserror::Error;

/// Result type alias for repository operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A PENDING or RUNNING run already exists for the date and universe
    #[error("A run for {run_date} ({universe}) is already {status}")]
    RunAlreadyActive {
        run_date: NaiveDate,
        universe: String,
        status: RunStatus,
    },

    /// Status update did not match the run's current state
    #[error("Run {run_id} is not {expected}")]
    InvalidTransition { run_id: i64, expected: RunStatus },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A stored token or value failed domain validation
    #[error("Invalid stored value: {0}")]
    Domain(#[from] research_core::Error),

    /// A JSON column could not be encoded or decoded
    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Whether the error is a unique-constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            Self::RunAlreadyActive { .. } => true,
            _ => false,
        }
    }
}
