use thiserror::Error;

use crate::detection::ScoringError;
use crate::store::StorageError;

/// Outcome taxonomy for every coordinator operation.
///
/// `NotFound` maps to a 404-class response in a transport; the three
/// business-rule variants map to 400-class. `Storage` and `Scoring` are
/// collaborator faults: the operation was aborted and rolled back.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),
    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),
}

pub type FleetResult<T> = Result<T, FleetError>;

impl FleetError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        FleetError::NotFound { entity, key: key.to_string() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FleetError::NotFound { .. })
    }

    /// Business-rule violations the caller can fix (400-class).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FleetError::InvalidState(_) | FleetError::ResourceUnavailable(_) | FleetError::Validation(_)
        )
    }
}

impl From<StorageError> for FleetError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UniqueViolation { table, key } => {
                FleetError::Validation(format!("{} '{}' already exists", table, key))
            }
            other => FleetError::Storage(other),
        }
    }
}
