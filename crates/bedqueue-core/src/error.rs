//! Engine error taxonomy.

use thiserror::Error;

use crate::db::DbError;
use crate::onboarding::ValidationErrors;

/// Errors returned by the identity, onboarding, catalog and allocation
/// components. The engine never retries; the caller decides.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Stage fields failed format rules. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Local profile storage cannot produce an identity. Fatal for the session.
    #[error("Identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// Storage-layer failure on a read or write.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The identity already holds a waiting or offered interest.
    #[error("Allocation conflict: {client_uuid} already holds an active interest")]
    AllocationConflict { client_uuid: String },

    /// Allocation attempted before onboarding completed.
    #[error("Not onboarded: {0}")]
    NotOnboarded(String),

    /// The unit does not exist or is not open.
    #[error("Unit unavailable: {0}")]
    UnitUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<DbError> for EngineError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::AllocationConflict(client_uuid) => {
                EngineError::AllocationConflict { client_uuid }
            }
            DbError::UnitUnavailable(unit_id) => EngineError::UnitUnavailable(unit_id),
            DbError::NotFound(what) => EngineError::NotFound(what),
            other => EngineError::StoreUnavailable(other.to_string()),
        }
    }
}
