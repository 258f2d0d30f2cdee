//! Engine error types.
//!
//! Every failure is expected and recoverable by the caller; nothing here is fatal.

use thiserror::Error;

use crate::types::{IncidentId, IncidentStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The referenced incident does not exist.
    #[error("Incident not found: {0}")]
    NotFound(IncidentId),

    /// The incident's current status does not permit the requested transition.
    #[error("Invalid state: cannot {action} incident {id} while it is {status}")]
    InvalidState {
        id: IncidentId,
        status: IncidentStatus,
        action: &'static str,
    },
}

impl Error {
    /// Stable numeric code, for callers that report errors over the wire.
    pub fn code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1,
            Self::NotFound(_) => 2,
            Self::InvalidState { .. } => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
