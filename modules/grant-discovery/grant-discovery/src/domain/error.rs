//! Domain errors for grant discovery.

use std::time::Duration;

use grant_discovery_sdk::GrantDiscoveryError;
use sea_orm::DbErr;

use super::snapshot::SnapshotError;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("job '{job_id}' was already processed")]
    AlreadyProcessed { job_id: String },

    #[error("snapshot store did not become reachable within {}ms", .0.as_millis())]
    StartupTimeout(Duration),

    #[error("snapshot store error: {0}")]
    Snapshot(SnapshotError),

    #[error("invalid snapshot payload: {0}")]
    InvalidSnapshot(String),

    /// Fatal: the run transaction is rolled back.
    #[error("persistence error: {0}")]
    Persistence(#[from] DbErr),

    #[error("run aborted by a fault: {0}")]
    Fault(String),
}

impl DomainError {
    #[must_use]
    pub fn invalid_snapshot(message: impl Into<String>) -> Self {
        Self::InvalidSnapshot(message.into())
    }
}

impl From<SnapshotError> for DomainError {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::StartupTimeout(bound) => Self::StartupTimeout(bound),
            other => Self::Snapshot(other),
        }
    }
}

impl From<DomainError> for GrantDiscoveryError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::AlreadyProcessed { job_id } => Self::AlreadyProcessed { job_id },
            other => Self::Internal(other.to_string()),
        }
    }
}
