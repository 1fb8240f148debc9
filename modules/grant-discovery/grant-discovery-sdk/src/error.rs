//! Error types for the grant discovery module.

use thiserror::Error;

/// Errors returned by [`GrantDiscoveryClient`](crate::GrantDiscoveryClient).
///
/// A run that executed and failed is not an error at this level; it is
/// reported through `RunOutcome.success == false`.
#[derive(Debug, Error)]
pub enum GrantDiscoveryError {
    /// Another trigger already claimed this job id.
    #[error("job '{job_id}' was already processed")]
    AlreadyProcessed { job_id: String },

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}
