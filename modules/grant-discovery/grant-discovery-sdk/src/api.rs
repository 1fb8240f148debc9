//! Public API trait for grant discovery.

use async_trait::async_trait;

use crate::error::GrantDiscoveryError;
use crate::models::{RunOutcome, RunRequest};

/// Public API trait consumed by the job/callback layer.
///
/// Both the push notification and the fallback poll call [`complete`]
/// for the same job; only the first call for a job id runs the inference.
///
/// ```ignore
/// let outcome = client.complete(request).await?;
/// ```
///
/// [`complete`]: GrantDiscoveryClient::complete
#[async_trait]
pub trait GrantDiscoveryClient: Send + Sync {
    /// Run inference for a completed snapshot fetch.
    ///
    /// A failed run is reported as `Ok(RunOutcome { success: false, .. })`.
    ///
    /// # Errors
    ///
    /// - `AlreadyProcessed` if the job id was already claimed by another trigger
    /// - `Internal` for unexpected infrastructure errors
    async fn complete(&self, request: RunRequest) -> Result<RunOutcome, GrantDiscoveryError>;
}
