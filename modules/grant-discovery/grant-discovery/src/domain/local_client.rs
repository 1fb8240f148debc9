//! Local (in-process) client for grant discovery.

use std::sync::Arc;

use async_trait::async_trait;
use grant_discovery_sdk::{GrantDiscoveryClient, GrantDiscoveryError, RunOutcome, RunRequest};

use super::repo::GrantDiscoveryRepository;
use super::service::{RunSummary, Service};
use super::DomainError;

/// Local client wrapping the service.
///
/// The push notification and the fallback poll both call [`complete`]; the
/// service admits only the first call per job id.
///
/// [`complete`]: GrantDiscoveryClient::complete
pub struct GrantDiscoveryLocalClient<R: GrantDiscoveryRepository> {
    svc: Arc<Service<R>>,
}

impl<R: GrantDiscoveryRepository> GrantDiscoveryLocalClient<R> {
    #[must_use]
    pub fn new(svc: Arc<Service<R>>) -> Self {
        Self { svc }
    }
}

/// Map a finished run to the completion signal.
///
/// Run failures are reported through `success == false`; only a repeated
/// trigger surfaces as an error.
///
/// # Errors
///
/// Returns [`GrantDiscoveryError::AlreadyProcessed`] for a job that already ran.
pub fn outcome_from_result(
    job_id: &str,
    result: Result<RunSummary, DomainError>,
) -> Result<RunOutcome, GrantDiscoveryError> {
    match result {
        Ok(summary) => Ok(RunOutcome {
            job_id: job_id.to_owned(),
            success: true,
            message: summary.message(),
            grants_created: summary.grants_created(),
            grants_existing: summary.grants_existing(),
            groups_assigned: summary.groups.assigned,
        }),
        Err(e @ DomainError::AlreadyProcessed { .. }) => Err(e.into()),
        Err(e) => {
            tracing::error!(job_id, error = %e, "grant discovery run failed");
            Ok(RunOutcome::failed(job_id, e.to_string()))
        }
    }
}

#[async_trait]
impl<R: GrantDiscoveryRepository + 'static> GrantDiscoveryClient for GrantDiscoveryLocalClient<R> {
    async fn complete(&self, request: RunRequest) -> Result<RunOutcome, GrantDiscoveryError> {
        let job_id = request.job_id.clone();
        let result = self.svc.handle_completion(request).await;
        outcome_from_result(&job_id, result)
    }
}
