//! Once-per-job guard for run completion.

use dashmap::DashSet;

/// Job ids that already started synthesis in this process.
///
/// Push notifications and fallback polls may both report completion of the
/// same job; only the first claim proceeds. A failed run keeps its claim.
#[derive(Debug, Default)]
pub struct RunGuard {
    claimed: DashSet<String>,
}

impl RunGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `job_id`. Returns `false` if it was already claimed.
    #[must_use]
    pub fn try_claim(&self, job_id: &str) -> bool {
        self.claimed.insert(job_id.to_owned())
    }

    #[must_use]
    pub fn is_claimed(&self, job_id: &str) -> bool {
        self.claimed.contains(job_id)
    }
}
