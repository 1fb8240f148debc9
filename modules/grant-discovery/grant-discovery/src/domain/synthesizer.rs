//! Turns allowed probe results into grants and coverage marks.

use sea_orm::ConnectionTrait;
use tracing::debug;

use super::audit::{self, AuditEvent, AuditSink};
use super::coverage::CoverageCache;
use super::decision::{Decision, decide};
use super::error::DomainError;
use super::evaluator::{ProbeOutput, ProbeResult};
use super::repo::{DuplicateScope, GrantDiscoveryRepository, GrantKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Super,
    ActionWide,
    ObjectSpecific,
}

impl Pass {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Super => "super",
            Self::ActionWide => "action_wide",
            Self::ObjectSpecific => "object_specific",
        }
    }

    /// Object-specific grants are deduplicated without connection scoping.
    #[must_use]
    pub fn duplicate_scope(self) -> DuplicateScope {
        match self {
            Self::Super | Self::ActionWide => DuplicateScope::Connection,
            Self::ObjectSpecific => DuplicateScope::Global,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub dispatched: usize,
    pub allowed: usize,
    pub denied: usize,
    pub unmatched: usize,
    pub failed: usize,
    pub created: usize,
    pub existing: usize,
}

impl PassSummary {
    pub fn absorb(&mut self, other: &Self) {
        self.dispatched += other.dispatched;
        self.allowed += other.allowed;
        self.denied += other.denied;
        self.unmatched += other.unmatched;
        self.failed += other.failed;
        self.created += other.created;
        self.existing += other.existing;
    }
}

pub struct GrantSynthesizer<'a, R, C> {
    pub repo: &'a R,
    /// The run transaction; every insert goes through it.
    pub conn: &'a C,
    pub coverage: &'a CoverageCache,
    pub audit: &'a dyn AuditSink,
    pub connection_id: i64,
}

impl<R, C> GrantSynthesizer<'_, R, C>
where
    R: GrantDiscoveryRepository,
    C: ConnectionTrait,
{
    /// Decide every result of a completed pass and persist the allowed ones.
    ///
    /// Results are processed sequentially so the write path stays
    /// single-threaded. A duplicate counts as success for coverage marking.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Persistence`] on the first failed lookup or
    /// insert; the caller must abandon the run transaction.
    pub async fn synthesize(
        &self,
        pass: Pass,
        mut results: Vec<ProbeResult>,
    ) -> Result<PassSummary, DomainError> {
        // Deterministic insert order regardless of completion order.
        results.sort_by_key(|r| {
            let k = r.task.key;
            (k.actor_id, k.template_id, k.database_id, k.object_id)
        });

        let mut summary = PassSummary {
            dispatched: results.len(),
            ..PassSummary::default()
        };

        for result in &results {
            let output = match &result.output {
                ProbeOutput::Value(v) => v,
                ProbeOutput::Failed(_) => {
                    summary.failed += 1;
                    continue;
                }
            };

            let task = &result.task;
            match decide(output, &task.expected_allow, &task.expected_deny) {
                Decision::Deny => {
                    summary.denied += 1;
                    continue;
                }
                Decision::Unmatched => {
                    summary.unmatched += 1;
                    audit::record(
                        self.audit,
                        &AuditEvent::Unmatched {
                            key: task.key,
                            sql: task.sql.clone(),
                            output: output.clone(),
                        },
                    );
                    continue;
                }
                Decision::Allow => summary.allowed += 1,
            }

            let key = GrantKey {
                connection_id: self.connection_id,
                template_id: task.key.template_id,
                database_id: task.key.database_id,
                actor_id: task.key.actor_id,
                object_id: task.key.object_id,
            };
            self.coverage
                .mark_template_allowed(key.actor_id, key.template_id);

            let existing = self
                .repo
                .find_enabled_grant(self.conn, &key, pass.duplicate_scope())
                .await?;
            let inserted = if existing.is_some() {
                false
            } else {
                self.repo.insert_grant(self.conn, &key).await?.is_some()
            };

            if inserted {
                audit::record(
                    self.audit,
                    &AuditEvent::GrantInserted {
                        actor_id: key.actor_id,
                        template_id: key.template_id,
                        database_id: key.database_id,
                        object_id: key.object_id,
                    },
                );
                summary.created += 1;
            } else {
                debug!(key = %task.key, "Grant already present");
                summary.existing += 1;
            }

            match pass {
                Pass::Super => self.coverage.mark_super(key.actor_id),
                Pass::ActionWide => self
                    .coverage
                    .mark_action_granted(key.actor_id, task.action_id),
                Pass::ObjectSpecific => {}
            }
        }

        Ok(summary)
    }
}
