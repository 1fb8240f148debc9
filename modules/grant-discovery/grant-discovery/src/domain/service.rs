use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use grant_discovery_sdk::{Actor, PolicyTemplate, RunRequest};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{info, warn};

use super::audit::{AuditLog, FileAuditLog};
use super::classifier::{TemplateTiers, classify};
use super::coverage::CoverageCache;
use super::error::DomainError;
use super::evaluator::Evaluator;
use super::groups::{AssignmentSummary, GroupAssigner};
use super::guard::RunGuard;
use super::repo::{Catalog, GrantDiscoveryRepository};
use super::snapshot::{LoadReport, SnapshotQuerier, SnapshotStore, SnapshotTables};
use super::synthesizer::{GrantSynthesizer, Pass, PassSummary};
use super::template::{ExpansionScope, ObjectLookup, QueryTask, TemplateEngine};
use crate::config::GrantDiscoveryConfig;

// ============================================================================
// Run Summary
// ============================================================================

/// Everything one completed run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub job_id: String,
    pub load: LoadReport,
    pub super_pass: PassSummary,
    pub action_pass: PassSummary,
    pub object_pass: PassSummary,
    pub groups: AssignmentSummary,
}

impl RunSummary {
    fn totals(&self) -> PassSummary {
        let mut total = PassSummary::default();
        for pass in [&self.super_pass, &self.action_pass, &self.object_pass] {
            total.absorb(pass);
        }
        total
    }

    #[must_use]
    pub fn grants_created(&self) -> usize {
        self.totals().created
    }

    #[must_use]
    pub fn grants_existing(&self) -> usize {
        self.totals().existing
    }

    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "created {} grants ({} already present), {} group assignments",
            self.grants_created(),
            self.grants_existing(),
            self.groups.assigned
        )
    }
}

// ============================================================================
// Service Implementation
// ============================================================================

pub struct Service<R: GrantDiscoveryRepository> {
    db: DatabaseConnection,
    repo: Arc<R>,
    config: GrantDiscoveryConfig,
    engine: TemplateEngine,
    guard: RunGuard,
    audit: Arc<dyn AuditLog>,
}

impl<R: GrantDiscoveryRepository> Service<R> {
    pub fn new(db: DatabaseConnection, repo: Arc<R>, config: GrantDiscoveryConfig) -> Self {
        let audit: Arc<dyn AuditLog> = Arc::new(FileAuditLog::new(config.audit_dir.clone()));
        let engine = TemplateEngine::new(
            config.user_object_kind.clone(),
            config.schema_object_kind.clone(),
        );
        Self {
            db,
            repo,
            config,
            engine,
            guard: RunGuard::new(),
            audit,
        }
    }

    #[must_use]
    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn config(&self) -> &GrantDiscoveryConfig {
        &self.config
    }

    /// The transaction-less connection, for reads outside a run.
    #[must_use]
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    #[must_use]
    pub fn repo(&self) -> &R {
        self.repo.as_ref()
    }

    /// Handle the completion of a snapshot job.
    ///
    /// Only the first call per job id runs. All grant and membership writes
    /// share one transaction that commits only when the whole run succeeds.
    /// The snapshot store is closed on every exit path, including panics.
    ///
    /// # Errors
    ///
    /// - [`DomainError::AlreadyProcessed`] if the job id was claimed before
    /// - [`DomainError::InvalidSnapshot`] if the payload cannot be decoded
    /// - [`DomainError::StartupTimeout`] / [`DomainError::Snapshot`] if the store cannot start
    /// - [`DomainError::Persistence`] if any read, insert or the commit fails
    /// - [`DomainError::Fault`] if the run panicked
    #[tracing::instrument(skip_all, fields(job_id = %request.job_id, connection_id = request.connection_id))]
    pub async fn handle_completion(&self, request: RunRequest) -> Result<RunSummary, DomainError> {
        if !self.guard.try_claim(&request.job_id) {
            info!("Completion already handled; ignoring duplicate trigger");
            return Err(DomainError::AlreadyProcessed {
                job_id: request.job_id,
            });
        }

        let tables = SnapshotTables::decode(&request.snapshot)
            .map_err(|e| DomainError::invalid_snapshot(e.to_string()))?;

        let txn = self.db.begin().await?;
        let catalog = self
            .repo
            .load_catalog(&txn, request.connection_id)
            .await?;

        let store = Arc::new(
            SnapshotStore::start(
                self.config.snapshot_pool_size,
                self.config.snapshot_startup_timeout(),
            )
            .await?,
        );

        let outcome = AssertUnwindSafe(self.run(&request, &catalog, &tables, &store, &txn))
            .catch_unwind()
            .await;
        store.close().await;

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(DomainError::Fault(panic_message(panic.as_ref()))),
        };

        match result {
            Ok(summary) => {
                txn.commit().await?;
                info!(
                    grants_created = summary.grants_created(),
                    grants_existing = summary.grants_existing(),
                    groups_assigned = summary.groups.assigned,
                    "Grant discovery run committed"
                );
                Ok(summary)
            }
            Err(e) => {
                warn!(error = %e, "Grant discovery run failed; rolling back");
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: &RunRequest,
        catalog: &Catalog,
        tables: &SnapshotTables,
        store: &Arc<SnapshotStore>,
        txn: &DatabaseTransaction,
    ) -> Result<RunSummary, DomainError> {
        let load = store.load(tables).await?;
        let tiers = classify(
            catalog.templates.clone(),
            &catalog.list_policies,
            self.config.super_template_id,
        );
        info!(
            actors = catalog.actors.len(),
            databases = catalog.databases.len(),
            super_template = tiers.super_template.is_some(),
            action_wide = tiers.action_wide.len(),
            object_specific = tiers.object_specific.len(),
            "Template catalog classified"
        );

        let coverage = CoverageCache::new();
        let audit = self.audit.open_run(&request.job_id);
        let querier: Arc<dyn SnapshotQuerier> = store.clone();
        let evaluator = Evaluator::new(querier, self.config.evaluator_width());
        let synthesizer = GrantSynthesizer {
            repo: self.repo.as_ref(),
            conn: txn,
            coverage: &coverage,
            audit: audit.as_ref(),
            connection_id: request.connection_id,
        };

        let no_objects = ObjectLookup::default();
        let scope = ExpansionScope {
            databases: &catalog.databases,
            actors: &catalog.actors,
            objects: &no_objects,
        };

        // Pass 1: the reserved super template.
        let tasks = self.general_tasks(&catalog.actors, tiers.super_template.as_slice(), &scope);
        let super_pass = run_pass(Pass::Super, tasks, &evaluator, &synthesizer).await?;

        // Pass 2: list-policy templates, super actors skipped.
        let eligible: Vec<&Actor> = catalog
            .actors
            .iter()
            .filter(|a| !coverage.is_super(a.id))
            .collect();
        let tasks = self.general_tasks(eligible.iter().copied(), &tiers.action_wide, &scope);
        let action_pass = run_pass(Pass::ActionWide, tasks, &evaluator, &synthesizer).await?;

        // Pass 3: the rest, minus actions already granted action-wide.
        let lookup = self.object_lookup(txn, catalog, &tiers).await?;
        let scope = ExpansionScope {
            objects: &lookup,
            ..scope
        };
        let tasks = self.object_tasks(&eligible, &tiers.object_specific, &coverage, &scope);
        let object_pass = run_pass(Pass::ObjectSpecific, tasks, &evaluator, &synthesizer).await?;

        let groups = GroupAssigner {
            repo: self.repo.as_ref(),
            conn: txn,
            coverage: &coverage,
            audit: audit.as_ref(),
            super_group_id: self.config.super_group_id,
        }
        .assign(&catalog.actors, &catalog.list_policies, &catalog.groups)
        .await?;

        Ok(RunSummary {
            job_id: request.job_id.clone(),
            load,
            super_pass,
            action_pass,
            object_pass,
            groups,
        })
    }

    fn general_tasks<'a>(
        &self,
        actors: impl IntoIterator<Item = &'a Actor>,
        templates: &[PolicyTemplate],
        scope: &ExpansionScope<'_>,
    ) -> Vec<QueryTask> {
        actors
            .into_iter()
            .flat_map(|actor| {
                templates
                    .iter()
                    .flat_map(move |t| self.engine.expand_general(t, actor, scope))
            })
            .collect()
    }

    fn object_tasks(
        &self,
        actors: &[&Actor],
        templates: &[PolicyTemplate],
        coverage: &CoverageCache,
        scope: &ExpansionScope<'_>,
    ) -> Vec<QueryTask> {
        let mut tasks = Vec::new();
        for actor in actors {
            for template in templates {
                if coverage.is_action_granted(actor.id, template.action_id) {
                    continue;
                }
                tasks.extend(self.engine.expand_general(template, actor, scope));
                tasks.extend(self.engine.expand_specific(template, actor, scope));
            }
        }
        tasks
    }

    /// Load, once, every object the object-specific tier can expand over.
    async fn object_lookup(
        &self,
        txn: &DatabaseTransaction,
        catalog: &Catalog,
        tiers: &TemplateTiers,
    ) -> Result<ObjectLookup, DomainError> {
        let kinds = self.engine.object_kinds(&tiers.object_specific);
        let database_ids: Vec<i64> = catalog.databases.iter().map(|d| d.id).collect();
        let objects = self.repo.load_objects(txn, &database_ids, &kinds).await?;
        Ok(ObjectLookup::new(objects))
    }
}

/// Evaluate a pass to completion, then synthesize it.
async fn run_pass<R, C>(
    pass: Pass,
    tasks: Vec<QueryTask>,
    evaluator: &Evaluator,
    synthesizer: &GrantSynthesizer<'_, R, C>,
) -> Result<PassSummary, DomainError>
where
    R: GrantDiscoveryRepository,
    C: sea_orm::ConnectionTrait,
{
    let results = evaluator.evaluate(tasks).await;
    let summary = synthesizer.synthesize(pass, results).await?;
    info!(
        pass = pass.name(),
        dispatched = summary.dispatched,
        allowed = summary.allowed,
        denied = summary.denied,
        unmatched = summary.unmatched,
        failed = summary.failed,
        created = summary.created,
        existing = summary.existing,
        "Pass finished"
    );
    Ok(summary)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_owned()
    }
}
