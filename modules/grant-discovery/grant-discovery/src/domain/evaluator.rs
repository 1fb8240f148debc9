//! Bounded-width execution of one pass worth of probe tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;
use futures::stream;
use tracing::{debug, warn};

use super::snapshot::SnapshotQuerier;
use super::template::QueryTask;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutput {
    /// First-row/first-column scalar, `"NULL"` when absent.
    Value(String),
    /// The probe errored or its worker faulted; no decision.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub task: QueryTask,
    pub output: ProbeOutput,
}

impl ProbeResult {
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match &self.output {
            ProbeOutput::Value(v) => Some(v),
            ProbeOutput::Failed(_) => None,
        }
    }
}

pub struct Evaluator {
    querier: Arc<dyn SnapshotQuerier>,
    width: usize,
    dispatched: AtomicUsize,
}

impl Evaluator {
    #[must_use]
    pub fn new(querier: Arc<dyn SnapshotQuerier>, width: usize) -> Self {
        Self {
            querier,
            width: width.max(1),
            dispatched: AtomicUsize::new(0),
        }
    }

    /// Run every task and return once all of them have reported.
    ///
    /// Result order is unspecified. Failures and worker panics become
    /// [`ProbeOutput::Failed`] entries; nothing is retried.
    pub async fn evaluate(&self, tasks: Vec<QueryTask>) -> Vec<ProbeResult> {
        if tasks.is_empty() {
            return Vec::new();
        }
        self.dispatched.fetch_add(tasks.len(), Ordering::Relaxed);

        stream::iter(tasks)
            .map(|task| {
                let querier = Arc::clone(&self.querier);
                async move {
                    let sql = task.sql.clone();
                    let handle = tokio::spawn(async move { querier.probe(&sql).await });

                    let output = match handle.await {
                        Ok(Ok(value)) => {
                            debug!(key = %task.key, output = %value, "Probe finished");
                            ProbeOutput::Value(value)
                        }
                        Ok(Err(e)) => {
                            warn!(key = %task.key, error = %e, "Probe failed");
                            ProbeOutput::Failed(e.to_string())
                        }
                        Err(e) => {
                            warn!(key = %task.key, error = %e, "Probe worker faulted");
                            ProbeOutput::Failed(format!("worker fault: {e}"))
                        }
                    };
                    ProbeResult { task, output }
                }
            })
            .buffer_unordered(self.width)
            .collect()
            .await
    }

    /// Total number of tasks handed to [`Self::evaluate`] so far.
    #[must_use]
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::domain::snapshot::SnapshotError;
    use crate::domain::template::{ProbeKind, TaskKey};

    /// Answers from the SQL text itself and tracks peak concurrency.
    struct ScriptedQuerier {
        in_flight: AtomicUsize,
        peak: Mutex<usize>,
    }

    #[async_trait]
    impl SnapshotQuerier for ScriptedQuerier {
        async fn probe(&self, sql: &str) -> Result<String, SnapshotError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            {
                let mut peak = self.peak.lock();
                *peak = (*peak).max(now);
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match sql {
                "panic" => panic!("probe blew up"),
                "fail" => Err(SnapshotError::QueryFailed("no such table".to_owned())),
                other => Ok(other.to_owned()),
            }
        }
    }

    fn task(n: i64, sql: &str) -> QueryTask {
        QueryTask {
            key: TaskKey {
                probe: ProbeKind::General,
                template_id: n,
                actor_id: 1,
                database_id: -1,
                object_id: -1,
            },
            sql: sql.to_owned(),
            action_id: 1,
            expected_allow: "Y".to_owned(),
            expected_deny: "N".to_owned(),
        }
    }

    fn querier() -> Arc<ScriptedQuerier> {
        Arc::new(ScriptedQuerier {
            in_flight: AtomicUsize::new(0),
            peak: Mutex::new(0),
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_task_reports_within_the_width_bound() {
        let querier = querier();
        let evaluator = Evaluator::new(querier.clone(), 3);

        let tasks: Vec<_> = (0..20).map(|n| task(n, "Y")).collect();
        let results = evaluator.evaluate(tasks).await;

        assert_eq!(results.len(), 20);
        assert!(results.iter().all(|r| r.value() == Some("Y")));
        assert!(*querier.peak.lock() <= 3);
        assert_eq!(evaluator.dispatched(), 20);
    }

    #[tokio::test]
    async fn failures_and_panics_are_isolated_per_task() {
        let evaluator = Evaluator::new(querier(), 2);
        let results = evaluator
            .evaluate(vec![task(1, "Y"), task(2, "fail"), task(3, "panic"), task(4, "N")])
            .await;

        let mut by_template: Vec<(i64, Option<&str>)> = results
            .iter()
            .map(|r| (r.task.key.template_id, r.value()))
            .collect();
        by_template.sort_unstable();
        assert_eq!(
            by_template,
            vec![(1, Some("Y")), (2, None), (3, None), (4, Some("N"))]
        );
    }

    #[tokio::test]
    async fn empty_batch_dispatches_nothing() {
        let evaluator = Evaluator::new(querier(), 0);
        assert!(evaluator.evaluate(Vec::new()).await.is_empty());
        assert_eq!(evaluator.dispatched(), 0);
    }
}
