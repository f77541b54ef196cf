//! Batch Executor
//!
//! Fans one lifecycle operation out over a set of techniques. Every technique
//! gets its own runner on its own task; results come back over a channel
//! sized to the batch and are collected before anything is reported.
//!
//! Workers share nothing but the result channel, so no further
//! synchronization is needed. Techniques run in no particular order, but
//! outcomes are reported in input order, one per input entry.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::domain::errors::{RunnerError, RunnerResult};
use crate::domain::models::{AttackTechnique, RunnerOptions};
use crate::services::runner::Runner;

/// Lifecycle operation applied to every technique of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    WarmUp,
    /// Detonate, optionally chaining a cleanup in the same worker
    Detonate { cleanup: bool },
    Revert,
    CleanUp,
}

impl fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WarmUp => "warmup",
            Self::Detonate { cleanup: false } => "detonate",
            Self::Detonate { cleanup: true } => "detonate+cleanup",
            Self::Revert => "revert",
            Self::CleanUp => "cleanup",
        };
        f.write_str(name)
    }
}

/// Builds the runner for one technique of a batch.
#[async_trait]
pub trait RunnerFactory: Send + Sync {
    async fn create(&self, technique: Arc<AttackTechnique>, options: RunnerOptions) -> Runner;
}

/// Result of one technique's operation.
#[derive(Debug)]
pub struct TechniqueOutcome {
    pub technique_id: String,
    /// Correlation identifier of the runner, if one was built
    pub execution_id: Option<String>,
    pub result: RunnerResult<()>,
}

impl TechniqueOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// All outcomes of a batch, one per technique.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<TechniqueOutcome>,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &RunnerError)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Ok(()) => None,
            Err(err) => Some((o.technique_id.as_str(), err)),
        })
    }

    pub fn was_cancelled(&self) -> bool {
        self.failures().any(|(_, err)| err.is_cancelled())
    }

    /// Log one line per failed technique. Cancellations are reported as
    /// aborted without the underlying message.
    pub fn log_failures(&self) {
        for (technique_id, err) in self.failures() {
            if err.is_cancelled() {
                warn!(technique_id, "aborted");
            } else {
                error!(technique_id, "{err}");
            }
        }
    }
}

/// Runs one operation across a batch of techniques concurrently.
pub struct BatchExecutor {
    factory: Arc<dyn RunnerFactory>,
}

impl BatchExecutor {
    pub fn new(factory: Arc<dyn RunnerFactory>) -> Self {
        Self { factory }
    }

    /// Run `operation` for every technique, one worker per technique.
    ///
    /// Returns once every worker has reported. A worker that dies without
    /// reporting is recorded as [`RunnerError::WorkerAborted`].
    pub async fn execute(
        &self,
        techniques: &[Arc<AttackTechnique>],
        operation: BatchOperation,
        options: &RunnerOptions,
    ) -> BatchReport {
        let worker_count = techniques.len();
        if worker_count == 0 {
            return BatchReport::default();
        }

        info!(%operation, techniques = worker_count, "starting batch");

        let (tx, mut rx) = mpsc::channel::<(usize, TechniqueOutcome)>(worker_count);

        for (index, technique) in techniques.iter().enumerate() {
            let tx = tx.clone();
            let factory = Arc::clone(&self.factory);
            let technique = Arc::clone(technique);
            let options = options.clone();

            tokio::spawn(async move {
                let technique_id = technique.id.clone();
                let mut runner = factory.create(technique, options).await;
                let execution_id = runner.execution_id();
                let result = run_operation(&mut runner, operation).await;

                let outcome = TechniqueOutcome {
                    technique_id,
                    execution_id: Some(execution_id),
                    result,
                };
                // Capacity equals the batch size, so this never waits.
                let _ = tx.send((index, outcome)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<TechniqueOutcome>> = (0..worker_count).map(|_| None).collect();
        while let Some((index, outcome)) = rx.recv().await {
            slots[index] = Some(outcome);
        }

        // A worker that panicked never reported.
        let outcomes = slots
            .into_iter()
            .zip(techniques)
            .map(|(slot, technique)| {
                slot.unwrap_or_else(|| TechniqueOutcome {
                    technique_id: technique.id.clone(),
                    execution_id: None,
                    result: Err(RunnerError::WorkerAborted {
                        technique_id: technique.id.clone(),
                    }),
                })
            })
            .collect();

        let report = BatchReport { outcomes };
        info!(
            %operation,
            failed = report.failures().count(),
            total = worker_count,
            "batch finished"
        );
        report
    }
}

async fn run_operation(runner: &mut Runner, operation: BatchOperation) -> RunnerResult<()> {
    match operation {
        BatchOperation::WarmUp => runner.warm_up().await.map(|_| ()),
        BatchOperation::Detonate { cleanup: false } => runner.detonate().await,
        BatchOperation::Detonate { cleanup: true } => {
            let detonated = runner.detonate().await;
            let cleaned = runner.clean_up().await;
            coalesce(runner.technique().id.as_str(), detonated, cleaned)
        }
        BatchOperation::Revert => runner.revert().await,
        BatchOperation::CleanUp => runner.clean_up().await,
    }
}

/// First error wins; when both steps failed the second is logged.
fn coalesce(technique_id: &str, first: RunnerResult<()>, second: RunnerResult<()>) -> RunnerResult<()> {
    match (first, second) {
        (Err(first), Err(second)) => {
            if !second.is_cancelled() {
                error!(technique_id, "{second}");
            }
            Err(first)
        }
        (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
        (Ok(()), Ok(())) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Platform;
    use crate::infrastructure::mock::{InMemoryStateStore, MockProvisioner};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Hands out in-memory runners and keeps their stores for inspection.
    #[derive(Default)]
    struct InMemoryFactory {
        provisioner: Arc<MockProvisioner>,
        stores: Mutex<HashMap<String, Arc<InMemoryStateStore>>>,
    }

    impl InMemoryFactory {
        fn store(&self, id: &str) -> Arc<InMemoryStateStore> {
            Arc::clone(
                self.stores
                    .lock()
                    .unwrap()
                    .entry(id.to_string())
                    .or_insert_with(|| Arc::new(InMemoryStateStore::new(id))),
            )
        }
    }

    #[async_trait]
    impl RunnerFactory for InMemoryFactory {
        async fn create(&self, technique: Arc<AttackTechnique>, options: RunnerOptions) -> Runner {
            let store = self.store(&technique.id);
            Runner::new(
                technique,
                options,
                Uuid::new_v4(),
                self.provisioner.clone(),
                store,
            )
            .await
        }
    }

    fn technique(id: &str, fails: bool) -> Arc<AttackTechnique> {
        Arc::new(
            AttackTechnique::new(id, Platform::Aws, move |_, _| {
                if fails {
                    anyhow::bail!("AccessDenied");
                }
                Ok(())
            })
            .with_prerequisites("code"),
        )
    }

    #[tokio::test]
    async fn test_one_failing_technique_fails_the_batch() {
        let factory = Arc::new(InMemoryFactory::default());
        let executor = BatchExecutor::new(factory.clone());
        let techniques = vec![
            technique("aws.ok-1", false),
            technique("aws.broken", true),
            technique("aws.ok-2", false),
        ];

        let report = executor
            .execute(&techniques, BatchOperation::Detonate { cleanup: false }, &RunnerOptions::default())
            .await;

        assert_eq!(report.outcomes.len(), 3);
        assert!(report.has_failures());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "aws.broken");
        assert!(matches!(failures[0].1, RunnerError::Detonation { .. }));
        assert!(report
            .outcomes
            .iter()
            .filter(|o| o.technique_id != "aws.broken")
            .all(TechniqueOutcome::is_success));
    }

    #[tokio::test]
    async fn test_every_runner_gets_its_own_execution_id() {
        let factory = Arc::new(InMemoryFactory::default());
        let executor = BatchExecutor::new(factory);
        let techniques: Vec<_> = (0..5).map(|i| technique(&format!("aws.t{i}"), false)).collect();

        let report = executor
            .execute(&techniques, BatchOperation::WarmUp, &RunnerOptions::default())
            .await;

        assert!(!report.has_failures());
        let ids: HashSet<_> = report
            .outcomes
            .iter()
            .filter_map(|o| o.execution_id.clone())
            .collect();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn test_detonate_with_cleanup_returns_to_cold() {
        let factory = Arc::new(InMemoryFactory::default());
        let executor = BatchExecutor::new(factory.clone());
        let techniques = vec![technique("aws.t1", false)];

        let report = executor
            .execute(&techniques, BatchOperation::Detonate { cleanup: true }, &RunnerOptions::default())
            .await;

        assert!(!report.has_failures());
        assert_eq!(factory.provisioner.apply_calls(), 1);
        assert_eq!(factory.provisioner.destroy_calls(), 1);
        assert_eq!(factory.store("aws.t1").cleanups(), 1);
    }

    #[tokio::test]
    async fn test_detonate_with_cleanup_reports_detonation_error_first() {
        let factory = Arc::new(InMemoryFactory::default());
        let executor = BatchExecutor::new(factory.clone());
        let techniques = vec![technique("aws.broken", true)];

        let report = executor
            .execute(&techniques, BatchOperation::Detonate { cleanup: true }, &RunnerOptions::default())
            .await;

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].1, RunnerError::Detonation { .. }));
        // Cleanup still ran after the failed detonation.
        assert_eq!(factory.provisioner.destroy_calls(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_of_cold_techniques_reports_each_failure() {
        let factory = Arc::new(InMemoryFactory::default());
        let executor = BatchExecutor::new(factory);
        let techniques = vec![technique("aws.a", false), technique("aws.b", false)];

        let report = executor
            .execute(&techniques, BatchOperation::CleanUp, &RunnerOptions::default())
            .await;

        let failed: HashSet<_> = report.failures().map(|(id, _)| id.to_string()).collect();
        assert_eq!(failed, HashSet::from(["aws.a".to_string(), "aws.b".to_string()]));
        assert!(report.failures().all(|(_, err)| err.is_guard_violation()));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let executor = BatchExecutor::new(Arc::new(InMemoryFactory::default()));

        let report = executor
            .execute(&[], BatchOperation::WarmUp, &RunnerOptions::default())
            .await;

        assert!(report.outcomes.is_empty());
        assert!(!report.has_failures());
    }

    /// Factory whose second `create` call panics, killing that worker.
    #[derive(Default)]
    struct PanicOnSecondCreate {
        inner: InMemoryFactory,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RunnerFactory for PanicOnSecondCreate {
        async fn create(&self, technique: Arc<AttackTechnique>, options: RunnerOptions) -> Runner {
            assert!(
                self.calls.fetch_add(1, Ordering::SeqCst) != 1,
                "runner construction failed"
            );
            self.inner.create(technique, options).await
        }
    }

    #[tokio::test]
    async fn test_lost_worker_is_reported_even_with_duplicate_ids() {
        let executor = BatchExecutor::new(Arc::new(PanicOnSecondCreate::default()));
        let techniques = vec![technique("aws.t1", false), technique("aws.t1", false)];

        let report = executor
            .execute(&techniques, BatchOperation::WarmUp, &RunnerOptions::default())
            .await;

        assert_eq!(report.outcomes.len(), 2);
        let aborted: Vec<_> = report
            .outcomes
            .iter()
            .filter(|o| matches!(o.result, Err(RunnerError::WorkerAborted { .. })))
            .collect();
        assert_eq!(aborted.len(), 1);
        assert_eq!(aborted[0].technique_id, "aws.t1");
        assert!(aborted[0].execution_id.is_none());
        assert_eq!(report.outcomes.iter().filter(|o| o.is_success()).count(), 1);
    }

    #[test]
    fn test_coalesce_prefers_first_error() {
        let first = Err(RunnerError::Configuration("first".to_string()));
        let second = Err(RunnerError::Configuration("second".to_string()));

        let err = coalesce("aws.t1", first, second).unwrap_err();
        assert_eq!(err.to_string(), "first");

        let err = coalesce("aws.t1", Ok(()), Err(RunnerError::Cancelled)).unwrap_err();
        assert!(err.is_cancelled());
        assert!(coalesce("aws.t1", Ok(()), Ok(())).is_ok());
    }
}
