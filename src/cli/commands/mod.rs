//! CLI command implementations.

pub mod cleanup;
pub mod detonate;
pub mod list;
pub mod revert;
pub mod status;
pub mod warmup;

use anyhow::Result;
use console::style;
use std::sync::Arc;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{AttackTechnique, RunnerOptions};
use crate::infrastructure::FileSystemRunnerFactory;
use crate::services::{BatchExecutor, BatchOperation, BatchReport, TechniqueRegistry};

/// Everything a command needs, built once per invocation.
pub struct CommandContext {
    pub registry: Arc<TechniqueRegistry>,
    pub factory: Arc<FileSystemRunnerFactory>,
    pub json_mode: bool,
}

impl CommandContext {
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<Arc<AttackTechnique>>> {
        Ok(self.registry.resolve(ids)?)
    }

    /// Run a batch and print one line per technique.
    pub async fn run_batch(
        &self,
        techniques: &[Arc<AttackTechnique>],
        operation: BatchOperation,
        options: &RunnerOptions,
    ) -> Result<BatchReport> {
        let executor = BatchExecutor::new(self.factory.clone());
        let report = executor.execute(techniques, operation, options).await;
        report.log_failures();
        output(&BatchOutput::new(operation, &report), self.json_mode);
        Ok(report)
    }
}

/// Turn a report into the command's exit status.
pub fn ensure_success(report: &BatchReport) -> Result<()> {
    let failed = report.failures().count();
    if failed == 0 {
        return Ok(());
    }
    if report.was_cancelled() {
        anyhow::bail!("interrupted, {failed} of {} technique(s) did not complete", report.outcomes.len());
    }
    anyhow::bail!("{failed} of {} technique(s) failed", report.outcomes.len())
}

#[derive(Debug, serde::Serialize)]
pub struct OutcomeOutput {
    pub technique_id: String,
    pub execution_id: Option<String>,
    pub status: &'static str,
    pub error: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct BatchOutput {
    pub operation: String,
    pub outcomes: Vec<OutcomeOutput>,
    pub failed: usize,
}

impl BatchOutput {
    pub fn new(operation: BatchOperation, report: &BatchReport) -> Self {
        let mut outcomes: Vec<OutcomeOutput> = report
            .outcomes
            .iter()
            .map(|outcome| {
                let (status, error) = match &outcome.result {
                    Ok(()) => ("ok", None),
                    Err(err) if err.is_cancelled() => ("aborted", None),
                    Err(err) => ("failed", Some(err.to_string())),
                };
                OutcomeOutput {
                    technique_id: outcome.technique_id.clone(),
                    execution_id: outcome.execution_id.clone(),
                    status,
                    error,
                }
            })
            .collect();
        outcomes.sort_by(|a, b| a.technique_id.cmp(&b.technique_id));

        Self {
            operation: operation.to_string(),
            failed: report.failures().count(),
            outcomes,
        }
    }
}

impl CommandOutput for BatchOutput {
    fn to_human(&self) -> String {
        self.outcomes
            .iter()
            .map(|o| {
                let marker = match o.status {
                    "ok" => style("✓").green(),
                    "aborted" => style("!").yellow(),
                    _ => style("✗").red(),
                };
                match &o.error {
                    Some(error) => format!("{marker} {} {}: {error}", self.operation, o.technique_id),
                    None if o.status == "aborted" => {
                        format!("{marker} {} {}: aborted", self.operation, o.technique_id)
                    }
                    None => format!("{marker} {} {}", self.operation, o.technique_id),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
