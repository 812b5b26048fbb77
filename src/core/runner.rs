//! Workflow runner.
//!
//! Drives one run of a [`Workflow`] for an event: opens its metrics record,
//! executes the workflow body, classifies the outcome as succeeded,
//! terminated or failed, sends the single closing notification, and seals
//! the metrics record.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::adapters::Notifier;
use crate::domain::{RunReport, RunStatus, WorkflowEvent};

use super::error::{termination_signal, TerminationSignal};
use super::metrics::{MetricsCollector, WorkflowStats};
use super::step::StepExecutor;

/// A statically ordered sequence of steps
#[async_trait]
pub trait Workflow: Send + Sync {
    /// Stable identity used to key metrics
    fn id(&self) -> &str;

    /// Run every step for `event` through `step`
    async fn execute(&self, event: &WorkflowEvent, step: &StepExecutor) -> Result<RunReport>;
}

/// How a run ended, when it did not succeed
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Workflow '{workflow}' terminated: {}", .signal.reason)]
    Terminated {
        workflow: String,
        #[source]
        signal: TerminationSignal,
    },

    #[error("Workflow '{workflow}' failed: {error:#}")]
    Failed {
        workflow: String,
        error: anyhow::Error,
    },
}

impl RunError {
    pub fn status(&self) -> RunStatus {
        match self {
            RunError::Terminated { .. } => RunStatus::Terminated,
            RunError::Failed { .. } => RunStatus::Failed,
        }
    }

    fn classify(workflow: &str, error: anyhow::Error) -> Self {
        match termination_signal(&error) {
            Some(signal) => RunError::Terminated {
                workflow: workflow.to_string(),
                signal: signal.clone(),
            },
            None => RunError::Failed {
                workflow: workflow.to_string(),
                error,
            },
        }
    }
}

/// Runs workflows against shared metrics and notifier
pub struct WorkflowRunner {
    metrics: Arc<MetricsCollector>,
    notifier: Arc<dyn Notifier>,
}

impl WorkflowRunner {
    pub fn new(metrics: Arc<MetricsCollector>, notifier: Arc<dyn Notifier>) -> Self {
        Self { metrics, notifier }
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Execute one run.
    ///
    /// Terminated and failed runs are reported and returned as distinct
    /// [`RunError`] variants.
    #[instrument(skip_all, fields(workflow = %workflow.id(), event_id = %event.id()))]
    pub async fn run(
        &self,
        workflow: &dyn Workflow,
        event: &WorkflowEvent,
    ) -> Result<RunReport, RunError> {
        let workflow_id = workflow.id();
        let event_id = event.id();

        self.metrics.start_workflow(workflow_id, event_id);
        info!("Starting workflow run");

        let step = StepExecutor::new(self.metrics.clone(), workflow_id, event_id);
        let outcome = workflow
            .execute(event, &step)
            .await
            .map_err(|e| RunError::classify(workflow_id, e));

        match outcome {
            Ok(report) => {
                self.complete_run(workflow_id, event_id, &report).await;
                Ok(report)
            }
            Err(run_error) => {
                self.handle_run_error(workflow_id, event_id, &run_error)
                    .await;
                Err(run_error)
            }
        }
    }

    async fn complete_run(&self, workflow_id: &str, event_id: &str, report: &RunReport) {
        self.metrics.end_workflow(workflow_id, event_id, None);
        let summary = report.summary();

        if report.has_failures() {
            warn!(failures = report.failures(), "Run completed with failures");
            self.notifier
                .warning("Workflow completed with failures", &summary)
                .await;
        } else {
            info!("Run completed successfully");
            self.notifier.success("Workflow completed", &summary).await;
        }
    }

    async fn handle_run_error(&self, workflow_id: &str, event_id: &str, run_error: &RunError) {
        let message = run_error.to_string();
        let progress = self
            .metrics
            .end_workflow(workflow_id, event_id, Some(&message))
            .map(|stats| step_progress(&stats))
            .unwrap_or_default();

        match run_error {
            RunError::Terminated { signal, .. } => {
                warn!(reason = %signal.reason, "Run terminated");
                let body = format!("{}\n{}", signal.reason, progress);
                self.notifier.warning("Workflow terminated", &body).await;
            }
            RunError::Failed { .. } => {
                error!(error = %message, "Run failed");
                let body = format!("{}\n{}", message, progress);
                self.notifier.error("Workflow failed", &body).await;
            }
        }
    }
}

/// One-line step tally for abort notifications
fn step_progress(stats: &WorkflowStats) -> String {
    format!(
        "steps: {} run, {} failed, {} attempts, {}ms",
        stats.total_steps, stats.failed_steps, stats.total_attempts, stats.total_duration_ms
    )
}
