//! Per-run execution metrics.
//!
//! Records are keyed by workflow id, then event id. Each (workflow, event)
//! pair is written only by the run that owns it; the collector itself is
//! shared across concurrent runs behind a mutex. Records are kept for the
//! life of the process.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Outcome recorded for a step or a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    /// Run started but not yet sealed (never used for steps)
    Running,
    Success,
    Failure,
}

/// One `StepExecutor::run` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMetric {
    pub step_id: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Always `end_time - start_time`
    pub duration_ms: u64,
    pub status: MetricStatus,
    /// Executions actually attempted (>= 1)
    pub attempts: u32,
    pub error: Option<String>,
}

impl StepMetric {
    pub fn new(
        step_id: String,
        name: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        status: MetricStatus,
        attempts: u32,
    ) -> Self {
        Self {
            step_id,
            name,
            start_time,
            end_time,
            duration_ms: elapsed_ms(start_time, end_time),
            status,
            attempts: attempts.max(1),
            error: None,
        }
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

/// One workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetric {
    pub event_id: String,
    pub start_time: DateTime<Utc>,
    /// Set when the run is sealed
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub status: MetricStatus,
    /// Steps in call order
    pub steps: Vec<StepMetric>,
    pub error: Option<String>,
}

impl WorkflowMetric {
    fn new(event_id: String) -> Self {
        Self {
            event_id,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: 0,
            status: MetricStatus::Running,
            steps: Vec::new(),
            error: None,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.end_time.is_some()
    }

    /// Aggregate statistics over the recorded steps
    pub fn stats(&self) -> WorkflowStats {
        let total_steps = self.steps.len();
        let failed_steps = self
            .steps
            .iter()
            .filter(|s| s.status == MetricStatus::Failure)
            .count();
        let total_attempts: u64 = self.steps.iter().map(|s| u64::from(s.attempts)).sum();
        let total_step_ms: u64 = self.steps.iter().map(|s| s.duration_ms).sum();

        if total_steps == 0 {
            return WorkflowStats {
                total_duration_ms: self.duration_ms,
                ..WorkflowStats::default()
            };
        }

        let n = total_steps as f64;
        WorkflowStats {
            total_steps,
            failed_steps,
            success_rate: (total_steps - failed_steps) as f64 / n,
            total_attempts,
            avg_attempts_per_step: total_attempts as f64 / n,
            avg_step_duration_ms: total_step_ms as f64 / n,
            total_duration_ms: self.duration_ms,
        }
    }
}

/// Statistics derived when a run is sealed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub total_steps: usize,
    pub failed_steps: usize,
    /// Fraction in [0, 1]; 0 when no steps were recorded
    pub success_rate: f64,
    pub total_attempts: u64,
    pub avg_attempts_per_step: f64,
    pub avg_step_duration_ms: f64,
    pub total_duration_ms: u64,
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}

type EventMetrics = HashMap<String, WorkflowMetric>;

/// Process-wide metrics store
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: Mutex<HashMap<String, EventMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, EventMetrics>> {
        // A panic while holding the lock can't leave a record half-written
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a fresh record for `(workflow_id, event_id)`
    pub fn start_workflow(&self, workflow_id: &str, event_id: &str) {
        let mut metrics = self.lock();
        let previous = metrics
            .entry(workflow_id.to_string())
            .or_default()
            .insert(event_id.to_string(), WorkflowMetric::new(event_id.to_string()));

        if previous.is_some() {
            warn!(workflow_id, event_id, "Replacing metrics for restarted event");
        }
        info!(workflow_id, event_id, "Workflow started");
    }

    /// Append a step to an open run. No-op for unknown or sealed runs.
    pub fn record_step(&self, workflow_id: &str, event_id: &str, mut step: StepMetric) {
        let mut metrics = self.lock();
        let Some(metric) = metrics
            .get_mut(workflow_id)
            .and_then(|events| events.get_mut(event_id))
        else {
            debug!(workflow_id, event_id, step = %step.name, "Dropping step for unknown run");
            return;
        };

        if metric.is_sealed() {
            debug!(workflow_id, event_id, step = %step.name, "Dropping step for sealed run");
            return;
        }

        step.duration_ms = elapsed_ms(step.start_time, step.end_time);
        metric.steps.push(step);
    }

    /// Seal a run and log its statistics.
    ///
    /// Returns `None` when the run was never started or is already sealed.
    pub fn end_workflow(
        &self,
        workflow_id: &str,
        event_id: &str,
        run_error: Option<&str>,
    ) -> Option<WorkflowStats> {
        let mut metrics = self.lock();
        let metric = metrics
            .get_mut(workflow_id)
            .and_then(|events| events.get_mut(event_id))?;

        if metric.is_sealed() {
            warn!(workflow_id, event_id, "Workflow already ended");
            return None;
        }

        let end_time = Utc::now();
        metric.end_time = Some(end_time);
        metric.duration_ms = elapsed_ms(metric.start_time, end_time);

        match run_error {
            Some(message) => {
                metric.status = MetricStatus::Failure;
                metric.error = Some(message.to_string());
                error!(workflow_id, event_id, error = message, "Workflow failed");
            }
            None => {
                metric.status = MetricStatus::Success;
                info!(workflow_id, event_id, "Workflow completed successfully");
            }
        }

        let stats = metric.stats();
        info!(
            workflow_id,
            event_id,
            total_steps = stats.total_steps,
            failed_steps = stats.failed_steps,
            success_rate = stats.success_rate,
            total_attempts = stats.total_attempts,
            avg_attempts_per_step = stats.avg_attempts_per_step,
            avg_step_duration_ms = stats.avg_step_duration_ms,
            total_duration_ms = stats.total_duration_ms,
            "Workflow statistics"
        );

        Some(stats)
    }

    pub fn get_workflow_event_metrics(
        &self,
        workflow_id: &str,
        event_id: &str,
    ) -> Option<WorkflowMetric> {
        self.lock()
            .get(workflow_id)
            .and_then(|events| events.get(event_id))
            .cloned()
    }

    pub fn get_all_workflow_event_metrics(&self, workflow_id: &str) -> Vec<WorkflowMetric> {
        self.lock()
            .get(workflow_id)
            .map(|events| events.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_all_workflow_metrics(&self) -> Vec<WorkflowMetric> {
        self.lock()
            .values()
            .flat_map(|events| events.values().cloned())
            .collect()
    }
}
