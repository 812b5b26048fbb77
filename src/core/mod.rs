//! Workflow execution engine.
//!
//! This module contains:
//! - StepExecutor: retried, timed, metered steps
//! - WorkflowRunner: run classification and closing notification
//! - MetricsCollector: per-run execution records
//! - Concurrency: bounded fan-out for step bodies
//! - Similarity: vector similarity math

pub mod concurrency;
pub mod error;
pub mod metrics;
pub mod runner;
pub mod similarity;
pub mod step;

// Re-export commonly used types
pub use concurrency::{run_concurrent_tasks, try_run_concurrent_tasks, ConcurrencyOptions, TaskError};
pub use error::{is_termination, terminate, termination_signal, StepTimeout, TerminationSignal};
pub use metrics::{MetricStatus, MetricsCollector, StepMetric, WorkflowMetric, WorkflowStats};
pub use runner::{RunError, Workflow, WorkflowRunner};
pub use similarity::{cosine_similarity, distance_to_similarity, euclidean_distance, SimilarityError};
pub use step::{Backoff, StepExecutor, StepPolicy};
