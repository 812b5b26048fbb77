//! curator - AI content curation workflows
//!
//! Scrapes configured sources, drops items already covered by earlier
//! articles, ranks and summarizes what is left, and publishes the result
//! as a single article.
//!
//! # Architecture
//!
//! The system is built around a small workflow engine:
//! - A workflow is a fixed sequence of named steps
//! - Every step runs under an explicit retry/backoff/timeout policy
//! - A step can end the run early with a termination signal
//! - Each run is recorded in a process-wide metrics store
//!
//! # Modules
//!
//! - `adapters`: Collaborator traits and concrete clients (embeddings,
//!   SQLite vector store, Bark notifications)
//! - `core`: Workflow engine (StepExecutor, WorkflowRunner, metrics,
//!   concurrency, similarity)
//! - `domain`: Data structures (WorkflowEvent, ScrapedContent, RunReport)
//! - `pipeline`: Deduplication, ranking, the article workflow and the
//!   weekly schedule
//! - `config`: Config file and environment resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Show resolved configuration
//! curator config
//!
//! # Which workflow runs on Saturday
//! curator schedule --day sat
//!
//! # Vector corpus counts
//! curator vectors
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod pipeline;

// Re-export main types at crate root for convenience
pub use crate::core::{
    MetricsCollector, RunError, StepExecutor, StepPolicy, TerminationSignal, Workflow,
    WorkflowRunner,
};
pub use domain::{RunReport, RunStatus, ScrapedContent, WorkflowEvent};
pub use pipeline::{ArticleWorkflow, Collaborators, WeeklySchedule, WorkflowKind};
