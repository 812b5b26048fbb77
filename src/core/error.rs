//! Error taxonomy for workflow runs.
//!
//! Step bodies return `anyhow::Result`. Two typed errors carry meaning for
//! the engine and are recovered with `downcast_ref`:
//! - [`TerminationSignal`]: fatal, never retried, ends the run as terminated
//! - [`StepTimeout`]: an attempt ran past its timeout; retried like any
//!   other failure

use std::time::Duration;

use thiserror::Error;

/// Deliberate abort of a run when further work is pointless
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Workflow terminated: {reason}")]
pub struct TerminationSignal {
    pub reason: String,
}

impl TerminationSignal {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A single step attempt exceeded its timeout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Step '{step}' attempt {attempt} timed out after {timeout:?}")]
pub struct StepTimeout {
    pub step: String,
    pub attempt: u32,
    pub timeout: Duration,
}

/// Find a termination signal anywhere in the error chain
pub fn termination_signal(error: &anyhow::Error) -> Option<&TerminationSignal> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<TerminationSignal>())
}

pub fn is_termination(error: &anyhow::Error) -> bool {
    termination_signal(error).is_some()
}

/// Shorthand for returning a termination from a step body
pub fn terminate<T>(reason: impl Into<String>) -> anyhow::Result<T> {
    Err(TerminationSignal::new(reason).into())
}
