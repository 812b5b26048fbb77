//! Workflow trigger events.
//!
//! An event identifies one run of a workflow and carries its parameters.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Payload key overriding how many articles a run publishes
pub const PAYLOAD_MAX_ARTICLES: &str = "max_articles";

/// One run of a workflow. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    id: String,

    /// Milliseconds since the Unix epoch
    timestamp: i64,

    payload: Map<String, Value>,
}

impl WorkflowEvent {
    /// Create an event with a fresh id and the current timestamp
    pub fn new(payload: Map<String, Value>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), payload)
    }

    pub fn with_id(id: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now().timestamp_millis(),
            payload,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// `max_articles` from the payload, if present and a positive integer
    pub fn max_articles(&self) -> Option<usize> {
        self.payload
            .get(PAYLOAD_MAX_ARTICLES)
            .and_then(Value::as_u64)
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
    }
}

impl Default for WorkflowEvent {
    fn default() -> Self {
        Self::new(Map::new())
    }
}
