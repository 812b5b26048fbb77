//! Domain types for the curator.
//!
//! This module contains the core data structures:
//! - WorkflowEvent: Identity and parameters of one run
//! - ScrapedContent: Items flowing through the pipeline
//! - VectorRecord: Persisted embeddings
//! - RunReport: Result of a completed run

pub mod content;
pub mod event;
pub mod run;
pub mod vector;

// Re-export commonly used types
pub use content::{RankedItem, ScrapedContent, Source, Summary};
pub use event::{WorkflowEvent, PAYLOAD_MAX_ARTICLES};
pub use run::{RunReport, RunStatus};
pub use vector::{content_hash, VectorRecord, ARTICLE_VECTOR_TYPE};
