//! Content curation pipeline built on the workflow engine.
//!
//! - Deduplicator: drops items already covered by the vector corpus
//! - Ranker: orders items by model-assigned relevance
//! - ArticleWorkflow: scrape, filter, summarize and publish one article
//! - WeeklySchedule: which workflow runs on which day

pub mod article;
pub mod dedup;
pub mod rank;
pub mod schedule;

pub use article::{
    ArticlePolicies, ArticleSettings, ArticleWorkflow, Collaborators, ARTICLE_WORKFLOW_ID,
};
pub use dedup::{DedupOutcome, DedupSettings, Deduplicator, DEFAULT_THRESHOLD};
pub use rank::Ranker;
pub use schedule::{parse_weekday, ScheduleEntry, ScheduleError, WeeklySchedule, WorkflowKind};
