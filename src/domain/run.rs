//! Run classification and the per-run report.

use serde::{Deserialize, Serialize};

/// Terminal state of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step completed
    Succeeded,

    /// A step raised a termination signal
    Terminated,

    /// An unrecovered error left the run
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::Terminated => write!(f, "terminated"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Counts for one completed run.
///
/// Built once at the end of the run and returned by value, so concurrent
/// runs never share counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Sources configured for the run
    pub sources: usize,

    /// Sources whose scrape failed
    pub failed_sources: usize,

    /// Items scraped across all sources
    pub scraped: usize,

    /// Items dropped as near-duplicates
    pub duplicates: usize,

    /// Items whose embedding could not be computed
    pub embedding_failures: usize,

    /// Items selected and summarized for the article
    pub processed: usize,

    /// Items whose summarization failed (kept with original fields)
    pub failed_items: usize,

    pub published: bool,

    /// `title: url` for every processed item
    pub links: Vec<String>,
}

impl RunReport {
    /// Total per-item and per-source failures
    pub fn failures(&self) -> usize {
        self.failed_sources + self.embedding_failures + self.failed_items
    }

    pub fn has_failures(&self) -> bool {
        self.failures() > 0
    }

    /// Human-readable body for the completion notification
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Sources: {} ({} failed)", self.sources, self.failed_sources),
            format!("Scraped: {}", self.scraped),
            format!("Duplicates: {}", self.duplicates),
            format!("Embedding failures: {}", self.embedding_failures),
            format!("Processed: {} ({} failed)", self.processed, self.failed_items),
            format!(
                "Published: {}",
                if self.published { "yes" } else { "no" }
            ),
        ];

        if !self.links.is_empty() {
            lines.push(String::new());
            lines.push("Links:".to_string());
            lines.extend(self.links.iter().map(|l| format!("- {}", l)));
        }

        lines.join("\n")
    }
}
