//! Interfaces for external collaborators.
//!
//! The workflow engine only talks to scrapers, models, stores and
//! publishers through these traits. Concrete clients live in the
//! submodules; anything not implemented here is supplied by the caller.

pub mod bark;
pub mod embedding;
pub mod sqlite;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::domain::{RankedItem, ScrapedContent, Source, Summary, VectorRecord};

pub use bark::{BarkConfig, BarkNotifier};
pub use embedding::{EmbeddingConfig, OpenAiEmbeddingProvider};
pub use sqlite::{SqliteVectorStore, VectorStats};

/// Lists the sources a workflow should scrape
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    async fn sources(&self) -> Result<Vec<Source>>;
}

/// Fetches content from one source
#[async_trait]
pub trait ContentScraper: Send + Sync {
    /// Scrape `source` (a URL, handle, or feed identifier)
    async fn scrape(&self, source: &str) -> Result<Vec<ScrapedContent>>;
}

/// Result of an embedding call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub embedding: Vec<f32>,
    pub model: String,
    pub dimensions: usize,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn create_embedding(&self, text: &str) -> Result<Embedding>;
}

/// Language-model summarization
#[async_trait]
pub trait ContentSummarizer: Send + Sync {
    async fn summarize(&self, content: &str, options: &Map<String, Value>) -> Result<Summary>;

    async fn generate_title(&self, content: &str, options: &Map<String, Value>) -> Result<String>;
}

/// Language-model relevance scoring
#[async_trait]
pub trait ContentScorer: Send + Sync {
    /// Score `items`; results are matched back to content by id
    async fn score(&self, items: &[ScrapedContent]) -> Result<Vec<RankedItem>>;
}

/// Turns processed items into a publishable article body
#[async_trait]
pub trait ArticleRenderer: Send + Sync {
    async fn render(&self, items: &[ScrapedContent]) -> Result<String>;
}

/// Produces a cover image URL for an article title
#[async_trait]
pub trait CoverImageProvider: Send + Sync {
    async fn cover_url(&self, title: &str) -> Result<String>;
}

/// Outcome reported by the publishing platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishStatus {
    pub status: String,
}

#[async_trait]
pub trait ContentPublisher: Send + Sync {
    /// Upload an image by URL and return its media id
    async fn upload_image(&self, url: &str) -> Result<String>;

    async fn publish(
        &self,
        html: &str,
        title: &str,
        subtitle: &str,
        media_id: &str,
    ) -> Result<PublishStatus>;
}

/// Durable embedding storage
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn get_by_type(&self, vector_type: &str) -> Result<Vec<VectorRecord>>;

    async fn create_batch(&self, records: Vec<VectorRecord>) -> Result<()>;
}

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Upper bound on a single best-effort delivery
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Push notifications to the operator.
///
/// Delivery is best effort: the provided helpers log and swallow failures
/// and give up after [`Notifier::delivery_timeout`], so a broken or hung
/// notifier never aborts or stalls a run.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, level: NotifyLevel, title: &str, body: &str) -> Result<()>;

    fn delivery_timeout(&self) -> Duration {
        NOTIFY_TIMEOUT
    }

    async fn notify(&self, level: NotifyLevel, title: &str, body: &str) {
        let limit = self.delivery_timeout();
        match tokio::time::timeout(limit, self.send(level, title, body)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(?level, title, error = %e, "Notification delivery failed"),
            Err(_) => warn!(
                ?level,
                title,
                timeout_ms = limit.as_millis() as u64,
                "Notification delivery timed out"
            ),
        }
    }

    async fn info(&self, title: &str, body: &str) {
        self.notify(NotifyLevel::Info, title, body).await
    }

    async fn success(&self, title: &str, body: &str) {
        self.notify(NotifyLevel::Success, title, body).await
    }

    async fn warning(&self, title: &str, body: &str) {
        self.notify(NotifyLevel::Warning, title, body).await
    }

    async fn error(&self, title: &str, body: &str) {
        self.notify(NotifyLevel::Error, title, body).await
    }
}

/// Notifier that only writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, level: NotifyLevel, title: &str, body: &str) -> Result<()> {
        match level {
            NotifyLevel::Info | NotifyLevel::Success => info!(title, body, "Notification"),
            NotifyLevel::Warning => warn!(title, body, "Notification"),
            NotifyLevel::Error => error!(title, body, "Notification"),
        }
        Ok(())
    }
}
