//! Article Workflow Integration Tests
//!
//! Runs the full article workflow through the runner with in-memory
//! collaborators and a SQLite vector store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use curator::adapters::{
    ArticleRenderer, ContentPublisher, ContentScorer, ContentScraper, ContentSummarizer,
    CoverImageProvider, Embedding, EmbeddingProvider, Notifier, NotifyLevel, PublishStatus,
    SourceRegistry, SqliteVectorStore, VectorStore,
};
use curator::core::{MetricStatus, MetricsCollector, RunError, WorkflowRunner};
use curator::domain::{RankedItem, RunStatus, ScrapedContent, Source, Summary, VectorRecord};
use curator::pipeline::{
    ArticleSettings, ArticleWorkflow, Collaborators, DedupSettings, ARTICLE_WORKFLOW_ID,
};
use curator::WorkflowEvent;

// ============================================================================
// Fakes
// ============================================================================

struct StaticSources(Vec<Source>);

#[async_trait]
impl SourceRegistry for StaticSources {
    async fn sources(&self) -> Result<Vec<Source>> {
        Ok(self.0.clone())
    }
}

/// Returns `count` items per source; sources named "broken" fail
struct FakeScraper {
    count: usize,
}

#[async_trait]
impl ContentScraper for FakeScraper {
    async fn scrape(&self, source: &str) -> Result<Vec<ScrapedContent>> {
        if source == "broken" {
            anyhow::bail!("site failed to load");
        }
        Ok((0..self.count)
            .map(|i| {
                let id = format!("{}-{}", source, i);
                ScrapedContent::new(
                    id.clone(),
                    format!("Title {}", id),
                    format!("Body of {}", id),
                    format!("https://{}.example/{}", source, i),
                )
            })
            .collect())
    }
}

/// One-hot vectors so no two items are similar; fails for texts in `failing`
struct OneHotEmbedder {
    dims: usize,
    next: Mutex<usize>,
    failing: Vec<String>,
}

impl OneHotEmbedder {
    fn new(dims: usize, failing: &[&str]) -> Self {
        Self {
            dims,
            next: Mutex::new(0),
            failing: failing.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OneHotEmbedder {
    async fn create_embedding(&self, text: &str) -> Result<Embedding> {
        if self.failing.iter().any(|f| f == text) {
            anyhow::bail!("embedding quota exceeded");
        }
        let mut next = self.next.lock().unwrap();
        let mut embedding = vec![0.0; self.dims];
        embedding[*next % self.dims] = 1.0;
        *next += 1;
        Ok(Embedding {
            dimensions: self.dims,
            embedding,
            model: "one-hot".to_string(),
        })
    }
}

/// Scores by position (later items score higher), or returns nothing
struct PositionScorer {
    empty: bool,
}

#[async_trait]
impl ContentScorer for PositionScorer {
    async fn score(&self, items: &[ScrapedContent]) -> Result<Vec<RankedItem>> {
        if self.empty {
            return Ok(Vec::new());
        }
        Ok(items
            .iter()
            .enumerate()
            .map(|(i, item)| RankedItem::new(item.id.clone(), i as f64))
            .collect())
    }
}

/// Prefixes titles; fails for ids in `failing`
struct PrefixSummarizer {
    failing: Vec<String>,
}

#[async_trait]
impl ContentSummarizer for PrefixSummarizer {
    async fn summarize(&self, content: &str, _options: &Map<String, Value>) -> Result<Summary> {
        let item: ScrapedContent = serde_json::from_str(content).context("bad summarizer input")?;
        if self.failing.contains(&item.id) {
            anyhow::bail!("model refused");
        }
        Ok(Summary {
            title: format!("Summary: {}", item.title),
            content: format!("Short {}", item.content),
            keywords: vec!["ai".to_string()],
            score: Some(0.5),
        })
    }

    async fn generate_title(&self, _content: &str, _options: &Map<String, Value>) -> Result<String> {
        Ok("Agents everywhere".to_string())
    }
}

struct JoinRenderer;

#[async_trait]
impl ArticleRenderer for JoinRenderer {
    async fn render(&self, items: &[ScrapedContent]) -> Result<String> {
        Ok(items
            .iter()
            .map(|item| format!("<h2>{}</h2>", item.title))
            .collect())
    }
}

struct FixedCover;

#[async_trait]
impl CoverImageProvider for FixedCover {
    async fn cover_url(&self, _title: &str) -> Result<String> {
        Ok("https://images.example/cover.png".to_string())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    uploads: Mutex<Vec<String>>,
    published: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ContentPublisher for RecordingPublisher {
    async fn upload_image(&self, url: &str) -> Result<String> {
        self.uploads.lock().unwrap().push(url.to_string());
        Ok("media-1".to_string())
    }

    async fn publish(
        &self,
        _html: &str,
        title: &str,
        _subtitle: &str,
        media_id: &str,
    ) -> Result<PublishStatus> {
        self.published
            .lock()
            .unwrap()
            .push((title.to_string(), media_id.to_string()));
        Ok(PublishStatus {
            status: "published".to_string(),
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(NotifyLevel, String)>>,
}

impl RecordingNotifier {
    fn titles(&self, level: NotifyLevel) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, level: NotifyLevel, title: &str, _body: &str) -> Result<()> {
        self.sent.lock().unwrap().push((level, title.to_string()));
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    sources: Vec<Source>,
    items_per_source: usize,
    failing_embeddings: Vec<&'static str>,
    failing_summaries: Vec<String>,
    empty_ranking: bool,
    store: Arc<SqliteVectorStore>,
    publisher: Arc<RecordingPublisher>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new(sources: &[&str], items_per_source: usize) -> Self {
        Self {
            sources: sources.iter().map(|s| Source::new("web", *s)).collect(),
            items_per_source,
            failing_embeddings: Vec::new(),
            failing_summaries: Vec::new(),
            empty_ranking: false,
            store: Arc::new(SqliteVectorStore::open_in_memory().unwrap()),
            publisher: Arc::new(RecordingPublisher::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    fn workflow(&self) -> ArticleWorkflow {
        let scraper: Arc<dyn ContentScraper> = Arc::new(FakeScraper {
            count: self.items_per_source,
        });

        let collaborators = Collaborators {
            sources: Arc::new(StaticSources(self.sources.clone())),
            scrapers: HashMap::from([("web".to_string(), scraper)]),
            embedder: Arc::new(OneHotEmbedder::new(64, &self.failing_embeddings)),
            vectors: self.store.clone(),
            scorer: Arc::new(PositionScorer {
                empty: self.empty_ranking,
            }),
            summarizer: Arc::new(PrefixSummarizer {
                failing: self.failing_summaries.clone(),
            }),
            renderer: Arc::new(JoinRenderer),
            covers: Arc::new(FixedCover),
            publisher: self.publisher.clone(),
            notifier: self.notifier.clone(),
        };

        ArticleWorkflow::new(collaborators, ArticleSettings::default(), DedupSettings::default())
    }

    fn runner(&self) -> WorkflowRunner {
        WorkflowRunner::new(Arc::new(MetricsCollector::new()), self.notifier.clone())
    }
}

fn event_with_max(max_articles: u64) -> WorkflowEvent {
    let payload = json!({ "max_articles": max_articles });
    WorkflowEvent::new(payload.as_object().cloned().unwrap())
}

fn step_names(runner: &WorkflowRunner, event: &WorkflowEvent) -> Vec<String> {
    runner
        .metrics()
        .get_workflow_event_metrics(ARTICLE_WORKFLOW_ID, event.id())
        .unwrap()
        .steps
        .iter()
        .map(|s| s.name.clone())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_run_publishes_article() {
    let harness = Harness::new(&["alpha", "beta"], 3);
    let runner = harness.runner();
    let event = event_with_max(4);

    let report = runner.run(&harness.workflow(), &event).await.unwrap();

    assert_eq!(report.sources, 2);
    assert_eq!(report.scraped, 6);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.processed, 4);
    assert!(report.published);
    assert!(!report.has_failures());

    // Highest positional score first: beta-2 was scraped last
    assert!(report.links[0].starts_with("Summary: Title beta-2: https://beta.example/2"));

    let published = harness.publisher.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert!(published[0].0.contains("AI digest | Agents everywhere"));
    assert!(published[0].0.chars().count() <= 64);
    assert_eq!(published[0].1, "media-1");

    assert_eq!(
        step_names(&runner, &event),
        vec![
            "fetch-sources",
            "scrape-contents",
            "dedup-contents",
            "rank-contents",
            "process-contents",
            "generate-article",
            "publish-article",
        ]
    );

    assert_eq!(harness.notifier.titles(NotifyLevel::Success), vec!["Workflow completed"]);
    assert!(harness.notifier.titles(NotifyLevel::Warning).is_empty());
}

#[tokio::test]
async fn test_embedding_failure_excludes_only_that_item() {
    let mut harness = Harness::new(&["alpha"], 10);
    harness.failing_embeddings = vec!["Body of alpha-3"];
    let runner = harness.runner();
    let event = event_with_max(20);

    let report = runner.run(&harness.workflow(), &event).await.unwrap();

    assert_eq!(report.scraped, 10);
    assert_eq!(report.embedding_failures, 1);
    assert_eq!(report.processed, 9);
    assert!(report.links.iter().all(|l| !l.contains("alpha-3")));

    let stored = harness.store.get_by_type("article").await.unwrap();
    assert_eq!(stored.len(), 9);

    // Partial failures end with a warning instead of success
    let warnings = harness.notifier.titles(NotifyLevel::Warning);
    assert!(warnings.contains(&"Workflow completed with failures".to_string()));
    assert!(harness.notifier.titles(NotifyLevel::Success).is_empty());
}

#[tokio::test]
async fn test_items_already_in_corpus_are_dropped() {
    let harness = Harness::new(&["alpha"], 3);

    // The first one-hot vector handed out is [1, 0, ...]
    let mut seen = vec![0.0; 64];
    seen[0] = 1.0;
    harness
        .store
        .create_batch(vec![VectorRecord::new("yesterday's story", seen, "article")])
        .await
        .unwrap();

    let runner = harness.runner();
    let report = runner
        .run(&harness.workflow(), &event_with_max(3))
        .await
        .unwrap();

    assert_eq!(report.duplicates, 1);
    assert_eq!(report.processed, 2);

    // Duplicates are persisted too
    assert_eq!(harness.store.get_by_type("article").await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_empty_ranking_terminates_run() {
    let mut harness = Harness::new(&["alpha"], 3);
    harness.empty_ranking = true;
    let runner = harness.runner();
    let event = event_with_max(3);

    let err = runner.run(&harness.workflow(), &event).await.unwrap_err();
    assert_eq!(err.status(), RunStatus::Terminated);
    assert!(matches!(err, RunError::Terminated { .. }));

    // Nothing after ranking ran
    assert_eq!(
        step_names(&runner, &event),
        vec!["fetch-sources", "scrape-contents", "dedup-contents", "rank-contents"]
    );
    assert!(harness.publisher.published.lock().unwrap().is_empty());

    let metric = runner
        .metrics()
        .get_workflow_event_metrics(ARTICLE_WORKFLOW_ID, event.id())
        .unwrap();
    assert_eq!(metric.status, MetricStatus::Failure);
    let rank_step = metric.steps.last().unwrap();
    assert_eq!(rank_step.attempts, 1);

    assert_eq!(harness.notifier.titles(NotifyLevel::Warning), vec!["Workflow terminated"]);
    assert!(harness.notifier.titles(NotifyLevel::Error).is_empty());
}

#[tokio::test]
async fn test_no_sources_terminates_run() {
    let harness = Harness::new(&[], 3);
    let runner = harness.runner();
    let event = WorkflowEvent::default();

    let err = runner.run(&harness.workflow(), &event).await.unwrap_err();
    assert_eq!(err.status(), RunStatus::Terminated);
    assert!(err.to_string().contains("No sources configured"));
    assert_eq!(step_names(&runner, &event), vec!["fetch-sources"]);
}

#[tokio::test]
async fn test_failed_source_is_isolated() {
    let harness = Harness::new(&["alpha", "broken"], 2);
    let runner = harness.runner();

    let report = runner
        .run(&harness.workflow(), &event_with_max(2))
        .await
        .unwrap();

    assert_eq!(report.failed_sources, 1);
    assert_eq!(report.scraped, 2);
    assert!(harness
        .notifier
        .titles(NotifyLevel::Warning)
        .contains(&"web scrape failed".to_string()));
}

#[tokio::test]
async fn test_summary_failure_keeps_original_fields() {
    let mut harness = Harness::new(&["alpha"], 2);
    harness.failing_summaries = vec!["alpha-0".to_string()];
    let runner = harness.runner();

    let report = runner
        .run(&harness.workflow(), &event_with_max(2))
        .await
        .unwrap();

    assert_eq!(report.failed_items, 1);
    assert_eq!(report.processed, 2);
    assert!(report
        .links
        .contains(&"Title alpha-0: https://alpha.example/0".to_string()));
    assert!(report
        .links
        .contains(&"Summary: Title alpha-1: https://alpha.example/1".to_string()));

    let warnings = harness.notifier.titles(NotifyLevel::Warning);
    assert!(warnings.contains(&"Content processing failed".to_string()));
    assert!(warnings.contains(&"Workflow completed with failures".to_string()));
}

#[tokio::test]
async fn test_fewer_items_than_requested_warns() {
    let harness = Harness::new(&["alpha"], 2);
    let runner = harness.runner();

    let report = runner
        .run(&harness.workflow(), &event_with_max(5))
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert!(harness
        .notifier
        .titles(NotifyLevel::Warning)
        .contains(&"Not enough content".to_string()));
}
