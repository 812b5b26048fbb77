//! The article curation workflow.
//!
//! fetch-sources → scrape-contents → dedup-contents → rank-contents →
//! process-contents → generate-article → publish-article
//!
//! Each stage is one [`StepExecutor`] call with its own [`StepPolicy`].
//! Collaborators are injected once through [`Collaborators`]; per-run
//! counts are returned as a [`RunReport`] instead of being accumulated on
//! the workflow.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use tracing::{info, instrument, warn};

use crate::adapters::{
    ArticleRenderer, ContentPublisher, ContentScorer, ContentScraper, ContentSummarizer,
    CoverImageProvider, EmbeddingProvider, Notifier, SourceRegistry, VectorStore,
};
use crate::core::concurrency::{run_concurrent_tasks, ConcurrencyOptions};
use crate::core::error::terminate;
use crate::core::runner::Workflow;
use crate::core::step::{StepExecutor, StepPolicy};
use crate::domain::{RankedItem, RunReport, ScrapedContent, Source, WorkflowEvent};

use super::dedup::{DedupOutcome, DedupSettings, Deduplicator};
use super::rank::Ranker;

pub const ARTICLE_WORKFLOW_ID: &str = "article-workflow";

/// Maximum characters in a published title
const MAX_TITLE_CHARS: usize = 64;

/// Maximum characters of the headline handed to the cover generator
const MAX_COVER_HEADLINE_CHARS: usize = 30;

/// Everything the workflow talks to, built once by the caller
#[derive(Clone)]
pub struct Collaborators {
    pub sources: Arc<dyn SourceRegistry>,

    /// Scrapers keyed by [`Source::platform`]
    pub scrapers: HashMap<String, Arc<dyn ContentScraper>>,

    pub embedder: Arc<dyn EmbeddingProvider>,
    pub vectors: Arc<dyn VectorStore>,
    pub scorer: Arc<dyn ContentScorer>,
    pub summarizer: Arc<dyn ContentSummarizer>,
    pub renderer: Arc<dyn ArticleRenderer>,
    pub covers: Arc<dyn CoverImageProvider>,
    pub publisher: Arc<dyn ContentPublisher>,
    pub notifier: Arc<dyn Notifier>,
}

/// Per-step retry and timeout policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticlePolicies {
    pub fetch_sources: StepPolicy,
    pub scrape: StepPolicy,
    pub dedup: StepPolicy,
    pub rank: StepPolicy,
    pub process: StepPolicy,
    pub generate: StepPolicy,
    pub publish: StepPolicy,
}

impl Default for ArticlePolicies {
    fn default() -> Self {
        const MINUTE: u64 = 60;
        let secs = Duration::from_secs;

        Self {
            fetch_sources: StepPolicy::once(secs(MINUTE)),
            scrape: StepPolicy::exponential(3, secs(10), secs(10 * MINUTE)),
            dedup: StepPolicy::exponential(2, secs(5), secs(15 * MINUTE)),
            rank: StepPolicy::exponential(2, secs(5), secs(5 * MINUTE)),
            process: StepPolicy::exponential(2, secs(5), secs(15 * MINUTE)),
            generate: StepPolicy::exponential(2, secs(5), secs(10 * MINUTE)),
            publish: StepPolicy::exponential(3, secs(10), secs(5 * MINUTE)),
        }
    }
}

/// Article workflow settings (the `article` config section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleSettings {
    /// Items per article when the event payload does not say
    pub max_articles: usize,

    pub max_concurrent_summaries: usize,

    /// Sources scraped at once
    pub scrape_concurrency: usize,

    /// Per-source scrape timeout in milliseconds
    pub scrape_timeout_ms: u64,

    pub policies: ArticlePolicies,
}

impl Default for ArticleSettings {
    fn default() -> Self {
        Self {
            max_articles: 10,
            max_concurrent_summaries: 5,
            scrape_concurrency: 3,
            scrape_timeout_ms: 120_000,
            policies: ArticlePolicies::default(),
        }
    }
}

#[derive(Debug)]
struct Scraped {
    items: Vec<ScrapedContent>,
    failed_sources: usize,
}

#[derive(Debug)]
struct Processed {
    items: Vec<ScrapedContent>,
    failed_items: usize,
}

#[derive(Debug)]
struct Article {
    title: String,
    media_id: String,
    html: String,
}

pub struct ArticleWorkflow {
    collaborators: Collaborators,
    settings: ArticleSettings,
    dedup: DedupSettings,
    deduplicator: Deduplicator,
    ranker: Ranker,
}

impl ArticleWorkflow {
    pub fn new(collaborators: Collaborators, settings: ArticleSettings, dedup: DedupSettings) -> Self {
        let deduplicator = Deduplicator::new(
            collaborators.embedder.clone(),
            collaborators.vectors.clone(),
            dedup.clone(),
        );
        let ranker = Ranker::new(collaborators.scorer.clone());

        Self {
            collaborators,
            settings,
            dedup,
            deduplicator,
            ranker,
        }
    }

    async fn fetch_sources(&self) -> Result<Vec<Source>> {
        let sources = self
            .collaborators
            .sources
            .sources()
            .await
            .context("Failed to load sources")?;

        if sources.is_empty() {
            return terminate("No sources configured");
        }

        let mut missing: Vec<&str> = sources
            .iter()
            .map(|s| s.platform.as_str())
            .filter(|p| !self.collaborators.scrapers.contains_key(*p))
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            missing.dedup();
            return terminate(format!("No scraper registered for: {}", missing.join(", ")));
        }

        info!(sources = sources.len(), "Sources loaded");
        Ok(sources)
    }

    /// Scrape every source; a failed source is reported and skipped
    async fn scrape(&self, sources: &[Source]) -> Result<Scraped> {
        let tasks: Vec<_> = sources
            .iter()
            .map(|source| {
                let scraper = self.collaborators.scrapers.get(&source.platform).cloned();
                let source = source.clone();
                move || async move {
                    let scraper = scraper
                        .with_context(|| format!("No scraper for {}", source.platform))?;
                    scraper.scrape(&source.identifier).await
                }
            })
            .collect();

        let options = ConcurrencyOptions::new(self.settings.scrape_concurrency)
            .with_timeout(Duration::from_millis(self.settings.scrape_timeout_ms));
        let results = run_concurrent_tasks(tasks, options).await;

        let mut scraped = Scraped {
            items: Vec::new(),
            failed_sources: 0,
        };
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(items) => {
                    info!(source = %source.identifier, items = items.len(), "Source scraped");
                    scraped.items.extend(items);
                }
                Err(e) => {
                    scraped.failed_sources += 1;
                    warn!(source = %source.identifier, error = %e, "Source scrape failed");
                    self.collaborators
                        .notifier
                        .warning(
                            &format!("{} scrape failed", source.platform),
                            &format!("Source: {}\nError: {}", source.identifier, e),
                        )
                        .await;
                }
            }
        }

        if scraped.items.is_empty() {
            return terminate("No content scraped from any source");
        }

        Ok(scraped)
    }

    async fn deduplicate(&self, items: Vec<ScrapedContent>) -> Result<DedupOutcome> {
        if !self.dedup.enabled {
            info!("Deduplication disabled, keeping all items");
            return Ok(DedupOutcome {
                unique: items,
                ..Default::default()
            });
        }

        let corpus = self.deduplicator.load_corpus().await?;
        self.deduplicator.deduplicate(items, &corpus).await
    }

    async fn rank(&self, items: &[ScrapedContent]) -> Result<Vec<RankedItem>> {
        let ranked = self.ranker.rank(items).await?;
        if ranked.is_empty() {
            return terminate("Ranking produced no scored content");
        }
        Ok(ranked)
    }

    /// Take the top `max_articles` items and summarize them.
    ///
    /// A failed summary keeps the item's original fields.
    async fn process(
        &self,
        ranked: &[RankedItem],
        items: &[ScrapedContent],
        max_articles: usize,
    ) -> Result<Processed> {
        let by_id: HashMap<&str, &ScrapedContent> =
            items.iter().map(|item| (item.id.as_str(), item)).collect();

        let mut seen = HashSet::new();
        let mut top: Vec<ScrapedContent> = ranked
            .iter()
            .filter(|r| seen.insert(r.id.as_str()))
            .filter_map(|r| {
                by_id.get(r.id.as_str()).map(|item| {
                    let mut item = (*item).clone();
                    item.apply_rank(r.score);
                    item
                })
            })
            .take(max_articles)
            .collect();

        if top.len() < max_articles {
            warn!(expected = max_articles, actual = top.len(), "Fewer items than requested");
            self.collaborators
                .notifier
                .warning(
                    "Not enough content",
                    &format!(
                        "Only {} items available, fewer than the expected {}",
                        top.len(),
                        max_articles
                    ),
                )
                .await;
        }

        let tasks: Vec<_> = top
            .iter()
            .map(|item| {
                let summarizer = self.collaborators.summarizer.clone();
                let input = serde_json::to_string(item);
                move || async move {
                    let input = input.context("Failed to serialize item for summarization")?;
                    summarizer.summarize(&input, &Map::new()).await
                }
            })
            .collect();

        let summaries = run_concurrent_tasks(
            tasks,
            ConcurrencyOptions::new(self.settings.max_concurrent_summaries),
        )
        .await;

        let mut failed_items = 0;
        for (item, summary) in top.iter_mut().zip(summaries) {
            match summary {
                Ok(summary) => item.apply_summary(summary),
                Err(e) => {
                    failed_items += 1;
                    warn!(id = %item.id, error = %e, "Summarization failed, keeping original");
                    self.collaborators
                        .notifier
                        .warning(
                            "Content processing failed",
                            &format!("ID: {}\nOriginal content kept", item.id),
                        )
                        .await;
                }
            }
        }

        Ok(Processed {
            items: top,
            failed_items,
        })
    }

    async fn generate(&self, items: &[ScrapedContent], date: &str) -> Result<Article> {
        let titles = items
            .iter()
            .map(|item| item.title.as_str())
            .collect::<Vec<_>>()
            .join(" | ");

        let headline = self
            .collaborators
            .summarizer
            .generate_title(&titles, &Map::new())
            .await
            .context("Failed to generate article title")?;
        let title = article_title(date, &headline);

        let cover_headline: String = headline.trim().chars().take(MAX_COVER_HEADLINE_CHARS).collect();
        let cover_url = self
            .collaborators
            .covers
            .cover_url(&cover_headline)
            .await
            .context("Failed to generate cover image")?;
        let media_id = self
            .collaborators
            .publisher
            .upload_image(&cover_url)
            .await
            .context("Failed to upload cover image")?;

        let html = self
            .collaborators
            .renderer
            .render(items)
            .await
            .context("Failed to render article")?;

        Ok(Article {
            title,
            media_id,
            html,
        })
    }

    async fn publish(&self, article: &Article) -> Result<()> {
        let status = self
            .collaborators
            .publisher
            .publish(&article.html, &article.title, &article.title, &article.media_id)
            .await
            .context("Failed to publish article")?;

        info!(title = %article.title, status = %status.status, "Article published");
        Ok(())
    }
}

#[async_trait]
impl Workflow for ArticleWorkflow {
    fn id(&self) -> &str {
        ARTICLE_WORKFLOW_ID
    }

    #[instrument(skip_all, fields(event_id = %event.id()))]
    async fn execute(&self, event: &WorkflowEvent, step: &StepExecutor) -> Result<RunReport> {
        let policies = &self.settings.policies;
        let max_articles = event.max_articles().unwrap_or(self.settings.max_articles);
        let date = run_date(event);

        let sources = step
            .run("fetch-sources", &policies.fetch_sources, move || async move {
                self.fetch_sources().await
            })
            .await?;

        let source_list = &sources;
        let scraped = step
            .run("scrape-contents", &policies.scrape, move || async move {
                self.scrape(source_list).await
            })
            .await?;

        let scraped_items = &scraped.items;
        let deduped = step
            .run("dedup-contents", &policies.dedup, move || async move {
                self.deduplicate(scraped_items.clone()).await
            })
            .await?;

        let unique = &deduped.unique;
        let ranked = step
            .run("rank-contents", &policies.rank, move || async move {
                self.rank(unique).await
            })
            .await?;

        let ranked_list = &ranked;
        let processed = step
            .run("process-contents", &policies.process, move || async move {
                self.process(ranked_list, unique, max_articles).await
            })
            .await?;

        let processed_items = &processed.items;
        let date = date.as_str();
        let article = step
            .run("generate-article", &policies.generate, move || async move {
                self.generate(processed_items, date).await
            })
            .await?;

        let article_ref = &article;
        step.run("publish-article", &policies.publish, move || async move {
            self.publish(article_ref).await
        })
        .await?;

        let report = RunReport {
            sources: sources.len(),
            failed_sources: scraped.failed_sources,
            scraped: scraped.items.len(),
            duplicates: deduped.duplicates,
            embedding_failures: deduped.embedding_failures,
            processed: processed.items.len(),
            failed_items: processed.failed_items,
            published: true,
            links: processed
                .items
                .iter()
                .map(|item| format!("{}: {}", item.title, item.url))
                .collect(),
        };

        info!(title = %article.title, "Article workflow finished");
        Ok(report)
    }
}

/// `YYYY-MM-DD` of the event, used in the article title
fn run_date(event: &WorkflowEvent) -> String {
    Utc.timestamp_millis_opt(event.timestamp())
        .single()
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%d")
        .to_string()
}

fn article_title(date: &str, headline: &str) -> String {
    format!("{} AI digest | {}", date, headline.trim())
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::step::Backoff;

    #[test]
    fn test_article_title_truncated() {
        let title = article_title("2026-10-18", &"x".repeat(100));
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
        assert!(title.starts_with("2026-10-18 AI digest | xxx"));

        assert_eq!(
            article_title("2026-10-18", " Agents everywhere "),
            "2026-10-18 AI digest | Agents everywhere"
        );
    }

    #[test]
    fn test_run_date_from_event_timestamp() {
        let event = WorkflowEvent::default();
        let expected = Utc
            .timestamp_millis_opt(event.timestamp())
            .unwrap()
            .format("%Y-%m-%d")
            .to_string();
        assert_eq!(run_date(&event), expected);
    }

    #[test]
    fn test_default_policies() {
        let policies = ArticlePolicies::default();

        assert_eq!(policies.fetch_sources.retry_limit, 0);
        assert_eq!(policies.scrape.retry_limit, 3);
        assert_eq!(policies.scrape.base_delay(), Duration::from_secs(10));
        assert_eq!(policies.dedup.timeout(), Duration::from_secs(15 * 60));
        assert_eq!(policies.rank.timeout(), Duration::from_secs(5 * 60));
        assert_eq!(policies.publish.backoff, Backoff::Exponential);
    }

    #[test]
    fn test_settings_partial_yaml() {
        let yaml = r#"
max_articles: 6
policies:
  publish:
    retry_limit: 5
    base_delay_ms: 1000
    backoff: fixed
    timeout_ms: 60000
"#;
        let settings: ArticleSettings = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(settings.max_articles, 6);
        assert_eq!(settings.max_concurrent_summaries, 5);
        assert_eq!(settings.policies.publish.retry_limit, 5);
        assert_eq!(settings.policies.rank, ArticlePolicies::default().rank);
    }
}
