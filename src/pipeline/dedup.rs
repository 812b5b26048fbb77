//! Embedding-based near-duplicate filtering.
//!
//! Each incoming item is embedded once and compared against the persisted
//! corpus of previously published items. An item is a duplicate when its
//! cosine similarity to any corpus vector reaches the threshold. Every
//! vector computed in a run is persisted afterwards, duplicates included,
//! so the corpus keeps growing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::adapters::{EmbeddingProvider, VectorStore};
use crate::core::concurrency::{run_concurrent_tasks, ConcurrencyOptions};
use crate::core::similarity::cosine_similarity;
use crate::domain::{ScrapedContent, VectorRecord, ARTICLE_VECTOR_TYPE};

/// Similarity at or above which two items are considered the same story
pub const DEFAULT_THRESHOLD: f64 = 0.85;

/// Deduplication settings (the `dedup` config section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    pub enabled: bool,

    /// Inclusive cosine similarity threshold
    pub threshold: f64,

    /// Corpus partition to compare against and persist into
    pub vector_type: String,

    /// Concurrent embedding calls
    pub max_concurrent: usize,

    /// Per-item embedding timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_THRESHOLD,
            vector_type: ARTICLE_VECTOR_TYPE.to_string(),
            max_concurrent: 5,
            timeout_ms: 30_000,
        }
    }
}

impl DedupSettings {
    fn concurrency(&self) -> ConcurrencyOptions {
        ConcurrencyOptions::new(self.max_concurrent)
            .with_timeout(Duration::from_millis(self.timeout_ms))
    }
}

/// Result of one deduplication pass
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Items kept, in input order
    pub unique: Vec<ScrapedContent>,

    pub duplicates: usize,

    /// Items dropped because their embedding could not be computed
    pub embedding_failures: usize,

    /// New vectors written to the store. Ids already in the corpus or
    /// repeated within the batch are written once.
    pub persisted: usize,
}

pub struct Deduplicator {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    settings: DedupSettings,
}

impl Deduplicator {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        settings: DedupSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &DedupSettings {
        &self.settings
    }

    /// Load the comparison corpus from the store
    pub async fn load_corpus(&self) -> Result<Vec<VectorRecord>> {
        self.store
            .get_by_type(&self.settings.vector_type)
            .await
            .with_context(|| {
                format!(
                    "Failed to load '{}' vectors for deduplication",
                    self.settings.vector_type
                )
            })
    }

    /// Drop items similar to anything in `corpus` and persist the new vectors.
    ///
    /// Items are only compared with the corpus, not with each other.
    #[instrument(skip_all, fields(items = items.len(), corpus = corpus.len()))]
    pub async fn deduplicate(
        &self,
        items: Vec<ScrapedContent>,
        corpus: &[VectorRecord],
    ) -> Result<DedupOutcome> {
        let tasks: Vec<_> = items
            .iter()
            .map(|item| {
                let embedder = self.embedder.clone();
                let text = item.embedding_text().to_string();
                move || async move { embedder.create_embedding(&text).await }
            })
            .collect();

        let embeddings = run_concurrent_tasks(tasks, self.settings.concurrency()).await;

        let mut outcome = DedupOutcome::default();
        let mut records = Vec::new();
        let mut known_ids: HashSet<String> = corpus.iter().map(|r| r.id.clone()).collect();

        for (item, embedding) in items.into_iter().zip(embeddings) {
            let embedding = match embedding {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!(id = %item.id, error = %e, "Embedding failed, dropping item");
                    outcome.embedding_failures += 1;
                    continue;
                }
            };

            let duplicate_of = find_match(&embedding.embedding, corpus, self.settings.threshold);

            let record = VectorRecord::new(
                item.embedding_text(),
                embedding.embedding,
                self.settings.vector_type.clone(),
            );
            if known_ids.insert(record.id.clone()) {
                records.push(record);
            }

            match duplicate_of {
                Some((existing, similarity)) => {
                    debug!(id = %item.id, existing, similarity, "Dropping duplicate");
                    outcome.duplicates += 1;
                }
                None => outcome.unique.push(item),
            }
        }

        if !records.is_empty() {
            outcome.persisted = records.len();
            self.store
                .create_batch(records)
                .await
                .context("Failed to persist item vectors")?;
        }

        info!(
            unique = outcome.unique.len(),
            duplicates = outcome.duplicates,
            embedding_failures = outcome.embedding_failures,
            persisted = outcome.persisted,
            "Deduplication complete"
        );

        Ok(outcome)
    }
}

/// First corpus record at or above `threshold`, with its similarity
fn find_match<'a>(
    vector: &[f32],
    corpus: &'a [VectorRecord],
    threshold: f64,
) -> Option<(&'a str, f64)> {
    corpus.iter().find_map(|record| {
        match cosine_similarity(vector, &record.vector) {
            Ok(similarity) if similarity >= threshold => Some((record.id.as_str(), similarity)),
            Ok(_) => None,
            Err(e) => {
                warn!(record = %record.id, error = %e, "Skipping incomparable corpus vector");
                None
            }
        }
    })
}
