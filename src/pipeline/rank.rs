//! LLM-backed relevance ranking.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::adapters::ContentScorer;
use crate::domain::{RankedItem, ScrapedContent};

pub struct Ranker {
    scorer: Arc<dyn ContentScorer>,
}

impl Ranker {
    pub fn new(scorer: Arc<dyn ContentScorer>) -> Self {
        Self { scorer }
    }

    /// Score `items` and return them best first.
    ///
    /// Scores for ids that are not in `items` are dropped. Ties keep the
    /// scorer's order and NaN scores sort last.
    pub async fn rank(&self, items: &[ScrapedContent]) -> Result<Vec<RankedItem>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let known: HashSet<&str> = items.iter().map(|item| item.id.as_str()).collect();
        let scored = self
            .scorer
            .score(items)
            .await
            .context("Content scoring failed")?;

        let mut ranked: Vec<RankedItem> = scored
            .into_iter()
            .filter(|r| {
                let keep = known.contains(r.id.as_str());
                if !keep {
                    warn!(id = %r.id, "Scorer returned an unknown id");
                }
                keep
            })
            .collect();

        ranked.sort_by(|a, b| descending(a.score, b.score));
        debug!(ranked = ranked.len(), of = items.len(), "Ranking complete");

        Ok(ranked)
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
