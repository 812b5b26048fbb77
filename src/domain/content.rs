//! Scraped content and the values derived from it while a run progresses.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reading speed used for `read_time` metadata, in characters per minute
const CHARS_PER_MINUTE: usize = 275;

/// One item produced by a scraper.
///
/// Summarization and ranking update it in place before rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub publish_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ScrapedContent {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            url: url.into(),
            publish_date: None,
            score: 0.0,
            metadata: HashMap::new(),
        }
    }

    /// Text submitted for embedding (falls back to the title)
    pub fn embedding_text(&self) -> &str {
        if self.content.trim().is_empty() {
            &self.title
        } else {
            &self.content
        }
    }

    /// Record the ranking score plus length and read-time metadata
    pub fn apply_rank(&mut self, score: f64) {
        let char_count = self.content.chars().count();
        self.score = score;
        self.metadata.insert("score".to_string(), Value::from(score));
        self.metadata
            .insert("char_count".to_string(), Value::from(char_count));
        self.metadata.insert(
            "read_time".to_string(),
            Value::from(char_count.div_ceil(CHARS_PER_MINUTE)),
        );
    }

    /// Replace title, body and keywords with a model summary
    pub fn apply_summary(&mut self, summary: Summary) {
        self.title = summary.title;
        self.content = summary.content;
        self.metadata
            .insert("keywords".to_string(), Value::from(summary.keywords));
        if let Some(score) = summary.score {
            self.metadata
                .insert("summary_score".to_string(), Value::from(score));
        }
    }

    pub fn keywords(&self) -> Vec<String> {
        self.metadata
            .get("keywords")
            .and_then(Value::as_array)
            .map(|words| {
                words
                    .iter()
                    .filter_map(|w| w.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Output of the summarization collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub score: Option<f64>,
}

/// A content id with its ranking score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    pub id: String,
    pub score: f64,
}

impl RankedItem {
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// A configured scraping source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Scraper platform key (e.g. "firecrawl", "twitter")
    pub platform: String,

    /// URL, handle, or feed the scraper understands
    pub identifier: String,
}

impl Source {
    pub fn new(platform: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            identifier: identifier.into(),
        }
    }
}
