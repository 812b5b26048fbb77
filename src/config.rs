//! Configuration for curator.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (CURATOR_HOME, CURATOR_DB,
//!    CURATOR_EMBEDDING_API_KEY, CURATOR_BARK_KEY)
//! 2. Config file (.curator/config.yaml)
//! 3. Defaults (~/.curator)
//!
//! Config file discovery:
//! - Searches current directory and parents for .curator/config.yaml
//! - Paths in the config file are relative to the `.curator/` directory
//!
//! The resolved config is loaded once in `main` and passed down by value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::{
    BarkConfig, BarkNotifier, EmbeddingConfig, Notifier, OpenAiEmbeddingProvider,
    SqliteVectorStore, TracingNotifier,
};
use crate::pipeline::{ArticleSettings, DedupSettings, WeeklySchedule};

pub const ENV_HOME: &str = "CURATOR_HOME";
pub const ENV_DB: &str = "CURATOR_DB";
pub const ENV_EMBEDDING_API_KEY: &str = "CURATOR_EMBEDDING_API_KEY";
pub const ENV_BARK_KEY: &str = "CURATOR_BARK_KEY";

const CONFIG_DIR: &str = ".curator";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub dedup: DedupSettings,
    #[serde(default)]
    pub article: ArticleSettings,
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Day name (or 1-7) to workflow name
    #[serde(default)]
    pub schedule: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .curator/)
    pub home: Option<String>,
    /// Vector database file (relative to .curator/)
    pub database: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    pub bark: Option<BarkConfig>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// SQLite vector database
    pub database: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub embedding: EmbeddingConfig,
    pub dedup: DedupSettings,
    pub article: ArticleSettings,
    /// Bark push settings; `None` means notifications only go to the log
    pub bark: Option<BarkConfig>,
    pub schedule: WeeklySchedule,
}

impl ResolvedConfig {
    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        let default_home = dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(CONFIG_DIR);

        let config_file = std::env::current_dir()
            .ok()
            .and_then(|cwd| find_config_file(&cwd));

        let file = match config_file {
            Some(ref path) => load_config_file(path)?,
            None => ConfigFile::default(),
        };

        resolve(config_file, file, default_home, |key| std::env::var(key).ok())
    }

    /// Bark when a device key is configured, otherwise log-only
    pub fn notifier(&self) -> Result<Arc<dyn Notifier>> {
        let notifier: Arc<dyn Notifier> = match self.bark {
            Some(ref bark) => Arc::new(BarkNotifier::new(bark.clone())?),
            None => Arc::new(TracingNotifier),
        };
        Ok(notifier)
    }

    pub fn vector_store(&self) -> Result<SqliteVectorStore> {
        SqliteVectorStore::open(&self.database)
    }

    pub fn embedding_provider(&self) -> Result<OpenAiEmbeddingProvider> {
        if self.embedding.api_key.is_none() {
            tracing::warn!("No embedding API key set ({})", ENV_EMBEDDING_API_KEY);
        }
        OpenAiEmbeddingProvider::new(self.embedding.clone())
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge env overrides, the parsed file and defaults
fn resolve<E>(
    config_file: Option<PathBuf>,
    file: ConfigFile,
    default_home: PathBuf,
    env: E,
) -> Result<ResolvedConfig>
where
    E: Fn(&str) -> Option<String>,
{
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf);

    let home = match (env(ENV_HOME), &file.paths.home, &config_dir) {
        (Some(home), _, _) => PathBuf::from(home),
        (None, Some(home), Some(dir)) => resolve_path(dir, home),
        (None, Some(home), None) => PathBuf::from(home),
        (None, None, _) => default_home,
    };

    let database = match (env(ENV_DB), &file.paths.database, &config_dir) {
        (Some(db), _, _) => PathBuf::from(db),
        (None, Some(db), Some(dir)) => resolve_path(dir, db),
        (None, Some(db), None) => PathBuf::from(db),
        (None, None, _) => home.join("vectors.db"),
    };

    let mut embedding = file.embedding;
    if let Some(key) = env(ENV_EMBEDDING_API_KEY) {
        embedding.api_key = Some(key);
    }

    let mut bark = file.notify.bark;
    if let Some(key) = env(ENV_BARK_KEY) {
        bark.get_or_insert_with(BarkConfig::default).device_key = key;
    }
    let bark = bark.filter(|b| !b.device_key.is_empty());

    if !(0.0..=1.0).contains(&file.dedup.threshold) {
        anyhow::bail!(
            "dedup.threshold must be between 0 and 1, got {}",
            file.dedup.threshold
        );
    }

    let schedule =
        WeeklySchedule::from_config(&file.schedule).context("Invalid schedule configuration")?;

    Ok(ResolvedConfig {
        home,
        database,
        config_file,
        embedding,
        dedup: file.dedup,
        article: file.article,
        bark,
        schedule,
    })
}
