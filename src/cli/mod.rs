//! Command-line interface for curator.
//!
//! Inspection commands for the resolved configuration, the weekly
//! schedule, and the vector corpus used for deduplication.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::adapters::VectorStore;
use crate::config::ResolvedConfig;
use crate::pipeline::{parse_weekday, ScheduleEntry};

/// curator - AI content curation workflows
#[derive(Parser, Debug)]
#[command(name = "curator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show resolved configuration
    Config,

    /// Show which workflow runs on each day
    Schedule {
        /// Only this day (monday..sunday or 1..7)
        #[arg(short, long)]
        day: Option<String>,
    },

    /// Inspect the vector corpus
    Vectors {
        /// List records of this type instead of counts
        #[arg(short = 't', long)]
        vector_type: Option<String>,

        /// Maximum number of records to list
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self, config: &ResolvedConfig) -> Result<()> {
        match self.command {
            Commands::Config => show_config(config),
            Commands::Schedule { day } => show_schedule(config, day.as_deref()),
            Commands::Vectors { vector_type, limit } => {
                show_vectors(config, vector_type.as_deref(), limit).await
            }
        }
    }
}

fn describe(entry: ScheduleEntry) -> String {
    match entry {
        ScheduleEntry::Run(kind) => kind.to_string(),
        ScheduleEntry::NotConfigured => "(not configured)".to_string(),
    }
}

fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("curator configuration");
    println!("{}", "-".repeat(40));
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Database: {}", cfg.database.display());
    println!();
    println!("Embedding:");
    println!("  Endpoint:   {}", cfg.embedding.base_url);
    println!("  Model:      {}", cfg.embedding.model);
    println!(
        "  Dimensions: {}",
        cfg.embedding
            .dimensions
            .map(|d| d.to_string())
            .unwrap_or_else(|| "(model default)".to_string())
    );
    println!(
        "  API key:    {}",
        if cfg.embedding.api_key.is_some() { "set" } else { "(not set)" }
    );
    println!();
    println!("Deduplication:");
    println!("  Enabled:     {}", cfg.dedup.enabled);
    println!("  Threshold:   {}", cfg.dedup.threshold);
    println!("  Vector type: {}", cfg.dedup.vector_type);
    println!();
    println!("Article:");
    println!("  Max articles:         {}", cfg.article.max_articles);
    println!("  Concurrent summaries: {}", cfg.article.max_concurrent_summaries);
    println!();
    println!(
        "Notifications: {}",
        cfg.bark
            .as_ref()
            .map(|b| format!("bark ({})", b.server))
            .unwrap_or_else(|| "log only".to_string())
    );

    Ok(())
}

fn show_schedule(cfg: &ResolvedConfig, day: Option<&str>) -> Result<()> {
    if let Some(day) = day {
        let weekday = parse_weekday(day)?;
        println!("{}: {}", weekday, describe(cfg.schedule.entry(weekday)));
        return Ok(());
    }

    let (today, _) = cfg.schedule.today();
    println!("{:<6} {:<20}", "DAY", "WORKFLOW");
    println!("{}", "-".repeat(28));
    for (weekday, entry) in cfg.schedule.week() {
        let marker = if weekday == today { " <- today" } else { "" };
        println!("{:<6} {:<20}{}", weekday.to_string(), describe(entry), marker);
    }

    Ok(())
}

async fn show_vectors(cfg: &ResolvedConfig, vector_type: Option<&str>, limit: usize) -> Result<()> {
    let store = cfg.vector_store()?;

    let Some(vector_type) = vector_type else {
        let stats = store.stats().await?;
        if stats.total == 0 {
            println!("No vectors stored in {}", cfg.database.display());
            return Ok(());
        }

        println!("{:<20} {:>8}", "TYPE", "COUNT");
        println!("{}", "-".repeat(29));
        for (vector_type, count) in &stats.by_type {
            println!("{:<20} {:>8}", vector_type, count);
        }
        println!("\nTotal: {} vectors", stats.total);
        return Ok(());
    };

    let records = store.get_by_type(vector_type).await?;
    if records.is_empty() {
        println!("No '{}' vectors found", vector_type);
        return Ok(());
    }

    println!("{:<18} {:<6} {:<50}", "ID", "DIM", "CONTENT");
    println!("{}", "-".repeat(76));
    for record in records.iter().take(limit) {
        let preview: String = record
            .content
            .chars()
            .take(47)
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();
        println!("{:<18} {:<6} {:<50}", record.id, record.vector_dim, preview);
    }
    println!("\nTotal: {} vectors", records.len());

    Ok(())
}
