//! SQLite-backed vector store.
//!
//! Vectors are stored as JSON arrays in a single `vector_items` table.
//! Reads are by type; writes are batch inserts in one transaction.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::VectorStore;
use crate::domain::VectorRecord;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS vector_items (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    vector TEXT NOT NULL,
    vector_dim INTEGER NOT NULL,
    vector_type TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_vector_items_type ON vector_items(vector_type);
";

/// Record counts per vector type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VectorStats {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
}

pub struct SqliteVectorStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteVectorStore {
    /// Open (or create) the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open vector database: {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL mode")?;

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize vector schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("Vector database lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .context("Vector database task panicked")?
    }

    pub async fn stats(&self) -> Result<VectorStats> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT vector_type, COUNT(*) FROM vector_items GROUP BY vector_type")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut stats = VectorStats::default();
            for row in rows {
                let (vector_type, count) = row?;
                let count = usize::try_from(count).unwrap_or(0);
                stats.total += count;
                stats.by_type.insert(vector_type, count);
            }
            Ok(stats)
        })
        .await
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn get_by_type(&self, vector_type: &str) -> Result<Vec<VectorRecord>> {
        let vector_type = vector_type.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content, vector, vector_dim, vector_type
                 FROM vector_items WHERE vector_type = ?1 ORDER BY created_at, id",
            )?;

            let rows = stmt.query_map(params![vector_type], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (id, content, vector_json, vector_dim, vector_type) = row?;
                let vector: Vec<f32> = serde_json::from_str(&vector_json)
                    .with_context(|| format!("Corrupt vector for record {}", id))?;
                records.push(VectorRecord {
                    id,
                    content,
                    vector,
                    vector_dim: usize::try_from(vector_dim).unwrap_or(0),
                    vector_type,
                });
            }
            Ok(records)
        })
        .await
    }

    async fn create_batch(&self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                // Same content hashes to the same id; keep the first copy
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO vector_items (id, content, vector, vector_dim, vector_type)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for record in &records {
                    let vector_json = serde_json::to_string(&record.vector)?;
                    stmt.execute(params![
                        record.id,
                        record.content,
                        vector_json,
                        record.vector_dim as i64,
                        record.vector_type,
                    ])?;
                }
            }
            tx.commit().context("Failed to commit vector batch")?;
            Ok(())
        })
        .await
    }
}
