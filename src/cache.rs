use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use crate::util::{now_utc_string, sha256_hex};

pub trait VectorCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<f32>>>;

    fn put(&self, key: &str, vector: &[f32]) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVectorCache;

impl VectorCache for NoopVectorCache {
    fn get(&self, _key: &str) -> Result<Option<Vec<f32>>> {
        Ok(None)
    }

    fn put(&self, _key: &str, _vector: &[f32]) -> Result<()> {
        Ok(())
    }
}

// Per-run tier consulted before the external store.
#[derive(Debug, Default)]
pub struct MemoryVectorCache {
    vectors: RwLock<HashMap<String, Arc<Vec<f32>>>>,
}

impl MemoryVectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.read().map(|vectors| vectors.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, key: &str) -> Option<Arc<Vec<f32>>> {
        self.vectors
            .read()
            .ok()
            .and_then(|vectors| vectors.get(key).cloned())
    }

    pub fn insert(&self, key: &str, vector: Arc<Vec<f32>>) {
        if let Ok(mut vectors) = self.vectors.write() {
            vectors.entry(key.to_string()).or_insert(vector);
        }
    }
}

impl VectorCache for MemoryVectorCache {
    fn get(&self, key: &str) -> Result<Option<Vec<f32>>> {
        Ok(self.lookup(key).map(|vector| vector.as_ref().clone()))
    }

    fn put(&self, key: &str, vector: &[f32]) -> Result<()> {
        self.insert(key, Arc::new(vector.to_vec()));
        Ok(())
    }
}

pub fn vector_cache_key(model_id: &str, normalized_text: &str) -> String {
    sha256_hex(&format!("{model_id}\n{normalized_text}"))
}

pub struct SqliteVectorCache {
    connection: Mutex<Connection>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct VectorCacheStats {
    pub vector_count: i64,
    pub dimensions: Vec<i64>,
}

impl SqliteVectorCache {
    pub fn open(db_path: &Path) -> Result<Self> {
        let connection = Connection::open(db_path).with_context(|| {
            format!("failed to open vector cache database: {}", db_path.display())
        })?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .context("failed to set journal_mode=WAL for vector cache")?;
        connection
            .pragma_update(None, "synchronous", "NORMAL")
            .context("failed to set synchronous=NORMAL for vector cache")?;
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory vector cache")?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        ensure_vector_cache_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn stats(&self) -> Result<VectorCacheStats> {
        let connection = self.lock()?;
        let vector_count =
            connection.query_row("SELECT COUNT(*) FROM vector_cache", [], |row| row.get(0))?;

        let mut statement = connection
            .prepare("SELECT DISTINCT vector_dim FROM vector_cache ORDER BY vector_dim ASC")?;
        let mut rows = statement.query([])?;
        let mut dimensions = Vec::<i64>::new();
        while let Some(row) = rows.next()? {
            dimensions.push(row.get(0)?);
        }

        Ok(VectorCacheStats {
            vector_count,
            dimensions,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| anyhow!("vector cache connection lock poisoned"))
    }
}

impl VectorCache for SqliteVectorCache {
    fn get(&self, key: &str) -> Result<Option<Vec<f32>>> {
        let connection = self.lock()?;
        let row = connection
            .query_row(
                "SELECT vector, vector_dim FROM vector_cache WHERE cache_key = ?1 LIMIT 1",
                params![key],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .with_context(|| format!("failed to read cached vector {key}"))?;

        Ok(row.and_then(|(blob, dim)| decode_vector_blob(&blob, dim as usize)))
    }

    fn put(&self, key: &str, vector: &[f32]) -> Result<()> {
        let connection = self.lock()?;
        connection
            .execute(
                "
                INSERT INTO vector_cache(cache_key, vector, vector_dim, created_at)
                VALUES(?1, ?2, ?3, ?4)
                ON CONFLICT(cache_key) DO UPDATE SET
                  vector=excluded.vector,
                  vector_dim=excluded.vector_dim,
                  created_at=excluded.created_at
                ",
                params![
                    key,
                    encode_vector_blob(vector),
                    vector.len() as i64,
                    now_utc_string()
                ],
            )
            .with_context(|| format!("failed to store cached vector {key}"))?;
        Ok(())
    }
}

fn ensure_vector_cache_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS vector_cache (
              cache_key TEXT PRIMARY KEY,
              vector BLOB NOT NULL,
              vector_dim INTEGER NOT NULL,
              created_at TEXT NOT NULL
            );
            ",
        )
        .context("failed to create vector_cache table")
}

// Any cache error disables the cache for the rest of the run.
pub struct FailOpenCache<'a> {
    inner: &'a dyn VectorCache,
    disabled: AtomicBool,
}

impl<'a> FailOpenCache<'a> {
    pub fn new(inner: &'a dyn VectorCache) -> Self {
        Self {
            inner,
            disabled: AtomicBool::new(false),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        if self.is_disabled() {
            return None;
        }
        match self.inner.get(key) {
            Ok(value) => value,
            Err(err) => {
                self.disable(&err);
                None
            }
        }
    }

    pub fn put(&self, key: &str, vector: &[f32]) {
        if self.is_disabled() {
            return;
        }
        if let Err(err) = self.inner.put(key, vector) {
            self.disable(&err);
        }
    }

    fn disable(&self, err: &anyhow::Error) {
        if !self.disabled.swap(true, Ordering::Relaxed) {
            warn!(error = %err, "vector cache failed; continuing without cache");
        }
    }
}

pub fn encode_vector_blob(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::<u8>::with_capacity(values.len() * 4);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_vector_blob(blob: &[u8], expected_dim: usize) -> Option<Vec<f32>> {
    if blob.len() != expected_dim.saturating_mul(4) {
        return None;
    }

    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}
