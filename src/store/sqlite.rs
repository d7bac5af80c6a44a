//! SQLite-backed vector store.
//!
//! Stores record text and metadata in SQLite, with embeddings serialized
//! as little-endian f32 blobs and brute-force cosine ranking at query
//! time. Namespaces pin their vector dimension on first upsert.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::{SearchHit, VectorStore};
use crate::core::config::AppPaths;
use crate::core::errors::RagError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteVectorStore {
    /// Open the store at the default location.
    pub async fn new(paths: &AppPaths) -> Result<Self, RagError> {
        Self::with_path(paths.vector_db_path.clone()).await
    }

    /// Open the store at a custom path (used by tests).
    pub async fn with_path(db_path: PathBuf) -> Result<Self, RagError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RagError::store)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS namespaces (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vector_records (
                namespace TEXT NOT NULL,
                id TEXT NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (namespace, id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_namespace ON vector_records(namespace)")
            .execute(&self.pool)
            .await
            .map_err(RagError::store)?;

        Ok(())
    }

    /// Serialize embedding to bytes (little-endian f32).
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    /// Compute cosine similarity between two vectors.
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    /// Dimension pinned for `namespace`, if the namespace exists.
    async fn namespace_dimension(&self, namespace: &str) -> Result<Option<usize>, RagError> {
        let row = sqlx::query("SELECT dimension FROM namespaces WHERE name = ?1")
            .bind(namespace)
            .fetch_optional(&self.pool)
            .await
            .map_err(RagError::store)?;

        Ok(row.map(|r| r.get::<i64, _>("dimension") as usize))
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(
        &self,
        namespace: &str,
        ids: Option<Vec<String>>,
        embeddings: Vec<Vec<f32>>,
        texts: Vec<String>,
        metadatas: Vec<Value>,
    ) -> Result<Vec<String>, RagError> {
        let n = embeddings.len();
        if texts.len() != n || metadatas.len() != n {
            return Err(RagError::Store(format!(
                "length mismatch: {} embeddings, {} texts, {} metadatas",
                n,
                texts.len(),
                metadatas.len()
            )));
        }
        if let Some(ids) = &ids {
            if ids.len() != n {
                return Err(RagError::Store(format!(
                    "length mismatch: {} ids for {} records",
                    ids.len(),
                    n
                )));
            }
        }
        if n == 0 {
            return Ok(Vec::new());
        }

        let dimension = embeddings[0].len();
        if dimension == 0 {
            return Err(RagError::Store("zero-dimension embedding".to_string()));
        }
        for embedding in &embeddings {
            if embedding.len() != dimension {
                return Err(RagError::Store(format!(
                    "embedding dimension mismatch within batch: {} != {}",
                    embedding.len(),
                    dimension
                )));
            }
        }

        if let Some(established) = self.namespace_dimension(namespace).await? {
            if established != dimension {
                return Err(RagError::Store(format!(
                    "dimension mismatch for namespace {namespace}: expected {established}, got {dimension}"
                )));
            }
        }

        let ids = ids.unwrap_or_else(|| {
            (0..n).map(|_| uuid::Uuid::new_v4().to_string()).collect()
        });

        let mut tx = self.pool.begin().await.map_err(RagError::store)?;

        sqlx::query("INSERT OR IGNORE INTO namespaces (name, dimension) VALUES (?1, ?2)")
            .bind(namespace)
            .bind(dimension as i64)
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;

        for (((id, embedding), text), metadata) in ids
            .iter()
            .zip(embeddings.iter())
            .zip(texts.iter())
            .zip(metadatas.iter())
        {
            let blob = Self::serialize_embedding(embedding);
            let metadata_str = serde_json::to_string(metadata).unwrap_or_else(|_| "{}".to_string());

            sqlx::query(
                "INSERT OR REPLACE INTO vector_records (namespace, id, text, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(namespace)
            .bind(id)
            .bind(text)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;
        }

        tx.commit().await.map_err(RagError::store)?;
        tracing::debug!("Stored {} records in namespace {}", n, namespace);
        Ok(ids)
    }

    async fn search(
        &self,
        namespace: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, RagError> {
        let Some(dimension) = self.namespace_dimension(namespace).await? else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(RagError::Store(format!(
                "query dimension {} does not match namespace dimension {}",
                query.len(),
                dimension
            )));
        }

        // rowid order = insertion order; the stable sort below keeps it
        // as the tie-break between equally distant records.
        let rows = sqlx::query(
            "SELECT id, text, metadata, embedding FROM vector_records
             WHERE namespace = ?1 ORDER BY rowid",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::store)?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let distance = 1.0 - Self::cosine_similarity(query, &stored);

                let metadata_str: String = row.get("metadata");
                let metadata = serde_json::from_str(&metadata_str).unwrap_or(Value::Null);

                Some(SearchHit {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata,
                    distance,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    async fn delete_by_metadata(
        &self,
        namespace: &str,
        filter: &Value,
    ) -> Result<usize, RagError> {
        let Some(filter_map) = filter.as_object() else {
            return Err(RagError::Store(
                "metadata filter must be an object".to_string(),
            ));
        };

        let rows = sqlx::query("SELECT id, metadata FROM vector_records WHERE namespace = ?1")
            .bind(namespace)
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::store)?;

        let matching: Vec<String> = rows
            .iter()
            .filter_map(|row| {
                let metadata_str: String = row.get("metadata");
                let metadata: Value = serde_json::from_str(&metadata_str).ok()?;
                let all_match = filter_map
                    .iter()
                    .all(|(key, expected)| metadata.get(key) == Some(expected));
                all_match.then(|| row.get("id"))
            })
            .collect();

        if matching.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(RagError::store)?;
        for id in &matching {
            sqlx::query("DELETE FROM vector_records WHERE namespace = ?1 AND id = ?2")
                .bind(namespace)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(RagError::store)?;
        }
        tx.commit().await.map_err(RagError::store)?;

        Ok(matching.len())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), RagError> {
        let mut tx = self.pool.begin().await.map_err(RagError::store)?;

        sqlx::query("DELETE FROM vector_records WHERE namespace = ?1")
            .bind(namespace)
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;

        sqlx::query("DELETE FROM namespaces WHERE name = ?1")
            .bind(namespace)
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;

        tx.commit().await.map_err(RagError::store)?;
        Ok(())
    }

    async fn count(&self, namespace: &str) -> Result<usize, RagError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM vector_records WHERE namespace = ?1")
                .bind(namespace)
                .fetch_one(&self.pool)
                .await
                .map_err(RagError::store)?;

        Ok(count as usize)
    }
}
