//! Document ownership records.
//!
//! One row per uploaded document. Rows start unprocessed, flip to
//! processed when ingestion lands every chunk, and disappear when the
//! document is deleted or ingestion rolls back.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use crate::core::errors::RagError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub owner_id: i64,
    pub filename: String,
    pub processed: bool,
    pub created_at: String,
}

#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, RagError> {
        let conn_str = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn_str)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                filename TEXT NOT NULL,
                processed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Insert a pending document row, returning its id.
    pub async fn create(&self, owner_id: i64, filename: &str) -> Result<i64, RagError> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO documents (owner_id, filename, processed, created_at) VALUES (?, ?, 0, ?)",
        )
        .bind(owner_id)
        .bind(filename)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn mark_processed(&self, document_id: i64) -> Result<(), RagError> {
        sqlx::query("UPDATE documents SET processed = 1 WHERE id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, document_id: i64) -> Result<Option<DocumentRecord>, RagError> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| record_from_row(&row)))
    }

    pub async fn list_owner(&self, owner_id: i64) -> Result<Vec<DocumentRecord>, RagError> {
        let rows = sqlx::query("SELECT * FROM documents WHERE owner_id = ? ORDER BY created_at DESC")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    pub async fn delete(&self, document_id: i64) -> Result<bool, RagError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_owner(&self, owner_id: i64) -> Result<usize, RagError> {
        let result = sqlx::query("DELETE FROM documents WHERE owner_id = ?")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> DocumentRecord {
    DocumentRecord {
        id: row.try_get::<i64, _>("id").unwrap_or_default(),
        owner_id: row.try_get::<i64, _>("owner_id").unwrap_or_default(),
        filename: row.try_get::<String, _>("filename").unwrap_or_default(),
        processed: row.try_get::<i64, _>("processed").unwrap_or_default() != 0,
        created_at: row.try_get::<String, _>("created_at").unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> DocumentStore {
        let tmp = std::env::temp_dir().join(format!(
            "docuchat-documents-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        DocumentStore::new(tmp).await.unwrap()
    }

    #[tokio::test]
    async fn create_starts_unprocessed() {
        let store = test_store().await;

        let id = store.create(1, "report.pdf").await.unwrap();
        let doc = store.get(id).await.unwrap().unwrap();
        assert_eq!(doc.filename, "report.pdf");
        assert!(!doc.processed);

        store.mark_processed(id).await.unwrap();
        let doc = store.get(id).await.unwrap().unwrap();
        assert!(doc.processed);
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let store = test_store().await;

        let id = store.create(1, "a.txt").await.unwrap();
        assert!(store.delete(id).await.unwrap());
        assert!(store.get(id).await.unwrap().is_none());
        assert!(!store.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_owner() {
        let store = test_store().await;

        store.create(1, "a.txt").await.unwrap();
        store.create(1, "b.txt").await.unwrap();
        store.create(2, "c.txt").await.unwrap();

        assert_eq!(store.list_owner(1).await.unwrap().len(), 2);
        assert_eq!(store.list_owner(2).await.unwrap().len(), 1);

        assert_eq!(store.delete_owner(1).await.unwrap(), 2);
        assert!(store.list_owner(1).await.unwrap().is_empty());
    }
}
