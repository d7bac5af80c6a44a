//! Chat history.
//!
//! Turns are persisted by the outer layer after each exchange; the
//! pipeline consumes a time-ascending view of the most recent N.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use crate::core::errors::RagError;

/// One completed query/response exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: i64,
    pub owner_id: i64,
    pub query: String,
    pub response: String,
    pub created_at: String,
}

#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, RagError> {
        let conn_str = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn_str)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                query TEXT NOT NULL,
                response TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chat_turns_owner ON chat_turns(owner_id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    pub async fn record_turn(
        &self,
        owner_id: i64,
        query: &str,
        response: &str,
    ) -> Result<i64, RagError> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO chat_turns (owner_id, query, response, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(owner_id)
        .bind(query)
        .bind(response)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// The newest `limit` turns for `owner_id`, oldest first.
    pub async fn recent_turns(&self, owner_id: i64, limit: usize) -> Result<Vec<ChatTurn>, RagError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT * FROM (SELECT * FROM chat_turns WHERE owner_id = ? ORDER BY id DESC LIMIT ?)
             ORDER BY id ASC",
        )
        .bind(owner_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut turns = Vec::new();
        for row in rows {
            turns.push(ChatTurn {
                id: row.try_get::<i64, _>("id").unwrap_or_default(),
                owner_id: row.try_get::<i64, _>("owner_id").unwrap_or_default(),
                query: row.try_get::<String, _>("query").unwrap_or_default(),
                response: row.try_get::<String, _>("response").unwrap_or_default(),
                created_at: row.try_get::<String, _>("created_at").unwrap_or_default(),
            });
        }

        Ok(turns)
    }

    pub async fn clear_owner(&self, owner_id: i64) -> Result<usize, RagError> {
        let result = sqlx::query("DELETE FROM chat_turns WHERE owner_id = ?")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    pub async fn count_owner(&self, owner_id: i64) -> Result<usize, RagError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_turns WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
