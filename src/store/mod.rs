//! Vector storage.
//!
//! Records live in per-owner namespaces; nothing crosses a namespace
//! boundary, so owner isolation needs no locking. The primary
//! implementation is `SqliteVectorStore` in the `sqlite` module.

mod sqlite;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::errors::RagError;

pub use sqlite::SqliteVectorStore;

/// Namespace key for one owner's document collection.
pub fn namespace_for_owner(owner_id: i64) -> String {
    format!("user_{owner_id}_docs")
}

/// A ranked search result. Lower distance means more relevant.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub metadata: Value,
    pub distance: f32,
}

/// Abstract interface over vector storage backends.
///
/// Every operation is scoped to a namespace. `delete_by_metadata` is part
/// of the trait for all backends; a backend with nothing to do returns 0.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store records, generating ids when the caller passes `None`.
    ///
    /// All sequences must have equal length, and every embedding must
    /// match the namespace's established dimension. Returns the ids
    /// actually stored, in input order.
    async fn upsert(
        &self,
        namespace: &str,
        ids: Option<Vec<String>>,
        embeddings: Vec<Vec<f32>>,
        texts: Vec<String>,
        metadatas: Vec<Value>,
    ) -> Result<Vec<String>, RagError>;

    /// Return up to `k` records nearest to `query`, ascending by
    /// distance. An empty or missing namespace yields an empty vec.
    async fn search(
        &self,
        namespace: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, RagError>;

    /// Delete all records whose metadata matches every key in `filter`.
    /// Returns the number of deleted records.
    async fn delete_by_metadata(&self, namespace: &str, filter: &Value)
        -> Result<usize, RagError>;

    /// Remove the namespace and everything in it. Idempotent.
    async fn delete_namespace(&self, namespace: &str) -> Result<(), RagError>;

    /// Number of records in the namespace.
    async fn count(&self, namespace: &str) -> Result<usize, RagError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_key_embeds_owner_id() {
        assert_eq!(namespace_for_owner(42), "user_42_docs");
        assert_ne!(namespace_for_owner(1), namespace_for_owner(11));
    }
}
