//! Document ingestion.
//!
//! Extraction and chunking happen before any state is written. After
//! that, ingestion is all-or-nothing per document: the document row and
//! every vector record land together, or the partial writes are rolled
//! back and the error propagates.

pub mod chunker;
pub mod extract;

use std::sync::Arc;

use serde_json::json;

use crate::core::config::RagSettings;
use crate::core::errors::RagError;
use crate::documents::DocumentStore;
use crate::embeddings::EmbeddingProvider;
use crate::store::{namespace_for_owner, VectorStore};

/// Outcome of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub document_id: i64,
    pub chunks: usize,
}

pub struct DocumentIngestor {
    documents: DocumentStore,
    vectors: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    settings: RagSettings,
}

impl DocumentIngestor {
    pub fn new(
        documents: DocumentStore,
        vectors: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        settings: RagSettings,
    ) -> Self {
        Self {
            documents,
            vectors,
            embeddings,
            settings,
        }
    }

    /// Ingest one uploaded document for `owner_id`.
    pub async fn ingest(
        &self,
        owner_id: i64,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestReport, RagError> {
        // Both of these fail before any state exists, so nothing to roll
        // back yet.
        let text = extract::extract_text(filename, bytes)?;
        let chunks =
            chunker::chunk_words(&text, self.settings.chunk_size, self.settings.chunk_overlap)?;

        let document_id = self.documents.create(owner_id, filename).await?;

        let stored = self
            .store_chunks(owner_id, document_id, filename, &chunks)
            .await;
        let result = match stored {
            Ok(()) => self.documents.mark_processed(document_id).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    "Ingested {} as document {} ({} chunks)",
                    filename,
                    document_id,
                    chunks.len()
                );
                Ok(IngestReport {
                    document_id,
                    chunks: chunks.len(),
                })
            }
            Err(err) => {
                tracing::error!("Ingestion of {} failed, rolling back: {}", filename, err);
                self.rollback(owner_id, document_id).await;
                Err(err)
            }
        }
    }

    async fn store_chunks(
        &self,
        owner_id: i64,
        document_id: i64,
        filename: &str,
        chunks: &[String],
    ) -> Result<(), RagError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let embeddings = self.embeddings.embed(chunks).await?;
        if embeddings.is_empty() {
            return Err(RagError::EmbeddingUnavailable(
                "embedding backend produced no vectors".to_string(),
            ));
        }
        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "{} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let metadatas = chunks
            .iter()
            .map(|_| json!({"filename": filename, "document_id": document_id}))
            .collect();

        self.vectors
            .upsert(
                &namespace_for_owner(owner_id),
                None,
                embeddings,
                chunks.to_vec(),
                metadatas,
            )
            .await?;

        Ok(())
    }

    /// Best-effort removal of whatever the failed ingestion wrote.
    async fn rollback(&self, owner_id: i64, document_id: i64) {
        let filter = json!({"document_id": document_id});
        if let Err(err) = self
            .vectors
            .delete_by_metadata(&namespace_for_owner(owner_id), &filter)
            .await
        {
            tracing::warn!("Rollback: failed to delete vector records: {}", err);
        }
        if let Err(err) = self.documents.delete(document_id).await {
            tracing::warn!("Rollback: failed to delete document row: {}", err);
        }
    }

    /// Delete a document and its vector records.
    pub async fn delete_document(&self, owner_id: i64, document_id: i64) -> Result<bool, RagError> {
        let filter = json!({"document_id": document_id});
        self.vectors
            .delete_by_metadata(&namespace_for_owner(owner_id), &filter)
            .await?;
        self.documents.delete(document_id).await
    }

    /// Remove every trace of an owner: vector namespace and document rows.
    pub async fn delete_owner_data(&self, owner_id: i64) -> Result<(), RagError> {
        self.vectors
            .delete_namespace(&namespace_for_owner(owner_id))
            .await?;
        self.documents.delete_owner(owner_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteVectorStore;
    use async_trait::async_trait;

    /// Deterministic embedder: counts a few marker words.
    struct MarkerEmbedder;

    fn marker_vector(text: &str) -> Vec<f32> {
        let mut counts = [0f32; 4];
        for word in text.split_whitespace() {
            match word {
                "alpha" => counts[0] += 1.0,
                "bravo" => counts[1] += 1.0,
                "charlie" => counts[2] += 1.0,
                _ => counts[3] += 1.0,
            }
        }
        counts.to_vec()
    }

    #[async_trait]
    impl EmbeddingProvider for MarkerEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(texts.iter().map(|t| marker_vector(t)).collect())
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "marker-test"
        }
    }

    /// Embedder that reports unavailability via an empty result.
    struct UnavailableEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UnavailableEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(Vec::new())
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "unavailable-test"
        }
    }

    async fn test_fixture(
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> (DocumentIngestor, DocumentStore, Arc<SqliteVectorStore>) {
        let tag = uuid::Uuid::new_v4();
        let documents = DocumentStore::new(
            std::env::temp_dir().join(format!("docuchat-ingest-docs-{tag}.db")),
        )
        .await
        .unwrap();
        let vectors = Arc::new(
            SqliteVectorStore::with_path(
                std::env::temp_dir().join(format!("docuchat-ingest-vectors-{tag}.db")),
            )
            .await
            .unwrap(),
        );

        let ingestor = DocumentIngestor::new(
            documents.clone(),
            vectors.clone(),
            embeddings,
            RagSettings::default(),
        );
        (ingestor, documents, vectors)
    }

    fn words(word: &str, n: usize) -> String {
        vec![word; n].join(" ")
    }

    #[tokio::test]
    async fn ingest_stores_chunks_and_marks_processed() {
        let (ingestor, documents, vectors) = test_fixture(Arc::new(MarkerEmbedder)).await;

        // 1200 words with default chunking (500/50) make 3 chunks.
        let text = format!(
            "{} {} {}",
            words("alpha", 450),
            words("bravo", 450),
            words("charlie", 300)
        );

        let report = ingestor.ingest(1, "doc.txt", text.as_bytes()).await.unwrap();
        assert_eq!(report.chunks, 3);

        let doc = documents.get(report.document_id).await.unwrap().unwrap();
        assert!(doc.processed);
        assert_eq!(vectors.count("user_1_docs").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn unsupported_extension_writes_nothing() {
        let (ingestor, documents, vectors) = test_fixture(Arc::new(MarkerEmbedder)).await;

        let err = ingestor.ingest(1, "img.png", b"bytes").await.unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
        assert!(documents.list_owner(1).await.unwrap().is_empty());
        assert_eq!(vectors.count("user_1_docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn embedding_outage_rolls_back_the_document() {
        let (ingestor, documents, vectors) = test_fixture(Arc::new(UnavailableEmbedder)).await;

        let err = ingestor
            .ingest(1, "doc.txt", b"some words to ingest")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::EmbeddingUnavailable(_)));

        // The pending row created before embedding is gone again.
        assert!(documents.list_owner(1).await.unwrap().is_empty());
        assert_eq!(vectors.count("user_1_docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_document_removes_row_and_vectors() {
        let (ingestor, documents, vectors) = test_fixture(Arc::new(MarkerEmbedder)).await;

        let first = ingestor
            .ingest(1, "first.txt", words("alpha", 40).as_bytes())
            .await
            .unwrap();
        let second = ingestor
            .ingest(1, "second.txt", words("bravo", 40).as_bytes())
            .await
            .unwrap();

        assert!(ingestor.delete_document(1, first.document_id).await.unwrap());

        assert!(documents.get(first.document_id).await.unwrap().is_none());
        assert!(documents.get(second.document_id).await.unwrap().is_some());
        assert_eq!(vectors.count("user_1_docs").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_owner_data_clears_namespace_and_rows() {
        let (ingestor, documents, vectors) = test_fixture(Arc::new(MarkerEmbedder)).await;

        ingestor
            .ingest(1, "a.txt", words("alpha", 10).as_bytes())
            .await
            .unwrap();
        ingestor
            .ingest(2, "b.txt", words("bravo", 10).as_bytes())
            .await
            .unwrap();

        ingestor.delete_owner_data(1).await.unwrap();

        assert!(documents.list_owner(1).await.unwrap().is_empty());
        assert_eq!(vectors.count("user_1_docs").await.unwrap(), 0);
        assert_eq!(vectors.count("user_2_docs").await.unwrap(), 1);
    }
}
