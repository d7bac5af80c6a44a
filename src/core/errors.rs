use thiserror::Error;

/// Errors raised by the document-chat pipeline.
///
/// Ingestion-time failures abort the document and trigger rollback.
/// Query-time failures degrade (empty context, empty history) except
/// for `Generation`, which reaches the caller as a typed error.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("embeddings unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("vector store error: {0}")]
    Store(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RagError {
    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        RagError::Store(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        RagError::Generation(err.to_string())
    }
}
