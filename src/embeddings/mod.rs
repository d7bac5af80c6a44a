//! Embedding generation.
//!
//! One strategy trait, two backends: in-process inference via fastembed
//! and a remote feature-extraction endpoint. The configured backend is
//! built lazily on first use and shared for the life of the process.

mod local;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::core::config::{EmbeddingBackend, EmbeddingSettings};
use crate::core::errors::RagError;

pub use local::FastEmbedProvider;
pub use remote::RemoteEmbeddingProvider;

/// Converts text into fixed-dimension vectors.
///
/// `embed` preserves order and length; an empty input yields an empty
/// output. A backend that cannot produce vectors right now (missing
/// credential, exhausted retries) returns an empty vec, which callers
/// must treat as "embeddings unavailable", never as "zero documents".
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embed a single text. `None` means the backend is unavailable.
    async fn embed_one(&self, text: &str) -> Result<Option<Vec<f32>>, RagError> {
        let input = vec![text.to_string()];
        let vectors = self.embed(&input).await?;
        Ok(vectors.into_iter().next())
    }

    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}

static SHARED_PROVIDER: OnceCell<Arc<dyn EmbeddingProvider>> = OnceCell::const_new();

/// Process-wide provider handle.
///
/// The first caller constructs the backend; concurrent first callers all
/// receive the same instance. The settings of later calls are ignored
/// once the instance exists.
pub async fn shared_provider(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    SHARED_PROVIDER
        .get_or_try_init(|| build_provider(settings))
        .await
        .cloned()
}

/// Construct the backend selected by configuration.
pub async fn build_provider(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    match settings.backend {
        EmbeddingBackend::Local => {
            let provider = FastEmbedProvider::load(&settings.local_model).await?;
            tracing::info!("Loaded local embedding model: {}", provider.model_name());
            Ok(Arc::new(provider))
        }
        EmbeddingBackend::Remote => {
            let provider = RemoteEmbeddingProvider::new(settings)?;
            tracing::info!("Using remote embedding model: {}", provider.model_name());
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes one constant vector per input, or nothing when told to be
    /// unavailable.
    struct FixedEmbedder {
        available: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            if !self.available {
                return Ok(Vec::new());
            }
            Ok(texts.iter().map(|_| vec![1.0, 2.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "fixed-test"
        }
    }

    #[tokio::test]
    async fn embed_preserves_input_length() {
        let provider = FixedEmbedder { available: true };

        let inputs: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();
        let vectors = provider.embed(&inputs).await.unwrap();
        assert_eq!(vectors.len(), 5);
        assert!(vectors.iter().all(|v| v.len() == provider.dimensions()));

        assert!(provider.embed(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embed_one_returns_first_vector_or_none() {
        let available = FixedEmbedder { available: true };
        assert_eq!(
            available.embed_one("text").await.unwrap(),
            Some(vec![1.0, 2.0])
        );

        let unavailable = FixedEmbedder { available: false };
        assert_eq!(unavailable.embed_one("text").await.unwrap(), None);
    }
}
