//! In-process embedding backend.
//!
//! Runs a fastembed ONNX model inside the process. Inference is
//! CPU-bound and blocking, so it is moved onto the blocking pool; inputs
//! are batched with a fixed cap to bound peak memory.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::EmbeddingProvider;
use crate::core::errors::RagError;

/// Upper bound on texts per inference call.
const MAX_BATCH: usize = 32;

pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dims: usize,
}

impl FastEmbedProvider {
    /// Load the named model, downloading it on first use.
    pub async fn load(model_name: &str) -> Result<Self, RagError> {
        let (embedding_model, dims) = resolve_model(model_name)?;
        let resolved_name = model_name.to_string();

        let model = tokio::task::spawn_blocking(move || {
            TextEmbedding::try_new(
                InitOptions::new(embedding_model).with_show_download_progress(false),
            )
        })
        .await
        .map_err(|err| RagError::EmbeddingUnavailable(format!("model load aborted: {err}")))?
        .map_err(|err| {
            RagError::EmbeddingUnavailable(format!("failed to load {resolved_name}: {err}"))
        })?;

        Ok(Self {
            model: Arc::new(model),
            model_name: resolved_name,
            dims,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model.clone();
        let inputs = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || model.embed(inputs, Some(MAX_BATCH)))
            .await
            .map_err(|err| RagError::EmbeddingUnavailable(format!("inference aborted: {err}")))?
            .map_err(|err| RagError::EmbeddingUnavailable(err.to_string()))?;

        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Map a configured model name onto a supported fastembed model and its
/// output dimension.
fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize), RagError> {
    // Accept both the bare name and the hub-qualified form.
    let short = name.rsplit('/').next().unwrap_or(name).to_ascii_lowercase();

    match short.as_str() {
        "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "nomic-embed-text-v1.5" => Ok((EmbeddingModel::NomicEmbedTextV15, 768)),
        _ => Err(RagError::Configuration(format!(
            "unsupported local embedding model: {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_models_resolve_with_dimensions() {
        let (_, dims) = resolve_model("all-MiniLM-L6-v2").unwrap();
        assert_eq!(dims, 384);

        let (_, dims) = resolve_model("sentence-transformers/all-MiniLM-L6-v2").unwrap();
        assert_eq!(dims, 384);

        let (_, dims) = resolve_model("nomic-embed-text-v1.5").unwrap();
        assert_eq!(dims, 768);
    }

    #[test]
    fn unknown_model_is_a_configuration_error() {
        let err = resolve_model("definitely-not-a-model").unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }
}
