use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::core::config::{AppPaths, ConfigService, EmbeddingSettings, LlmSettings, RagSettings};
use crate::documents::DocumentStore;
use crate::embeddings::{self, EmbeddingProvider};
use crate::generation::{ChatCompletionsProvider, ResponseGenerator};
use crate::history::HistoryStore;
use crate::ingest::DocumentIngestor;
use crate::pipeline::RagPipeline;
use crate::store::{SqliteVectorStore, VectorStore};

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to initialize history store: {0}")]
    History(#[source] anyhow::Error),

    #[error("Failed to initialize document store: {0}")]
    Documents(#[source] anyhow::Error),

    #[error("Failed to initialize vector store: {0}")]
    Vectors(#[source] anyhow::Error),

    #[error("Failed to initialize embedding backend: {0}")]
    Embeddings(#[source] anyhow::Error),

    #[error("Failed to initialize LLM client: {0}")]
    Llm(#[source] anyhow::Error),
}

/// Process-wide pipeline state shared with the outer web layer.
///
/// Holds the shared singletons: configuration, the stores, the embedding
/// backend and the assembled pipeline. Clone freely; everything inside
/// is reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub history: HistoryStore,
    pub documents: DocumentStore,
    pub vectors: Arc<dyn VectorStore>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub ingestor: Arc<DocumentIngestor>,
    pub pipeline: Arc<RagPipeline>,
}

impl AppState {
    /// Initializes the pipeline state.
    ///
    /// This process includes:
    /// 1. Setting up paths and loading configuration
    /// 2. Opening the history, document and vector stores
    /// 3. Building (or reusing) the process-wide embedding backend
    /// 4. Assembling the ingestor and the retrieval pipeline
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());
        let merged = config.load_config();

        let rag_settings = RagSettings::from_config(&merged);
        let embedding_settings = EmbeddingSettings::from_config(&merged);
        let llm_settings = LlmSettings::from_config(&merged);

        let history = HistoryStore::new(paths.db_path.clone())
            .await
            .map_err(|e| InitializationError::History(e.into()))?;

        let documents = DocumentStore::new(paths.db_path.clone())
            .await
            .map_err(|e| InitializationError::Documents(e.into()))?;

        let vectors: Arc<dyn VectorStore> = Arc::new(
            SqliteVectorStore::new(paths.as_ref())
                .await
                .map_err(|e| InitializationError::Vectors(e.into()))?,
        );

        let embeddings = embeddings::shared_provider(&embedding_settings)
            .await
            .map_err(|e| InitializationError::Embeddings(e.into()))?;

        let llm = Arc::new(
            ChatCompletionsProvider::new(
                llm_settings.base_url.clone(),
                llm_settings.api_key.clone(),
                Duration::from_secs(llm_settings.request_timeout_secs),
            )
            .map_err(|e| InitializationError::Llm(e.into()))?,
        );
        let generator = ResponseGenerator::new(llm, llm_settings);

        let ingestor = Arc::new(DocumentIngestor::new(
            documents.clone(),
            vectors.clone(),
            embeddings.clone(),
            rag_settings.clone(),
        ));

        let pipeline = Arc::new(RagPipeline::new(
            embeddings.clone(),
            vectors.clone(),
            history.clone(),
            generator,
            rag_settings,
        ));

        Ok(Arc::new(AppState {
            paths,
            config,
            history,
            documents,
            vectors,
            embeddings,
            ingestor,
            pipeline,
        }))
    }
}
