use serde_json::Value;

/// Retrieval pipeline knobs.
#[derive(Debug, Clone)]
pub struct RagSettings {
    /// Chunk window, in words.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in words.
    pub chunk_overlap: usize,
    /// Number of nearest records retrieved per query.
    pub top_k: usize,
    /// Number of recent chat turns fed back to the model.
    pub history_limit: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 3,
            history_limit: 5,
        }
    }
}

impl RagSettings {
    pub fn from_config(config: &Value) -> Self {
        let defaults = Self::default();
        let section = config.get("rag");

        Self {
            chunk_size: read_usize(section, "chunk_size", defaults.chunk_size),
            chunk_overlap: read_usize(section, "chunk_overlap", defaults.chunk_overlap),
            top_k: read_usize(section, "top_k", defaults.top_k).max(1),
            history_limit: read_usize(section, "history_limit", defaults.history_limit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Local,
    Remote,
}

/// Embedding backend selection and credentials.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub local_model: String,
    pub remote_model: String,
    pub endpoint: String,
    pub api_token: Option<String>,
    /// Dimension of vectors served by the remote model.
    pub remote_dimensions: usize,
    /// Total wall-clock budget for "model loading" waits, in seconds.
    pub wait_ceiling_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Local,
            local_model: "all-MiniLM-L6-v2".to_string(),
            remote_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            endpoint: "https://api-inference.huggingface.co".to_string(),
            api_token: None,
            remote_dimensions: 384,
            wait_ceiling_secs: 60,
            request_timeout_secs: 30,
        }
    }
}

impl EmbeddingSettings {
    pub fn from_config(config: &Value) -> Self {
        let defaults = Self::default();
        let section = config.get("embeddings");

        let backend = match read_str(section, "backend", "local").as_str() {
            "remote" => EmbeddingBackend::Remote,
            _ => EmbeddingBackend::Local,
        };

        Self {
            backend,
            local_model: read_str(section, "local_model", &defaults.local_model),
            remote_model: read_str(section, "remote_model", &defaults.remote_model),
            endpoint: read_str(section, "endpoint", &defaults.endpoint),
            api_token: read_opt_str(section, "api_token"),
            remote_dimensions: read_usize(section, "remote_dimensions", defaults.remote_dimensions),
            wait_ceiling_secs: read_u64(section, "wait_ceiling_secs", defaults.wait_ceiling_secs),
            request_timeout_secs: read_u64(
                section,
                "request_timeout_secs",
                defaults.request_timeout_secs,
            ),
        }
    }
}

/// Chat-completion backend settings. Sampling parameters are fixed by
/// policy and not read from configuration.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: i32,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 1024,
            request_timeout_secs: 60,
        }
    }
}

impl LlmSettings {
    pub fn from_config(config: &Value) -> Self {
        let defaults = Self::default();
        let section = config.get("llm");

        Self {
            base_url: read_str(section, "base_url", &defaults.base_url),
            model: read_str(section, "model", &defaults.model),
            api_key: read_opt_str(section, "api_key"),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            request_timeout_secs: read_u64(
                section,
                "request_timeout_secs",
                defaults.request_timeout_secs,
            ),
        }
    }
}

fn read_usize(section: Option<&Value>, key: &str, default: usize) -> usize {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(default)
}

fn read_u64(section: Option<&Value>, key: &str, default: u64) -> u64 {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_u64())
        .unwrap_or(default)
}

fn read_str(section: Option<&Value>, key: &str, default: &str) -> String {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

fn read_opt_str(section: Option<&Value>, key: &str) -> Option<String> {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rag_settings_use_defaults_when_absent() {
        let settings = RagSettings::from_config(&json!({}));
        assert_eq!(settings.chunk_size, 500);
        assert_eq!(settings.chunk_overlap, 50);
        assert_eq!(settings.top_k, 3);
        assert_eq!(settings.history_limit, 5);
    }

    #[test]
    fn rag_settings_read_overrides() {
        let settings = RagSettings::from_config(&json!({
            "rag": {"chunk_size": 200, "chunk_overlap": 20, "top_k": 5, "history_limit": 2}
        }));
        assert_eq!(settings.chunk_size, 200);
        assert_eq!(settings.chunk_overlap, 20);
        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.history_limit, 2);
    }

    #[test]
    fn embedding_backend_selector() {
        let local = EmbeddingSettings::from_config(&json!({}));
        assert_eq!(local.backend, EmbeddingBackend::Local);

        let remote = EmbeddingSettings::from_config(&json!({
            "embeddings": {"backend": "remote", "api_token": "hf_test"}
        }));
        assert_eq!(remote.backend, EmbeddingBackend::Remote);
        assert_eq!(remote.api_token.as_deref(), Some("hf_test"));
    }

    #[test]
    fn empty_token_reads_as_missing() {
        let settings = EmbeddingSettings::from_config(&json!({
            "embeddings": {"api_token": ""}
        }));
        assert!(settings.api_token.is_none());
    }

    #[test]
    fn llm_sampling_parameters_are_fixed() {
        let settings = LlmSettings::from_config(&json!({
            "llm": {"model": "mixtral-8x7b", "temperature": 0.0}
        }));
        assert_eq!(settings.model, "mixtral-8x7b");
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.max_tokens, 1024);
    }
}
