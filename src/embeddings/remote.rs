//! Remote embedding backend.
//!
//! Calls a hosted feature-extraction endpoint with a bearer credential.
//! A "model loading" reply carries an estimated wait; the call sleeps
//! and retries, bounded by an attempt count and a wall-clock ceiling.
//! Unavailability is reported as an empty result, not an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::core::config::EmbeddingSettings;
use crate::core::errors::RagError;

/// Attempts per embed call, including the first.
const MAX_ATTEMPTS: u32 = 3;

pub struct RemoteEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_token: Option<String>,
    dims: usize,
    wait_ceiling: Duration,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    inputs: &'a [String],
    options: RequestOptions,
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    wait_for_model: bool,
}

#[derive(Debug, Deserialize)]
struct ModelLoading {
    error: String,
    estimated_time: f64,
}

impl RemoteEmbeddingProvider {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.remote_model.clone(),
            api_token: settings.api_token.clone(),
            dims: settings.remote_dimensions,
            wait_ceiling: Duration::from_secs(settings.wait_ceiling_secs),
        })
    }

    fn request_url(&self) -> String {
        format!(
            "{}/pipeline/feature-extraction/{}",
            self.endpoint, self.model
        )
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let Some(token) = &self.api_token else {
            tracing::warn!("Remote embedding credential missing; returning no vectors");
            return Ok(Vec::new());
        };

        let url = self.request_url();
        let body = EmbeddingRequest {
            inputs: texts,
            options: RequestOptions {
                wait_for_model: true,
            },
        };

        let mut waited = Duration::ZERO;

        for attempt in 1..=MAX_ATTEMPTS {
            let response = match self
                .client
                .post(&url)
                .bearer_auth(token)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!("Embedding request failed (attempt {attempt}): {err}");
                    return Ok(Vec::new());
                }
            };

            if response.status().is_success() {
                match response.json::<Vec<Vec<f32>>>().await {
                    Ok(vectors) if vectors.len() == texts.len() => return Ok(vectors),
                    Ok(vectors) => {
                        tracing::warn!(
                            "Embedding endpoint returned {} vectors for {} inputs",
                            vectors.len(),
                            texts.len()
                        );
                        return Ok(Vec::new());
                    }
                    Err(err) => {
                        tracing::warn!("Malformed embedding response: {err}");
                        return Ok(Vec::new());
                    }
                }
            }

            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();

            // A structured loading reply is the only condition worth
            // retrying; anything else is a hard failure.
            let Some(loading) = parse_model_loading(&body_text) else {
                tracing::warn!("Embedding endpoint error {status}: {body_text}");
                return Ok(Vec::new());
            };

            if attempt == MAX_ATTEMPTS {
                tracing::warn!(
                    "Embedding model still loading after {MAX_ATTEMPTS} attempts: {}",
                    loading.error
                );
                return Ok(Vec::new());
            }

            let estimated = loading
                .estimated_time
                .clamp(0.0, self.wait_ceiling.as_secs_f64());
            let wait = Duration::from_secs_f64(estimated);
            let remaining = self.wait_ceiling.saturating_sub(waited);
            if remaining.is_zero() {
                tracing::warn!(
                    "Embedding wait ceiling of {:?} exhausted while model loads",
                    self.wait_ceiling
                );
                return Ok(Vec::new());
            }

            let wait = wait.min(remaining);
            tracing::info!(
                "Embedding model loading, waiting {:.1}s (attempt {attempt}/{MAX_ATTEMPTS})",
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
            waited += wait;
        }

        Ok(Vec::new())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn parse_model_loading(body: &str) -> Option<ModelLoading> {
    serde_json::from_str::<ModelLoading>(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(token: Option<&str>) -> EmbeddingSettings {
        EmbeddingSettings {
            api_token: token.map(|t| t.to_string()),
            ..EmbeddingSettings::default()
        }
    }

    #[test]
    fn request_url_targets_the_model_pipeline() {
        let provider = RemoteEmbeddingProvider::new(&settings(Some("hf_test"))).unwrap();
        assert_eq!(
            provider.request_url(),
            "https://api-inference.huggingface.co/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2"
        );
    }

    #[test]
    fn loading_reply_parses_estimated_time() {
        let loading =
            parse_model_loading(r#"{"error": "Model is currently loading", "estimated_time": 20.5}"#)
                .unwrap();
        assert_eq!(loading.estimated_time, 20.5);
        assert!(loading.error.contains("loading"));

        assert!(parse_model_loading(r#"{"error": "rate limited"}"#).is_none());
        assert!(parse_model_loading("service unavailable").is_none());
    }

    #[tokio::test]
    async fn missing_credential_yields_no_vectors() {
        let provider = RemoteEmbeddingProvider::new(&settings(None)).unwrap();
        let vectors = provider
            .embed(&["some text".to_string()])
            .await
            .unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output_without_io() {
        let provider = RemoteEmbeddingProvider::new(&settings(None)).unwrap();
        assert!(provider.embed(&[]).await.unwrap().is_empty());
    }
}
