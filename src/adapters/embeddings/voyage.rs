//! Voyage multimodal embedding provider adapter.
//!
//! Text and images go through the same `/multimodalembeddings` endpoint and
//! model, so both land in one vector space.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::domain::errors::{Modality, RagError, RagResult};
use crate::domain::models::{EmbeddingConfig, ImageData, RateLimitConfig, RetryConfig};
use crate::domain::ports::EmbeddingProvider;
use crate::infrastructure::http::{redact_key, BackendError, RetryPolicy, TokenBucketRateLimiter};

const API_KEY_ENV: &str = "VOYAGE_API_KEY";

/// Voyage multimodal embedding provider.
pub struct VoyageEmbeddingProvider {
    config: EmbeddingConfig,
    client: reqwest::Client,
    rate_limiter: TokenBucketRateLimiter,
    retry_policy: RetryPolicy,
}

impl VoyageEmbeddingProvider {
    pub fn new(
        config: EmbeddingConfig,
        rate_limit: &RateLimitConfig,
        retry: &RetryConfig,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            dimension = config.dimension,
            api_key = %config.api_key.as_deref().map_or_else(|| format!("${API_KEY_ENV}"), redact_key),
            "Initializing Voyage embedding provider"
        );

        Ok(Self {
            config,
            client,
            rate_limiter: TokenBucketRateLimiter::from_config(rate_limit),
            retry_policy: RetryPolicy::from_config(retry),
        })
    }

    fn api_key(&self) -> Option<String> {
        self.config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
    }

    async fn embed_content(&self, modality: Modality, content: ContentPart) -> RagResult<Vec<f32>> {
        let api_key = self.api_key().ok_or_else(|| {
            RagError::backend(
                modality,
                format!("Voyage API key not set. Set {API_KEY_ENV} or configure embedding.api_key."),
            )
        })?;

        let request = EmbeddingsRequest {
            inputs: vec![MultimodalInput {
                content: vec![content],
            }],
            model: &self.config.model,
        };

        let (api_key, request) = (api_key.as_str(), &request);
        let response = self
            .retry_policy
            .execute(|| async move {
                self.rate_limiter.acquire().await;
                self.send(api_key, request).await
            })
            .await
            .map_err(|e| map_backend_error(modality, e))?;

        let vector = response
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| RagError::backend(modality, "empty embedding response"))?;

        if vector.len() != self.config.dimension {
            return Err(RagError::backend(
                modality,
                format!(
                    "model returned {}-dimensional vectors but embedding.dimension is {}",
                    vector.len(),
                    self.config.dimension
                ),
            ));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(RagError::backend(modality, "embedding contains non-finite values"));
        }

        Ok(vector)
    }

    async fn send(
        &self,
        api_key: &str,
        request: &EmbeddingsRequest<'_>,
    ) -> Result<EmbeddingsResponse, BackendError> {
        let url = format!("{}/multimodalembeddings", self.config.base_url);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(BackendError::from_status(status, body));
        }

        Ok(response.json().await?)
    }
}

fn map_backend_error(modality: Modality, err: BackendError) -> RagError {
    match err {
        BackendError::Timeout => RagError::EmbeddingTimeout { modality },
        BackendError::InvalidRequest(reason) => RagError::invalid_input(modality, reason),
        other => RagError::backend(modality, other.to_string()),
    }
}

#[async_trait]
impl EmbeddingProvider for VoyageEmbeddingProvider {
    fn name(&self) -> &str {
        "voyage"
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn embed_text(&self, text: &str) -> RagResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::invalid_input(Modality::Text, "text is empty"));
        }

        self.embed_content(
            Modality::Text,
            ContentPart::Text {
                text: text.to_string(),
            },
        )
        .await
    }

    #[instrument(skip(self, image), fields(format = %image.format(), bytes = image.len()))]
    async fn embed_image(&self, image: &ImageData) -> RagResult<Vec<f32>> {
        self.embed_content(
            Modality::Image,
            ContentPart::ImageBase64 {
                image_base64: image.to_data_url(),
            },
        )
        .await
    }
}

// -- Voyage API request/response types --

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    inputs: Vec<MultimodalInput>,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct MultimodalInput {
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageBase64 { image_base64: String },
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
