//! Anthropic Messages API generator adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use tracing::{debug, info, instrument, warn};

use super::types::{ContentBlock, ImageSource, Message, MessageContent, MessageRequest, MessageResponse};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{GenerationConfig, RateLimitConfig, RetryConfig};
use crate::domain::ports::{GenerationRequest, Generator};
use crate::infrastructure::http::{redact_key, BackendError, RetryPolicy, TokenBucketRateLimiter};

const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const API_VERSION: &str = "2023-06-01";

/// Generator backed by the Anthropic Messages API
pub struct AnthropicGenerator {
    config: GenerationConfig,
    client: reqwest::Client,
    rate_limiter: TokenBucketRateLimiter,
    retry_policy: RetryPolicy,
}

impl AnthropicGenerator {
    pub fn new(
        config: GenerationConfig,
        rate_limit: &RateLimitConfig,
        retry: &RetryConfig,
    ) -> Result<Self, BackendError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(API_VERSION),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            api_key = %config.api_key.as_deref().map_or_else(|| format!("${API_KEY_ENV}"), redact_key),
            "Initializing Anthropic generator"
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

    fn build_request(&self, request: &GenerationRequest) -> MessageRequest {
        let content = match &request.image {
            Some(image) => MessageContent::Blocks(vec![
                ContentBlock::Image {
                    source: ImageSource::Base64 {
                        media_type: image.format().media_type().to_string(),
                        data: image.to_base64(),
                    },
                },
                ContentBlock::Text {
                    text: request.prompt.clone(),
                },
            ]),
            None => MessageContent::Text(request.prompt.clone()),
        };

        MessageRequest {
            model: self.config.model.clone(),
            messages: vec![Message::user(content)],
            max_tokens: self.config.max_tokens,
            system: None,
            temperature: Some(self.config.temperature),
        }
    }

    async fn send(&self, api_key: &str, request: &MessageRequest) -> Result<MessageResponse, BackendError> {
        let url = format!("{}/v1/messages", self.config.base_url);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            warn!("API error ({}): {}", status, body);
            return Err(BackendError::from_status(status, body));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn supports_images(&self) -> bool {
        true
    }

    #[instrument(skip(self, request), fields(model = %self.config.model, with_image = request.image.is_some()))]
    async fn generate(&self, request: &GenerationRequest) -> RagResult<String> {
        let api_key = self.api_key().ok_or_else(|| {
            RagError::GenerationFailure(format!(
                "Anthropic API key not set. Set {API_KEY_ENV} or configure generation.api_key."
            ))
        })?;
        let message = self.build_request(request);

        let (api_key, message) = (api_key.as_str(), &message);
        let response = self
            .retry_policy
            .execute(|| async move {
                self.rate_limiter.acquire().await;
                self.send(api_key, message).await
            })
            .await
            .map_err(|e| match e {
                BackendError::Timeout => RagError::GenerationTimeout,
                other => RagError::GenerationFailure(other.to_string()),
            })?;

        info!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Generation succeeded"
        );

        let text = response.text();
        if text.trim().is_empty() {
            return Err(RagError::GenerationFailure(
                "model returned no text".to_string(),
            ));
        }
        Ok(text)
    }
}
