//! Generator port: produces the final answer from assembled context.

use async_trait::async_trait;

use crate::domain::errors::RagResult;
use crate::domain::models::ImageData;

/// One generation call: a fully assembled prompt plus an optional image.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: Option<ImageData>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: ImageData) -> Self {
        self.image = Some(image);
        self
    }
}

/// Trait for answer generation backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Backend name (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Whether an image can be attached to the request.
    fn supports_images(&self) -> bool;

    /// Generate a completion. Failures surface as `GenerationFailure`.
    async fn generate(&self, request: &GenerationRequest) -> RagResult<String>;
}
