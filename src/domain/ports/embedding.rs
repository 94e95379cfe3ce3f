//! Embedding provider port for multimodal vector generation.
//!
//! Text and images must be embedded by the same model so that a text query
//! can retrieve an image and the other way round.

use async_trait::async_trait;

use crate::domain::errors::RagResult;
use crate::domain::models::ImageData;

/// Trait for multimodal embedding providers.
///
/// Every vector returned has exactly `dimension()` components, for both
/// modalities. Implementations report rejected inputs as
/// `EmbeddingFailure { kind: InvalidInput, .. }` and unusable backends as
/// `EmbeddingFailure { kind: Backend, .. }`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name (e.g., "voyage").
    fn name(&self) -> &str;

    /// Embedding dimension for this provider/model.
    fn dimension(&self) -> usize;

    /// Generate an embedding for a text fragment.
    async fn embed_text(&self, text: &str) -> RagResult<Vec<f32>>;

    /// Generate an embedding for an encoded image.
    async fn embed_image(&self, image: &ImageData) -> RagResult<Vec<f32>>;
}
