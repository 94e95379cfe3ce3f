//! Common test utilities for integration tests
//!
//! Deterministic in-process stand-ins for the embedding and generation
//! backends, with call counters so tests can assert what reached them.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use multimodal_rag::domain::errors::{Modality, RagError, RagResult};
use multimodal_rag::domain::models::{ImageData, QueryConfig};
use multimodal_rag::domain::ports::{EmbeddingProvider, GenerationRequest, Generator};
use multimodal_rag::infrastructure::vector::VectorIndexStore;
use multimodal_rag::services::MultimodalRag;
use tempfile::TempDir;

pub const DIMENSION: usize = 64;

/// Bucket reserved for image embeddings; text never hashes here.
const IMAGE_BUCKET: usize = DIMENSION - 1;

/// PNG signature followed by the start of an IHDR chunk
pub const RED_PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x02";

/// Setup test logging
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Bag-of-words vector: each lowercase word increments one hashed bucket.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSION];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let bucket = (fnv1a(&token.to_lowercase()) % IMAGE_BUCKET as u64) as usize;
        vector[bucket] += 1.0;
    }
    vector
}

/// Deterministic embedder: bag of words for text, a fixed axis for images
#[derive(Default)]
pub struct HashEmbedder {
    pub text_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst) + self.image_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn embed_text(&self, text: &str) -> RagResult<Vec<f32>> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        Ok(bag_of_words(text))
    }

    async fn embed_image(&self, _image: &ImageData) -> RagResult<Vec<f32>> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        let mut vector = vec![0.0; DIMENSION];
        vector[IMAGE_BUCKET] = 1.0;
        Ok(vector)
    }
}

/// Embedder whose backend is always unreachable
pub struct DownEmbedder;

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn embed_text(&self, _text: &str) -> RagResult<Vec<f32>> {
        Err(RagError::backend(Modality::Text, "connection refused"))
    }

    async fn embed_image(&self, _image: &ImageData) -> RagResult<Vec<f32>> {
        Err(RagError::backend(Modality::Image, "connection refused"))
    }
}

/// Embedder that never answers
pub struct StalledEmbedder;

#[async_trait]
impl EmbeddingProvider for StalledEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn embed_text(&self, _text: &str) -> RagResult<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![0.0; DIMENSION])
    }

    async fn embed_image(&self, _image: &ImageData) -> RagResult<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![0.0; DIMENSION])
    }
}

/// Generator that answers with the context it was given and records requests
#[derive(Default)]
pub struct EchoGenerator {
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<GenerationRequest>>,
}

impl EchoGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    fn supports_images(&self) -> bool {
        true
    }

    async fn generate(&self, request: &GenerationRequest) -> RagResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let context = request
            .prompt
            .split("## Context")
            .nth(1)
            .and_then(|rest| rest.split("## Question").next())
            .unwrap_or_default()
            .trim();
        Ok(format!("According to the context: {context}"))
    }
}

/// Generator that never answers
pub struct StalledGenerator;

#[async_trait]
impl Generator for StalledGenerator {
    fn name(&self) -> &str {
        "stalled"
    }

    fn supports_images(&self) -> bool {
        false
    }

    async fn generate(&self, _request: &GenerationRequest) -> RagResult<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".to_string())
    }
}

/// Orchestrator over `store` with the given backends and query settings.
pub fn rag(
    store: Arc<VectorIndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
    config: QueryConfig,
    index_path: &Path,
) -> MultimodalRag {
    MultimodalRag::new(store, embedder, generator, config, index_path)
}

pub fn empty_store() -> Arc<VectorIndexStore> {
    Arc::new(VectorIndexStore::new(DIMENSION, "hash"))
}

/// Temp directory with `documents/` and `images/` subdirectories.
pub fn data_dirs() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let documents = dir.path().join("documents");
    let images = dir.path().join("images");
    std::fs::create_dir(&documents).expect("Failed to create documents dir");
    std::fs::create_dir(&images).expect("Failed to create images dir");
    (dir, documents, images)
}
