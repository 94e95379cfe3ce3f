//! Query-time models: the request, the transient per-query context, and the answer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::image::ImageData;
use super::record::{ScoredRecord, SourceRecord};

/// How a query carrying both text and an image is turned into one search vector
///
/// The embedding space is defined per call and per modality, so there is no
/// fused vector; one modality is searched and the question always reaches
/// the generation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryFusion {
    /// Search with the image; the text only instructs generation
    #[default]
    PreferImage,
    /// Search with the text; the image only accompanies generation
    PreferText,
}

/// A retrieval-generation request
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub question: Option<String>,
    pub image: Option<ImageData>,
    pub top_k: usize,
}

impl QueryRequest {
    pub fn text(question: impl Into<String>, top_k: usize) -> Self {
        Self {
            question: Some(question.into()),
            image: None,
            top_k,
        }
    }

    pub fn image(image: ImageData, top_k: usize) -> Self {
        Self {
            question: None,
            image: Some(image),
            top_k,
        }
    }

    #[must_use]
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: ImageData) -> Self {
        self.image = Some(image);
        self
    }

    /// The question with surrounding whitespace removed, if any text remains.
    pub fn question_text(&self) -> Option<&str> {
        self.question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// Transient state assembled while answering one query. Never persisted.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub query_id: Uuid,
    pub embedding: Vec<f32>,
    pub hits: Vec<ScoredRecord>,
    pub context_text: String,
}

/// The grounded answer and the records it was generated from, in rank order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub query_id: Uuid,
    pub answer: String,
    pub sources: Vec<ScoredRecord>,
}

impl QueryAnswer {
    /// The cited records without their scores.
    pub fn records(&self) -> impl Iterator<Item = &SourceRecord> {
        self.sources.iter().map(|hit| &hit.record)
    }
}
