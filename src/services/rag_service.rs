//! Retrieval-generation orchestrator
//!
//! Answers a question and/or image query in typed stages:
//! embed, search, per-source cap, context assembly, generate.
//! Any failing stage fails the whole query; no partial answer is returned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, Span};
use uuid::Uuid;

use crate::domain::errors::{Modality, RagError, RagResult};
use crate::domain::models::{
    ImageData, QueryAnswer, QueryConfig, QueryContext, QueryFusion, QueryRequest, ScoredRecord,
};
use crate::domain::ports::{EmbeddingProvider, GenerationRequest, Generator};
use crate::infrastructure::vector::VectorIndexStore;

/// What the query vector is computed from
#[derive(Debug, Clone, Copy)]
enum SearchInput<'a> {
    Text(&'a str),
    Image(&'a ImageData),
}

impl SearchInput<'_> {
    const fn modality(self) -> Modality {
        match self {
            Self::Text(_) => Modality::Text,
            Self::Image(_) => Modality::Image,
        }
    }
}

/// Multimodal RAG orchestrator
///
/// Owns handles to the index and both backends. The index is shared with
/// ingestion through the `Arc`; its own lock keeps readers and writers apart.
pub struct MultimodalRag {
    store: Arc<VectorIndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
    config: QueryConfig,
    index_path: PathBuf,
}

impl MultimodalRag {
    pub fn new(
        store: Arc<VectorIndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
        config: QueryConfig,
        index_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            config,
            index_path: index_path.into(),
        }
    }

    pub fn store(&self) -> &Arc<VectorIndexStore> {
        &self.store
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Load the persisted index.
    ///
    /// Returns `Ok(false)` when nothing has been saved yet; callers should
    /// tell the user to ingest first.
    #[instrument(skip(self), fields(path = %self.index_path.display()))]
    pub async fn load_index(&self) -> RagResult<bool> {
        let loaded = self.store.load(&self.index_path).await?;
        if loaded {
            info!(count = self.store.count().await, "Index ready");
        }
        Ok(loaded)
    }

    /// Persist the index to its configured path.
    pub async fn save_index(&self) -> RagResult<()> {
        self.store.save(&self.index_path).await
    }

    /// Answer a query from the indexed content.
    ///
    /// A `top_k` of 0 falls back to the configured default.
    #[instrument(
        skip(self, request),
        fields(query_id = tracing::field::Empty, with_image = request.image.is_some())
    )]
    pub async fn query(&self, request: QueryRequest) -> RagResult<QueryAnswer> {
        let context = self.retrieve(&request).await?;
        let question = request
            .question_text()
            .unwrap_or(&self.config.default_image_prompt);
        let prompt = build_prompt(question, &context.context_text);

        let mut generation = GenerationRequest::new(prompt);
        if let Some(image) = &request.image {
            if self.generator.supports_images() {
                generation = generation.with_image(image.clone());
            } else {
                debug!(generator = self.generator.name(), "Generator is text-only, image not attached");
            }
        }

        let answer = tokio::time::timeout(
            Duration::from_secs(self.config.generation_timeout_secs),
            self.generator.generate(&generation),
        )
        .await
        .map_err(|_| RagError::GenerationTimeout)??;

        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(RagError::GenerationFailure(
                "generator returned an empty answer".to_string(),
            ));
        }

        info!(sources = context.hits.len(), "Query answered");
        Ok(QueryAnswer {
            query_id: context.query_id,
            answer,
            sources: context.hits,
        })
    }

    /// Run the retrieval half of a query: embed, search, cap, assemble.
    pub async fn retrieve(&self, request: &QueryRequest) -> RagResult<QueryContext> {
        let input = self.search_input(request)?;

        let total = self.store.count().await;
        if total == 0 {
            return Err(RagError::IndexNotFound);
        }

        let query_id = Uuid::new_v4();
        Span::current().record("query_id", tracing::field::display(query_id));

        let top_k = if request.top_k == 0 {
            self.config.top_k
        } else {
            request.top_k
        };

        let modality = input.modality();
        let embedding = tokio::time::timeout(
            Duration::from_secs(self.config.embed_timeout_secs),
            self.embed(input),
        )
        .await
        .map_err(|_| RagError::EmbeddingTimeout { modality })??;

        let cap = self.config.max_chunks_per_source;
        let mut fetch = if cap == 0 {
            top_k
        } else {
            top_k.saturating_mul(self.config.oversample.max(1))
        };

        // Widen the window until the cap leaves `top_k` hits or the index runs out.
        let hits = loop {
            let candidates = self.store.search(&embedding, fetch).await?;
            let exhausted = candidates.len() < fetch || fetch >= total;
            let hits = cap_per_source(candidates, cap, top_k);
            if cap == 0 || hits.len() >= top_k || exhausted {
                break hits;
            }
            fetch = fetch.saturating_mul(2).min(total);
            debug!(fetch, "Per-source cap left too few hits, widening search");
        };
        let context_text = assemble_context(&hits, self.config.max_context_chars);

        debug!(
            %modality,
            top_k,
            fetched = fetch,
            hits = hits.len(),
            context_chars = context_text.chars().count(),
            "Context assembled"
        );

        Ok(QueryContext {
            query_id,
            embedding,
            hits,
            context_text,
        })
    }

    fn search_input<'a>(&self, request: &'a QueryRequest) -> RagResult<SearchInput<'a>> {
        match (request.question_text(), request.image.as_ref(), self.config.fusion) {
            (None, None, _) => Err(RagError::EmptyQuery),
            (None, Some(image), _) | (Some(_), Some(image), QueryFusion::PreferImage) => {
                Ok(SearchInput::Image(image))
            }
            (Some(question), _, _) => Ok(SearchInput::Text(question)),
        }
    }

    async fn embed(&self, input: SearchInput<'_>) -> RagResult<Vec<f32>> {
        match input {
            SearchInput::Text(text) => self.embedder.embed_text(text).await,
            SearchInput::Image(image) => self.embedder.embed_image(image).await,
        }
    }
}

/// Keep at most `cap` hits per source (0 disables the cap), then the best `top_k`.
///
/// Rank order is preserved.
pub fn cap_per_source(hits: Vec<ScoredRecord>, cap: usize, top_k: usize) -> Vec<ScoredRecord> {
    let mut per_source: HashMap<String, usize> = HashMap::new();

    hits.into_iter()
        .filter(|hit| {
            if cap == 0 {
                return true;
            }
            let seen = per_source.entry(hit.record.source.clone()).or_insert(0);
            *seen += 1;
            *seen <= cap
        })
        .take(top_k)
        .collect()
}

/// Concatenate hits as numbered, cited context blocks of at most `max_chars` characters.
///
/// The block that crosses the limit is cut short and later blocks are dropped.
pub fn assemble_context(hits: &[ScoredRecord], max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0;

    for (i, hit) in hits.iter().enumerate() {
        let separator = if i == 0 { "" } else { "\n" };
        let block = format!(
            "{separator}[Context {}] (Source: {})\n{}\n",
            i + 1,
            hit.record.citation(),
            hit.record.content
        );
        let len = block.chars().count();

        if used + len > max_chars {
            context.extend(block.chars().take(max_chars - used));
            break;
        }
        context.push_str(&block);
        used += len;
    }

    context
}

/// Wrap the question and retrieved context into the generation prompt.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        r"Use the following context to answer the question. If the context doesn't contain the information needed, say so instead of guessing.

## Context

{context}

## Question

{question}

## Instructions

Answer based on the context provided above. Cite sources using the context numbers ([Context 1], [Context 2], etc.) when referencing specific information."
    )
}
