//! Ingestion pipeline
//!
//! Reads documents and images from disk, embeds them and appends them to the
//! vector index. A bad file is skipped and reported; an unusable embedding
//! backend aborts the rest of the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{ImageData, ImageFormat, IngestConfig, NewRecord};
use crate::domain::ports::{EmbeddingProvider, GenerationRequest, Generator};
use crate::infrastructure::vector::{Chunker, VectorIndexStore};

/// File extensions read as documents. PDFs are extracted page by page,
/// everything else is read as UTF-8 text.
pub const DOCUMENT_EXTENSIONS: [&str; 5] = ["txt", "md", "markdown", "text", "pdf"];

const CAPTION_PROMPT: &str =
    "Describe this image in two or three sentences for a search index. Mention visible text, objects and colors.";

/// A file that was not ingested and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one ingestion call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Files that produced at least one record
    pub files: usize,
    /// Records appended to the index
    pub added: usize,
    /// Records dropped because their source was ingested again
    pub replaced: usize,
    pub skipped: Vec<SkippedFile>,
}

impl IngestReport {
    fn skip(&mut self, err: &RagError, path: &Path) {
        warn!(path = %path.display(), error = %err, "Skipping file");
        self.skipped.push(SkippedFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        });
    }
}

/// Service that turns files on disk into indexed records
pub struct IngestService {
    store: Arc<VectorIndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    captioner: Option<Arc<dyn Generator>>,
    chunker: Chunker,
    config: IngestConfig,
}

impl IngestService {
    pub fn new(
        store: Arc<VectorIndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunker: Chunker,
        config: IngestConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            captioner: None,
            chunker,
            config,
        }
    }

    /// Use `generator` to caption images when `caption_images` is enabled.
    #[must_use]
    pub fn with_captioner(mut self, generator: Arc<dyn Generator>) -> Self {
        self.captioner = Some(generator);
        self
    }

    pub fn store(&self) -> &Arc<VectorIndexStore> {
        &self.store
    }

    /// Ingest text documents given as files or directories.
    ///
    /// Each document is chunked and every chunk becomes one `text` record.
    #[instrument(skip(self, paths), fields(paths = paths.len()))]
    pub async fn ingest_documents(&self, paths: &[PathBuf]) -> RagResult<IngestReport> {
        let mut report = IngestReport::default();
        let files = collect_files(paths, &DOCUMENT_EXTENSIONS, &mut report).await;

        for path in files {
            match self.ingest_document(&path).await {
                Ok((replaced, added)) => {
                    report.files += 1;
                    report.added += added;
                    report.replaced += replaced;
                }
                Err(err) if err.is_item_error() => report.skip(&err, &path),
                Err(err) => return Err(abort(&path, report.added, &err)),
            }
        }

        info!(
            files = report.files,
            chunks = report.added,
            skipped = report.skipped.len(),
            "Documents ingested"
        );
        Ok(report)
    }

    /// Ingest image files given as files or directories.
    ///
    /// Images are loaded and embedded `concurrency` at a time, then appended
    /// to the index one by one in path order.
    #[instrument(skip(self, paths), fields(paths = paths.len()))]
    pub async fn ingest_images(&self, paths: &[PathBuf]) -> RagResult<IngestReport> {
        let mut report = IngestReport::default();
        let files = collect_files(paths, &ImageFormat::EXTENSIONS, &mut report).await;

        let mut embedded = stream::iter(files)
            .map(|path| async move {
                let result = self.embed_image_file(&path).await;
                (path, result)
            })
            .buffered(self.config.concurrency.max(1));

        while let Some((path, result)) = embedded.next().await {
            let outcome = match result {
                Ok(item) => self.commit(&path, vec![item]).await,
                Err(err) => Err(err),
            };

            match outcome {
                Ok((replaced, added)) => {
                    report.files += 1;
                    report.added += added;
                    report.replaced += replaced;
                }
                Err(err) if err.is_item_error() => report.skip(&err, &path),
                Err(err) => return Err(abort(&path, report.added, &err)),
            }
        }

        info!(
            images = report.added,
            skipped = report.skipped.len(),
            "Images ingested"
        );
        Ok(report)
    }

    /// Ingest both default directories. A missing directory counts as empty.
    pub async fn ingest_all(
        &self,
        documents_dir: &Path,
        images_dir: &Path,
    ) -> RagResult<(IngestReport, IngestReport)> {
        let documents = if documents_dir.is_dir() {
            self.ingest_documents(&[documents_dir.to_path_buf()]).await?
        } else {
            warn!(dir = %documents_dir.display(), "Documents directory not found");
            IngestReport::default()
        };

        let images = if images_dir.is_dir() {
            self.ingest_images(&[images_dir.to_path_buf()]).await?
        } else {
            warn!(dir = %images_dir.display(), "Images directory not found");
            IngestReport::default()
        };

        Ok((documents, images))
    }

    async fn ingest_document(&self, path: &Path) -> RagResult<(usize, usize)> {
        let bytes = tokio::fs::read(path).await.map_err(|e| item(path, e))?;
        let pages = extract_pages(path, bytes).await?;

        // Chunk indices run across pages so they stay unique per source.
        let source = path.display().to_string();
        let mut records = Vec::new();
        for (page, raw) in pages {
            for chunk in self.chunker.chunk(&normalize_text(&raw)) {
                let record = NewRecord::text_chunk(source.as_str(), chunk.content, records.len());
                records.push(match page {
                    Some(page) => record.with_page(page),
                    None => record,
                });
            }
        }
        if records.is_empty() {
            return Err(item(path, "document contains no text"));
        }
        debug!(source = %source, chunks = records.len(), "Document chunked");

        let embedder = &self.embedder;
        let items: Vec<(Vec<f32>, NewRecord)> = stream::iter(records)
            .map(|record| async move {
                let vector = embedder.embed_text(&record.content).await?;
                Ok::<_, RagError>((vector, record))
            })
            .buffered(self.config.concurrency.max(1))
            .try_collect()
            .await?;

        self.commit(path, items).await
    }

    async fn embed_image_file(&self, path: &Path) -> RagResult<(Vec<f32>, NewRecord)> {
        let bytes = tokio::fs::read(path).await.map_err(|e| item(path, e))?;
        let image = ImageData::from_bytes(bytes).map_err(|reason| item(path, reason))?;
        let vector = self.embedder.embed_image(&image).await?;
        let caption = self.caption(path, image).await;
        Ok((vector, NewRecord::image(path.display().to_string(), caption)))
    }

    async fn caption(&self, path: &Path, image: ImageData) -> String {
        let placeholder = format!(
            "Image: {}",
            path.file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
        );

        let Some(generator) = self.captioner.as_ref().filter(|_| self.config.caption_images) else {
            return placeholder;
        };
        if !generator.supports_images() {
            return placeholder;
        }

        match generator
            .generate(&GenerationRequest::new(CAPTION_PROMPT).with_image(image))
            .await
        {
            Ok(caption) => caption.trim().to_string(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Captioning failed, using file name");
                placeholder
            }
        }
    }

    /// Append the records of one file, replacing its earlier records if configured.
    async fn commit(
        &self,
        path: &Path,
        items: Vec<(Vec<f32>, NewRecord)>,
    ) -> RagResult<(usize, usize)> {
        let added = items.len();
        if self.config.replace_existing {
            let source = path.display().to_string();
            let (replaced, _) = self.store.replace_source(&source, items).await?;
            Ok((replaced, added))
        } else {
            self.store.add_batch(items).await?;
            Ok((0, added))
        }
    }
}

fn item(path: &Path, reason: impl ToString) -> RagError {
    RagError::IngestItem {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn abort(path: &Path, added_before_abort: usize, err: &RagError) -> RagError {
    warn!(path = %path.display(), error = %err, "Embedding backend failed, aborting ingestion");
    RagError::IngestBackend {
        path: path.to_path_buf(),
        added_before_abort,
        reason: err.to_string(),
    }
}

/// Raw text of a document with the 1-based page it came from, if paged.
async fn extract_pages(path: &Path, bytes: Vec<u8>) -> RagResult<Vec<(Option<u32>, String)>> {
    if has_extension(path, &["pdf"]) {
        let source = path.display().to_string();
        return tokio::task::spawn_blocking(move || pdf_pages(&source, &bytes))
            .await
            .map_err(|e| item(path, e))?
            .map_err(|reason| item(path, reason));
    }

    let raw = String::from_utf8(bytes).map_err(|_| item(path, "file is not valid UTF-8"))?;
    Ok(vec![(None, raw)])
}

/// Extract the text of each PDF page in page order. Pages whose text
/// cannot be decoded are skipped with a warning.
fn pdf_pages(source: &str, bytes: &[u8]) -> Result<Vec<(Option<u32>, String)>, String> {
    let document = lopdf::Document::load_mem(bytes).map_err(|e| format!("unreadable PDF: {e}"))?;

    let mut pages = Vec::new();
    for number in document.get_pages().into_keys() {
        match document.extract_text(&[number]) {
            Ok(text) => pages.push((Some(number), text)),
            Err(e) => warn!(source, page = number, error = %e, "Skipping unreadable PDF page"),
        }
    }
    Ok(pages)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Expand directories into their matching files, sorted by path.
///
/// Explicit files are kept regardless of extension so a corrupt or
/// unsupported file is reported rather than silently ignored. Files with
/// other extensions found inside directories are skipped with a warning.
async fn collect_files(
    paths: &[PathBuf],
    extensions: &[&str],
    report: &mut IngestReport,
) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                report.skip(&item(path, e), path);
                continue;
            }
        };

        if metadata.is_file() {
            files.push(path.clone());
            continue;
        }

        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) => {
                report.skip(&item(path, e), path);
                continue;
            }
        };

        let mut found = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let entry_path = entry.path();
                    let hidden = entry.file_name().to_string_lossy().starts_with('.');
                    if hidden || !entry_path.is_file() {
                        continue;
                    }
                    if has_extension(&entry_path, extensions) {
                        found.push(entry_path);
                    } else {
                        warn!(path = %entry_path.display(), "Unsupported file type, skipping");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    report.skip(&item(path, e), path);
                    break;
                }
            }
        }
        found.sort();
        files.extend(found);
    }

    files
}

/// Unify line endings, collapse runs of whitespace and blank lines, trim.
pub fn normalize_text(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(&line);
        out.push('\n');
    }

    out.trim().to_string()
}
