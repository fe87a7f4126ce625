//! Semantic search service over indexed PDF pages.
//!
//! Owns the embedding model, the document store and the in-memory index,
//! and implements the operations the HTTP layer exposes:
//! - Bootstrap the index from disk on startup
//! - Ingest a document (extract, embed, persist, swap in)
//! - Search, list, delete and reset
//!
//! The index sits behind one `RwLock`. Ingestion embeds outside the lock and
//! then persists and swaps under the write lock, so a concurrent search sees
//! either the old or the new version of a document, never a mix.

use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::config::SemanticSearchConfig;
use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::extract::{extract_pages, ExtractError, ExtractedPage};
use crate::semantic::index::{DocumentEntry, IndexError, PageRecord, SearchResult, VectorIndex};
use crate::semantic::storage::{DocumentStore, VectorStorageError};
use crate::storage::StorageManager;

/// Marker appended to every returned page preview.
pub const PREVIEW_ELLIPSIS: &str = "...";

pub const EMPTY_INDEX_MESSAGE: &str = "No PDFs loaded. Upload some first.";

/// Errors that can occur during semantic search operations.
#[derive(Debug, thiserror::Error)]
pub enum SemanticSearchError {
    #[error("Invalid document name: {0}")]
    InvalidName(String),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Storage error: {0}")]
    Storage(#[from] VectorStorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SemanticSearchError {
    /// Whether the caller sent something unusable, as opposed to a server fault.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidName(_) | Self::Extract(_))
    }
}

/// One ranked page, as returned to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub pdf: String,
    pub page: u32,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// The search ran against at least one document (hits may still be empty).
    Searched,
    /// Nothing is indexed.
    EmptyIndex,
    /// The requested document is not indexed.
    UnknownScope,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    pub hits: Vec<SearchHit>,
}

impl SearchOutcome {
    fn empty(status: SearchStatus) -> Self {
        Self {
            status,
            hits: vec![],
        }
    }

    /// Informational message for outcomes that found nothing to search.
    pub fn message(&self, scope: Option<&str>) -> Option<String> {
        match self.status {
            SearchStatus::Searched => None,
            SearchStatus::EmptyIndex => Some(EMPTY_INDEX_MESSAGE.to_string()),
            SearchStatus::UnknownScope => Some(format!(
                "{} is not indexed.",
                scope.unwrap_or_default()
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub name: String,
    /// Pages kept and embedded
    pub pages: usize,
    /// Pages dropped because they had no text
    pub skipped: usize,
    /// Whether an earlier version of the document was replaced
    pub replaced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    NotFound,
}

/// Service for ingesting documents and searching their pages.
pub struct SemanticSearchService {
    config: SemanticSearchConfig,
    embedder: Arc<dyn Embedder>,
    store: DocumentStore,
    index: RwLock<VectorIndex>,
}

impl SemanticSearchService {
    /// Open the service and rebuild the index from `backend`.
    ///
    /// # Arguments
    /// * `config` - Semantic search configuration
    /// * `embedder` - Model used for pages and queries
    /// * `backend` - Directory holding the persisted documents
    pub fn open(
        config: SemanticSearchConfig,
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn StorageManager>,
    ) -> Self {
        let dimensions = embedder.dimensions();
        let store = DocumentStore::new(backend, embedder.model_id_hash(), Some(dimensions));

        let index = store.load_all(dimensions);
        log::info!("Loaded {} PDFs into memory", index.len());

        Self {
            config,
            embedder,
            store,
            index: RwLock::new(index),
        }
    }

    /// Names of all indexed documents, sorted.
    pub fn list(&self) -> Result<Vec<String>, SemanticSearchError> {
        Ok(self.read_index()?.names())
    }

    /// A copy of the indexed entry for `name`, if any.
    pub fn document(&self, name: &str) -> Result<Option<DocumentEntry>, SemanticSearchError> {
        Ok(self.read_index()?.get(name).cloned())
    }

    /// Ingest an uploaded PDF.
    ///
    /// The document name is the file name without its extension. The upload
    /// is kept in the store next to the embeddings.
    pub fn ingest_pdf(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<IngestReport, SemanticSearchError> {
        let name = document_name(file_name)?;
        let pages = extract_pages(bytes)?;
        self.ingest(&name, pages, Some(bytes))
    }

    /// Ingest a document from already extracted page texts.
    pub fn ingest_pages(
        &self,
        name: &str,
        pages: Vec<ExtractedPage>,
    ) -> Result<IngestReport, SemanticSearchError> {
        validate_name(name)?;
        self.ingest(name, pages, None)
    }

    fn ingest(
        &self,
        name: &str,
        pages: Vec<ExtractedPage>,
        source: Option<&[u8]>,
    ) -> Result<IngestReport, SemanticSearchError> {
        let total = pages.len();
        let records: Vec<PageRecord> = pages
            .into_iter()
            .filter_map(|p| {
                let text = p.text.trim();
                (!text.is_empty()).then(|| PageRecord {
                    page: p.page,
                    text: text.to_string(),
                })
            })
            .collect();
        let skipped = total - records.len();

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        let entry = DocumentEntry::new(name, records, vectors)?;

        let mut index = self.write_index()?;
        if let Some(bytes) = source {
            self.store.save_source(name, bytes)?;
        }
        self.store.save(&entry)?;
        let pages = entry.len();
        let replaced = index.insert(entry)?.is_some();
        drop(index);

        log::info!(
            "Built and saved {} embeddings for {} ({} empty pages skipped)",
            pages,
            name,
            skipped
        );

        Ok(IngestReport {
            name: name.to_string(),
            pages,
            skipped,
            replaced,
        })
    }

    /// Remove a document from memory and disk.
    ///
    /// Deleting an unknown name is not an error; the outcome says whether
    /// anything existed.
    pub fn delete(&self, name: &str) -> Result<DeleteOutcome, SemanticSearchError> {
        validate_name(name)?;

        let mut index = self.write_index()?;
        let in_memory = index.remove(name).is_some();
        let on_disk = self.store.delete(name)?;

        if in_memory || on_disk {
            log::info!("Deleted {name}");
            Ok(DeleteOutcome::Removed)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }

    /// Remove every document from memory and disk.
    ///
    /// Returns the number of documents that were indexed.
    pub fn reset(&self) -> Result<usize, SemanticSearchError> {
        let mut index = self.write_index()?;
        let count = index.len();
        index.clear();
        let files = self.store.clear()?;
        log::info!("Reset: dropped {count} documents, removed {files} files");
        Ok(count)
    }

    /// Rank indexed pages by similarity to `query`.
    ///
    /// # Arguments
    /// * `query` - The search query text
    /// * `top_k` - Maximum results (config default if None)
    /// * `scope` - Restrict the search to one document
    pub fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
        scope: Option<&str>,
    ) -> Result<SearchOutcome, SemanticSearchError> {
        let top_k = top_k.unwrap_or(self.config.default_top_k);

        if let Some(status) = Self::unsearchable(&*self.read_index()?, scope) {
            return Ok(SearchOutcome::empty(status));
        }

        let query_embedding = self.embedder.embed(query)?;

        let index = self.read_index()?;
        // the index may have changed while the query was embedded
        if let Some(status) = Self::unsearchable(&index, scope) {
            return Ok(SearchOutcome::empty(status));
        }
        let results = index.search(&query_embedding, scope, top_k)?;
        drop(index);

        let hits = results
            .into_iter()
            .map(|r| self.to_hit(r))
            .collect();

        Ok(SearchOutcome {
            status: SearchStatus::Searched,
            hits,
        })
    }

    fn unsearchable(index: &VectorIndex, scope: Option<&str>) -> Option<SearchStatus> {
        if index.is_empty() {
            return Some(SearchStatus::EmptyIndex);
        }
        match scope {
            Some(name) if !index.contains(name) => Some(SearchStatus::UnknownScope),
            _ => None,
        }
    }

    fn to_hit(&self, result: SearchResult) -> SearchHit {
        SearchHit {
            pdf: result.document,
            page: result.page,
            score: result.score,
            text: preview(&result.text, self.config.preview_chars),
        }
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, VectorIndex>, SemanticSearchError> {
        self.index
            .read()
            .map_err(|e| SemanticSearchError::Internal(format!("Lock poisoned: {}", e)))
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, VectorIndex>, SemanticSearchError> {
        self.index
            .write()
            .map_err(|e| SemanticSearchError::Internal(format!("Lock poisoned: {}", e)))
    }
}

/// First `max_chars` characters of `text`, always followed by `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(PREVIEW_ELLIPSIS);
    out
}

/// Derive the document name from an uploaded file name: the last path
/// component without its extension.
pub fn document_name(file_name: &str) -> Result<String, SemanticSearchError> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    validate_name(stem)?;
    Ok(stem.to_string())
}

fn validate_name(name: &str) -> Result<(), SemanticSearchError> {
    let invalid = name.trim().is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.len() > 200;

    if invalid {
        return Err(SemanticSearchError::InvalidName(name.to_string()));
    }
    Ok(())
}
