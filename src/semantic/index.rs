//! In-memory vector index with cosine similarity search.
//!
//! Holds one `DocumentEntry` per document name: the page records of the
//! document and one embedding per page, aligned by position.

use std::cmp::Ordering;
use std::collections::HashMap;

use rayon::prelude::*;

/// A non-empty page of a document, numbered as in the original file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub page: u32,
    pub text: String,
}

/// Everything known about one indexed document.
///
/// `vectors[i]` is the embedding of `pages[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentEntry {
    name: String,
    pages: Vec<PageRecord>,
    vectors: Vec<Vec<f32>>,
}

impl DocumentEntry {
    pub fn new(
        name: impl Into<String>,
        pages: Vec<PageRecord>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if pages.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                pages: pages.len(),
                vectors: vectors.len(),
            });
        }

        Ok(Self {
            name: name.into(),
            pages,
            vectors,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pages(&self) -> &[PageRecord] {
        &self.pages
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Score every page against `query` and keep the best `limit`.
    fn top_pages(&self, query: &[f32], query_norm: f32, limit: usize) -> Vec<Candidate<'_>> {
        let mut scored: Vec<Candidate<'_>> = self
            .pages
            .iter()
            .zip(self.vectors.iter())
            .map(|(page, vector)| Candidate {
                document: &self.name,
                page,
                score: cosine_similarity(query, query_norm, vector),
            })
            .collect();

        scored.sort_by(Candidate::rank);
        scored.truncate(limit);
        scored
    }
}

/// Search result from the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub document: String,
    pub page: u32,
    /// Cosine similarity score in [-1.0, 1.0]
    pub score: f32,
    /// Full page text
    pub text: String,
}

struct Candidate<'a> {
    document: &'a str,
    page: &'a PageRecord,
    score: f32,
}

impl Candidate<'_> {
    /// Highest score first; equal scores fall back to document name, then page number.
    fn rank(a: &Self, b: &Self) -> Ordering {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.document.cmp(b.document))
            .then_with(|| a.page.page.cmp(&b.page.page))
    }

    fn into_result(self) -> SearchResult {
        SearchResult {
            document: self.document.to_string(),
            page: self.page.page,
            score: self.score,
            text: self.page.text.clone(),
        }
    }
}

/// In-memory vector index for semantic search.
///
/// Stores one entry per document name, supporting:
/// - Insert/replace/remove of whole documents
/// - Cosine similarity search, optionally scoped to one document
#[derive(Debug)]
pub struct VectorIndex {
    entries: HashMap<String, DocumentEntry>,
    /// Expected embedding dimensions
    dimensions: usize,
}

impl VectorIndex {
    /// Create a new empty vector index with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: HashMap::new(),
            dimensions,
        }
    }

    /// Number of documents in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a document, replacing any entry with the same name.
    ///
    /// Returns the replaced entry, if any.
    pub fn insert(&mut self, entry: DocumentEntry) -> Result<Option<DocumentEntry>, IndexError> {
        if let Some(bad) = entry.vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: bad.len(),
            });
        }

        Ok(self.entries.insert(entry.name.clone(), entry))
    }

    pub fn remove(&mut self, name: &str) -> Option<DocumentEntry> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&DocumentEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Document names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Clear all entries from the index.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Search for the pages most similar to `query`.
    ///
    /// Each document in scope contributes at most `limit` candidates, the
    /// candidates are merged and the best `limit` overall are returned,
    /// highest score first. A scope naming an unknown document yields nothing.
    pub fn search(
        &self,
        query: &[f32],
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        if limit == 0 {
            return Ok(vec![]);
        }

        let query_norm = l2_norm(query);

        let mut candidates: Vec<Candidate<'_>> = match scope {
            Some(name) => self
                .entries
                .get(name)
                .map(|entry| entry.top_pages(query, query_norm, limit))
                .unwrap_or_default(),
            None => self
                .entries
                .par_iter()
                .flat_map_iter(|(_, entry)| entry.top_pages(query, query_norm, limit))
                .collect(),
        };

        candidates.sort_by(Candidate::rank);
        candidates.truncate(limit);

        Ok(candidates.into_iter().map(Candidate::into_result).collect())
    }
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity with a precomputed query norm.
/// Zero-norm vectors on either side score 0.0.
fn cosine_similarity(query: &[f32], query_norm: f32, target: &[f32]) -> f32 {
    let target_norm = l2_norm(target);
    if query_norm < f32::EPSILON || target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    dot_product / (query_norm * target_norm)
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Document has {pages} pages but {vectors} vectors")]
    LengthMismatch { pages: usize, vectors: usize },
}
