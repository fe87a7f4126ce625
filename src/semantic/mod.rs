//! Semantic search over the pages of uploaded PDFs.
//!
//! Pages are embedded locally with fastembed-rs and searched in memory by
//! cosine similarity.
//!
//! # Architecture
//!
//! - `embeddings`: The `Embedder` trait and its fastembed implementation
//! - `extract`: Per-page text extraction from PDF bytes
//! - `index`: In-memory document index with cosine similarity search
//! - `storage`: Binary per-document artifacts (`<name>.vec`)
//! - `service`: Ingestion, search and maintenance operations

pub mod embeddings;
pub mod extract;
mod index;
mod service;
mod storage;

pub use embeddings::{model_id_for, Embedder, EmbeddingError, EmbeddingModel};
pub use extract::ExtractedPage;
pub use index::{DocumentEntry, PageRecord};
pub use service::{
    DeleteOutcome, SearchHit, SearchStatus, SemanticSearchError, SemanticSearchService,
    EMPTY_INDEX_MESSAGE,
};
pub use storage::DocumentStore;
