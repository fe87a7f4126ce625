mod web;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::config::SemanticSearchConfig;
use crate::semantic::{Embedder, EmbeddingError, ExtractedPage, SemanticSearchService};
use crate::storage::BackendLocal;

/// Deterministic bag-of-words embedder: every lowercase word adds 1.0 to the
/// bucket its CRC32 lands in. Identical texts get identical vectors and texts
/// with no words get the zero vector.
pub struct HashEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "test-hash-embedder"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut vector = vec![0.0; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = crc32fast::hash(word.to_lowercase().as_bytes()) as usize % self.dimensions;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }
}

/// Embedder whose every call fails.
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "test-hash-embedder"
    }

    fn dimensions(&self) -> usize {
        64
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::EmbeddingFailed("model unavailable".to_string()))
    }
}

/// [`HashEmbedder`] that runs a callback with the text before embedding it.
pub struct HookEmbedder {
    inner: HashEmbedder,
    hook: OnceLock<Box<dyn Fn(&str) + Send + Sync>>,
}

impl HookEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: HashEmbedder::new(dimensions),
            hook: OnceLock::new(),
        }
    }

    pub fn set_hook(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        assert!(self.hook.set(Box::new(hook)).is_ok(), "hook already set");
    }
}

impl Embedder for HookEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(hook) = self.hook.get() {
            hook(text);
        }
        self.inner.embed(text)
    }
}

pub fn open_service_with(dir: &Path, embedder: Arc<dyn Embedder>) -> SemanticSearchService {
    let backend = Arc::new(BackendLocal::new(dir).expect("failed to create store"));
    SemanticSearchService::open(SemanticSearchConfig::default(), embedder, backend)
}

/// Service over `dir` with a 64-dimension [`HashEmbedder`].
pub fn open_service(dir: &Path) -> SemanticSearchService {
    open_service_with(dir, Arc::new(HashEmbedder::new(64)))
}

/// Pages numbered from 1 in the given order.
pub fn pages(texts: &[&str]) -> Vec<ExtractedPage> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| ExtractedPage::new(i as u32 + 1, *text))
        .collect()
}
