//! Binary storage for document embeddings.
//!
//! One artifact per document, `<name>.vec`, holding both the page records and
//! the page vectors so the two can never drift apart on disk. The uploaded
//! file is kept beside it as `<name>.pdf`.
//!
//! Header (51 bytes):
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - dimensions: u16 (little-endian)
//! - page_count: u64 (little-endian)
//! - payload_checksum: u32 (CRC32 of everything after the header)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Pages (repeated page_count times):
//! - page: u32 (little-endian)
//! - text_len: u32 (little-endian)
//! - text: [u8; text_len] (UTF-8)
//! - embedding: [f32; dimensions] (little-endian)

use std::io::Read;
use std::sync::Arc;

use crate::semantic::index::{DocumentEntry, IndexError, PageRecord, VectorIndex};
use crate::storage::StorageManager;

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// version(1) + model_id(32) + dimensions(2) + page_count(8) + payload_checksum(4) + checksum(4)
const HEADER_SIZE: usize = 51;

pub const ARTIFACT_EXT: &str = "vec";
pub const SOURCE_EXT: &str = "pdf";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum VectorStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: file uses different model")]
    ModelMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Dimension mismatch: expected {expected}, file has {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Inconsistent entry: {0}")]
    Entry(#[from] IndexError),
}

/// Persisted copies of every indexed document.
pub struct DocumentStore {
    backend: Arc<dyn StorageManager>,
    model_id: [u8; 32],
    /// `None` accepts whatever dimensionality the file declares.
    dimensions: Option<usize>,
}

impl DocumentStore {
    pub fn new(
        backend: Arc<dyn StorageManager>,
        model_id: [u8; 32],
        dimensions: Option<usize>,
    ) -> Self {
        Self {
            backend,
            model_id,
            dimensions,
        }
    }

    pub fn artifact_ident(name: &str) -> String {
        format!("{name}.{ARTIFACT_EXT}")
    }

    pub fn source_ident(name: &str) -> String {
        format!("{name}.{SOURCE_EXT}")
    }

    pub fn exists(&self, name: &str) -> bool {
        self.backend.exists(&Self::artifact_ident(name))
    }

    /// Names of all documents with an artifact on disk, sorted.
    pub fn names(&self) -> Vec<String> {
        let suffix = format!(".{ARTIFACT_EXT}");
        let mut names: Vec<String> = self
            .backend
            .list()
            .into_iter()
            .filter(|ident| !ident.starts_with('.'))
            .filter_map(|ident| ident.strip_suffix(&suffix).map(str::to_string))
            .collect();
        names.sort();
        names
    }

    /// Keep the original upload next to its artifact.
    pub fn save_source(&self, name: &str, bytes: &[u8]) -> Result<(), VectorStorageError> {
        self.backend.write(&Self::source_ident(name), bytes)?;
        Ok(())
    }

    /// Write the artifact for `entry`, replacing any previous one.
    pub fn save(&self, entry: &DocumentEntry) -> Result<(), VectorStorageError> {
        let bytes = encode_entry(entry, &self.model_id)?;
        self.backend.write(&Self::artifact_ident(entry.name()), &bytes)?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<DocumentEntry, VectorStorageError> {
        let bytes = self.backend.read(&Self::artifact_ident(name))?;
        decode_entry(name, &bytes, &self.model_id, self.dimensions)
    }

    /// Rebuild an index from every artifact on disk.
    ///
    /// Artifacts that cannot be decoded are skipped with a warning, and an
    /// uploaded file without an artifact is reported but otherwise ignored.
    pub fn load_all(&self, dimensions: usize) -> VectorIndex {
        let mut index = VectorIndex::new(dimensions);
        let idents = self.backend.list();

        for name in self.names() {
            let entry = match self.load(&name) {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!(
                        "skipping {}: {err}",
                        Self::artifact_ident(&name)
                    );
                    continue;
                }
            };

            if let Err(err) = index.insert(entry) {
                log::warn!("skipping {}: {err}", Self::artifact_ident(&name));
            }
        }

        let source_suffix = format!(".{SOURCE_EXT}");
        for ident in idents {
            if let Some(name) = ident.strip_suffix(&source_suffix) {
                if !ident.starts_with('.') && !self.exists(name) {
                    log::warn!("{ident} has no embeddings; upload it again to index it");
                }
            }
        }

        index
    }

    /// Remove the artifact and the uploaded file of `name`.
    ///
    /// Returns whether anything was on disk.
    pub fn delete(&self, name: &str) -> Result<bool, VectorStorageError> {
        let mut removed = false;
        for ident in [Self::artifact_ident(name), Self::source_ident(name)] {
            if self.backend.exists(&ident) {
                self.backend.delete(&ident)?;
                removed = true;
            }
        }
        Ok(removed)
    }

    /// Remove every file in the store, including leftover temp files.
    ///
    /// Returns the number of files removed.
    pub fn clear(&self) -> Result<usize, VectorStorageError> {
        let idents = self.backend.list();
        for ident in &idents {
            self.backend.delete(ident)?;
        }
        Ok(idents.len())
    }
}

/// Serialize a document into the artifact format.
pub fn encode_entry(
    entry: &DocumentEntry,
    model_id: &[u8; 32],
) -> Result<Vec<u8>, VectorStorageError> {
    let dimensions = entry.vectors().first().map(Vec::len).unwrap_or(0);
    let dimensions_u16 = u16::try_from(dimensions).map_err(|_| {
        VectorStorageError::InvalidFormat(format!("{dimensions} dimensions do not fit the format"))
    })?;

    let mut payload = Vec::new();
    for (page, vector) in entry.pages().iter().zip(entry.vectors()) {
        if vector.len() != dimensions {
            return Err(VectorStorageError::DimensionMismatch {
                expected: dimensions,
                got: vector.len(),
            });
        }
        let text = page.text.as_bytes();
        let text_len = u32::try_from(text.len()).map_err(|_| {
            VectorStorageError::InvalidFormat(format!("page {} text is too long", page.page))
        })?;

        payload.extend_from_slice(&page.page.to_le_bytes());
        payload.extend_from_slice(&text_len.to_le_bytes());
        payload.extend_from_slice(text);
        for &value in vector {
            payload.extend_from_slice(&value.to_le_bytes());
        }
    }

    let mut header_bytes = [0u8; HEADER_SIZE];
    header_bytes[0] = FORMAT_VERSION;
    header_bytes[1..33].copy_from_slice(model_id);
    header_bytes[33..35].copy_from_slice(&dimensions_u16.to_le_bytes());
    header_bytes[35..43].copy_from_slice(&(entry.len() as u64).to_le_bytes());
    header_bytes[43..47].copy_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    let checksum = crc32fast::hash(&header_bytes[0..47]);
    header_bytes[47..51].copy_from_slice(&checksum.to_le_bytes());

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&header_bytes);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Parse an artifact produced by [`encode_entry`].
pub fn decode_entry(
    name: &str,
    bytes: &[u8],
    expected_model_id: &[u8; 32],
    expected_dimensions: Option<usize>,
) -> Result<DocumentEntry, VectorStorageError> {
    if bytes.len() < HEADER_SIZE {
        return Err(VectorStorageError::InvalidFormat(format!(
            "file is {} bytes, shorter than the header",
            bytes.len()
        )));
    }
    let (header_bytes, payload) = bytes.split_at(HEADER_SIZE);
    let header = Header::parse(header_bytes)?;

    if header.model_id != *expected_model_id {
        return Err(VectorStorageError::ModelMismatch);
    }
    let dimensions = header.dimensions as usize;
    if let Some(expected) = expected_dimensions {
        // an empty document carries no vectors, so its dimensions are irrelevant
        if header.page_count > 0 && dimensions != expected {
            return Err(VectorStorageError::DimensionMismatch {
                expected,
                got: dimensions,
            });
        }
    }
    if crc32fast::hash(payload) != header.payload_checksum {
        return Err(VectorStorageError::ChecksumMismatch);
    }

    let mut reader = payload;
    let mut pages = Vec::new();
    let mut vectors = Vec::new();
    for _ in 0..header.page_count {
        let page = read_u32(&mut reader)?;
        let text_len = read_u32(&mut reader)? as usize;
        if text_len > reader.len() {
            return Err(VectorStorageError::InvalidFormat(format!(
                "page {page} text runs past end of file"
            )));
        }
        let mut text = vec![0u8; text_len];
        reader.read_exact(&mut text)?;
        let text = String::from_utf8(text).map_err(|_| {
            VectorStorageError::InvalidFormat(format!("page {page} text is not valid UTF-8"))
        })?;

        let mut embedding = Vec::with_capacity(dimensions);
        for _ in 0..dimensions {
            let mut float_bytes = [0u8; 4];
            reader.read_exact(&mut float_bytes)?;
            embedding.push(f32::from_le_bytes(float_bytes));
        }

        pages.push(PageRecord { page, text });
        vectors.push(embedding);
    }

    if !reader.is_empty() {
        return Err(VectorStorageError::InvalidFormat(format!(
            "{} trailing bytes",
            reader.len()
        )));
    }

    Ok(DocumentEntry::new(name, pages, vectors)?)
}

fn read_u32(reader: &mut &[u8]) -> Result<u32, VectorStorageError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// File header structure.
#[derive(Debug)]
struct Header {
    model_id: [u8; 32],
    dimensions: u16,
    page_count: u64,
    payload_checksum: u32,
}

impl Header {
    fn parse(header_bytes: &[u8]) -> Result<Self, VectorStorageError> {
        let version = header_bytes[0];
        if version != FORMAT_VERSION {
            return Err(VectorStorageError::VersionMismatch(version, FORMAT_VERSION));
        }

        let stored_checksum = u32::from_le_bytes(fixed(&header_bytes[47..51]));
        if crc32fast::hash(&header_bytes[0..47]) != stored_checksum {
            return Err(VectorStorageError::ChecksumMismatch);
        }

        Ok(Header {
            model_id: fixed(&header_bytes[1..33]),
            dimensions: u16::from_le_bytes(fixed(&header_bytes[33..35])),
            page_count: u64::from_le_bytes(fixed(&header_bytes[35..43])),
            payload_checksum: u32::from_le_bytes(fixed(&header_bytes[43..47])),
        })
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BackendLocal;

    fn test_model_id() -> [u8; 32] {
        let mut id = [0u8; 32];
        id[0] = 0xAB;
        id[31] = 0xCD;
        id
    }

    fn test_store(dir: &std::path::Path) -> DocumentStore {
        let backend = Arc::new(BackendLocal::new(dir).unwrap());
        DocumentStore::new(backend, test_model_id(), Some(3))
    }

    fn sample_entry(name: &str) -> DocumentEntry {
        DocumentEntry::new(
            name,
            vec![
                PageRecord {
                    page: 1,
                    text: "Attention is all you need".to_string(),
                },
                PageRecord {
                    page: 4,
                    text: "Ünïcödé 文字".to_string(),
                },
            ],
            vec![vec![1.0, 0.0, -0.5], vec![0.25, 0.5, 0.75]],
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        let entry = sample_entry("paper");

        store.save(&entry).unwrap();
        assert!(store.exists("paper"));

        let loaded = store.load("paper").unwrap();
        assert_eq!(loaded, entry);
        assert_eq!(loaded.pages().len(), loaded.vectors().len());
    }

    #[test]
    fn test_empty_document_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        let entry = DocumentEntry::new("blank", vec![], vec![]).unwrap();

        store.save(&entry).unwrap();
        let loaded = store.load("blank").unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_model_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        store.save(&sample_entry("paper")).unwrap();

        let bytes = std::fs::read(tmp.path().join("paper.vec")).unwrap();
        let result = decode_entry("paper", &bytes, &[0xFF; 32], Some(3));
        assert!(matches!(result, Err(VectorStorageError::ModelMismatch)));
    }

    #[test]
    fn test_dimension_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        test_store(tmp.path()).save(&sample_entry("paper")).unwrap();

        let backend = Arc::new(BackendLocal::new(tmp.path()).unwrap());
        let store = DocumentStore::new(backend, test_model_id(), Some(384));
        let result = store.load("paper");
        assert!(matches!(
            result,
            Err(VectorStorageError::DimensionMismatch { expected: 384, got: 3 })
        ));
    }

    #[test]
    fn test_checksum_detects_payload_corruption() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        store.save(&sample_entry("paper")).unwrap();

        let path = tmp.path().join("paper.vec");
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            store.load("paper"),
            Err(VectorStorageError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_checksum_detects_header_corruption() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        store.save(&sample_entry("paper")).unwrap();

        let path = tmp.path().join("paper.vec");
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[36] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            store.load("paper"),
            Err(VectorStorageError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_truncated_file_is_invalid() {
        let result = decode_entry("x", &[1, 2, 3], &test_model_id(), None);
        assert!(matches!(result, Err(VectorStorageError::InvalidFormat(_))));
    }

    #[test]
    fn test_load_all_skips_corrupt_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        store.save(&sample_entry("good")).unwrap();
        std::fs::write(tmp.path().join("bad.vec"), b"garbage").unwrap();
        std::fs::write(tmp.path().join("orphan.pdf"), b"%PDF").unwrap();

        let index = store.load_all(3);
        assert_eq!(index.names(), vec!["good".to_string()]);
    }

    #[test]
    fn test_delete_removes_artifact_and_source() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        store.save(&sample_entry("paper")).unwrap();
        store.save_source("paper", b"%PDF-1.5").unwrap();

        assert!(store.delete("paper").unwrap());
        assert!(!tmp.path().join("paper.vec").exists());
        assert!(!tmp.path().join("paper.pdf").exists());

        assert!(!store.delete("paper").unwrap());
    }

    #[test]
    fn test_clear_removes_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        store.save(&sample_entry("a")).unwrap();
        store.save(&sample_entry("b")).unwrap();
        store.save_source("a", b"%PDF").unwrap();
        std::fs::write(tmp.path().join(".stale-a.vec.tmp"), b"partial").unwrap();

        assert_eq!(store.clear().unwrap(), 4);
        assert!(store.names().is_empty());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_names_ignores_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        store.save(&sample_entry("b")).unwrap();
        store.save(&sample_entry("a")).unwrap();
        std::fs::write(tmp.path().join(".01HX-c.vec"), b"partial").unwrap();

        assert_eq!(store.names(), vec!["a".to_string(), "b".to_string()]);
    }
}
