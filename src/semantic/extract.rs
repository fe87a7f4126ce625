//! Per-page text extraction from PDF bytes.

use lopdf::Document;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Failed to parse PDF: {0}")]
    Malformed(#[from] lopdf::Error),

    #[error("PDF is encrypted")]
    Encrypted,
}

/// Text of a single page, numbered from 1 in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub page: u32,
    pub text: String,
}

impl ExtractedPage {
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
        }
    }
}

/// Parse `bytes` as a PDF and return the text of every page, in order.
///
/// A page whose text cannot be decoded (unsupported font encoding, broken
/// content stream) is returned with empty text rather than failing the
/// whole document.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<ExtractedPage>, ExtractError> {
    let doc = Document::load_mem(bytes)?;
    if doc.is_encrypted() {
        return Err(ExtractError::Encrypted);
    }

    let pages = doc
        .get_pages()
        .into_keys()
        .map(|page| {
            let text = doc.extract_text(&[page]).unwrap_or_else(|err| {
                log::warn!("could not extract text from page {page}: {err}");
                String::new()
            });
            ExtractedPage { page, text }
        })
        .collect();

    Ok(pages)
}
