//! Text extraction from source documents.
//!
//! Plain text and Markdown are read verbatim as a single page. PDFs are
//! extracted page by page with `lopdf`: one bad page is logged and skipped
//! rather than sinking the whole document, and the Info dictionary supplies
//! title/author when present (falling back to the filename).
//!
//! Failures come back as a typed [`ParseError`]; the indexer decides whether
//! to skip the document or halt the run.

use crate::storage::DocType;
use lopdf::{Document, Object};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Typed parse failure. Always local to one document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open PDF {path}: {message}")]
    PdfOpen { path: PathBuf, message: String },

    /// Every page of the PDF failed extraction or was empty.
    #[error("no extractable text in {path}")]
    NoText { path: PathBuf },

    #[error("PDF parsing task failed: {source}")]
    Task {
        #[from]
        source: tokio::task::JoinError,
    },
}

/// One page of extracted text. Non-paginated formats use `page: None`.
#[derive(Debug, Clone)]
pub struct DocumentPage {
    pub page: Option<u32>,
    pub text: String,
}

/// Parsed document: metadata plus extracted pages.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub title: String,
    pub author: Option<String>,
    pub pages: Vec<DocumentPage>,
}

/// Extracts text and metadata from supported document formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentParser;

impl DocumentParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one document.
    pub async fn parse(&self, path: &Path, doc_type: DocType) -> Result<ParsedDocument, ParseError> {
        match doc_type {
            DocType::Txt | DocType::Md => {
                let text =
                    tokio::fs::read_to_string(path)
                        .await
                        .map_err(|source| ParseError::Io {
                            path: path.to_path_buf(),
                            source,
                        })?;
                Ok(ParsedDocument {
                    title: title_from_path(path),
                    author: None,
                    pages: vec![DocumentPage { page: None, text }],
                })
            }
            DocType::Pdf => {
                // lopdf is synchronous and can chew CPU on large files.
                let owned = path.to_path_buf();
                tokio::task::spawn_blocking(move || parse_pdf(&owned)).await?
            }
        }
    }
}

fn parse_pdf(path: &Path) -> Result<ParsedDocument, ParseError> {
    let doc = Document::load(path).map_err(|e| ParseError::PdfOpen {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut pages = Vec::new();
    for (&number, _) in &doc.get_pages() {
        match doc.extract_text(&[number]) {
            Ok(text) if !text.trim().is_empty() => pages.push(DocumentPage {
                page: Some(number),
                text,
            }),
            Ok(_) => debug!(path = %path.display(), page = number, "page has no text"),
            Err(e) => {
                warn!(path = %path.display(), page = number, error = %e,
                      "skipping unextractable PDF page");
            }
        }
    }
    if pages.is_empty() {
        return Err(ParseError::NoText {
            path: path.to_path_buf(),
        });
    }

    let (title, author) = pdf_info(&doc);
    Ok(ParsedDocument {
        title: title.unwrap_or_else(|| title_from_path(path)),
        author,
        pages,
    })
}

/// Title and author from the PDF Info dictionary, when present.
fn pdf_info(doc: &Document) -> (Option<String>, Option<String>) {
    let Ok(info_obj) = doc.trailer.get(b"Info") else {
        return (None, None);
    };
    let dict = match info_obj {
        Object::Reference(id) => match doc.get_object(*id).and_then(|o| o.as_dict()) {
            Ok(dict) => dict,
            Err(_) => return (None, None),
        },
        Object::Dictionary(dict) => dict,
        _ => return (None, None),
    };

    let string_entry = |key: &[u8]| -> Option<String> {
        match dict.get(key) {
            Ok(Object::String(bytes, _)) => {
                let decoded = decode_pdf_string(bytes);
                let trimmed = decoded.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            _ => None,
        }
    };

    (string_entry(b"Title"), string_entry(b"Author"))
}

/// PDF text strings are either UTF-16BE (BOM-prefixed) or PDFDocEncoding,
/// which is close enough to Latin-1 for titles.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Filename-derived title: the stem, or the whole name if there is no stem.
fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
