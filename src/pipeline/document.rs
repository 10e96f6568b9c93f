//! Document loading: turn an uploaded PDF or text file into one text blob.
//!
//! PDF pages are read with pdfium's text layer, not rendered. Pages with no
//! extractable text (scans, blank separators) are dropped silently and the
//! rest are joined with `\n` in page order. Text files are decoded as UTF-8,
//! replacing undecodable bytes instead of failing.
//!
//! An empty document is not an error here. The orchestrator refuses to run
//! a stage on it.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and no async API, so the
//! extraction runs on the blocking pool and the Tokio workers stay free.

use crate::error::Doc2TestError;
use crate::output::DocumentInfo;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Media type of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Pdf,
    PlainText,
}

impl MediaType {
    /// Map an upload's MIME type. Anything other than `application/pdf` is
    /// treated as text.
    pub fn from_mime(mime: &str) -> Self {
        if mime.trim().eq_ignore_ascii_case("application/pdf") {
            MediaType::Pdf
        } else {
            MediaType::PlainText
        }
    }

    /// Guess from the `%PDF` magic bytes, then the file extension.
    pub fn detect(path: &Path, head: &[u8]) -> Self {
        if head.starts_with(b"%PDF") {
            return MediaType::Pdf;
        }
        let is_pdf_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf_ext {
            MediaType::Pdf
        } else {
            MediaType::PlainText
        }
    }
}

/// A loaded document. Created once per upload and replaced on re-upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub media_type: MediaType,
    /// Pages that contributed text (1 for non-empty plain text).
    pub pages_with_text: usize,
    /// Pages in the source file (1 for plain text).
    pub total_pages: usize,
    /// File path or upload name, if known.
    pub source: Option<String>,
}

impl Document {
    /// Build a plain-text document directly from a string.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let pages_with_text = usize::from(!text.trim().is_empty());
        Self {
            text,
            media_type: MediaType::PlainText,
            pages_with_text,
            total_pages: 1,
            source: None,
        }
    }

    /// `true` when there is no non-whitespace text.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Summary used in [`crate::output::GenerationOutput`].
    pub fn info(&self) -> DocumentInfo {
        DocumentInfo {
            source: self.source.clone(),
            media_type: self.media_type,
            pages_with_text: self.pages_with_text,
            total_pages: self.total_pages,
            chars: self.text.chars().count(),
        }
    }
}

/// Decode a text upload. Invalid UTF-8 sequences become U+FFFD and a
/// leading byte-order mark is removed.
pub fn load_text(bytes: &[u8]) -> Document {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    Document::from_text(String::from_utf8_lossy(bytes).into_owned())
}

/// Join per-page text in page order, skipping pages without text.
///
/// Returns the joined text and the number of pages that contributed.
pub fn join_pages<I, S>(pages: I) -> (String, usize)
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let kept: Vec<S> = pages
        .into_iter()
        .flatten()
        .filter(|p| !p.as_ref().trim().is_empty())
        .collect();
    let count = kept.len();
    let text = kept
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join("\n");
    (text, count)
}

/// Extract the text layer of an in-memory PDF.
///
/// `name` only labels errors and log lines.
pub async fn load_pdf(bytes: Vec<u8>, name: &str) -> Result<Document, Doc2TestError> {
    let name = name.to_string();
    tokio::task::spawn_blocking(move || load_pdf_blocking(&bytes, &name))
        .await
        .map_err(|e| Doc2TestError::Internal(format!("PDF text task panicked: {e}")))?
}

fn load_pdf_blocking(bytes: &[u8], name: &str) -> Result<Document, Doc2TestError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| Doc2TestError::CorruptPdf {
            name: name.to_string(),
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let texts: Vec<Option<String>> = pages
        .iter()
        .enumerate()
        .map(|(idx, page)| match page.text() {
            Ok(text) => Some(text.all()),
            Err(e) => {
                warn!("Page {}: no text layer ({:?})", idx + 1, e);
                None
            }
        })
        .collect();

    let (text, pages_with_text) = join_pages(texts);
    debug!(
        "Extracted {} chars from {}/{} pages",
        text.len(),
        pages_with_text,
        total_pages
    );

    Ok(Document {
        text,
        media_type: MediaType::Pdf,
        pages_with_text,
        total_pages,
        source: None,
    })
}

/// Bind pdfium from `PDFIUM_LIB_PATH` (a library file or the directory that
/// holds it), else from the system library path.
fn bind_pdfium() -> Result<Pdfium, Doc2TestError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(p);
            if path.is_dir() {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&path))
            } else {
                Pdfium::bind_to_library(&path)
            }
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Doc2TestError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Load an upload whose media type is already known.
pub async fn load_document(bytes: Vec<u8>, media_type: MediaType) -> Result<Document, Doc2TestError> {
    match media_type {
        MediaType::Pdf => load_pdf(bytes, "<upload>").await,
        MediaType::PlainText => Ok(load_text(&bytes)),
    }
}

/// Read a local file and load it, detecting PDF vs. text.
pub async fn load_file(path: impl AsRef<Path>) -> Result<Document, Doc2TestError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        IoErrorKind::NotFound => Doc2TestError::FileNotFound {
            path: path.to_path_buf(),
        },
        IoErrorKind::PermissionDenied => Doc2TestError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Doc2TestError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let media_type = MediaType::detect(path, &bytes);
    debug!("Loading {} as {:?} ({} bytes)", path.display(), media_type, bytes.len());

    let name = path.display().to_string();
    let document = match media_type {
        MediaType::Pdf => load_pdf(bytes, &name).await?,
        MediaType::PlainText => load_text(&bytes),
    };
    Ok(document.with_source(name))
}
