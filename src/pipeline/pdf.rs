//! PDF text extraction via pdfium.
//!
//! ## Why pdfium?
//!
//! pdfium returns page text in the order its layout engine reads it, which
//! for multi-column papers and forms is far closer to reading order than a
//! naive content-stream walk. Pages are concatenated in page order, one
//! line break between pages.
//!
//! pdfium is blocking and keeps thread-local state, so the orchestrator runs
//! extraction inside `spawn_blocking`; nothing in here is async.
//!
//! ## Binding
//!
//! `PDFIUM_LIB_PATH` points at an explicit library; otherwise a library next
//! to the executable is tried, then the system library.

use crate::error::GenerationError;
use crate::pipeline::extract::TextExtractor;
use crate::source::DocumentFormat;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// PDF variant of [`TextExtractor`].
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor {
    /// Explicit pdfium library path. Falls back to `PDFIUM_LIB_PATH`.
    pub library_path: Option<PathBuf>,
}

impl PdfExtractor {
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, GenerationError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => Pdfium::bind_to_library(&path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| failed(format!("could not bind to a pdfium library: {e:?}")))?;

        Ok(Pdfium::new(bindings))
    }
}

impl TextExtractor for PdfExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, GenerationError> {
        if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
            let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
            return Err(failed(format!("missing %PDF header, first bytes: {magic:?}")));
        }

        let pdfium = self.bind()?;
        let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                failed("document is password-protected".to_string())
            } else {
                failed(format!("corrupt PDF: {err_str}"))
            }
        })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let mut full_text = String::new();
        for (idx, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| failed(format!("page {}: {:?}", idx + 1, e)))?
                .all();
            if text.trim().is_empty() {
                warn!("Page {} has no extractable text (scanned image?)", idx + 1);
            }
            debug!("Page {} → {} chars", idx + 1, text.len());
            full_text.push_str(&text);
            full_text.push('\n');
        }

        Ok(full_text)
    }
}

fn failed(detail: String) -> GenerationError {
    GenerationError::ExtractionFailed {
        format: DocumentFormat::Pdf.to_string(),
        detail,
    }
}
