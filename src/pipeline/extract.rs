//! Text extraction: normalise heterogeneous documents into plain text.
//!
//! Each supported container format is one [`TextExtractor`] variant. The
//! [`TextExtractionAdapter`] classifies a [`Document`] by declared MIME type,
//! falling back to the file suffix, then hands the bytes to the variant it
//! picked. Unrecognised documents fail with `UnsupportedFormat` before any
//! decoding work happens, so a new format is one new variant and one line in
//! [`TextExtractionAdapter::default`].

use crate::error::GenerationError;
use crate::pipeline::{docx::DocxExtractor, pdf::PdfExtractor};
use crate::source::{Document, DocumentFormat};
use tracing::debug;

/// One container format's decoder.
pub trait TextExtractor: Send + Sync {
    /// The format this variant decodes.
    fn format(&self) -> DocumentFormat;

    /// Whether this variant claims the document.
    fn recognizes(&self, doc: &Document) -> bool {
        self.format().matches(doc)
    }

    /// Decode the container and return its text in natural reading order.
    ///
    /// An empty document may legitimately yield empty text; emptiness is
    /// judged by the caller, not here.
    fn extract(&self, bytes: &[u8]) -> Result<String, GenerationError>;
}

/// UTF-8 text and Markdown files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::PlainText
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, GenerationError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        String::from_utf8(bytes.to_vec()).map_err(|e| GenerationError::ExtractionFailed {
            format: self.format().to_string(),
            detail: format!("not valid UTF-8: {e}"),
        })
    }
}

/// Dispatches documents to the extractor variant that recognises them.
pub struct TextExtractionAdapter {
    extractors: Vec<Box<dyn TextExtractor>>,
}

impl Default for TextExtractionAdapter {
    fn default() -> Self {
        Self::new(vec![
            Box::new(DocxExtractor),
            Box::new(PdfExtractor::default()),
            Box::new(PlainTextExtractor),
        ])
    }
}

impl TextExtractionAdapter {
    /// Build an adapter over an explicit set of variants, checked in order.
    pub fn new(extractors: Vec<Box<dyn TextExtractor>>) -> Self {
        Self { extractors }
    }

    /// Formats this adapter can decode.
    pub fn supported_formats(&self) -> Vec<DocumentFormat> {
        self.extractors.iter().map(|e| e.format()).collect()
    }

    /// Classify the document without decoding it.
    pub fn classify(&self, doc: &Document) -> Result<DocumentFormat, GenerationError> {
        self.find(doc).map(|e| e.format())
    }

    /// Extract plain text from the document.
    ///
    /// Fails with `UnsupportedFormat` (no decoding attempted) when no variant
    /// recognises the document, or `ExtractionFailed` when the variant's
    /// decoder rejects the bytes.
    pub fn extract(&self, doc: &Document) -> Result<String, GenerationError> {
        let extractor = self.find(doc)?;
        let text = extractor.extract(&doc.bytes)?;
        debug!(
            "Extracted {} chars from {} document ({} bytes)",
            text.chars().count(),
            extractor.format(),
            doc.bytes.len()
        );
        Ok(text)
    }

    /// A variant named by the declared MIME type wins over one named only by
    /// the suffix, whatever the registration order.
    fn find(&self, doc: &Document) -> Result<&dyn TextExtractor, GenerationError> {
        self.extractors
            .iter()
            .find(|e| e.format().matches_mime(doc))
            .or_else(|| self.extractors.iter().find(|e| e.recognizes(doc)))
            .map(|e| &**e)
            .ok_or_else(|| GenerationError::UnsupportedFormat {
                format: doc.format_label(),
            })
    }
}
