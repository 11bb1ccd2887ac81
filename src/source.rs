//! Source inputs: free text or an uploaded document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// What the user hands the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    /// A free-text description, used directly as the generation prompt.
    Text(String),
    /// A document to analyse first.
    Document(Document),
}

/// Raw document bytes plus whatever the caller knows about their format.
///
/// At least one of `declared_format` (a MIME type) or `file_name` should be
/// set; with neither, no extractor can classify the document.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    pub bytes: Vec<u8>,
    pub declared_format: Option<String>,
    pub file_name: Option<String>,
}

impl Document {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            declared_format: None,
            file_name: None,
        }
    }

    pub fn with_format(mut self, mime: impl Into<String>) -> Self {
        self.declared_format = Some(mime.into());
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Lower-cased extension of `file_name`, without the dot.
    pub fn suffix(&self) -> Option<String> {
        self.file_name
            .as_deref()
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// MIME type with parameters (`; charset=…`) stripped, lower-cased.
    pub fn mime(&self) -> Option<String> {
        self.declared_format.as_deref().map(|m| {
            m.split(';')
                .next()
                .unwrap_or(m)
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Human-readable format label for error messages.
    pub fn format_label(&self) -> String {
        match (self.mime(), self.suffix()) {
            (Some(m), Some(s)) => format!("{m} (.{s})"),
            (Some(m), None) => m,
            (None, Some(s)) => format!(".{s}"),
            (None, None) => "unknown".to_string(),
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("declared_format", &self.declared_format)
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// The closed set of container formats the extraction stage understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    /// MIME types that identify this format.
    pub fn mime_types(self) -> &'static [&'static str] {
        match self {
            DocumentFormat::Pdf => &["application/pdf"],
            DocumentFormat::Docx => {
                &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"]
            }
            DocumentFormat::PlainText => &["text/plain", "text/markdown"],
        }
    }

    /// File suffixes (lower-case, no dot) that identify this format.
    pub fn suffixes(self) -> &'static [&'static str] {
        match self {
            DocumentFormat::Pdf => &["pdf"],
            DocumentFormat::Docx => &["docx"],
            DocumentFormat::PlainText => &["txt", "md", "markdown"],
        }
    }

    /// Whether the document's declared MIME type names this format.
    pub fn matches_mime(self, doc: &Document) -> bool {
        doc.mime()
            .is_some_and(|m| self.mime_types().contains(&m.as_str()))
    }

    /// Whether the document's file suffix names this format.
    pub fn matches_suffix(self, doc: &Document) -> bool {
        doc.suffix()
            .is_some_and(|s| self.suffixes().contains(&s.as_str()))
    }

    /// Whether the document's MIME type or suffix names this format.
    ///
    /// Either one is enough for this format alone. Precedence between
    /// formats (a `.pdf` name served as `text/plain`) is settled by
    /// [`crate::TextExtractionAdapter`], which lets the MIME type win.
    pub fn matches(self, doc: &Document) -> bool {
        self.matches_mime(doc) || self.matches_suffix(doc)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Pdf => write!(f, "PDF"),
            DocumentFormat::Docx => write!(f, "DOCX"),
            DocumentFormat::PlainText => write!(f, "plain-text"),
        }
    }
}
