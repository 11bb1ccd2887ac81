//! DOCX text extraction.
//!
//! A `.docx` file is a zip container; the body text lives in
//! `word/document.xml` as `<w:t>` runs grouped into `<w:p>` paragraphs.
//! We walk the runs in document order, emit tabs and line breaks where the
//! markup asks for them, and end every paragraph with a newline. Styling,
//! headers, footers, and comments are ignored: the analysis phase only needs
//! the prose.

use crate::error::GenerationError;
use crate::pipeline::extract::TextExtractor;
use crate::source::DocumentFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};

const BODY_PART: &str = "word/document.xml";

/// DOCX variant of [`TextExtractor`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, GenerationError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| failed(format!("not a zip container: {e}")))?;

        let mut xml = String::new();
        archive
            .by_name(BODY_PART)
            .map_err(|e| failed(format!("missing {BODY_PART}: {e}")))?
            .read_to_string(&mut xml)
            .map_err(|e| failed(format!("unreadable {BODY_PART}: {e}")))?;

        Ok(body_text(&xml))
    }
}

// One pass over the body in document order. Group 1 captures run text.
// A self-closing `<w:p/>` is an empty paragraph and still ends a line.
static RE_BODY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:(?:br|cr)(?:\s[^>]*)?/>|</w:p>|<w:p(?:\s[^>]*)?/>",
    )
    .unwrap()
});

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(?:#x([0-9A-Fa-f]+)|#([0-9]+)|(amp|lt|gt|quot|apos));").unwrap());

/// Flatten `word/document.xml` into plain text.
fn body_text(xml: &str) -> String {
    let mut out = String::new();
    for caps in RE_BODY_TOKEN.captures_iter(xml) {
        if let Some(run) = caps.get(1) {
            out.push_str(&unescape(run.as_str()));
            continue;
        }
        // Paragraph ends and explicit breaks both become newlines.
        if caps[0].starts_with("<w:tab") {
            out.push('\t');
        } else {
            out.push('\n');
        }
    }
    out
}

/// Decode the five predefined XML entities and numeric character references.
fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    RE_ENTITY
        .replace_all(s, |caps: &regex::Captures<'_>| {
            if let Some(hex) = caps.get(1) {
                return u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string());
            }
            if let Some(dec) = caps.get(2) {
                return dec
                    .as_str()
                    .parse::<u32>()
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string());
            }
            match &caps[3] {
                "amp" => "&",
                "lt" => "<",
                "gt" => ">",
                "quot" => "\"",
                _ => "'",
            }
            .to_string()
        })
        .into_owned()
}

fn failed(detail: String) -> GenerationError {
    GenerationError::ExtractionFailed {
        format: DocumentFormat::Docx.to_string(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zw = zip::ZipWriter::new(&mut buf);
            zw.start_file(BODY_PART, SimpleFileOptions::default())
                .unwrap();
            zw.write_all(body.as_bytes()).unwrap();
            zw.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn paragraphs_in_order() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Start</w:t></w:r><w:r><w:t xml:space="preserve"> here</w:t></w:r></w:p>
            <w:p><w:r><w:t>Then check</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = DocxExtractor.extract(&docx_with_body(xml)).unwrap();
        assert_eq!(text, "Start here\nThen check\n");
    }

    #[test]
    fn tabs_breaks_and_entities() {
        let xml = "<w:p><w:r><w:t>A</w:t><w:tab/><w:t>B &amp; C</w:t><w:br/><w:t>&lt;D&gt; &#x2192; &#65;</w:t></w:r></w:p>";
        assert_eq!(body_text(xml), "A\tB & C\n<D> → A\n");
    }

    #[test]
    fn empty_paragraphs_keep_blank_lines() {
        let xml = r#"<w:p><w:r><w:t>Title</w:t></w:r></w:p><w:p/><w:p w:rsidR="00A1"/><w:p><w:pPr/><w:r><w:t>Body</w:t></w:r></w:p>"#;
        assert_eq!(body_text(xml), "Title\n\n\nBody\n");
    }

    #[test]
    fn tables_and_tbl_tags_are_not_runs() {
        let xml = "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>";
        assert_eq!(body_text(xml), "cell\n");
    }

    #[test]
    fn empty_body_yields_empty_text() {
        let text = DocxExtractor
            .extract(&docx_with_body("<w:document><w:body/></w:document>"))
            .unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn non_zip_bytes_fail() {
        let err = DocxExtractor.extract(b"%PDF-1.4").unwrap_err();
        assert_eq!(err.kind(), "extraction_failed");
    }

    #[test]
    fn zip_without_body_fails() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zw = zip::ZipWriter::new(&mut buf);
            zw.start_file("other.txt", SimpleFileOptions::default())
                .unwrap();
            zw.write_all(b"x").unwrap();
            zw.finish().unwrap();
        }
        let err = DocxExtractor.extract(&buf.into_inner()).unwrap_err();
        match err {
            GenerationError::ExtractionFailed { detail, .. } => {
                assert!(detail.contains(BODY_PART))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
