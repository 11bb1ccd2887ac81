//! Response recovery: pull the Draw.io document out of a free-form reply.
//!
//! ## Why is this necessary?
//!
//! Even when told to answer with raw XML only, models regularly:
//!
//! - wrap the XML in ` ```xml … ``` ` fences,
//! - prepend "Sure, here's your diagram:" or append an explanation,
//! - or answer with no diagram at all.
//!
//! Recovery runs in two stages and the order matters: a reply may omit the
//! fence, so unwrapping is attempted first but never required; bracketing by
//! the root markers then discards any commentary that survived. A reply that
//! cannot be bracketed fails outright. A truncated or best-guess artifact is
//! never returned.
//!
//! Internal well-formedness of the XML is not checked here.

use crate::error::GenerationError;
use crate::prompts::ARTIFACT_ROOT;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opening marker, matched as a prefix so attributes on the root are allowed.
pub const START_MARKER: &str = "<mxGraphModel";

/// Exact closing marker.
pub const END_MARKER: &str = "</mxGraphModel>";

/// A validated diagram document: starts with [`START_MARKER`] and ends with
/// [`END_MARKER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedArtifact(String);

impl ExtractedArtifact {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ExtractedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExtractedArtifact {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// A backtick run of fence width or more.
static RE_TICKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"`{3,}").unwrap());

// Optional language hint directly after an opening fence.
static RE_LANG_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_+.\-]*").unwrap());

/// Recover the diagram document from a raw model reply.
///
/// 1. If the reply contains a fenced block, the (trimmed) body of the
///    innermost fence becomes the working text; otherwise the whole reply
///    does.
/// 2. The first [`START_MARKER`] and the *last* [`END_MARKER`] bracket the
///    artifact. Both must exist and the start must precede the end.
/// 3. The bracketed slice is re-checked against both markers.
///
/// With several complete diagrams in one reply the result spans from the
/// first opening tag to the last closing tag.
pub fn extract_artifact(raw: &str) -> Result<ExtractedArtifact, GenerationError> {
    let working = unwrap_fence(raw.trim());

    let start = working.find(START_MARKER);
    let end = working.rfind(END_MARKER);

    let (start, end) = match (start, end) {
        (None, _) => return Err(malformed(format!("no {START_MARKER} start tag"))),
        (_, None) => return Err(malformed(format!("no {END_MARKER} end tag"))),
        (Some(s), Some(e)) if s >= e => {
            return Err(malformed(format!(
                "{END_MARKER} appears before {START_MARKER}"
            )))
        }
        (Some(s), Some(e)) => (s, e),
    };

    let slice = &working[start..end + END_MARKER.len()];
    if !slice.starts_with(START_MARKER) || !slice.ends_with(END_MARKER) {
        return Err(malformed(format!("{ARTIFACT_ROOT} markers do not bracket the slice")));
    }

    Ok(ExtractedArtifact(slice.to_string()))
}

/// Return the body of the innermost fenced block, or the input unchanged.
///
/// A fence opens with three or more backticks and closes at the next run at
/// least as long, so a four-backtick block may wrap a three-backtick one.
/// Unwrapping repeats on the body until no complete fence is left.
pub fn unwrap_fence(text: &str) -> &str {
    let mut working = text;
    while let Some(body) = fence_body(working) {
        working = body;
    }
    working
}

fn fence_body(text: &str) -> Option<&str> {
    let mut runs = RE_TICKS.find_iter(text);
    let open = runs.next()?;
    let close = runs.find(|run| run.len() >= open.len())?;
    let inner = &text[open.end()..close.start()];
    let hint = RE_LANG_HINT.find(inner).map_or(0, |m| m.end());
    Some(inner[hint..].trim())
}

fn malformed(detail: String) -> GenerationError {
    GenerationError::MalformedResponse { detail }
}
