//! Error types for the edgequake-doc2diagram library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DiagramError`]: **Fatal**, the generator cannot be set up or the
//!   input cannot be reached at all (missing API key, provider not
//!   configured, file not found, download failed). Returned by the
//!   construction and input-resolution functions and by the CLI.
//!
//! * [`GenerationError`]: **Per-request**, one analysis or generation
//!   request failed (unsupported format, empty text, service error,
//!   malformed response). It is `Clone` so it can live inside
//!   [`crate::orchestrator::GenerationState::Failed`] while also being
//!   returned to the caller that issued the request.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doc2diagram library.
///
/// Request-level failures use [`GenerationError`] and are wrapped here only
/// when they bubble up through a fatal path (e.g. the CLI).
#[derive(Debug, Error)]
pub enum DiagramError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Provider errors ───────────────────────────────────────────────────
    /// No API credential was found for the selected provider.
    ///
    /// Raised once at startup; the generator never starts without one.
    #[error("No API key found for provider '{provider}'.\nSet {env_hint} and try again.")]
    CredentialMissing { provider: String, env_hint: String },

    /// The configured provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output diagram file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Request errors ────────────────────────────────────────────────────
    /// An analysis or generation request failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which orchestrated phase a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Document → derived description.
    Analysis,
    /// Description → diagram artifact.
    Generation,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Analysis => write!(f, "analysis"),
            Phase::Generation => write!(f, "generation"),
        }
    }
}

/// A failed analysis or generation request.
///
/// Pre-flight kinds (`MissingInput`, `EmptyPrompt`, `Busy`) are returned
/// synchronously and never touch the orchestrator state. Every other kind is
/// also recorded as the `Failed` state.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationError {
    /// No extractor recognises the document's declared format or suffix.
    #[error("Unsupported document format '{format}'. Please upload a .docx, .pdf, .txt or .md file.")]
    UnsupportedFormat { format: String },

    /// The extractor recognised the document but could not decode it.
    #[error("Failed to extract text from {format} document: {detail}")]
    ExtractionFailed { format: String, detail: String },

    /// The document decoded to empty or whitespace-only text.
    #[error("Could not extract text from the document or the document is empty.")]
    EmptyExtractedText,

    /// Analysis was requested without a document.
    #[error("Please select a document to analyze.")]
    MissingInput,

    /// Generation was requested with an empty or whitespace-only description.
    #[error("Please enter or generate a description for the diagram.")]
    EmptyPrompt,

    /// Another request is still in flight.
    #[error("A {phase} request is already in progress; wait for it to finish.")]
    Busy { phase: Phase },

    /// The completion service failed (after any retries).
    #[error("Completion service error: {message}")]
    ServiceError { message: String },

    /// The model response did not contain a well-delimited diagram.
    #[error("The AI returned an invalid format ({detail}). Please try rephrasing your request or be more specific.")]
    MalformedResponse { detail: String },
}

impl GenerationError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::UnsupportedFormat { .. } => "unsupported_format",
            GenerationError::ExtractionFailed { .. } => "extraction_failed",
            GenerationError::EmptyExtractedText => "empty_extracted_text",
            GenerationError::MissingInput => "missing_input",
            GenerationError::EmptyPrompt => "empty_prompt",
            GenerationError::Busy { .. } => "busy",
            GenerationError::ServiceError { .. } => "service_error",
            GenerationError::MalformedResponse { .. } => "malformed_response",
        }
    }

    /// Whether the orchestrator may retry the failed call.
    ///
    /// Only service errors are transient. A malformed response is a content
    /// problem; retrying it is left to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::ServiceError { .. })
    }

    /// Whether this error is a synchronous admission rejection.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            GenerationError::MissingInput
                | GenerationError::EmptyPrompt
                | GenerationError::Busy { .. }
        )
    }
}
