//! # edgequake-doc2diagram
//!
//! Turn a document or a free-text description into a Draw.io diagram using
//! a text-generation model.
//!
//! ## Why two phases?
//!
//! A requirements document is rarely a good diagram prompt: it is long,
//! unordered, and full of detail no diagram should show. The analysis phase
//! asks the model to condense the document into one paragraph describing
//! *what to draw*; the caller can review or edit that paragraph before the
//! generation phase turns it into `<mxGraphModel>` XML. Models seldom answer
//! with XML alone, so the reply is then recovered: fences are unwrapped and
//! the document is bracketed by its root tags, or the request fails. A
//! truncated or best-guess artifact is never returned.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Document (PDF / DOCX / text)         Description
//!  │                                      │
//!  ├─ 1. Input     path or URL → bytes    │
//!  ├─ 2. Extract   bytes → plain text     │
//!  ├─ 3. Analyze   text → description ───▶├─ 4. Generate  description → reply
//!  │               (state returns Idle)   └─ 5. Recover   reply → <mxGraphModel>
//! ```
//!
//! [`GenerationOrchestrator`] sequences the phases as a single-flight state
//! machine (see [`GenerationState`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2diagram::{ApiCredential, GenerationOrchestrator, GeneratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Fatal at startup if no GEMINI_API_KEY / OPENAI_API_KEY / … is set.
//!     let credential = ApiCredential::from_env(None)?;
//!     let config = GeneratorConfig::default();
//!     let orchestrator = GenerationOrchestrator::connect(&config, &credential)?;
//!
//!     let out = orchestrator
//!         .request_generation("A login flow with start, check, success, fail, end")
//!         .await?;
//!     println!("{}", out.artifact);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2diagram` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-doc2diagram = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod observer;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ApiCredential, GeneratorConfig, GeneratorConfigBuilder, DEFAULT_MODEL};
pub use error::{DiagramError, GenerationError, Phase};
pub use observer::{GenerationObserver, NoopObserver, Observer};
pub use orchestrator::{GenerationOrchestrator, GenerationState};
pub use output::{write_artifact, AnalysisOutcome, DiagramOutput, GenerationOutcome, PhaseStats};
pub use pipeline::artifact::{extract_artifact, ExtractedArtifact};
pub use pipeline::extract::{TextExtractionAdapter, TextExtractor};
pub use pipeline::gateway::{CompletionGateway, GatewayOptions, LlmGateway, RawResponse};
pub use pipeline::input::resolve_input;
pub use prompts::{build_analysis_prompt, build_artifact_prompt, ComposedPrompt};
pub use source::{Document, DocumentFormat, SourceInput};
