//! Pipeline stages for document-to-diagram generation.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and a stage can be swapped (another extractor,
//! another completion backend) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ gateway ──▶ gateway ──▶ artifact
//! (URL/path) (pdf/docx/txt) (analysis)  (generation) (recovery)
//! ```
//!
//! 1. [`input`]: read a local file or download a URL into a `Document`
//! 2. [`extract`]: classify by MIME type or suffix and decode to plain text;
//!    [`pdf`] and [`docx`] hold the container-specific variants
//! 3. [`gateway`]: the only stage with network I/O; retry and timeout live here
//! 4. [`artifact`]: recover the `<mxGraphModel>` document from a free-form reply
//!
//! The orchestrator in [`crate::orchestrator`] sequences these stages and
//! owns the request state.

pub mod artifact;
pub mod docx;
pub mod extract;
pub mod gateway;
pub mod input;
pub mod pdf;
