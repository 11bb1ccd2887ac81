//! Result types for analysis and generation requests.

use crate::error::DiagramError;
use crate::pipeline::artifact::ExtractedArtifact;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Accounting for one orchestrated phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseStats {
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Wall-clock time of the service call, retries and backoff included.
    pub duration_ms: u64,
    /// Attempts beyond the first.
    pub retries: u32,
}

/// A successful analysis: the description to feed the generation phase.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    /// Derived description, trimmed. Callers may edit it before generating.
    pub prompt: String,
    pub stats: PhaseStats,
}

/// A successful generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub artifact: ExtractedArtifact,
    pub stats: PhaseStats,
}

/// Both phases of a source-to-diagram run.
#[derive(Debug, Clone, Serialize)]
pub struct DiagramOutput {
    /// The description the artifact was generated from.
    pub description: String,
    pub artifact: ExtractedArtifact,
    /// Absent when the source was already a text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PhaseStats>,
    pub generation: PhaseStats,
}

impl DiagramOutput {
    pub fn total_input_tokens(&self) -> usize {
        self.generation.input_tokens + self.analysis.as_ref().map_or(0, |s| s.input_tokens)
    }

    pub fn total_output_tokens(&self) -> usize {
        self.generation.output_tokens + self.analysis.as_ref().map_or(0, |s| s.output_tokens)
    }
}

/// Write the artifact to `path`.
///
/// Uses atomic write (temp file + rename) so a crash never leaves a
/// half-written diagram behind.
pub async fn write_artifact(
    path: impl AsRef<Path>,
    artifact: &ExtractedArtifact,
) -> Result<(), DiagramError> {
    let path = path.as_ref();
    let write_failed = |e| DiagramError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let written = match tokio::fs::write(&tmp_path, artifact.as_str()).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        // Never leave a partial temp file next to the target.
        if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
            debug!("Could not remove {}: {}", tmp_path.display(), cleanup);
        }
        return Err(write_failed(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::artifact::extract_artifact;

    const XML: &str = r#"<mxGraphModel><root><mxCell id="0"/><mxCell id="1" parent="0"/></root></mxGraphModel>"#;

    #[tokio::test]
    async fn write_artifact_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/login.drawio");
        let artifact = extract_artifact(XML).unwrap();

        write_artifact(&path, &artifact).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), XML);
        assert!(!path.with_file_name("login.drawio.tmp").exists());
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the target path makes the rename fail.
        let path = dir.path().join("taken.drawio");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep.txt"), "x").unwrap();

        let err = write_artifact(&path, &extract_artifact(XML).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, DiagramError::OutputWriteFailed { .. }), "got: {err:?}");
        assert!(!dir.path().join("taken.drawio.tmp").exists());
        assert!(path.join("keep.txt").exists());
    }

    #[tokio::test]
    async fn write_artifact_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.xml");
        std::fs::write(&path, "old").unwrap();

        write_artifact(&path, &extract_artifact(XML).unwrap())
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), XML);
    }

    #[test]
    fn totals_include_analysis_when_present() {
        let out = DiagramOutput {
            description: "d".into(),
            artifact: extract_artifact(XML).unwrap(),
            analysis: Some(PhaseStats {
                input_tokens: 100,
                output_tokens: 20,
                ..Default::default()
            }),
            generation: PhaseStats {
                input_tokens: 50,
                output_tokens: 300,
                ..Default::default()
            },
        };
        assert_eq!(out.total_input_tokens(), 150);
        assert_eq!(out.total_output_tokens(), 320);

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["artifact"], XML);
        assert_eq!(json["analysis"]["input_tokens"], 100);
    }

    #[test]
    fn analysis_stats_omitted_from_json_when_absent() {
        let out = DiagramOutput {
            description: "d".into(),
            artifact: extract_artifact(XML).unwrap(),
            analysis: None,
            generation: PhaseStats::default(),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("analysis").is_none());
    }
}
