//! Generation orchestrator: the request-driven state machine.
//!
//! ```text
//!            request_analysis(doc)              request_generation(text)
//!   Idle ───────────────────────▶ Analyzing     Idle/Ready/Failed ─────▶ Generating
//!    ▲                               │                                      │
//!    └──────── ok (prompt) ──────────┤                         ok ──▶ Ready(artifact)
//!                                    └──── err ──▶ Failed(e) ◀── err ──────┘
//! ```
//!
//! Only one of `Analyzing`/`Generating` can be live. A request arriving while
//! one is in flight is rejected with `Busy` before any collaborator runs.
//! `MissingInput` and `EmptyPrompt` are also rejected synchronously; neither
//! touches the state. Every failure after admission is recorded as `Failed`
//! and returned to the caller.
//!
//! The state lives behind a `std::sync::Mutex` that is never held across an
//! await: admission and each transition are short critical sections.

use crate::config::{ApiCredential, GeneratorConfig};
use crate::error::{DiagramError, GenerationError, Phase};
use crate::observer::{NoopObserver, Observer};
use crate::output::{AnalysisOutcome, DiagramOutput, GenerationOutcome, PhaseStats};
use crate::pipeline::artifact::{extract_artifact, ExtractedArtifact};
use crate::pipeline::extract::TextExtractionAdapter;
use crate::pipeline::gateway::{
    complete_with_retry, CompletedCall, CompletionGateway, GatewayOptions, LlmGateway,
    RetryPolicy,
};
use crate::prompts::{build_analysis_prompt, build_artifact_prompt};
use crate::source::{Document, SourceInput};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// The orchestrator's single source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum GenerationState {
    #[default]
    Idle,
    Analyzing,
    Generating,
    Ready(ExtractedArtifact),
    Failed(GenerationError),
}

impl GenerationState {
    /// Whether a request is in flight.
    pub fn is_busy(&self) -> bool {
        self.phase().is_some()
    }

    /// The in-flight phase, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            GenerationState::Analyzing => Some(Phase::Analysis),
            GenerationState::Generating => Some(Phase::Generation),
            _ => None,
        }
    }

    pub fn artifact(&self) -> Option<&ExtractedArtifact> {
        match self {
            GenerationState::Ready(a) => Some(a),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&GenerationError> {
        match self {
            GenerationState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Short lowercase name, matching the serialised tag.
    pub fn label(&self) -> &'static str {
        match self {
            GenerationState::Idle => "idle",
            GenerationState::Analyzing => "analyzing",
            GenerationState::Generating => "generating",
            GenerationState::Ready(_) => "ready",
            GenerationState::Failed(_) => "failed",
        }
    }
}

/// Sequences extraction, prompt composition, the completion call, and
/// artifact recovery, and owns the [`GenerationState`].
pub struct GenerationOrchestrator {
    gateway: Arc<dyn CompletionGateway>,
    extractor: Arc<TextExtractionAdapter>,
    model: String,
    policy: RetryPolicy,
    state: Mutex<GenerationState>,
    /// Held across a state write and its notification.
    events: Mutex<()>,
    observer: Observer,
}

impl GenerationOrchestrator {
    /// Build over any gateway. Model and retry policy come from `config`.
    pub fn new(gateway: Arc<dyn CompletionGateway>, config: &GeneratorConfig) -> Self {
        Self {
            gateway,
            extractor: Arc::new(TextExtractionAdapter::default()),
            model: config.model.clone(),
            policy: RetryPolicy::from(config),
            state: Mutex::new(GenerationState::Idle),
            events: Mutex::new(()),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Build over the edgequake-llm gateway, injecting the startup credential.
    pub fn connect(
        config: &GeneratorConfig,
        credential: &ApiCredential,
    ) -> Result<Self, DiagramError> {
        let gateway = LlmGateway::connect(config, credential)?;
        Ok(Self::new(Arc::new(gateway), config))
    }

    pub fn with_extractor(mut self, extractor: Arc<TextExtractionAdapter>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> GenerationState {
        self.lock().clone()
    }

    /// Analyse a document and hand back the derived description.
    ///
    /// On success the state returns to `Idle`; the description is not an
    /// artifact and is meant to be reviewed before generating.
    pub async fn request_analysis(
        &self,
        document: Option<Document>,
    ) -> Result<AnalysisOutcome, GenerationError> {
        let Some(document) = document else {
            return Err(self.reject(GenerationError::MissingInput));
        };
        let flight = self.admit(Phase::Analysis)?;

        info!(
            "Analysis: {} document, {} bytes",
            document.format_label(),
            document.bytes.len()
        );

        match self.analyze(document).await {
            Ok(outcome) => {
                flight.finish(GenerationState::Idle);
                Ok(outcome)
            }
            Err(e) => {
                flight.finish(GenerationState::Failed(e.clone()));
                Err(e)
            }
        }
    }

    /// Generate a diagram from a description.
    ///
    /// The description is embedded verbatim in the generation prompt.
    pub async fn request_generation(
        &self,
        description: &str,
    ) -> Result<GenerationOutcome, GenerationError> {
        if description.trim().is_empty() {
            return Err(self.reject(GenerationError::EmptyPrompt));
        }
        let flight = self.admit(Phase::Generation)?;

        info!("Generation: {} chars of description", description.len());

        match self.generate(description).await {
            Ok(outcome) => {
                flight.finish(GenerationState::Ready(outcome.artifact.clone()));
                Ok(outcome)
            }
            Err(e) => {
                flight.finish(GenerationState::Failed(e.clone()));
                Err(e)
            }
        }
    }

    /// Run a source end to end: documents are analysed first, text goes
    /// straight to generation.
    pub async fn run(&self, input: SourceInput) -> Result<DiagramOutput, GenerationError> {
        let (description, analysis) = match input {
            SourceInput::Text(text) => (text, None),
            SourceInput::Document(doc) => {
                let outcome = self.request_analysis(Some(doc)).await?;
                (outcome.prompt, Some(outcome.stats))
            }
        };
        let generated = self.request_generation(&description).await?;
        Ok(DiagramOutput {
            description,
            artifact: generated.artifact,
            analysis,
            generation: generated.stats,
        })
    }

    // ── Phases ───────────────────────────────────────────────────────────

    async fn analyze(&self, document: Document) -> Result<AnalysisOutcome, GenerationError> {
        let text = self.extract_text(document).await?;
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyExtractedText);
        }

        let prompt = build_analysis_prompt(&text);
        let options = GatewayOptions {
            model: self.model.clone(),
            low_elaboration: false,
        };
        let call = self.call(Phase::Analysis, prompt.as_str(), &options).await?;

        let derived = call.response.text.trim();
        if derived.is_empty() {
            return Err(GenerationError::MalformedResponse {
                detail: "analysis returned no description".to_string(),
            });
        }
        debug!("Analysis derived {} chars of description", derived.len());

        Ok(AnalysisOutcome {
            prompt: derived.to_string(),
            stats: stats(&call),
        })
    }

    async fn generate(&self, description: &str) -> Result<GenerationOutcome, GenerationError> {
        let prompt = build_artifact_prompt(description);
        let options = GatewayOptions {
            model: self.model.clone(),
            low_elaboration: true,
        };
        let call = self.call(Phase::Generation, prompt.as_str(), &options).await?;

        let artifact = extract_artifact(&call.response.text).inspect_err(|e| {
            warn!(
                "Generation: unusable response ({} chars): {}",
                call.response.text.len(),
                e
            )
        })?;
        info!("Generation: recovered {} byte artifact", artifact.len());

        Ok(GenerationOutcome {
            artifact,
            stats: stats(&call),
        })
    }

    /// pdfium and zip decoding block, so extraction leaves the async runtime.
    async fn extract_text(&self, document: Document) -> Result<String, GenerationError> {
        let extractor = Arc::clone(&self.extractor);
        let label = document.format_label();
        tokio::task::spawn_blocking(move || extractor.extract(&document))
            .await
            .map_err(|e| GenerationError::ExtractionFailed {
                format: label,
                detail: format!("extraction task failed: {e}"),
            })?
    }

    async fn call(
        &self,
        phase: Phase,
        prompt: &str,
        options: &GatewayOptions,
    ) -> Result<CompletedCall, GenerationError> {
        let observer = Arc::clone(&self.observer);
        let on_retry = move |attempt: u32, err: &GenerationError| {
            observer.on_retry(phase, attempt, err);
        };
        complete_with_retry(
            self.gateway.as_ref(),
            phase,
            prompt,
            options,
            self.policy,
            &on_retry,
        )
        .await
    }

    // ── State ────────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, GenerationState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Order state changes with their observer events. Always taken before
    /// the state lock.
    fn events(&self) -> MutexGuard<'_, ()> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Single-flight admission: move to the phase's busy state or reject.
    fn admit(&self, phase: Phase) -> Result<InFlight<'_>, GenerationError> {
        let next = match phase {
            Phase::Analysis => GenerationState::Analyzing,
            Phase::Generation => GenerationState::Generating,
        };
        let events = self.events();
        {
            let mut state = self.lock();
            if let Some(running) = state.phase() {
                drop(state);
                drop(events);
                return Err(self.reject(GenerationError::Busy { phase: running }));
            }
            *state = next.clone();
        }
        self.observer.on_state_change(&next);
        drop(events);
        Ok(InFlight {
            orchestrator: self,
            finished: false,
        })
    }

    fn reject(&self, error: GenerationError) -> GenerationError {
        warn!("Request rejected: {}", error);
        self.observer.on_rejected(&error);
        error
    }

    fn transition(&self, next: GenerationState) {
        let _events = self.events();
        *self.lock() = next.clone();
        debug!("State → {}", next.label());
        self.observer.on_state_change(&next);
    }
}

/// An admitted request. Dropping it unfinished (the caller abandoned the
/// future) returns the machine to `Idle` so it is never stuck busy.
struct InFlight<'a> {
    orchestrator: &'a GenerationOrchestrator,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(mut self, next: GenerationState) {
        self.finished = true;
        self.orchestrator.transition(next);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("In-flight request dropped before completion");
            self.orchestrator.transition(GenerationState::Idle);
        }
    }
}

fn stats(call: &CompletedCall) -> PhaseStats {
    PhaseStats {
        input_tokens: call.response.input_tokens,
        output_tokens: call.response.output_tokens,
        duration_ms: call.duration_ms,
        retries: call.retries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gateway::RawResponse;
    use async_trait::async_trait;

    struct Echo(&'static str);

    #[async_trait]
    impl CompletionGateway for Echo {
        async fn complete(
            &self,
            _prompt: &str,
            _options: &GatewayOptions,
        ) -> Result<RawResponse, GenerationError> {
            Ok(RawResponse::new(self.0))
        }
    }

    fn orchestrator(reply: &'static str) -> GenerationOrchestrator {
        let config = GeneratorConfig::builder().build().unwrap();
        GenerationOrchestrator::new(Arc::new(Echo(reply)), &config)
    }

    #[test]
    fn state_helpers() {
        assert!(GenerationState::Analyzing.is_busy());
        assert!(GenerationState::Generating.is_busy());
        assert!(!GenerationState::Idle.is_busy());
        assert_eq!(GenerationState::Generating.phase(), Some(Phase::Generation));
        assert_eq!(
            GenerationState::Failed(GenerationError::EmptyPrompt)
                .error()
                .map(|e| e.kind()),
            Some("empty_prompt")
        );
    }

    #[test]
    fn state_serialises_with_tag() {
        let json = serde_json::to_value(GenerationState::Failed(GenerationError::MissingInput))
            .unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["value"]["kind"], "missing_input");

        let json = serde_json::to_value(GenerationState::Idle).unwrap();
        assert_eq!(json["state"], "idle");
    }

    #[tokio::test]
    async fn initial_state_is_idle() {
        assert_eq!(orchestrator("").state(), GenerationState::Idle);
    }

    #[tokio::test]
    async fn ready_state_holds_artifact() {
        let xml = "<mxGraphModel><root/></mxGraphModel>";
        let orch = orchestrator("<mxGraphModel><root/></mxGraphModel>");
        let out = orch.request_generation("boxes").await.unwrap();
        assert_eq!(out.artifact.as_str(), xml);
        assert_eq!(orch.state().artifact().map(|a| a.as_str()), Some(xml));
    }

    #[tokio::test]
    async fn analysis_returns_to_idle_with_trimmed_prompt() {
        let orch = orchestrator("\n  Draw a three-step approval flow.  \n");
        let doc = Document::new(b"Managers approve requests.".to_vec()).with_file_name("a.txt");
        let out = orch.request_analysis(Some(doc)).await.unwrap();
        assert_eq!(out.prompt, "Draw a three-step approval flow.");
        assert_eq!(orch.state(), GenerationState::Idle);
    }

    #[tokio::test]
    async fn blank_analysis_reply_fails() {
        let orch = orchestrator("   ");
        let doc = Document::new(b"text".to_vec()).with_file_name("a.txt");
        let err = orch.request_analysis(Some(doc)).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
        assert_eq!(orch.state(), GenerationState::Failed(err));
    }

    #[tokio::test]
    async fn dropped_request_releases_the_machine() {
        struct Never;

        #[async_trait]
        impl CompletionGateway for Never {
            async fn complete(
                &self,
                _prompt: &str,
                _options: &GatewayOptions,
            ) -> Result<RawResponse, GenerationError> {
                std::future::pending().await
            }
        }

        let config = GeneratorConfig::builder().build().unwrap();
        let orch = GenerationOrchestrator::new(Arc::new(Never), &config);
        {
            let fut = orch.request_generation("x");
            tokio::pin!(fut);
            let polled = tokio::time::timeout(std::time::Duration::from_millis(20), &mut fut).await;
            assert!(polled.is_err());
            assert_eq!(orch.state(), GenerationState::Generating);
        }
        assert_eq!(orch.state(), GenerationState::Idle);
    }
}
