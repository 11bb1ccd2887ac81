//! Completion gateway: send a prompt to the text-generation service.
//!
//! [`CompletionGateway`] is the seam between the orchestrator and the
//! outside world. [`LlmGateway`] implements it over edgequake-llm; tests
//! implement it with scripted responses. Everything about *what* is asked
//! lives in [`crate::prompts`], so retry and error handling here never
//! change when a prompt does.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors are transient. [`complete_with_retry`] retries
//! service errors with exponential backoff (`retry_backoff_ms * 2^attempt`):
//! with 500 ms base and 2 retries the waits are 500 ms → 1 s. Each attempt is
//! bounded by `api_timeout_secs`; a timeout counts as a service error.

use crate::config::{ApiCredential, GeneratorConfig};
use crate::error::{DiagramError, GenerationError, Phase};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Per-call options passed through to the service.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOptions {
    /// Model to run the prompt against.
    pub model: String,
    /// Ask for a direct answer with no extended reasoning.
    pub low_elaboration: bool,
}

/// Raw reply text plus token accounting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResponse {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl RawResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// The text-generation service, seen as a black box.
///
/// Implementations return `GenerationError::ServiceError` on failure.
/// Latency is unbounded; retries are the caller's business.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &GatewayOptions,
    ) -> Result<RawResponse, GenerationError>;
}

/// [`CompletionGateway`] backed by an edgequake-llm provider.
pub struct LlmGateway {
    provider_name: Option<String>,
    default_model: String,
    default_provider: Arc<dyn LLMProvider>,
    by_model: Mutex<HashMap<String, Arc<dyn LLMProvider>>>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmGateway {
    /// Wrap an existing provider. Model overrides are not honoured since
    /// the provider's origin is unknown.
    pub fn from_provider(provider: Arc<dyn LLMProvider>, config: &GeneratorConfig) -> Self {
        Self {
            provider_name: None,
            default_model: config.model.clone(),
            default_provider: provider,
            by_model: Mutex::new(HashMap::new()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Resolve the provider, from most-specific to least-specific:
    ///
    /// 1. **Pre-built provider** (`config.provider`), used as-is.
    /// 2. **Named provider** (`config.provider_name`) with `config.model`.
    /// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
    /// 4. **Credential provider**: the provider the [`ApiCredential`] was
    ///    resolved for.
    ///
    /// Whichever provider is picked must hold a credential. When it differs
    /// from the one `credential` was resolved for, its key is resolved again
    /// and a missing key fails here with [`DiagramError::CredentialMissing`].
    /// `ProviderFactory` then reads that same key variable when it builds
    /// the client.
    pub fn connect(
        config: &GeneratorConfig,
        credential: &ApiCredential,
    ) -> Result<Self, DiagramError> {
        if let Some(ref provider) = config.provider {
            return Ok(Self::from_provider(Arc::clone(provider), config));
        }

        let selection = select_provider(config, credential, |var| std::env::var(var).ok())?;
        info!(
            "Using provider '{}' with model '{}' (key from {})",
            selection.name,
            selection.model,
            selection.credential.source().unwrap_or("none")
        );
        let provider = create_provider(&selection.name, &selection.model)?;

        Ok(Self {
            provider_name: Some(selection.name),
            default_model: selection.model,
            default_provider: provider,
            by_model: Mutex::new(HashMap::new()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Provider for the requested model, created on first use.
    fn provider_for(&self, model: &str) -> Result<Arc<dyn LLMProvider>, GenerationError> {
        if model == self.default_model {
            return Ok(Arc::clone(&self.default_provider));
        }
        let Some(ref name) = self.provider_name else {
            debug!(
                "Pre-built provider ignores model override '{}'; using '{}'",
                model, self.default_model
            );
            return Ok(Arc::clone(&self.default_provider));
        };

        let mut cache = self.by_model.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(p) = cache.get(model) {
            return Ok(Arc::clone(p));
        }
        let provider =
            create_provider(name, model).map_err(|e| GenerationError::ServiceError {
                message: e.to_string(),
            })?;
        cache.insert(model.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    fn build_options(&self, options: &GatewayOptions) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(if options.low_elaboration {
                0.0
            } else {
                self.temperature
            }),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CompletionGateway for LlmGateway {
    async fn complete(
        &self,
        prompt: &str,
        options: &GatewayOptions,
    ) -> Result<RawResponse, GenerationError> {
        let provider = self.provider_for(&options.model)?;
        let messages = vec![ChatMessage::user(prompt)];
        let opts = self.build_options(options);

        let response = provider
            .chat(&messages, Some(&opts))
            .await
            .map_err(|e| GenerationError::ServiceError {
                message: format!("{}", e),
            })?;

        Ok(RawResponse {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Provider name, model and the credential that backs them.
#[derive(Debug)]
struct ProviderSelection {
    name: String,
    model: String,
    credential: ApiCredential,
}

/// Pick the provider and model for [`LlmGateway::connect`], reading the
/// environment through `lookup`.
fn select_provider(
    config: &GeneratorConfig,
    credential: &ApiCredential,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ProviderSelection, DiagramError> {
    let env_pair = match (lookup("EDGEQUAKE_LLM_PROVIDER"), lookup("EDGEQUAKE_MODEL")) {
        (Some(prov), Some(model)) if !prov.trim().is_empty() && !model.trim().is_empty() => {
            Some((prov.trim().to_string(), model.trim().to_string()))
        }
        _ => None,
    };

    let (name, model) = if let Some(ref name) = config.provider_name {
        (name.clone(), config.model.clone())
    } else if let Some(pair) = env_pair {
        pair
    } else {
        (credential.provider().to_string(), config.model.clone())
    };

    let credential = if name.eq_ignore_ascii_case(credential.provider()) {
        credential.clone()
    } else {
        debug!(
            "Provider '{}' differs from credential provider '{}'; resolving its key",
            name,
            credential.provider()
        );
        ApiCredential::resolve(Some(&name), &lookup)?
    };

    Ok(ProviderSelection {
        name,
        model,
        credential,
    })
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DiagramError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        DiagramError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Retry and timeout policy for one phase's service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
}

impl From<&GeneratorConfig> for RetryPolicy {
    fn from(config: &GeneratorConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }
}

/// A successful call together with how many retries it took.
#[derive(Debug, Clone)]
pub struct CompletedCall {
    pub response: RawResponse,
    pub retries: u32,
    pub duration_ms: u64,
}

/// Call the gateway, retrying service errors with exponential backoff.
///
/// `on_retry` is told about every failed attempt that will be retried.
pub async fn complete_with_retry(
    gateway: &dyn CompletionGateway,
    phase: Phase,
    prompt: &str,
    options: &GatewayOptions,
    policy: RetryPolicy,
    on_retry: &(dyn Fn(u32, &GenerationError) + Send + Sync),
) -> Result<CompletedCall, GenerationError> {
    let start = Instant::now();
    let mut last_err: Option<GenerationError> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.backoff_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "{}: retry {}/{} after {}ms",
                phase, attempt, policy.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let call = gateway.complete(prompt, options);
        let result = match timeout(Duration::from_secs(policy.timeout_secs), call).await {
            Ok(r) => r,
            Err(_) => Err(GenerationError::ServiceError {
                message: format!("call timed out after {}s", policy.timeout_secs),
            }),
        };

        match result {
            Ok(response) => {
                let duration = start.elapsed();
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    phase, response.input_tokens, response.output_tokens, duration
                );
                return Ok(CompletedCall {
                    response,
                    retries: attempt,
                    duration_ms: duration.as_millis() as u64,
                });
            }
            Err(e) if e.is_retryable() => {
                warn!("{}: attempt {} failed: {}", phase, attempt + 1, e);
                if attempt < policy.max_retries {
                    on_retry(attempt + 1, &e);
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| GenerationError::ServiceError {
        message: "Unknown error".to_string(),
    }))
}
