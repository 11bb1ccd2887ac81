//! Configuration types for diagram generation.
//!
//! All generation behaviour is controlled through [`GeneratorConfig`], built
//! via its [`GeneratorConfigBuilder`]. The API credential is kept apart in
//! [`ApiCredential`]: it is resolved exactly once at startup, is fatal when
//! absent, and never changes afterwards.

use crate::error::DiagramError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default model used for both phases when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for the two-phase generator.
///
/// Built via [`GeneratorConfig::builder()`] or using
/// [`GeneratorConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_doc2diagram::GeneratorConfig;
///
/// let config = GeneratorConfig::builder()
///     .model("gemini-2.5-flash")
///     .max_retries(1)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GeneratorConfig {
    /// LLM model identifier sent with every completion request.
    /// Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    /// If None, the provider selected by the [`ApiCredential`] is used.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the analysis phase. Default: 0.2.
    ///
    /// The generation phase runs in low-elaboration mode and always samples
    /// at temperature 0.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 8192.
    ///
    /// Diagram XML is verbose; a twenty-node flowchart with styled cells
    /// easily runs past 4 000 tokens.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient service failure. Default: 2.
    ///
    /// Malformed responses are never retried here.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 8192,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl GeneratorConfig {
    /// Create a new builder for `GeneratorConfig`.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GeneratorConfig, DiagramError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(DiagramError::InvalidConfig("Model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(DiagramError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(DiagramError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Credential ───────────────────────────────────────────────────────────

/// Key variables per provider, in auto-detection order.
const PROVIDER_KEYS: &[(&str, &[&str])] = &[
    ("gemini", &["GEMINI_API_KEY", "GOOGLE_API_KEY"]),
    ("openai", &["OPENAI_API_KEY"]),
    ("anthropic", &["ANTHROPIC_API_KEY"]),
    ("mistral", &["MISTRAL_API_KEY"]),
    ("openrouter", &["OPENROUTER_API_KEY"]),
    ("azure", &["AZURE_OPENAI_API_KEY"]),
];

/// Providers that run locally and need no key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "lmstudio"];

/// The process-wide API credential for the completion service.
///
/// Resolve it once at startup with [`ApiCredential::from_env`] and hand it
/// to [`crate::pipeline::gateway::LlmGateway::connect`]. A missing key is a
/// startup failure, never a per-request error.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential {
    provider: String,
    source: Option<&'static str>,
    secret: Option<String>,
}

impl ApiCredential {
    /// Resolve the credential from the process environment.
    pub fn from_env(provider: Option<&str>) -> Result<Self, DiagramError> {
        Self::resolve(provider, |name| std::env::var(name).ok())
    }

    /// Resolve the credential through an arbitrary lookup.
    ///
    /// With a named provider, only that provider's variables are consulted.
    /// Without one, the first provider whose key is present wins.
    pub fn resolve(
        provider: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DiagramError> {
        let present = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        match provider.map(|p| p.trim().to_lowercase()) {
            Some(name) if KEYLESS_PROVIDERS.contains(&name.as_str()) => Ok(Self {
                provider: name,
                source: None,
                secret: None,
            }),
            Some(name) => {
                let vars = PROVIDER_KEYS
                    .iter()
                    .find(|(p, _)| *p == name)
                    .map(|(_, vars)| *vars)
                    .ok_or_else(|| DiagramError::ProviderNotConfigured {
                        provider: name.clone(),
                        hint: format!(
                            "Unknown provider. Supported: {}, {}",
                            PROVIDER_KEYS
                                .iter()
                                .map(|(p, _)| *p)
                                .collect::<Vec<_>>()
                                .join(", "),
                            KEYLESS_PROVIDERS.join(", ")
                        ),
                    })?;
                vars.iter()
                    .find_map(|var| {
                        present(var).map(|secret| Self {
                            provider: name.clone(),
                            source: Some(*var),
                            secret: Some(secret),
                        })
                    })
                    .ok_or_else(|| DiagramError::CredentialMissing {
                        provider: name.clone(),
                        env_hint: vars.join(" or "),
                    })
            }
            None => PROVIDER_KEYS
                .iter()
                .find_map(|(name, vars)| {
                    vars.iter().find_map(|var| {
                        present(var).map(|secret| Self {
                            provider: (*name).to_string(),
                            source: Some(*var),
                            secret: Some(secret),
                        })
                    })
                })
                .ok_or_else(|| DiagramError::CredentialMissing {
                    provider: "auto".into(),
                    env_hint: PROVIDER_KEYS
                        .iter()
                        .flat_map(|(_, vars)| vars.iter().copied())
                        .collect::<Vec<_>>()
                        .join(", "),
                }),
        }
    }

    /// Provider this credential belongs to.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Environment variable the key was read from, if any.
    pub fn source(&self) -> Option<&'static str> {
        self.source
    }

    /// The secret itself. `None` for keyless local providers.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("provider", &self.provider)
            .field("source", &self.source)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
