//! CLI binary for edgequake-doc2diagram.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GeneratorConfig`, drives the orchestrator, and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_doc2diagram::{
    resolve_input, write_artifact, ApiCredential, GenerationError, GenerationObserver,
    GenerationOrchestrator, GenerationState, GeneratorConfig, Observer, Phase, SourceInput,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: one spinner whose message follows the state machine,
/// plus a log line per retry.
struct CliObserver {
    bar: ProgressBar,
    started: Instant,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl GenerationObserver for CliObserver {
    fn on_state_change(&self, state: &GenerationState) {
        match state {
            GenerationState::Analyzing => {
                self.bar.set_prefix("Analyzing");
                self.bar.set_message("condensing the document into a description…");
            }
            GenerationState::Generating => {
                self.bar.set_prefix("Generating");
                self.bar.set_message("drawing the diagram…");
            }
            GenerationState::Idle => {
                self.bar.println(format!(
                    "  {} Description derived  {}",
                    green("✓"),
                    dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64()))
                ));
            }
            GenerationState::Ready(artifact) => {
                self.bar.println(format!(
                    "  {} Diagram recovered  {}  {}",
                    green("✓"),
                    dim(&format!("{:>6} bytes", artifact.len())),
                    dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64()))
                ));
            }
            GenerationState::Failed(e) => {
                self.bar.println(format!("  {} {}", red("✗"), red(&e.to_string())));
            }
        }
    }

    fn on_retry(&self, phase: Phase, attempt: u32, error: &GenerationError) {
        let msg = error.to_string();
        // Truncate very long error messages to keep output tidy.
        let msg = if msg.chars().count() > 80 {
            format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
        } else {
            msg
        };
        self.bar.println(format!(
            "  {} {} retry {}  {}",
            cyan("⚠"),
            phase,
            attempt,
            dim(&msg)
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Diagram from a description (stdout)
  doc2diagram --prompt "A login flow with start, check, success, fail, end"

  # Analyse a document, then generate; write the diagram to a file
  doc2diagram requirements.docx -o requirements.drawio

  # Only derive the description, to review or edit it first
  doc2diagram --analyze-only design.pdf > idea.txt
  doc2diagram --prompt "$(cat idea.txt)" -o design.drawio

  # From a URL, with a specific model
  doc2diagram --provider openai --model gpt-4.1 https://example.com/spec.pdf

  # JSON output with token statistics
  doc2diagram --json notes.md > result.json

SUPPORTED INPUTS:
  .pdf   application/pdf
  .docx  application/vnd.openxmlformats-officedocument.wordprocessingml.document
  .txt   text/plain
  .md    text/markdown

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  MISTRAL_API_KEY         Mistral API key
  OPENROUTER_API_KEY      OpenRouter API key
  AZURE_OPENAI_API_KEY    Azure OpenAI API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama, …)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium for PDF inputs

SETUP:
  1. Set API key:     export GEMINI_API_KEY=...
  2. Generate:        doc2diagram notes.md -o notes.drawio
  3. Open the .drawio file in diagrams.net.
"#;

/// Turn documents and descriptions into Draw.io diagrams using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "doc2diagram",
    version,
    about = "Turn documents and descriptions into Draw.io diagrams using LLMs",
    long_about = "Generate Draw.io (mxGraphModel) diagrams from a free-text description, or from a \
PDF, DOCX, or text document that is first condensed into a description. Supports Google Gemini, \
OpenAI, Anthropic, Mistral, OpenRouter, Azure OpenAI, and local Ollama / LM Studio models.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local document path (.pdf, .docx, .txt, .md) or HTTP/HTTPS URL.
    #[arg(conflicts_with = "prompt", required_unless_present = "prompt")]
    input: Option<String>,

    /// Describe the diagram directly instead of analysing a document.
    #[arg(short, long, env = "DOC2DIAGRAM_PROMPT")]
    prompt: Option<String>,

    /// Write the diagram XML to this file instead of stdout.
    #[arg(short, long, env = "DOC2DIAGRAM_OUTPUT")]
    output: Option<PathBuf>,

    /// Stop after analysis and print the derived description.
    #[arg(long, requires = "input")]
    analyze_only: bool,

    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, mistral, openrouter, azure, ollama, lmstudio.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set."
    )]
    provider: Option<String>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DOC2DIAGRAM_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature for the analysis phase (0.0–2.0).
    #[arg(long, env = "DOC2DIAGRAM_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries per call on a service failure.
    #[arg(long, env = "DOC2DIAGRAM_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Output structured JSON instead of raw XML.
    #[arg(long, env = "DOC2DIAGRAM_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DOC2DIAGRAM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2DIAGRAM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2DIAGRAM_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOC2DIAGRAM_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "DOC2DIAGRAM_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides all the feedback that matters while it runs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Startup: credential and config ───────────────────────────────────
    let credential =
        ApiCredential::from_env(cli.provider.as_deref()).context("Missing API credential")?;
    let config = build_config(&cli)?;

    let observer = show_progress.then(CliObserver::new);
    let mut orchestrator = GenerationOrchestrator::connect(&config, &credential)
        .context("Failed to initialise LLM provider")?;
    if let Some(ref obs) = observer {
        orchestrator = orchestrator.with_observer(Arc::clone(obs) as Observer);
    }

    // ── Resolve the source ───────────────────────────────────────────────
    let source = match requested_source(&cli)? {
        Requested::Prompt(prompt) => SourceInput::Text(prompt.to_string()),
        Requested::Document(input) => {
            let doc = resolve_input(input, config.download_timeout_secs)
                .await
                .with_context(|| format!("Failed to read '{input}'"))?;
            SourceInput::Document(doc)
        }
    };

    // ── Analyze-only mode ────────────────────────────────────────────────
    if cli.analyze_only {
        let SourceInput::Document(doc) = source else {
            anyhow::bail!("--analyze-only needs a document input");
        };
        let result = orchestrator.request_analysis(Some(doc)).await;
        if let Some(ref obs) = observer {
            obs.finish();
        }
        let outcome = result.context("Analysis failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&outcome).context("Failed to serialise output")?
            );
        } else {
            println!("{}", outcome.prompt);
        }
        if !cli.quiet && !cli.json {
            eprintln!(
                "   {} tokens in  /  {} tokens out  ·  {}ms",
                dim(&outcome.stats.input_tokens.to_string()),
                dim(&outcome.stats.output_tokens.to_string()),
                outcome.stats.duration_ms,
            );
        }
        return Ok(());
    }

    // ── Full run ─────────────────────────────────────────────────────────
    let result = orchestrator.run(source).await;
    if let Some(ref obs) = observer {
        obs.finish();
    }
    let output = result.context("Diagram generation failed")?;

    if let Some(ref output_path) = cli.output {
        write_artifact(output_path, &output.artifact)
            .await
            .context("Failed to write diagram")?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.artifact.as_str().as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }

    if !cli.quiet && !cli.json {
        let duration_ms = output.generation.duration_ms
            + output.analysis.as_ref().map_or(0, |s| s.duration_ms);
        match cli.output {
            Some(ref path) => eprintln!(
                "{}  {} bytes  {}ms  →  {}",
                green("✔"),
                output.artifact.len(),
                duration_ms,
                bold(&path.display().to_string()),
            ),
            None => eprintln!("{}  {} bytes  {}ms", green("✔"), output.artifact.len(), duration_ms),
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&output.total_input_tokens().to_string()),
            dim(&output.total_output_tokens().to_string()),
        );
    }

    Ok(())
}

/// What the invocation asks to diagram.
#[derive(Debug, PartialEq)]
enum Requested<'a> {
    Prompt(&'a str),
    Document(&'a str),
}

/// Exactly one of `--prompt` and a document must be given. clap rejects the
/// pair on the command line; this also covers `DOC2DIAGRAM_PROMPT` set in
/// the environment next to a positional document.
fn requested_source(cli: &Cli) -> Result<Requested<'_>> {
    match (cli.prompt.as_deref(), cli.input.as_deref()) {
        (Some(_), Some(input)) => anyhow::bail!(
            "Both --prompt and a document ('{input}') were given; pass only one"
        ),
        (Some(prompt), None) => Ok(Requested::Prompt(prompt)),
        (None, Some(input)) => Ok(Requested::Document(input)),
        (None, None) => anyhow::bail!("Provide a document path/URL or --prompt"),
    }
}

/// Map CLI args to `GeneratorConfig`.
fn build_config(cli: &Cli) -> Result<GeneratorConfig> {
    let mut builder = GeneratorConfig::builder()
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }

    builder.build().context("Invalid configuration")
}
