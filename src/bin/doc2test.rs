//! CLI binary for edgequake-doc2test.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig`, runs the pipeline and prints the results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_doc2test::{
    create_provider, generate_artifacts, generate_document, inspect, load_file, write_atomic,
    ArtifactRequest, DetailLevel, GenerationConfig, ProgressCallback, ProviderKind, RunPlan,
    Stage, StageProgressCallback, StopAfter, TechStack, TestCaseTypes,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut g| g.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl StageProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, prompt_len: usize) {
        if let Ok(mut g) = self.started.lock() {
            *g = Some(Instant::now());
        }
        self.bar.reset_elapsed();
        self.bar.set_prefix("Generating");
        self.bar
            .set_message(format!("{stage} {}", dim(&format!("({prompt_len} chars sent)"))));
    }

    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        let secs = self.elapsed_secs();
        self.bar.println(format!(
            "  {} {:<32} {:<14} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{output_len:>6} chars")),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let secs = self.elapsed_secs();
        let msg = match error.char_indices().nth(80) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} {:<32} {}  {}",
            red("✗"),
            stage.to_string(),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full pipeline, Markdown to stdout
  doc2test requirements.pdf

  # Stop after the scenario list and save it for editing
  doc2test --until scenarios --json manual.txt -o run.json

  # Re-run test-case generation with an edited scenario list
  doc2test --scenarios scenarios.json manual.txt -o cases.md

  # Unit test cases only, three per scenario, via OpenAI
  doc2test --provider openai --types unit --cases-per-scenario 3 spec.pdf

  # One-shot plan, cases and sample code for a tech stack
  doc2test --artifacts --tech-stack java-junit --detail detailed manual.pdf

  # Show what text was extracted (no API key needed)
  doc2test --inspect-only scanned.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY        Google Gemini API key (provider gemini)
  OPENAI_API_KEY        OpenAI API key (provider openai)
  DOC2TEST_PROVIDER     Default provider (openai, gemini)
  DOC2TEST_MODEL        Override model ID
  DOC2TEST_BASE_URL     Override the API endpoint root
  PDFIUM_LIB_PATH       Path to libpdfium (file or directory) for PDF input
  RUST_LOG              Override log filter (e.g. edgequake_doc2test=debug)
"#;

/// Generate business processes, test scenarios and test cases from a document.
#[derive(Parser, Debug)]
#[command(
    name = "doc2test",
    version,
    about = "Generate test scenarios and test cases from a PDF or text document using an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or text document.
    input: PathBuf,

    /// Write the result to this file instead of stdout.
    #[arg(short, long, env = "DOC2TEST_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM provider: openai or gemini.
    #[arg(long, env = "DOC2TEST_PROVIDER", default_value = "gemini")]
    provider: String,

    /// API key. Defaults to OPENAI_API_KEY or GEMINI_API_KEY for the provider.
    #[arg(long, env = "DOC2TEST_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID (default: gpt-4o-mini for openai, gemini-1.5-flash for gemini).
    #[arg(long, env = "DOC2TEST_MODEL")]
    model: Option<String>,

    /// API endpoint root, for proxies and compatible servers.
    #[arg(long, env = "DOC2TEST_BASE_URL")]
    base_url: Option<String>,

    /// JSON file with an edited scenario list, used for test-case generation.
    #[arg(long)]
    scenarios: Option<PathBuf>,

    /// Last stage to run.
    #[arg(long, value_enum, default_value = "test-cases")]
    until: UntilArg,

    /// Number of test scenarios to request.
    #[arg(long, env = "DOC2TEST_SCENARIO_COUNT", default_value_t = 10)]
    scenario_count: usize,

    /// Test cases per scenario and type (default: model decides).
    #[arg(long, env = "DOC2TEST_CASES_PER_SCENARIO")]
    cases_per_scenario: Option<usize>,

    /// Test-case types to generate.
    #[arg(long, value_enum, env = "DOC2TEST_TYPES", default_value = "both")]
    types: TypesArg,

    /// Produce a one-shot report (plan, cases, sample code) instead.
    #[arg(long)]
    artifacts: bool,

    /// Detail level of the one-shot report.
    #[arg(long, value_enum, default_value = "medium")]
    detail: DetailArg,

    /// Tech stack for sample code in the one-shot report.
    #[arg(long, value_enum, default_value = "python-pytest")]
    tech_stack: TechStackArg,

    /// Custom instructions for the one-shot report.
    #[arg(long)]
    instructions: Option<String>,

    /// Path to a text file containing a custom system prompt (openai only).
    #[arg(long, env = "DOC2TEST_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DOC2TEST_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOC2TEST_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Per-call LLM timeout in seconds (default: none).
    #[arg(long, env = "DOC2TEST_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Output structured JSON instead of Markdown.
    #[arg(long, env = "DOC2TEST_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DOC2TEST_NO_PROGRESS")]
    no_progress: bool,

    /// Print document statistics only, no LLM call.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2TEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2TEST_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum UntilArg {
    Processes,
    Scenarios,
    TestCases,
}

impl From<UntilArg> for StopAfter {
    fn from(v: UntilArg) -> Self {
        match v {
            UntilArg::Processes => StopAfter::Processes,
            UntilArg::Scenarios => StopAfter::Scenarios,
            UntilArg::TestCases => StopAfter::TestCases,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TypesArg {
    Unit,
    System,
    Both,
}

impl From<TypesArg> for TestCaseTypes {
    fn from(v: TypesArg) -> Self {
        match v {
            TypesArg::Unit => TestCaseTypes::Unit,
            TypesArg::System => TestCaseTypes::System,
            TypesArg::Both => TestCaseTypes::Both,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DetailArg {
    Short,
    Medium,
    Detailed,
}

impl From<DetailArg> for DetailLevel {
    fn from(v: DetailArg) -> Self {
        match v {
            DetailArg::Short => DetailLevel::Short,
            DetailArg::Medium => DetailLevel::Medium,
            DetailArg::Detailed => DetailLevel::Detailed,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TechStackArg {
    PythonPytest,
    JavascriptJest,
    JavaJunit,
    CsharpNunit,
    GoTesting,
}

impl From<TechStackArg> for TechStack {
    fn from(v: TechStackArg) -> Self {
        match v {
            TechStackArg::PythonPytest => TechStack::PythonPytest,
            TechStackArg::JavascriptJest => TechStack::JavaScriptJest,
            TechStackArg::JavaJunit => TechStack::JavaJUnit,
            TechStackArg::CsharpNunit => TechStack::CSharpNUnit,
            TechStackArg::GoTesting => TechStack::GoTesting,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives the feedback that matters; library INFO logs would
    // only tear it up.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.inspect_only;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input)
            .await
            .context("Failed to inspect document")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize document info")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            println!("Type:         {:?}", info.media_type);
            println!("Pages:        {} ({} with text)", info.total_pages, info.pages_with_text);
            println!("Characters:   {}", info.chars);
        }
        return Ok(());
    }

    // ── Build config and provider ────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressCallback)).await?;

    let env_key = std::env::var(config.provider.api_key_env_var()).ok();
    let credential = cli.api_key.as_deref().or(env_key.as_deref());
    let provider = create_provider(config.provider, credential, &config)
        .context("Failed to set up the LLM provider")?;

    let edited_scenarios = match &cli.scenarios {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read scenarios from {:?}", path))?,
        ),
        None => None,
    };

    let document = load_file(&cli.input)
        .await
        .with_context(|| format!("Failed to load {}", cli.input.display()))?;

    // ── Run ──────────────────────────────────────────────────────────────
    let run_start = Instant::now();
    let rendered = if cli.artifacts {
        let request = ArtifactRequest {
            instructions: cli.instructions.clone(),
            detail: cli.detail.into(),
            tech_stack: cli.tech_stack.into(),
        };
        if let Some(p) = &progress {
            p.on_stage_start(Stage::Artifacts, document.text.len());
        }
        let result = generate_artifacts(&document, &request, provider.as_ref()).await;
        if let Some(p) = &progress {
            match &result {
                Ok(report) => p.on_stage_complete(Stage::Artifacts, report.raw.len()),
                Err(e) => p.on_stage_error(Stage::Artifacts, &e.to_string()),
            }
            p.finish();
        }
        let report = result.context("Report generation failed")?;
        if cli.json {
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        } else {
            report.to_markdown()
        }
    } else {
        let plan = RunPlan {
            stop_after: cli.until.into(),
            edited_scenarios,
        };
        let result = generate_document(document, &config, provider.as_ref(), &plan).await;
        if let Some(p) = &progress {
            p.finish();
        }
        let output = result.context("Generation failed")?;
        if !cli.quiet {
            let cases = output.test_cases.as_ref().map_or(0, |c| c.case_count());
            eprintln!(
                "{} {} scenarios, {} test cases  {}",
                green("✔"),
                bold(&output.scenarios.len().to_string()),
                bold(&cases.to_string()),
                dim(&format!("{}ms", output.stats.total_duration_ms)),
            );
        }
        if cli.json {
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        } else {
            output.to_markdown()
        }
    };

    // ── Write result ─────────────────────────────────────────────────────
    match &cli.output {
        Some(path) => {
            write_atomic(path, rendered.as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!(
                    "   {}  →  {}",
                    dim(&format!("{:.1}s", run_start.elapsed().as_secs_f64())),
                    bold(&path.display().to_string())
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    Ok(())
}

/// Map CLI args to `GenerationConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let provider: ProviderKind = cli.provider.parse()?;

    let mut builder = GenerationConfig::builder()
        .provider(provider)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .scenario_count(cli.scenario_count)
        .test_case_types(cli.types.into());

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(n) = cli.cases_per_scenario {
        builder = builder.test_cases_per_scenario(n);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    Ok(builder.build()?)
}
