//! Eager entry points: run the whole pipeline in one call.
//!
//! These drive a [`Session`] non-interactively, for scripts and the CLI. The
//! one interactive step, editing the scenario list, is covered by
//! [`RunPlan::edited_scenarios`], which replaces the generated list before
//! stage 3.

use crate::config::{DetailLevel, GenerationConfig, TechStack};
use crate::error::{Doc2TestError, Stage};
use crate::output::{ArtifactReport, DocumentInfo, GenerationOutput, GenerationStats};
use crate::pipeline::document::{self, Document};
use crate::pipeline::sections::split_sections;
use crate::prompts;
use crate::provider::LlmProvider;
use crate::session::{parse_scenario_text, Session};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Last stage an eager run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum StopAfter {
    Processes,
    Scenarios,
    #[default]
    TestCases,
}

/// What an eager run should do beyond the defaults.
#[derive(Debug, Clone, Default)]
pub struct RunPlan {
    pub stop_after: StopAfter,
    /// Scenario JSON that replaces the generated list before stage 3. It is
    /// validated before any provider call.
    pub edited_scenarios: Option<String>,
}

/// Load `path` and run all three stages with `provider`.
///
/// # Errors
/// Input errors (missing file, empty document) are returned before any call.
/// The first failing stage aborts the run.
pub async fn generate(
    path: impl AsRef<Path>,
    config: &GenerationConfig,
    provider: &dyn LlmProvider,
) -> Result<GenerationOutput, Doc2TestError> {
    let document = document::load_file(path).await?;
    generate_document(document, config, provider, &RunPlan::default()).await
}

/// Run the pipeline over an already loaded document.
pub async fn generate_document(
    document: Document,
    config: &GenerationConfig,
    provider: &dyn LlmProvider,
    plan: &RunPlan,
) -> Result<GenerationOutput, Doc2TestError> {
    let total_start = Instant::now();

    if document.is_empty() {
        return Err(Doc2TestError::EmptyDocument);
    }
    if let Some(text) = &plan.edited_scenarios {
        parse_scenario_text(text)?;
    }

    let info = document.info();
    let mut session = Session::new(config.clone());
    session.load_document(document);
    let mut durations = BTreeMap::new();

    session.extract_business_processes(provider).await?;
    record(&session, Stage::BusinessProcesses, &mut durations);

    if plan.stop_after >= StopAfter::Scenarios {
        session.generate_scenarios(provider).await?;
        record(&session, Stage::TestScenarios, &mut durations);

        if let Some(text) = &plan.edited_scenarios {
            let edited = session.edit_scenarios(text)?;
            info!("Using {} edited scenarios", edited.len());
        }
    }

    if plan.stop_after >= StopAfter::TestCases {
        session.generate_test_cases(provider).await?;
        record(&session, Stage::TestCases, &mut durations);
    }

    let state = session.state().clone();
    let output = GenerationOutput {
        document: info,
        business_processes: state.business_processes.unwrap_or_default(),
        scenarios: state.scenarios.unwrap_or_default(),
        test_cases: state.test_cases,
        stats: GenerationStats {
            provider: Some(config.provider),
            model: Some(provider_model(config, provider)),
            stage_duration_ms: durations,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        },
    };
    info!(
        "Pipeline finished in {}ms: {} scenarios, {} test cases",
        output.stats.total_duration_ms,
        output.scenarios.len(),
        output.test_cases.as_ref().map_or(0, |c| c.case_count())
    );
    Ok(output)
}

/// Run [`generate`] and write the JSON result to `output_path`.
///
/// The file is written to a temporary sibling and renamed into place, so a
/// failed run never leaves a partial file.
pub async fn generate_to_file(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &GenerationConfig,
    provider: &dyn LlmProvider,
) -> Result<GenerationStats, Doc2TestError> {
    let output = generate(path, config, provider).await?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Doc2TestError::Internal(format!("serialising output: {e}")))?;
    write_atomic(output_path.as_ref(), json.as_bytes())?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    path: impl AsRef<Path>,
    config: &GenerationConfig,
    provider: &dyn LlmProvider,
) -> Result<GenerationOutput, Doc2TestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Doc2TestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(path, config, provider))
}

/// Load a document and report what was extracted. No LLM call, no key needed.
pub async fn inspect(path: impl AsRef<Path>) -> Result<DocumentInfo, Doc2TestError> {
    Ok(document::load_file(path).await?.info())
}

// ── One-shot artifact report ─────────────────────────────────────────────

/// Options for [`generate_artifacts`].
#[derive(Debug, Clone, Default)]
pub struct ArtifactRequest {
    /// Replaces [`prompts::DEFAULT_ARTIFACT_INSTRUCTIONS`] when set.
    pub instructions: Option<String>,
    pub detail: DetailLevel,
    pub tech_stack: TechStack,
}

/// Ask for a test plan, test cases and sample code in a single call.
///
/// A reply without the three numbered sections is not an error: the report
/// keeps `sections: None` and renders the raw text.
pub async fn generate_artifacts(
    document: &Document,
    request: &ArtifactRequest,
    provider: &dyn LlmProvider,
) -> Result<ArtifactReport, Doc2TestError> {
    if document.is_empty() {
        return Err(Doc2TestError::EmptyDocument);
    }
    let instructions = request
        .instructions
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(prompts::DEFAULT_ARTIFACT_INSTRUCTIONS);
    let prompt = prompts::test_artifacts_prompt(
        instructions,
        &document.text,
        request.detail,
        request.tech_stack,
    );

    info!(
        "Requesting {} artifact report via {}",
        request.tech_stack,
        provider.name()
    );
    let raw = provider.invoke(&prompt).await?;
    let sections = split_sections(&raw);
    if sections.is_none() {
        warn!("Artifact reply has no 1./2./3. sections; showing it unsplit");
    }
    Ok(ArtifactReport {
        tech_stack: request.tech_stack,
        raw,
        sections,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn record(session: &Session, stage: Stage, durations: &mut BTreeMap<Stage, u64>) {
    if let Some(d) = session.last_stage_duration() {
        durations.insert(stage, d.as_millis() as u64);
    }
}

fn provider_model(config: &GenerationConfig, provider: &dyn LlmProvider) -> String {
    if provider.name() == config.provider.as_str() {
        config.effective_model().to_string()
    } else {
        config
            .model
            .clone()
            .unwrap_or_else(|| provider.name().to_string())
    }
}

/// Write `bytes` to `path` through a temporary file in the same directory,
/// creating parent directories as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Doc2TestError> {
    let write_err = |e: std::io::Error| Doc2TestError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
