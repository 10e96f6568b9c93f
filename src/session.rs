//! The interactive pipeline: one session, three gated LLM stages.
//!
//! ```text
//! Idle ──load──▶ DocumentReady ──stage 1──▶ ProcessesReady ──stage 2──▶ ScenariosReady
//!                                                                  │  ▲
//!                                                             edit └──┘
//!                                                                  │
//!                                                            stage 3 ▼
//!                                                            TestCasesReady
//! ```
//!
//! Every action either succeeds and moves the session forward, or fails and
//! leaves every field exactly as it was. A successful re-run of a stage
//! clears the results that were derived from its old output, and loading a
//! new document clears everything.
//!
//! Stages never run concurrently: each method takes `&mut self` and awaits a
//! single provider call. The provider is passed per call so the caller can
//! switch provider or credential between stages.

use crate::config::GenerationConfig;
use crate::error::{Doc2TestError, Stage};
use crate::output::{unknown_fields, ScenarioTestCases, TestCase, TestCaseCollection, TestScenario};
use crate::pipeline::document::Document;
use crate::pipeline::extract::recover_json;
use crate::pipeline::postprocess::tidy_markdown;
use crate::prompts::{self, TestCasePromptOptions};
use crate::provider::LlmProvider;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the session stands. Derived from which results are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Idle,
    DocumentReady,
    ProcessesReady,
    ScenariosReady,
    TestCasesReady,
}

/// Session-scoped results. Nothing here is persisted.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub document: Option<Document>,
    /// Stage-1 markdown, kept opaque.
    pub business_processes: Option<String>,
    /// Last valid scenario list.
    pub scenarios: Option<Vec<TestScenario>>,
    /// Scenario JSON as the user sees and edits it. May be invalid.
    pub scenario_draft: Option<String>,
    pub test_cases: Option<TestCaseCollection>,
}

/// Orchestrates the three stages over one [`SessionState`].
pub struct Session {
    config: GenerationConfig,
    state: SessionState,
    last_duration: Option<Duration>,
}

impl Session {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config,
            state: SessionState::default(),
            last_duration: None,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn document(&self) -> Option<&Document> {
        self.state.document.as_ref()
    }

    pub fn business_processes(&self) -> Option<&str> {
        self.state.business_processes.as_deref()
    }

    pub fn scenarios(&self) -> Option<&[TestScenario]> {
        self.state.scenarios.as_deref()
    }

    pub fn scenario_draft(&self) -> Option<&str> {
        self.state.scenario_draft.as_deref()
    }

    pub fn test_cases(&self) -> Option<&TestCaseCollection> {
        self.state.test_cases.as_ref()
    }

    /// Wall time of the last successful LLM stage.
    pub fn last_stage_duration(&self) -> Option<Duration> {
        self.last_duration
    }

    pub fn stage(&self) -> PipelineStage {
        let s = &self.state;
        if s.test_cases.is_some() {
            PipelineStage::TestCasesReady
        } else if s.scenarios.is_some() {
            PipelineStage::ScenariosReady
        } else if s.business_processes.is_some() {
            PipelineStage::ProcessesReady
        } else if s.document.is_some() {
            PipelineStage::DocumentReady
        } else {
            PipelineStage::Idle
        }
    }

    /// Drop every result and the document.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
        self.last_duration = None;
    }

    /// Replace the document. All derived results are cleared.
    pub fn load_document(&mut self, document: Document) {
        info!(
            "Document loaded: {} chars from {}/{} pages",
            document.text.len(),
            document.pages_with_text,
            document.total_pages
        );
        self.state = SessionState {
            document: Some(document),
            ..SessionState::default()
        };
    }

    // ── Stage 1 ──────────────────────────────────────────────────────────────

    /// Ask for the business processes described by the document.
    pub async fn extract_business_processes(
        &mut self,
        provider: &dyn LlmProvider,
    ) -> Result<&str, Doc2TestError> {
        let stage = Stage::BusinessProcesses;
        let document = self.require_document()?;
        let prompt = prompts::business_process_prompt(&document.text);

        let (raw, elapsed) = self.run_stage(stage, provider, &prompt).await?;
        let report = tidy_markdown(&raw);
        if report.is_empty() {
            return Err(self.soft_failure(stage, "the reply was empty"));
        }

        self.complete_stage(stage, raw.len(), elapsed);
        self.state.scenarios = None;
        self.state.scenario_draft = None;
        self.state.test_cases = None;
        Ok(self.state.business_processes.insert(report).as_str())
    }

    // ── Stage 2 ──────────────────────────────────────────────────────────────

    /// Ask for test scenarios grounded in the document and stage-1 report.
    pub async fn generate_scenarios(
        &mut self,
        provider: &dyn LlmProvider,
    ) -> Result<&[TestScenario], Doc2TestError> {
        let stage = Stage::TestScenarios;
        let document = self.require_document()?;
        let processes = self.require_processes(stage)?;
        let context = prompts::document_with_processes(&document.text, processes);
        let prompt = prompts::test_scenario_prompt(&context, self.config.scenario_count);

        let (raw, elapsed) = self.run_stage(stage, provider, &prompt).await?;
        let scenarios = match recover_json(&raw).map(scenarios_from_value) {
            Some(Ok(list)) => list,
            Some(Err(detail)) => return Err(self.soft_failure(stage, &detail)),
            None => return Err(self.soft_failure(stage, "the reply contained no JSON")),
        };
        if scenarios.is_empty() {
            return Err(self.soft_failure(stage, "the scenario list is empty"));
        }

        if scenarios.len() != self.config.scenario_count {
            debug!(
                "Asked for {} scenarios, got {}",
                self.config.scenario_count,
                scenarios.len()
            );
        }

        let draft = scenarios_to_json(&scenarios)?;
        self.complete_stage(stage, raw.len(), elapsed);
        self.state.scenario_draft = Some(draft);
        self.state.test_cases = None;
        Ok(self.state.scenarios.insert(scenarios).as_slice())
    }

    // ── Edit ─────────────────────────────────────────────────────────────────

    /// Replace the scenario list with user-edited JSON text.
    ///
    /// The text is kept as the draft whether or not it is valid, like an
    /// editor buffer. A valid edit becomes the scenario list and clears test
    /// cases made from the old one; an invalid edit leaves the last valid
    /// list in place and returns [`Doc2TestError::InvalidScenarioJson`].
    /// Stage 3 refuses to run while the draft is invalid.
    pub fn edit_scenarios(&mut self, json_text: &str) -> Result<&[TestScenario], Doc2TestError> {
        if self.state.scenarios.is_none() {
            return Err(Doc2TestError::MissingStageOutput {
                stage: Stage::TestCases,
                missing: "a generated scenario list".to_string(),
            });
        }

        self.state.scenario_draft = Some(json_text.to_string());
        let scenarios = parse_scenario_text(json_text)?;

        if self.state.scenarios.as_ref() != Some(&scenarios) {
            self.state.test_cases = None;
        }
        Ok(self.state.scenarios.insert(scenarios).as_slice())
    }

    // ── Stage 3 ──────────────────────────────────────────────────────────────

    /// Ask for unit and/or system test cases for every scenario in the draft.
    ///
    /// The draft is validated first; an invalid draft fails without calling
    /// the provider.
    pub async fn generate_test_cases(
        &mut self,
        provider: &dyn LlmProvider,
    ) -> Result<&TestCaseCollection, Doc2TestError> {
        let stage = Stage::TestCases;
        let document = self.require_document()?;
        let processes = self.require_processes(stage)?;
        let draft = self
            .state
            .scenario_draft
            .as_deref()
            .ok_or_else(|| Doc2TestError::MissingStageOutput {
                stage,
                missing: "the test scenarios".to_string(),
            })?;
        let scenarios = parse_scenario_text(draft)?;
        if scenarios.is_empty() {
            return Err(Doc2TestError::InvalidScenarioJson {
                detail: "the scenario list is empty".to_string(),
            });
        }

        let context = prompts::document_with_processes(&document.text, processes);
        let scenarios_json = scenarios_to_json(&scenarios)?;
        let options = TestCasePromptOptions {
            cases_per_scenario: self.config.test_cases_per_scenario,
            types: self.config.test_case_types,
        };
        let prompt = prompts::test_case_prompt(&context, &scenarios_json, &options);

        let (raw, elapsed) = self.run_stage(stage, provider, &prompt).await?;
        let collection = match recover_json(&raw).map(collection_from_value) {
            Some(Ok(c)) => c,
            Some(Err(detail)) => return Err(self.soft_failure(stage, &detail)),
            None => return Err(self.soft_failure(stage, "the reply contained no JSON")),
        };

        let unknown = collection.unknown_scenario_ids(&scenarios);
        if !unknown.is_empty() {
            warn!("Test cases reference unknown scenario ids: {:?}", unknown);
        }
        info!(
            "Generated {} test cases for {} scenarios",
            collection.case_count(),
            collection.test_cases.len()
        );

        self.complete_stage(stage, raw.len(), elapsed);
        self.state.scenarios = Some(scenarios);
        Ok(&*self.state.test_cases.insert(collection))
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn require_document(&self) -> Result<&Document, Doc2TestError> {
        match &self.state.document {
            Some(doc) if !doc.is_empty() => Ok(doc),
            _ => Err(Doc2TestError::EmptyDocument),
        }
    }

    fn require_processes(&self, stage: Stage) -> Result<&str, Doc2TestError> {
        self.state
            .business_processes
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| Doc2TestError::MissingStageOutput {
                stage,
                missing: "the business processes".to_string(),
            })
    }

    /// One provider call with start/error events and timing. Does not touch
    /// state; the caller reports completion once the reply is validated.
    async fn run_stage(
        &self,
        stage: Stage,
        provider: &dyn LlmProvider,
        prompt: &str,
    ) -> Result<(String, Duration), Doc2TestError> {
        info!("Running {} via {}", stage, provider.name());
        if let Some(cb) = &self.config.progress_callback {
            cb.on_stage_start(stage, prompt.len());
        }

        let start = Instant::now();
        match provider.invoke(prompt).await {
            Ok(raw) => {
                let elapsed = start.elapsed();
                debug!(
                    "{} reply: {} chars in {}ms",
                    stage,
                    raw.len(),
                    elapsed.as_millis()
                );
                Ok((raw, elapsed))
            }
            Err(e) => {
                warn!("{} failed: {}", stage, e);
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_stage_error(stage, &e.to_string());
                }
                Err(e)
            }
        }
    }

    fn complete_stage(&mut self, stage: Stage, output_len: usize, elapsed: Duration) {
        self.last_duration = Some(elapsed);
        if let Some(cb) = &self.config.progress_callback {
            cb.on_stage_complete(stage, output_len);
        }
    }

    fn soft_failure(&self, stage: Stage, detail: &str) -> Doc2TestError {
        warn!("No valid data in {} reply: {}", stage, detail);
        if let Some(cb) = &self.config.progress_callback {
            cb.on_stage_error(stage, detail);
        }
        Doc2TestError::NoValidData {
            stage,
            detail: detail.to_string(),
        }
    }
}

/// Validate a JSON value as a scenario list. Extra keys are logged and
/// ignored; missing keys are an error.
pub fn scenarios_from_value(value: Value) -> Result<Vec<TestScenario>, String> {
    if !value.is_array() {
        return Err(format!("expected a JSON array, got {}", json_kind(&value)));
    }
    let extra = unknown_fields(&value, TestScenario::FIELDS);
    if !extra.is_empty() {
        debug!("Ignoring extra scenario fields: {:?}", extra);
    }
    serde_json::from_value(value).map_err(|e| format!("scenario list does not match {{id, name, description}}: {e}"))
}

/// Validate a JSON value as a test-case collection.
pub fn collection_from_value(value: Value) -> Result<TestCaseCollection, String> {
    let Some(groups) = value.get("testCases") else {
        return Err(format!(
            "expected an object with a \"testCases\" key, got {}",
            json_kind(&value)
        ));
    };
    let extra = unknown_fields(groups, ScenarioTestCases::FIELDS);
    if !extra.is_empty() {
        debug!("Ignoring extra test-case group fields: {:?}", extra);
    }
    if let Some(items) = groups.as_array() {
        for group in items {
            for key in ["unitTestCases", "systemTestCases"] {
                if let Some(cases) = group.get(key) {
                    let extra = unknown_fields(cases, TestCase::FIELDS);
                    if !extra.is_empty() {
                        debug!("Ignoring extra test-case fields: {:?}", extra);
                    }
                }
            }
        }
    }
    serde_json::from_value(value).map_err(|e| format!("test-case collection is malformed: {e}"))
}

/// Strictly parse user-edited scenario text. No fence stripping or repair:
/// what the user typed must be a valid scenario array.
pub fn parse_scenario_text(text: &str) -> Result<Vec<TestScenario>, Doc2TestError> {
    let value: Value = serde_json::from_str(text).map_err(|e| Doc2TestError::InvalidScenarioJson {
        detail: e.to_string(),
    })?;
    scenarios_from_value(value).map_err(|detail| Doc2TestError::InvalidScenarioJson { detail })
}

fn scenarios_to_json(scenarios: &[TestScenario]) -> Result<String, Doc2TestError> {
    serde_json::to_string_pretty(scenarios)
        .map_err(|e| Doc2TestError::Internal(format!("serialising scenarios: {e}")))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
