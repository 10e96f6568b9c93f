//! Output types: the generated artifacts and their Markdown rendering.
//!
//! The JSON field names follow what the prompts ask the model for
//! (`scenarioId`, `unitTestCases`, `expectedResult`, …) so a reply can be
//! deserialised directly and re-serialised for the caller unchanged.
//!
//! Deserialisation is the validation step: a missing required field fails
//! and the orchestrator reports "no valid data". Unknown fields are ignored
//! and only logged (see [`unknown_fields`]).

use crate::config::{ProviderKind, TechStack};
use crate::error::Stage;
use crate::pipeline::document::MediaType;
use crate::pipeline::sections::ArtifactSections;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// One test scenario as produced by stage 2.
///
/// Ids are assigned by the model and are not guaranteed unique or gapless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestScenario {
    pub id: i64,
    pub name: String,
    pub description: String,
}

impl TestScenario {
    pub(crate) const FIELDS: &'static [&'static str] = &["id", "name", "description"];
}

/// Identifier of a single test case. Models use both `1` and `"UT-1-1"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaseId {
    Number(i64),
    Text(String),
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseId::Number(n) => write!(f, "{n}"),
            CaseId::Text(s) => f.write_str(s),
        }
    }
}

/// A concrete test case: preconditions, ordered steps, expected result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: CaseId,
    pub title: String,
    pub description: String,
    /// Models sometimes answer with a list; it is joined with newlines.
    #[serde(deserialize_with = "string_or_list")]
    pub preconditions: String,
    pub steps: Vec<String>,
    pub expected_result: String,
}

impl TestCase {
    pub(crate) const FIELDS: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "preconditions",
        "steps",
        "expectedResult",
    ];
}

/// All test cases generated for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioTestCases {
    pub scenario_id: i64,
    pub scenario_name: String,
    #[serde(default)]
    pub unit_test_cases: Vec<TestCase>,
    #[serde(default)]
    pub system_test_cases: Vec<TestCase>,
}

impl ScenarioTestCases {
    pub(crate) const FIELDS: &'static [&'static str] = &[
        "scenarioId",
        "scenarioName",
        "unitTestCases",
        "systemTestCases",
    ];

    /// Unit and system cases together.
    pub fn case_count(&self) -> usize {
        self.unit_test_cases.len() + self.system_test_cases.len()
    }
}

/// The stage-3 result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseCollection {
    pub test_cases: Vec<ScenarioTestCases>,
}

impl TestCaseCollection {
    /// Total number of test cases across every scenario.
    pub fn case_count(&self) -> usize {
        self.test_cases.iter().map(ScenarioTestCases::case_count).sum()
    }

    /// `scenarioId`s that match no scenario in `scenarios`, in order of
    /// appearance. Reported only; the pipeline never rejects a collection
    /// because of them.
    pub fn unknown_scenario_ids(&self, scenarios: &[TestScenario]) -> Vec<i64> {
        let known: HashSet<i64> = scenarios.iter().map(|s| s.id).collect();
        self.test_cases
            .iter()
            .map(|group| group.scenario_id)
            .filter(|id| !known.contains(id))
            .collect()
    }
}

/// Names of keys in `value` (an object, or every object of an array) that
/// are not in `allowed`. Used to log extra fields the model invented.
pub(crate) fn unknown_fields(value: &serde_json::Value, allowed: &[&str]) -> Vec<String> {
    let objects: Vec<&serde_json::Map<String, serde_json::Value>> = match value {
        serde_json::Value::Object(map) => vec![map],
        serde_json::Value::Array(items) => items.iter().filter_map(|v| v.as_object()).collect(),
        _ => Vec::new(),
    };
    let mut extra: Vec<String> = objects
        .into_iter()
        .flat_map(|m| m.keys())
        .filter(|k| !allowed.contains(&k.as_str()))
        .cloned()
        .collect();
    extra.sort_unstable();
    extra.dedup();
    extra
}

fn string_or_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s,
        StringOrList::Many(items) => items.join("\n"),
    })
}

// ── Run-level output ─────────────────────────────────────────────────────

/// Summary of the loaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Where the document came from (file path), if known.
    pub source: Option<String>,
    pub media_type: MediaType,
    /// Pages that yielded text (1 for plain text).
    pub pages_with_text: usize,
    /// Pages in the file (1 for plain text).
    pub total_pages: usize,
    pub chars: usize,
}

/// Timing for a full pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    /// Wall-clock duration of each completed stage, in milliseconds.
    pub stage_duration_ms: BTreeMap<Stage, u64>,
    pub total_duration_ms: u64,
}

/// Everything a full pipeline run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub document: DocumentInfo,
    /// Stage-1 Markdown report.
    pub business_processes: String,
    pub scenarios: Vec<TestScenario>,
    /// Absent when the run stopped before stage 3.
    pub test_cases: Option<TestCaseCollection>,
    pub stats: GenerationStats,
}

impl GenerationOutput {
    /// Render the run as a single Markdown document.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Business Processes\n\n");
        md.push_str(self.business_processes.trim_end());
        md.push_str("\n\n");

        if !self.scenarios.is_empty() {
            md.push_str("# Test Scenarios\n\n");
            md.push_str("| ID | Name | Description |\n| --- | --- | --- |\n");
            for s in &self.scenarios {
                md.push_str(&format!(
                    "| {} | {} | {} |\n",
                    s.id,
                    escape_cell(&s.name),
                    escape_cell(&s.description)
                ));
            }
            md.push('\n');
        }

        if let Some(ref collection) = self.test_cases {
            md.push_str("# Test Cases\n\n");
            for group in &collection.test_cases {
                md.push_str(&format!(
                    "## Scenario {}: {}\n\n",
                    group.scenario_id, group.scenario_name
                ));
                render_cases(&mut md, "Unit Test Cases", &group.unit_test_cases);
                render_cases(&mut md, "System Test Cases", &group.system_test_cases);
            }
        }

        format!("{}\n", md.trim_end())
    }
}

fn render_cases(md: &mut String, heading: &str, cases: &[TestCase]) {
    if cases.is_empty() {
        return;
    }
    md.push_str(&format!("### {heading}\n\n"));
    for case in cases {
        md.push_str(&format!("#### {} — {}\n\n", case.id, case.title));
        if !case.description.is_empty() {
            md.push_str(&format!("{}\n\n", case.description));
        }
        if !case.preconditions.is_empty() {
            md.push_str(&format!("**Preconditions:** {}\n\n", case.preconditions));
        }
        if !case.steps.is_empty() {
            md.push_str("**Steps:**\n\n");
            for (i, step) in case.steps.iter().enumerate() {
                md.push_str(&format!("{}. {}\n", i + 1, step));
            }
            md.push('\n');
        }
        md.push_str(&format!("**Expected result:** {}\n\n", case.expected_result));
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

/// Result of the one-shot artifact report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub tech_stack: TechStack,
    /// The full model reply.
    pub raw: String,
    /// `None` when the reply lacked one of the `1.`/`2.`/`3.` markers; show
    /// `raw` instead.
    pub sections: Option<ArtifactSections>,
}

impl ArtifactReport {
    /// Render as Markdown, falling back to the raw reply when unsplit.
    pub fn to_markdown(&self) -> String {
        match self.sections {
            Some(ref s) => format!(
                "## Test Plan\n\n{}\n\n## Test Cases\n\n{}\n\n## Test Code ({})\n\n{}\n",
                s.test_plan,
                s.test_cases,
                self.tech_stack.label(),
                self.fenced_code(&s.test_code)
            ),
            None => format!("```markdown\n{}\n```\n", self.raw.trim_end()),
        }
    }

    /// The code section as one fenced block. Models usually fence it
    /// themselves; that fence is kept as is.
    fn fenced_code(&self, code: &str) -> String {
        let code = code.trim();
        if code.starts_with("```") {
            code.to_string()
        } else {
            format!("```{}\n{}\n```", self.tech_stack.code_language(), code)
        }
    }
}
