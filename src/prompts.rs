//! Prompt templates for the three generation stages and the one-shot report.
//!
//! Every prompt is a pure `format!` substitution: inputs are inserted
//! verbatim and nothing is truncated, so an empty input simply yields a
//! degenerate prompt. Keeping the templates here lets tests inspect them
//! without a provider.

use crate::config::{DetailLevel, TechStack, TestCaseTypes};

/// System instruction sent alongside every prompt by providers that support one.
///
/// Used when `GenerationConfig::system_prompt` is `None`.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that converts requirements and documents into structured test scenarios. Return only valid JSON (an array) unless explicitly asked otherwise.";

/// Default instructions for the one-shot artifact report.
pub const DEFAULT_ARTIFACT_INSTRUCTIONS: &str = "Read the following product manual and generate a high-level test plan, test cases, and code snippets for the selected tech stack.";

/// Stage 1: ask for the top business processes as Markdown.
pub fn business_process_prompt(document: &str) -> String {
    format!(
        r#"You are a senior business analyst. Read the functional specification below and identify the top 10 business processes it describes.

For each process give its name, the trigger that starts it, the actors involved, the main steps, and the expected outcome.

Use exactly this format:

1. <Process name>
Trigger: <what starts the process>
Actors: <who takes part>
Steps:
- <step>
- <step>
Outcome: <expected result>

2. <Process name>
...

Output Markdown only. Do NOT output JSON. Do NOT add an introduction or a closing remark.

Functional specification:
"""
{document}
""""#
    )
}

/// Join the document and the stage-1 report into the context shared by
/// stages 2 and 3.
pub fn document_with_processes(document: &str, business_processes: &str) -> String {
    format!("Document:\n{document}\n\nBusiness processes:\n{business_processes}")
}

/// Stage 2: ask for `scenario_count` test scenarios as a JSON array.
pub fn test_scenario_prompt(context: &str, scenario_count: usize) -> String {
    format!(
        r#"You are a QA lead. Using the document and the business processes below, generate exactly {scenario_count} test scenarios that together cover the most important behaviour.

Return a JSON array where every element has this shape:
[
  {{
    "id": 1,
    "name": "<short scenario name>",
    "description": "<what is verified and why>"
  }}
]

Rules:
- "id" is an integer, unique within the array, starting at 1.
- Output ONLY the JSON array. No Markdown fences, no explanations, no surrounding text.

{context}"#
    )
}

/// Knobs substituted into the stage-3 prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TestCasePromptOptions {
    /// Test cases requested per scenario and type. `None` lets the model decide.
    pub cases_per_scenario: Option<usize>,
    /// Which test-case kinds to produce.
    pub types: TestCaseTypes,
}

/// Stage 3: ask for unit and/or system test cases per scenario as a JSON object.
pub fn test_case_prompt(
    context: &str,
    scenarios_json: &str,
    options: &TestCasePromptOptions,
) -> String {
    let coverage = type_instruction(options.types);
    let count = count_instruction(options.cases_per_scenario);
    format!(
        r#"You are a QA engineer. For every test scenario listed below, write detailed test cases grounded in the document and business processes.

{coverage}
{count}

Return a JSON object with exactly this shape:
{{
  "testCases": [
    {{
      "scenarioId": 1,
      "scenarioName": "<scenario name>",
      "unitTestCases": [
        {{
          "id": "UT-1-1",
          "title": "<title>",
          "description": "<what the test checks>",
          "preconditions": "<state required before the test>",
          "steps": ["<step 1>", "<step 2>"],
          "expectedResult": "<expected outcome>"
        }}
      ],
      "systemTestCases": [
        {{
          "id": "ST-1-1",
          "title": "<title>",
          "description": "<what the test checks>",
          "preconditions": "<state required before the test>",
          "steps": ["<step 1>", "<step 2>"],
          "expectedResult": "<expected outcome>"
        }}
      ]
    }}
  ]
}}

Rules:
- "scenarioId" must be the "id" of the scenario the cases belong to.
- Output ONLY the JSON object. No Markdown fences, no explanations, no surrounding text.

Test scenarios:
{scenarios_json}

{context}"#
    )
}

fn type_instruction(types: TestCaseTypes) -> &'static str {
    match types {
        TestCaseTypes::Both => "Write both unit test cases and system test cases for each scenario.",
        TestCaseTypes::Unit => {
            "Write unit test cases only; leave \"systemTestCases\" as an empty array."
        }
        TestCaseTypes::System => {
            "Write system test cases only; leave \"unitTestCases\" as an empty array."
        }
    }
}

fn count_instruction(cases_per_scenario: Option<usize>) -> String {
    match cases_per_scenario {
        Some(n) => format!("Write exactly {n} test cases of each requested type per scenario."),
        None => "Write as many test cases per scenario as needed for good coverage.".to_string(),
    }
}

/// One-shot report: test plan, test cases and sample code in a single reply.
///
/// The reply is expected to use the numbered sections `1.`, `2.`, `3.` that
/// [`crate::pipeline::sections::split_sections`] looks for.
pub fn test_artifacts_prompt(
    instructions: &str,
    document: &str,
    detail: DetailLevel,
    tech_stack: TechStack,
) -> String {
    format!(
        r#"
{instructions}

Manual:
{document}

Generate the following:
1. A high-level test plan.
2. A comprehensive list of software test cases.
3. Sample test code (unit or integration) using this tech stack: {stack}.

Detail level: {detail}
"#,
        stack = tech_stack.label(),
        detail = detail.as_str(),
    )
}
