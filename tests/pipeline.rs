//! Pipeline integration tests with a scripted in-memory provider.
//!
//! No network, no API key and no pdfium are needed: every reply is queued up
//! front and every prompt is recorded so tests can check what was sent.

use async_trait::async_trait;
use edgequake_doc2test::{
    generate_artifacts, generate_document, invoke, load_file, ArtifactRequest, Doc2TestError,
    Document, ErrorKind, GenerationConfig, LlmProvider, PipelineStage, ProviderKind, RunPlan,
    Session, Stage, StageProgressCallback, StopAfter, TechStack, TestCaseTypes,
};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Replies with queued strings in order; an empty queue is a provider error.
struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn push_ok(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    fn push_err(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn prompt(&self, idx: usize) -> String {
        self.prompts.lock().unwrap()[idx].clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, prompt: &str) -> Result<String, Doc2TestError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(Doc2TestError::LlmApiError {
                provider: "scripted".into(),
                message,
            }),
            None => Err(Doc2TestError::LlmApiError {
                provider: "scripted".into(),
                message: "no scripted reply left".into(),
            }),
        }
    }
}

const DOC: &str = "Page1 text. Page2 text.";
const PROCESSES: &str = "1. Foo\nTrigger: x\n";
const SCENARIOS: &str = r#"[{"id":1,"name":"Login","description":"desc"}]"#;
const TEST_CASES: &str = r#"{
  "testCases": [
    {
      "scenarioId": 1,
      "scenarioName": "Login",
      "unitTestCases": [
        {
          "id": "UT-1-1",
          "title": "Valid password accepted",
          "description": "Checks the happy path",
          "preconditions": "User exists",
          "steps": ["Enter e-mail", "Enter password", "Submit"],
          "expectedResult": "Dashboard is shown"
        }
      ],
      "systemTestCases": [
        {
          "id": "ST-1-1",
          "title": "Locked account rejected",
          "description": "Checks lockout",
          "preconditions": ["Account locked", "User on login page"],
          "steps": ["Submit valid credentials"],
          "expectedResult": "Error message is shown"
        }
      ]
    }
  ]
}"#;

fn text_document() -> Document {
    Document::from_text(DOC)
}

fn session() -> Session {
    Session::new(GenerationConfig::default())
}

async fn session_with_scenarios(provider: &ScriptedProvider) -> Session {
    let mut s = session();
    s.load_document(text_document());
    s.extract_business_processes(provider).await.unwrap();
    s.generate_scenarios(provider).await.unwrap();
    s
}

// ── End-to-end ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_pipeline_reaches_terminal_stage() {
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    file.write_all(DOC.as_bytes()).unwrap();

    let provider = ScriptedProvider::new([PROCESSES, SCENARIOS, TEST_CASES]);
    let mut s = session();
    assert_eq!(s.stage(), PipelineStage::Idle);

    s.load_document(load_file(file.path()).await.unwrap());
    assert_eq!(s.stage(), PipelineStage::DocumentReady);

    let processes = s.extract_business_processes(&provider).await.unwrap();
    assert_eq!(processes, PROCESSES);
    assert_eq!(s.stage(), PipelineStage::ProcessesReady);

    let scenarios = s.generate_scenarios(&provider).await.unwrap();
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0].id, 1);
    assert_eq!(s.stage(), PipelineStage::ScenariosReady);

    let cases = s.generate_test_cases(&provider).await.unwrap();
    assert_eq!(cases.test_cases[0].scenario_id, 1);
    assert_eq!(cases.case_count(), 2);
    assert_eq!(s.stage(), PipelineStage::TestCasesReady);

    // All three results stay retrievable and agree on scenario ids.
    let scenario_ids: Vec<i64> = s.scenarios().unwrap().iter().map(|sc| sc.id).collect();
    let case_ids: Vec<i64> = s
        .test_cases()
        .unwrap()
        .test_cases
        .iter()
        .map(|g| g.scenario_id)
        .collect();
    assert_eq!(scenario_ids, case_ids);
    assert_eq!(s.business_processes(), Some(PROCESSES));
    assert_eq!(
        s.test_cases().unwrap().test_cases[0].system_test_cases[0].preconditions,
        "Account locked\nUser on login page"
    );
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn later_prompts_carry_document_and_earlier_results() {
    let provider = ScriptedProvider::new([PROCESSES, SCENARIOS, TEST_CASES]);
    let mut s = session();
    s.load_document(text_document());
    s.extract_business_processes(&provider).await.unwrap();
    s.generate_scenarios(&provider).await.unwrap();
    s.generate_test_cases(&provider).await.unwrap();

    assert!(provider.prompt(0).contains(DOC));
    assert!(provider.prompt(1).contains(DOC));
    assert!(provider.prompt(1).contains(PROCESSES));
    assert!(provider.prompt(2).contains(PROCESSES));
    assert!(provider.prompt(2).contains("\"name\": \"Login\""));
}

#[tokio::test]
async fn noisy_replies_are_recovered() {
    let provider = ScriptedProvider::new([
        "```markdown\n1. Foo\nTrigger: x\n```".to_string(),
        format!("Sure! Here are the scenarios:\n```json\n{SCENARIOS}\n```\nLet me know."),
        format!("{TEST_CASES}\n-- generated for you"),
    ]);
    let mut s = session();
    s.load_document(text_document());
    assert_eq!(
        s.extract_business_processes(&provider).await.unwrap(),
        PROCESSES
    );
    s.generate_scenarios(&provider).await.unwrap();
    let cases = s.generate_test_cases(&provider).await.unwrap();
    assert_eq!(cases.case_count(), 2);
}

// ── Input errors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_document_is_rejected_before_any_call() {
    let provider = ScriptedProvider::new([PROCESSES]);
    let mut s = session();

    let err = s.extract_business_processes(&provider).await.unwrap_err();
    assert!(matches!(err, Doc2TestError::EmptyDocument));

    s.load_document(Document::from_text("   \n"));
    let err = s.extract_business_processes(&provider).await.unwrap_err();
    assert!(err.is_input_error());
    assert_eq!(provider.calls(), 0);
    assert_eq!(s.stage(), PipelineStage::DocumentReady);
}

#[tokio::test]
async fn stages_are_gated_on_previous_output() {
    let provider = ScriptedProvider::new(Vec::<String>::new());
    let mut s = session();
    s.load_document(text_document());

    let err = s.generate_scenarios(&provider).await.unwrap_err();
    assert!(matches!(
        err,
        Doc2TestError::MissingStageOutput {
            stage: Stage::TestScenarios,
            ..
        }
    ));
    let err = s.generate_test_cases(&provider).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(s.edit_scenarios(SCENARIOS).is_err());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn invalid_edit_blocks_test_case_generation() {
    let provider = ScriptedProvider::new([PROCESSES, SCENARIOS, TEST_CASES]);
    let mut s = session_with_scenarios(&provider).await;
    assert_eq!(provider.calls(), 2);

    let err = s.edit_scenarios("[{\"id\": 1, \"name\": ").unwrap_err();
    assert!(matches!(err, Doc2TestError::InvalidScenarioJson { .. }));
    assert_eq!(s.scenarios().unwrap().len(), 1, "last valid list is kept");

    let err = s.generate_test_cases(&provider).await.unwrap_err();
    assert!(matches!(err, Doc2TestError::InvalidScenarioJson { .. }));
    assert!(err.is_input_error());
    assert_eq!(provider.calls(), 2, "no remote call for an invalid draft");
    assert_eq!(s.stage(), PipelineStage::ScenariosReady);
}

#[tokio::test]
async fn edit_with_wrong_shape_is_rejected() {
    let provider = ScriptedProvider::new([PROCESSES, SCENARIOS]);
    let mut s = session_with_scenarios(&provider).await;

    let err = s.edit_scenarios(r#"{"id": 1}"#).unwrap_err();
    assert!(matches!(err, Doc2TestError::InvalidScenarioJson { .. }));
    let err = s.edit_scenarios(r#"[{"id": 1, "title": "x"}]"#).unwrap_err();
    assert!(err.to_string().contains("Invalid scenario JSON"));
}

#[tokio::test]
async fn valid_edit_is_sent_to_stage_three() {
    let provider = ScriptedProvider::new([PROCESSES, SCENARIOS, TEST_CASES]);
    let mut s = session_with_scenarios(&provider).await;

    let edited = r#"[{"id":1,"name":"Login with SSO","description":"Edited by hand"}]"#;
    let list = s.edit_scenarios(edited).unwrap();
    assert_eq!(list[0].name, "Login with SSO");
    assert_eq!(s.scenario_draft(), Some(edited));

    s.generate_test_cases(&provider).await.unwrap();
    assert!(provider.prompt(2).contains("Login with SSO"));
}

// ── Extraction failures ──────────────────────────────────────────────────────

#[tokio::test]
async fn prose_reply_is_no_valid_data_and_state_is_kept() {
    let provider = ScriptedProvider::new([PROCESSES, "I cannot help with that."]);
    let mut s = session();
    s.load_document(text_document());
    s.extract_business_processes(&provider).await.unwrap();

    let err = s.generate_scenarios(&provider).await.unwrap_err();
    assert!(matches!(
        err,
        Doc2TestError::NoValidData {
            stage: Stage::TestScenarios,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Extraction);
    assert_eq!(s.stage(), PipelineStage::ProcessesReady);
    assert_eq!(s.business_processes(), Some(PROCESSES));
    assert!(s.scenarios().is_none());
}

#[tokio::test]
async fn object_instead_of_list_is_no_valid_data() {
    let provider = ScriptedProvider::new([PROCESSES, r#"{"scenarios": []}"#]);
    let mut s = session();
    s.load_document(text_document());
    s.extract_business_processes(&provider).await.unwrap();
    let err = s.generate_scenarios(&provider).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Extraction);
}

#[tokio::test]
async fn test_cases_without_key_is_no_valid_data() {
    let provider = ScriptedProvider::new([PROCESSES, SCENARIOS, r#"[{"scenarioId": 1}]"#]);
    let mut s = session_with_scenarios(&provider).await;
    let err = s.generate_test_cases(&provider).await.unwrap_err();
    assert!(matches!(
        err,
        Doc2TestError::NoValidData {
            stage: Stage::TestCases,
            ..
        }
    ));
    assert_eq!(s.stage(), PipelineStage::ScenariosReady);
}

#[tokio::test]
async fn unknown_scenario_ids_are_tolerated() {
    let reply = TEST_CASES.replace("\"scenarioId\": 1", "\"scenarioId\": 42");
    let provider = ScriptedProvider::new([PROCESSES.to_string(), SCENARIOS.to_string(), reply]);
    let mut s = session_with_scenarios(&provider).await;
    let cases = s.generate_test_cases(&provider).await.unwrap().clone();
    assert_eq!(cases.unknown_scenario_ids(s.scenarios().unwrap()), vec![42]);
}

// ── Provider errors and state ────────────────────────────────────────────────

#[tokio::test]
async fn provider_failure_leaves_state_untouched() {
    let provider = ScriptedProvider::new([PROCESSES, SCENARIOS, TEST_CASES]);
    let mut s = session_with_scenarios(&provider).await;
    s.generate_test_cases(&provider).await.unwrap();

    provider.push_err("quota exceeded");
    let err = s.generate_scenarios(&provider).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert!(err.to_string().contains("quota exceeded"));
    assert_eq!(s.stage(), PipelineStage::TestCasesReady);
    assert!(s.test_cases().is_some());
}

#[tokio::test]
async fn rerun_clears_downstream_results() {
    let provider = ScriptedProvider::new([PROCESSES, SCENARIOS, TEST_CASES]);
    let mut s = session_with_scenarios(&provider).await;
    s.generate_test_cases(&provider).await.unwrap();

    provider.push_ok(SCENARIOS);
    s.generate_scenarios(&provider).await.unwrap();
    assert!(s.test_cases().is_none());
    assert_eq!(s.stage(), PipelineStage::ScenariosReady);

    provider.push_ok("1. Bar\nTrigger: y\n");
    s.extract_business_processes(&provider).await.unwrap();
    assert!(s.scenarios().is_none());
    assert!(s.scenario_draft().is_none());
    assert_eq!(s.stage(), PipelineStage::ProcessesReady);

    s.load_document(Document::from_text("Another manual."));
    assert_eq!(s.stage(), PipelineStage::DocumentReady);
    assert!(s.business_processes().is_none());

    s.reset();
    assert_eq!(s.stage(), PipelineStage::Idle);
}

#[tokio::test]
async fn unsupported_provider_is_a_configuration_error() {
    let config = GenerationConfig::default();
    let err = "claude".parse::<ProviderKind>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let err = invoke(ProviderKind::OpenAi, "", "hi", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, Doc2TestError::MissingCredential { .. }));
    assert_eq!(err.kind(), ErrorKind::Input);
}

// ── Configuration threading ──────────────────────────────────────────────────

#[tokio::test]
async fn count_and_type_reach_the_prompts() {
    let config = GenerationConfig::builder()
        .scenario_count(3)
        .test_cases_per_scenario(2)
        .test_case_types(TestCaseTypes::System)
        .build()
        .unwrap();
    let provider = ScriptedProvider::new([PROCESSES, SCENARIOS, TEST_CASES]);
    let mut s = Session::new(config);
    s.load_document(text_document());
    s.extract_business_processes(&provider).await.unwrap();
    s.generate_scenarios(&provider).await.unwrap();
    s.generate_test_cases(&provider).await.unwrap();

    assert!(provider.prompt(1).contains("exactly 3 test scenarios"));
    assert!(provider.prompt(2).contains("exactly 2 test cases"));
    assert!(provider.prompt(2).contains("system test cases only"));
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl StageProgressCallback for EventLog {
    fn on_stage_start(&self, stage: Stage, _prompt_len: usize) {
        self.0.lock().unwrap().push(format!("start:{stage:?}"));
    }
    fn on_stage_complete(&self, stage: Stage, _output_len: usize) {
        self.0.lock().unwrap().push(format!("done:{stage:?}"));
    }
    fn on_stage_error(&self, stage: Stage, _error: &str) {
        self.0.lock().unwrap().push(format!("error:{stage:?}"));
    }
}

#[tokio::test]
async fn progress_callback_sees_every_stage() {
    let log = Arc::new(EventLog::default());
    let config = GenerationConfig::builder()
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let provider = ScriptedProvider::new([PROCESSES, "no json here", SCENARIOS]);
    let mut s = Session::new(config);
    s.load_document(text_document());
    s.extract_business_processes(&provider).await.unwrap();
    let err = s.generate_scenarios(&provider).await.unwrap_err();
    assert!(matches!(err, Doc2TestError::NoValidData { .. }));
    s.generate_scenarios(&provider).await.unwrap();

    // A reply without usable data is only an error, never "done".
    assert_eq!(
        *log.0.lock().unwrap(),
        vec![
            "start:BusinessProcesses",
            "done:BusinessProcesses",
            "start:TestScenarios",
            "error:TestScenarios",
            "start:TestScenarios",
            "done:TestScenarios",
        ]
    );
}

#[tokio::test]
async fn empty_stage_one_reply_reports_error_only() {
    let log = Arc::new(EventLog::default());
    let config = GenerationConfig::builder()
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let provider = ScriptedProvider::new(["  \n\n\t\n"]);
    let mut s = Session::new(config);
    s.load_document(text_document());
    let err = s.extract_business_processes(&provider).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Extraction);

    assert_eq!(
        *log.0.lock().unwrap(),
        vec!["start:BusinessProcesses", "error:BusinessProcesses"]
    );
}

// ── Eager entry points ───────────────────────────────────────────────────────

#[tokio::test]
async fn generate_document_runs_all_stages() {
    let provider = ScriptedProvider::new([PROCESSES, SCENARIOS, TEST_CASES]);
    let config = GenerationConfig::default();
    let output = generate_document(text_document(), &config, &provider, &RunPlan::default())
        .await
        .unwrap();

    assert_eq!(output.scenarios.len(), 1);
    assert_eq!(output.test_cases.as_ref().unwrap().case_count(), 2);
    assert_eq!(output.stats.stage_duration_ms.len(), 3);
    assert_eq!(output.document.chars, DOC.len());

    let md = output.to_markdown();
    assert!(md.contains("# Business Processes"));
    assert!(md.contains("Valid password accepted"));
}

#[tokio::test]
async fn generate_document_can_stop_early() {
    let provider = ScriptedProvider::new([PROCESSES, SCENARIOS]);
    let plan = RunPlan {
        stop_after: StopAfter::Scenarios,
        edited_scenarios: None,
    };
    let output = generate_document(text_document(), &GenerationConfig::default(), &provider, &plan)
        .await
        .unwrap();
    assert!(output.test_cases.is_none());
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn invalid_edited_scenarios_fail_before_any_call() {
    let provider = ScriptedProvider::new([PROCESSES, SCENARIOS, TEST_CASES]);
    let plan = RunPlan {
        stop_after: StopAfter::TestCases,
        edited_scenarios: Some("not json".into()),
    };
    let err = generate_document(text_document(), &GenerationConfig::default(), &provider, &plan)
        .await
        .unwrap_err();
    assert!(matches!(err, Doc2TestError::InvalidScenarioJson { .. }));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn artifact_report_splits_sections_or_falls_back() {
    let provider = ScriptedProvider::new([
        "1. Test Plan\nScope\n2. Test Cases\n- TC1\n3. Sample Code\nassert True",
        "Here is everything in one block.",
    ]);
    let request = ArtifactRequest {
        tech_stack: TechStack::PythonPytest,
        ..ArtifactRequest::default()
    };

    let report = generate_artifacts(&text_document(), &request, &provider)
        .await
        .unwrap();
    let sections = report.sections.as_ref().unwrap();
    assert_eq!(sections.test_plan, "Scope");
    assert!(report.to_markdown().contains("```python\nassert True\n```"));
    assert!(provider.prompt(0).contains("Python + Pytest"));

    let report = generate_artifacts(&text_document(), &request, &provider)
        .await
        .unwrap();
    assert!(report.sections.is_none());
    assert!(report.to_markdown().contains("Here is everything in one block."));
}
