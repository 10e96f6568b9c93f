//! # edgequake-doc2test
//!
//! Turn a functional specification (PDF or text) into business processes,
//! test scenarios and detailed test cases with a Large Language Model.
//!
//! ## Why this crate?
//!
//! Asking a model for "test cases for this spec" in one shot gives shallow,
//! unstructured output. This crate splits the job into three grounded
//! stages, each feeding the next, and recovers structured JSON from replies
//! that wrap it in prose, fences or trailing commentary.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / text
//!  │
//!  ├─ 0. Load        pdfium text layer or lossy UTF-8 (spawn_blocking)
//!  ├─ 1. Processes   top business processes, Markdown
//!  ├─ 2. Scenarios   JSON array of {id, name, description}
//!  │      └─ edit    the user may replace the list before stage 3
//!  └─ 3. Test cases  {testCases: [{scenarioId, unitTestCases, systemTestCases}]}
//! ```
//!
//! Each stage is one call to OpenAI or Google Gemini, never retried and never
//! run concurrently with another.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2test::{load_file, provider_from_config, GenerationConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Key read from GEMINI_API_KEY
//!     let config = GenerationConfig::default();
//!     let provider = provider_from_config(&config)?;
//!
//!     let mut session = Session::new(config);
//!     session.load_document(load_file("requirements.pdf").await?);
//!     session.extract_business_processes(provider.as_ref()).await?;
//!     session.generate_scenarios(provider.as_ref()).await?;
//!     let cases = session.generate_test_cases(provider.as_ref()).await?;
//!     println!("{} test cases", cases.case_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `doc2test` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `openai` | on      | OpenAI Chat Completions adapter |
//! | `gemini` | on      | Google Gemini adapter |
//!
//! Requesting a provider whose feature is off fails at construction with
//! [`Doc2TestError::ProviderNotConfigured`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    DetailLevel, GenerationConfig, GenerationConfigBuilder, ProviderKind, TechStack, TestCaseTypes,
};
pub use error::{Doc2TestError, ErrorKind, Stage};
pub use generate::{
    generate, generate_artifacts, generate_document, generate_sync, generate_to_file, inspect,
    write_atomic, ArtifactRequest, RunPlan, StopAfter,
};
pub use output::{
    ArtifactReport, CaseId, DocumentInfo, GenerationOutput, GenerationStats, ScenarioTestCases,
    TestCase, TestCaseCollection, TestScenario,
};
pub use pipeline::document::{load_document, load_file, Document, MediaType};
pub use pipeline::extract::{extract_json, parse_json, recover_json};
pub use pipeline::sections::ArtifactSections;
pub use progress::{NoopProgressCallback, ProgressCallback, StageProgressCallback};
pub use provider::{create_provider, invoke, provider_from_config, LlmProvider};
pub use session::{PipelineStage, Session, SessionState};
