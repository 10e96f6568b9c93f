//! Configuration types for test-artifact generation.
//!
//! All generation behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. The config carries the provider choice
//! and the prompt parameters; it never carries pipeline state, which lives in
//! [`crate::session::Session`].

use crate::error::Doc2TestError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration for a generation run.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_doc2test::{GenerationConfig, ProviderKind, TestCaseTypes};
///
/// let config = GenerationConfig::builder()
///     .provider(ProviderKind::OpenAi)
///     .scenario_count(5)
///     .test_case_types(TestCaseTypes::Unit)
///     .build()
///     .unwrap();
/// assert_eq!(config.scenario_count, 5);
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Which LLM backend to call. Default: [`ProviderKind::Gemini`].
    pub provider: ProviderKind,

    /// Credential for the selected provider.
    ///
    /// Used only to build the provider for the in-flight call. It is redacted
    /// from `Debug` output and never serialised.
    pub api_key: Option<String>,

    /// Model identifier. If None, uses [`ProviderKind::default_model`].
    pub model: Option<String>,

    /// API base URL. If None, uses [`ProviderKind::default_base_url`].
    pub base_url: Option<String>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 4096.
    ///
    /// A ten-scenario test-case collection with unit and system cases runs to
    /// several thousand tokens; lower values truncate the JSON mid-object.
    pub max_tokens: u32,

    /// Custom system instruction. If None, uses
    /// [`crate::prompts::DEFAULT_SYSTEM_PROMPT`]. Only the OpenAI adapter
    /// sends a system instruction.
    pub system_prompt: Option<String>,

    /// Number of test scenarios requested in stage 2. Default: 10.
    pub scenario_count: usize,

    /// Test cases requested per scenario and type in stage 3. Default: None
    /// (the model decides).
    pub test_cases_per_scenario: Option<usize>,

    /// Which test-case kinds stage 3 asks for. Default: [`TestCaseTypes::Both`].
    pub test_case_types: TestCaseTypes,

    /// Per-call timeout in seconds. Default: None (a call blocks until the
    /// provider answers or fails).
    pub api_timeout_secs: Option<u64>,

    /// Receives stage start/complete/error events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            api_key: None,
            model: None,
            base_url: None,
            temperature: 0.2,
            max_tokens: 4096,
            system_prompt: None,
            scenario_count: 10,
            test_cases_per_scenario: None,
            test_case_types: TestCaseTypes::default(),
            api_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("scenario_count", &self.scenario_count)
            .field("test_cases_per_scenario", &self.test_cases_per_scenario)
            .field("test_case_types", &self.test_case_types)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn StageProgressCallback>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model that will be requested, falling back to the provider default.
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// The base URL that will be called, without a trailing slash.
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.config.provider = provider;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn scenario_count(mut self, n: usize) -> Self {
        self.config.scenario_count = n;
        self
    }

    pub fn test_cases_per_scenario(mut self, n: usize) -> Self {
        self.config.test_cases_per_scenario = Some(n);
        self
    }

    pub fn test_case_types(mut self, types: TestCaseTypes) -> Self {
        self.config.test_case_types = types;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, Doc2TestError> {
        let c = &self.config;
        if c.scenario_count == 0 {
            return Err(Doc2TestError::InvalidConfig(
                "Scenario count must be ≥ 1".into(),
            ));
        }
        if c.test_cases_per_scenario == Some(0) {
            return Err(Doc2TestError::InvalidConfig(
                "Test cases per scenario must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(Doc2TestError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(Doc2TestError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The two supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI Chat Completions.
    #[serde(rename = "openai")]
    OpenAi,
    /// Google Gemini `generateContent`. (default)
    #[default]
    Gemini,
}

impl ProviderKind {
    /// Lower-case identifier used on the command line and in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Model used when the config does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Gemini => "gemini-1.5-flash",
        }
    }

    /// Public API endpoint root.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Environment variable conventionally holding this provider's key.
    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Doc2TestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            _ => Err(Doc2TestError::UnsupportedProvider {
                name: s.to_string(),
            }),
        }
    }
}

/// Which kinds of test cases stage 3 should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestCaseTypes {
    /// Unit test cases only.
    Unit,
    /// System test cases only.
    System,
    /// Both unit and system test cases. (default)
    #[default]
    Both,
}

/// How much detail the one-shot artifact report should contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Short,
    #[default]
    Medium,
    Detailed,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Short => "short",
            DetailLevel::Medium => "medium",
            DetailLevel::Detailed => "detailed",
        }
    }
}

/// Target language and test framework for generated sample code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TechStack {
    #[default]
    PythonPytest,
    JavaScriptJest,
    JavaJUnit,
    CSharpNUnit,
    GoTesting,
}

impl TechStack {
    /// Human-readable label substituted into the prompt.
    pub fn label(&self) -> &'static str {
        match self {
            TechStack::PythonPytest => "Python + Pytest",
            TechStack::JavaScriptJest => "JavaScript + Jest",
            TechStack::JavaJUnit => "Java + JUnit",
            TechStack::CSharpNUnit => "C# + NUnit",
            TechStack::GoTesting => "Go + Testing",
        }
    }

    /// Code-fence language tag used when displaying the sample code.
    pub fn code_language(&self) -> &'static str {
        match self {
            TechStack::PythonPytest => "python",
            TechStack::JavaScriptJest => "javascript",
            TechStack::JavaJUnit => "java",
            TechStack::CSharpNUnit => "csharp",
            TechStack::GoTesting => "go",
        }
    }
}

impl fmt::Display for TechStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = GenerationConfig::default();
        assert_eq!(c.provider, ProviderKind::Gemini);
        assert_eq!(c.scenario_count, 10);
        assert_eq!(c.test_case_types, TestCaseTypes::Both);
        assert!(c.api_timeout_secs.is_none());
        assert_eq!(c.effective_model(), "gemini-1.5-flash");
    }

    #[test]
    fn provider_from_str() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(" Gemini ".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        let err = "claude".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, Doc2TestError::UnsupportedProvider { ref name } if name == "claude"));
    }

    #[test]
    fn builder_rejects_zero_scenarios() {
        let err = GenerationConfig::builder().scenario_count(0).build().unwrap_err();
        assert!(matches!(err, Doc2TestError::InvalidConfig(_)));
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = GenerationConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = GenerationConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = GenerationConfig::builder()
            .provider(ProviderKind::OpenAi)
            .base_url("http://localhost:8080/v1/")
            .build()
            .unwrap();
        assert_eq!(c.effective_base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn tech_stack_languages() {
        assert_eq!(TechStack::CSharpNUnit.code_language(), "csharp");
        assert_eq!(TechStack::GoTesting.label(), "Go + Testing");
    }
}
