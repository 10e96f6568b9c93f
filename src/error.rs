//! Error types for the edgequake-doc2test library.
//!
//! A single fatal error type, [`Doc2TestError`], covers every failure a
//! pipeline action can surface. Variants fall into five families, reported by
//! [`Doc2TestError::kind`]:
//!
//! * **Input**: detected before any remote call (missing credential, empty
//!   document, missing upstream stage output, invalid user-edited JSON).
//! * **Configuration**: the requested provider cannot be constructed.
//! * **Provider**: the remote call failed; the message is passed through.
//! * **Extraction**: the reply contained no usable structured data. The
//!   extractor itself never errors, the orchestrator converts an absent value
//!   into [`Doc2TestError::NoValidData`] so callers can report it.
//! * **Io**: reading inputs or writing outputs failed.
//!
//! No variant is ever retried by the library. Each failing action leaves the
//! session state exactly as it was before the action started.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-doc2test library.
#[derive(Debug, Error)]
pub enum Doc2TestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No credential was supplied for the selected provider.
    #[error("No API key provided for provider '{provider}'.\nSet {env_var} or pass --api-key.")]
    MissingCredential { provider: String, env_var: String },

    /// The document is missing or contains no text.
    #[error("The document is empty. Upload a PDF with extractable text or a non-empty text file.")]
    EmptyDocument,

    /// A stage was invoked before the stage it depends on produced output.
    #[error("Cannot run {stage}: {missing} is not available yet")]
    MissingStageOutput { stage: Stage, missing: String },

    /// User-edited scenario JSON does not parse as a scenario list.
    #[error("Invalid scenario JSON: {detail}")]
    InvalidScenarioJson { detail: String },

    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Configuration errors ──────────────────────────────────────────────
    /// The provider identifier is not one of the supported values.
    #[error("Unsupported LLM provider '{name}'. Supported: openai, gemini")]
    UnsupportedProvider { name: String },

    /// The provider is known but its adapter is not available in this build.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library for PDF text extraction.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF text extraction needs the PDFium shared library.\n\
  • Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium, or\n\
  • install libpdfium on the system library path.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Provider errors ───────────────────────────────────────────────────
    /// The provider rejected the credential (401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The provider returned HTTP 429.
    ///
    /// `detail` is the provider's own message (quota, billing, ...).
    /// `retry_after_secs` carries the server's `Retry-After` hint when present.
    /// The library never waits on it; it is surfaced for the caller.
    #[error(
        "Rate limit exceeded for provider '{provider}'{}: {detail}",
        retry_hint(.retry_after_secs)
    )]
    RateLimitExceeded {
        provider: String,
        detail: String,
        retry_after_secs: Option<u64>,
    },

    /// The call exceeded `api_timeout_secs`.
    #[error("Call to provider '{provider}' timed out after {secs}s")]
    ApiTimeout { provider: String, secs: u64 },

    /// Any other remote failure (network, quota, malformed request or reply).
    #[error("LLM API error from '{provider}': {message}")]
    LlmApiError { provider: String, message: String },

    // ── Extraction (soft) ─────────────────────────────────────────────────
    /// The reply did not contain data of the expected shape.
    #[error("No valid data found in the {stage} reply: {detail}")]
    NoValidData { stage: Stage, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The PDF could not be opened or parsed (corrupt, encrypted, not a PDF).
    #[error("PDF '{name}' could not be read: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// Reading the input file failed for a reason other than not-found or permissions.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn retry_hint(secs: &Option<u64>) -> String {
    match secs {
        Some(s) => format!(" (retry after {s}s)"),
        None => String::new(),
    }
}

/// Broad family of a [`Doc2TestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Configuration,
    Provider,
    Extraction,
    Io,
    Internal,
}

impl Doc2TestError {
    /// Classify this error into its family.
    pub fn kind(&self) -> ErrorKind {
        use Doc2TestError::*;
        match self {
            MissingCredential { .. }
            | EmptyDocument
            | MissingStageOutput { .. }
            | InvalidScenarioJson { .. }
            | FileNotFound { .. }
            | PermissionDenied { .. } => ErrorKind::Input,
            UnsupportedProvider { .. }
            | ProviderNotConfigured { .. }
            | InvalidConfig(_)
            | PdfiumBindingFailed(_) => ErrorKind::Configuration,
            AuthError { .. }
            | RateLimitExceeded { .. }
            | ApiTimeout { .. }
            | LlmApiError { .. } => ErrorKind::Provider,
            NoValidData { .. } => ErrorKind::Extraction,
            CorruptPdf { .. } | ReadFailed { .. } | OutputWriteFailed { .. } => ErrorKind::Io,
            Internal(_) => ErrorKind::Internal,
        }
    }

    /// `true` for errors detected before any remote call was made.
    pub fn is_input_error(&self) -> bool {
        self.kind() == ErrorKind::Input
    }
}

/// The three LLM stages of the pipeline, plus the one-shot artifact report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BusinessProcesses,
    TestScenarios,
    TestCases,
    Artifacts,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::BusinessProcesses => "business-process extraction",
            Stage::TestScenarios => "test-scenario generation",
            Stage::TestCases => "test-case generation",
            Stage::Artifacts => "test-artifact generation",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_display_with_retry() {
        let e = Doc2TestError::RateLimitExceeded {
            provider: "openai".into(),
            detail: "HTTP 429".into(),
            retry_after_secs: Some(60),
        };
        let msg = e.to_string();
        assert!(msg.contains("openai"), "got: {msg}");
        assert!(msg.contains("retry after 60s"), "got: {msg}");
    }

    #[test]
    fn rate_limit_display_without_retry() {
        let e = Doc2TestError::RateLimitExceeded {
            provider: "gemini".into(),
            detail: "HTTP 429: RESOURCE_EXHAUSTED".into(),
            retry_after_secs: None,
        };
        assert_eq!(
            e.to_string(),
            "Rate limit exceeded for provider 'gemini': HTTP 429: RESOURCE_EXHAUSTED"
        );
    }

    #[test]
    fn auth_error_display() {
        let e = Doc2TestError::AuthError {
            provider: "gemini".into(),
            detail: "API key not valid".into(),
        };
        assert!(e.to_string().contains("gemini"));
        assert!(e.to_string().contains("API key not valid"));
    }

    #[test]
    fn missing_stage_output_names_stage() {
        let e = Doc2TestError::MissingStageOutput {
            stage: Stage::TestCases,
            missing: "test scenarios".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("test-case generation"), "got: {msg}");
        assert!(msg.contains("test scenarios"), "got: {msg}");
    }

    #[test]
    fn kinds_are_distinct() {
        let unsupported = Doc2TestError::UnsupportedProvider { name: "claude".into() };
        let remote = Doc2TestError::LlmApiError {
            provider: "openai".into(),
            message: "boom".into(),
        };
        assert_eq!(unsupported.kind(), ErrorKind::Configuration);
        assert_eq!(remote.kind(), ErrorKind::Provider);
        assert!(Doc2TestError::EmptyDocument.is_input_error());
        assert_eq!(
            Doc2TestError::NoValidData {
                stage: Stage::TestScenarios,
                detail: "x".into()
            }
            .kind(),
            ErrorKind::Extraction
        );
    }
}
