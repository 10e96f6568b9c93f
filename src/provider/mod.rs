//! LLM client: one capability trait and two HTTP adapters.
//!
//! A provider is chosen by [`ProviderKind`] when it is constructed. Each
//! adapter authenticates with the credential it was built with, sends the
//! prompt as a single-turn request and returns the first text completion.
//! Nothing is retried and no partial result is kept: a failure becomes one
//! [`Doc2TestError`] carrying the provider's own message.
//!
//! | Status / condition     | Error                 |
//! |------------------------|-----------------------|
//! | 401, 403               | `AuthError`           |
//! | 429                    | `RateLimitExceeded`   |
//! | client timeout         | `ApiTimeout`          |
//! | anything else          | `LlmApiError`         |
//!
//! Adapters are compiled behind the `openai` and `gemini` cargo features.
//! Asking for one that was compiled out is a configuration error raised at
//! construction, before any request.

use crate::config::{GenerationConfig, ProviderKind};
use crate::error::Doc2TestError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "openai")]
pub mod openai;

/// A text-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Send `prompt` as a single user turn and return the reply text.
    async fn invoke(&self, prompt: &str) -> Result<String, Doc2TestError>;
}

/// Settings shared by both adapters, resolved from a [`GenerationConfig`]
/// for one provider kind.
#[derive(Clone)]
pub(crate) struct ProviderSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub timeout_secs: Option<u64>,
}

impl ProviderSettings {
    fn resolve(kind: ProviderKind, api_key: String, config: &GenerationConfig) -> Self {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or_else(|| kind.default_base_url())
            .trim_end_matches('/')
            .to_string();
        Self {
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| kind.default_model().to_string()),
            base_url,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| crate::prompts::DEFAULT_SYSTEM_PROMPT.to_string()),
            timeout_secs: config.api_timeout_secs,
        }
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client, Doc2TestError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder
            .build()
            .map_err(|e| Doc2TestError::Internal(format!("HTTP client: {e}")))
    }
}

/// Build the adapter for `kind`.
///
/// `credential` wins over `config.api_key`. A missing or blank credential is
/// an input error and no client is built.
pub fn create_provider(
    kind: ProviderKind,
    credential: Option<&str>,
    config: &GenerationConfig,
) -> Result<Arc<dyn LlmProvider>, Doc2TestError> {
    let key = credential
        .or(config.api_key.as_deref())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Doc2TestError::MissingCredential {
            provider: kind.as_str().to_string(),
            env_var: kind.api_key_env_var().to_string(),
        })?;

    let settings = ProviderSettings::resolve(kind, key.to_string(), config);
    debug!(
        "Creating {} provider (model={}, base_url={})",
        kind, settings.model, settings.base_url
    );

    match kind {
        ProviderKind::OpenAi => build_openai(settings),
        ProviderKind::Gemini => build_gemini(settings),
    }
}

/// Build the provider named by `config.provider`, taking the key from
/// `config.api_key` or the provider's environment variable.
pub fn provider_from_config(
    config: &GenerationConfig,
) -> Result<Arc<dyn LlmProvider>, Doc2TestError> {
    let env_key = std::env::var(config.provider.api_key_env_var()).ok();
    let credential = config.api_key.as_deref().or(env_key.as_deref());
    create_provider(config.provider, credential, config)
}

/// Construct the provider and make one call.
pub async fn invoke(
    kind: ProviderKind,
    credential: &str,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<String, Doc2TestError> {
    let provider = create_provider(kind, Some(credential), config)?;
    provider.invoke(prompt).await
}

/// Same as [`invoke`] but with the provider named as a string, e.g. from a
/// form field. Unknown names are a configuration error.
pub async fn invoke_named(
    provider: &str,
    credential: &str,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<String, Doc2TestError> {
    let kind: ProviderKind = provider.parse()?;
    invoke(kind, credential, prompt, config).await
}

#[cfg(feature = "openai")]
fn build_openai(settings: ProviderSettings) -> Result<Arc<dyn LlmProvider>, Doc2TestError> {
    Ok(Arc::new(openai::OpenAiProvider::new(settings)?))
}

#[cfg(not(feature = "openai"))]
fn build_openai(_settings: ProviderSettings) -> Result<Arc<dyn LlmProvider>, Doc2TestError> {
    Err(Doc2TestError::ProviderNotConfigured {
        provider: ProviderKind::OpenAi.as_str().to_string(),
        hint: "Rebuild with the `openai` cargo feature enabled.".to_string(),
    })
}

#[cfg(feature = "gemini")]
fn build_gemini(settings: ProviderSettings) -> Result<Arc<dyn LlmProvider>, Doc2TestError> {
    Ok(Arc::new(gemini::GeminiProvider::new(settings)?))
}

#[cfg(not(feature = "gemini"))]
fn build_gemini(_settings: ProviderSettings) -> Result<Arc<dyn LlmProvider>, Doc2TestError> {
    Err(Doc2TestError::ProviderNotConfigured {
        provider: ProviderKind::Gemini.as_str().to_string(),
        hint: "Rebuild with the `gemini` cargo feature enabled.".to_string(),
    })
}

// ── Shared HTTP error mapping ────────────────────────────────────────────────

/// Map a non-success HTTP status to an error. `body` is passed through so the
/// provider's own explanation reaches the user.
pub(crate) fn classify_status(
    provider: &str,
    status: u16,
    retry_after: Option<&str>,
    body: &str,
) -> Doc2TestError {
    let detail = if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", body.trim())
    };
    match status {
        401 | 403 => Doc2TestError::AuthError {
            provider: provider.to_string(),
            detail,
        },
        429 => Doc2TestError::RateLimitExceeded {
            provider: provider.to_string(),
            detail,
            retry_after_secs: retry_after.and_then(parse_retry_after),
        },
        _ => Doc2TestError::LlmApiError {
            provider: provider.to_string(),
            message: detail,
        },
    }
}

/// Map a transport failure. Timeouts get their own variant.
pub(crate) fn classify_transport(
    provider: &str,
    timeout_secs: Option<u64>,
    err: &reqwest::Error,
) -> Doc2TestError {
    if err.is_timeout() {
        return Doc2TestError::ApiTimeout {
            provider: provider.to_string(),
            secs: timeout_secs.unwrap_or_default(),
        };
    }
    Doc2TestError::LlmApiError {
        provider: provider.to_string(),
        message: format!("Request failed: {err}"),
    }
}

/// Read a response, turning HTTP errors into [`Doc2TestError`]s and
/// returning the body text on success.
pub(crate) async fn read_response(
    provider: &str,
    timeout_secs: Option<u64>,
    response: reqwest::Response,
) -> Result<String, Doc2TestError> {
    let status = response.status();
    if status.is_success() {
        return response
            .text()
            .await
            .map_err(|e| classify_transport(provider, timeout_secs, &e));
    }
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(
        provider,
        status.as_u16(),
        retry_after.as_deref(),
        &body,
    ))
}

/// Parse a `Retry-After` value given in seconds (`"30"`, `"1.5"`).
///
/// HTTP-date values are not interpreted and yield `None`.
pub fn parse_retry_after(value: &str) -> Option<u64> {
    let v = value.trim();
    if let Ok(n) = v.parse::<f64>() {
        return (n.is_finite() && n >= 0.0).then(|| n.round() as u64);
    }
    let digits: String = v.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            classify_status("openai", 401, None, "bad key"),
            Doc2TestError::AuthError { .. }
        ));
        assert!(matches!(
            classify_status("gemini", 403, None, ""),
            Doc2TestError::AuthError { .. }
        ));
        match classify_status("openai", 429, Some("12"), "") {
            Doc2TestError::RateLimitExceeded {
                retry_after_secs, ..
            } => assert_eq!(retry_after_secs, Some(12)),
            other => panic!("unexpected {other:?}"),
        }
        let err = classify_status("openai", 500, None, "{\"error\":\"overloaded\"}");
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(err.to_string().contains("overloaded"));
    }

    #[test]
    fn rate_limit_keeps_provider_message() {
        let err = classify_status(
            "openai",
            429,
            Some("30"),
            "{\"error\":\"insufficient_quota: billing\"}",
        );
        assert_eq!(err.kind(), ErrorKind::Provider);
        let msg = err.to_string();
        assert!(msg.contains("insufficient_quota: billing"), "got: {msg}");
        assert!(msg.contains("retry after 30s"), "got: {msg}");
        match err {
            Doc2TestError::RateLimitExceeded { detail, .. } => {
                assert_eq!(detail, "HTTP 429: {\"error\":\"insufficient_quota: billing\"}")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn retry_after_values() {
        assert_eq!(parse_retry_after("30"), Some(30));
        assert_eq!(parse_retry_after(" 1.6 "), Some(2));
        assert_eq!(parse_retry_after("20s"), Some(20));
        assert_eq!(parse_retry_after("-3"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn missing_credential_is_an_input_error() {
        let config = GenerationConfig::default();
        let err = create_provider(ProviderKind::OpenAi, None, &config).err().unwrap();
        assert!(matches!(err, Doc2TestError::MissingCredential { .. }));
        assert!(err.is_input_error());

        let err = create_provider(ProviderKind::Gemini, Some("   "), &config)
            .err()
            .unwrap();
        assert!(matches!(err, Doc2TestError::MissingCredential { .. }));
    }

    #[test]
    fn settings_use_provider_defaults() {
        let config = GenerationConfig::default();
        let s = ProviderSettings::resolve(ProviderKind::OpenAi, "k".into(), &config);
        assert_eq!(s.model, "gpt-4o-mini");
        assert_eq!(s.base_url, "https://api.openai.com/v1");
        assert_eq!(s.system_prompt, crate::prompts::DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn settings_honour_overrides() {
        let config = GenerationConfig::builder()
            .model("gemini-2.0-flash")
            .base_url("http://localhost:8080/")
            .build()
            .unwrap();
        let s = ProviderSettings::resolve(ProviderKind::Gemini, "k".into(), &config);
        assert_eq!(s.model, "gemini-2.0-flash");
        assert_eq!(s.base_url, "http://localhost:8080");
    }

    #[cfg(all(feature = "openai", feature = "gemini"))]
    #[test]
    fn both_adapters_construct() {
        let config = GenerationConfig::default();
        let p = create_provider(ProviderKind::OpenAi, Some("sk-test"), &config).unwrap();
        assert_eq!(p.name(), "openai");
        let p = create_provider(ProviderKind::Gemini, Some("g-test"), &config).unwrap();
        assert_eq!(p.name(), "gemini");
    }

    #[tokio::test]
    async fn unknown_provider_name_is_a_configuration_error() {
        let config = GenerationConfig::default();
        let err = invoke_named("anthropic", "key", "hi", &config)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(matches!(err, Doc2TestError::UnsupportedProvider { .. }));
    }
}
