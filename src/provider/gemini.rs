//! Google Gemini `generateContent` adapter.
//!
//! The prompt goes out as one user turn with no system instruction. The key
//! travels as the `?key=` query parameter. The reply is the text parts of the
//! first candidate, concatenated.

use super::{classify_transport, read_response, LlmProvider, ProviderSettings};
use crate::error::Doc2TestError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const NAME: &str = "gemini";

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "promptFeedback", default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

pub struct GeminiProvider {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl GeminiProvider {
    pub(crate) fn new(settings: ProviderSettings) -> Result<Self, Doc2TestError> {
        Ok(Self {
            client: settings.http_client()?,
            settings,
        })
    }

    /// Endpoint without the key, safe to log.
    fn endpoint(&self) -> String {
        let model = self.settings.model.trim();
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:generateContent", self.settings.base_url, model)
    }
}

fn build_request<'a>(settings: &ProviderSettings, prompt: &'a str) -> GeminiRequest<'a> {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user",
            parts: vec![GeminiPart { text: prompt }],
        }],
        generation_config: GeminiGenerationConfig {
            temperature: settings.temperature,
            max_output_tokens: settings.max_tokens,
        },
    }
}

fn parse_reply(body: &str) -> Result<String, Doc2TestError> {
    let parsed: GeminiResponse =
        serde_json::from_str(body).map_err(|e| Doc2TestError::LlmApiError {
            provider: NAME.to_string(),
            message: format!("Failed to parse response: {e}"),
        })?;

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        let reason = parsed
            .prompt_feedback
            .map(|f| f.to_string())
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(Doc2TestError::LlmApiError {
            provider: NAME.to_string(),
            message: format!("Response contained no completion ({reason})"),
        });
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(Doc2TestError::LlmApiError {
            provider: NAME.to_string(),
            message: format!(
                "Response contained no completion (finishReason={})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ),
        });
    }
    Ok(text)
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn invoke(&self, prompt: &str) -> Result<String, Doc2TestError> {
        let endpoint = self.endpoint();
        debug!(
            "POST {} (prompt={} chars)",
            endpoint,
            prompt.len()
        );

        let response = self
            .client
            .post(&endpoint)
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&build_request(&self.settings, prompt))
            .send()
            .await
            .map_err(|e| classify_transport(NAME, self.settings.timeout_secs, &e.without_url()))?;

        let text = read_response(NAME, self.settings.timeout_secs, response).await?;
        parse_reply(&text)
    }
}
