//! OpenAI Chat Completions adapter.
//!
//! Sends the configured system instruction plus the prompt as a user message
//! and returns `choices[0].message.content`.

use super::{classify_transport, read_response, LlmProvider, ProviderSettings};
use crate::error::Doc2TestError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const NAME: &str = "openai";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiProvider {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl OpenAiProvider {
    pub(crate) fn new(settings: ProviderSettings) -> Result<Self, Doc2TestError> {
        Ok(Self {
            client: settings.http_client()?,
            settings,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url)
    }
}

fn build_request<'a>(settings: &'a ProviderSettings, prompt: &'a str) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if !settings.system_prompt.trim().is_empty() {
        messages.push(ChatMessage {
            role: "system",
            content: &settings.system_prompt,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: prompt,
    });
    ChatRequest {
        model: &settings.model,
        messages,
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    }
}

fn parse_reply(body: &str) -> Result<String, Doc2TestError> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| Doc2TestError::LlmApiError {
        provider: NAME.to_string(),
        message: format!("Failed to parse response: {e}"),
    })?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Doc2TestError::LlmApiError {
            provider: NAME.to_string(),
            message: "Response contained no completion".to_string(),
        })
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn invoke(&self, prompt: &str) -> Result<String, Doc2TestError> {
        let body = build_request(&self.settings, prompt);
        debug!(
            "POST {} (model={}, prompt={} chars)",
            self.endpoint(),
            self.settings.model,
            prompt.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(NAME, self.settings.timeout_secs, &e))?;

        let text = read_response(NAME, self.settings.timeout_secs, response).await?;
        parse_reply(&text)
    }
}
