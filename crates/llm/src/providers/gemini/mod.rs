//! Gemini (Google Generative Language API) implementation of both
//! [`ModelBackend`] and [`LlmProvider`].
//!
//! Every round-trip is a single non-streaming `generateContent` call carrying
//! the full history.

mod translate;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use repoctx_core::config::GeminiConfig;
use repoctx_core::ConfigError;
use repoctx_tool_runtime::{LlmError, ModelBackend, ModelTurn, ToolDefinition, Turn};

use self::translate::{history_to_gemini, parse_response, retry_delay_secs, tool_definition_to_gemini};
use crate::provider::{LlmProvider, Message, Role};

const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    ///
    /// # Arguments
    /// * `api_key` - Generative Language API key
    /// * `model` - Model name (e.g. `"gemini-2.5-flash"`)
    /// * `base_url` - API base URL (e.g. `"https://generativelanguage.googleapis.com"`)
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build from the `gemini` config section. Fails when no key is set.
    pub fn from_config(config: &GeminiConfig) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key()?.to_string();
        Ok(Self::new(api_key, config.model.clone(), config.base_url.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    /// Request body for a tool-enabled round-trip.
    fn tool_request_body(history: &[Turn], tools: &[ToolDefinition], temperature: f32) -> Value {
        let mut body = json!({
            "contents": history_to_gemini(history),
            "generationConfig": { "temperature": temperature },
        });
        if !tools.is_empty() {
            let declarations: Vec<Value> = tools.iter().map(tool_definition_to_gemini).collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }
        body
    }

    /// Request body for a plain completion. Gemini takes the system prompt
    /// in a separate `system_instruction` field.
    fn completion_request_body(messages: &[Message], temperature: f32, max_tokens: u32) -> Value {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let contents: Vec<Value> = messages
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                    Role::System => return None,
                };
                Some(json!({ "role": role, "parts": [{ "text": m.content }] }))
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
            },
        });
        if !system.is_empty() {
            body["system_instruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<Value, LlmError> {
        let url = self.endpoint();
        debug!(model = %self.model, url = %url, "Gemini generateContent request");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(match status {
                401 | 403 => LlmError::AuthError,
                429 => LlmError::RateLimited {
                    retry_after_secs: retry_delay_secs(&body_text)
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
                },
                _ => LlmError::ApiError {
                    status,
                    message: body_text,
                },
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("response is not JSON: {e}")))
    }
}

#[async_trait]
impl ModelBackend for GeminiProvider {
    async fn generate(
        &self,
        history: &[Turn],
        tools: &[ToolDefinition],
        temperature: f32,
    ) -> Result<ModelTurn, LlmError> {
        let body = Self::tool_request_body(history, tools, temperature);
        let response = self.send(&body).await?;
        let turn = parse_response(&response)?;
        debug!(
            parts = turn.parts.len(),
            calls = turn.tool_calls().count(),
            "Gemini response parsed"
        );
        Ok(turn)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let body = Self::completion_request_body(&messages, temperature, max_tokens);
        let response = self.send(&body).await?;
        parse_response(&response)?
            .joined_text()
            .ok_or_else(|| LlmError::InvalidResponse("missing candidates[0] text".into()))
    }
}
