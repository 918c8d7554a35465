use crate::conversation::{ModelTurn, Turn};
use crate::tool::ToolDefinition;
use async_trait::async_trait;

/// Trait for model backends that support tool calling.
///
/// This trait lives in tool-runtime (not in crates/llm) because it's
/// defined by the consumer (the orchestrator), not the provider.
/// Implementations translate the history and tool catalog into their own
/// wire format and parse the response back into a [`ModelTurn`].
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// One round-trip: full ordered history in, one model turn out.
    async fn generate(
        &self,
        history: &[Turn],
        tools: &[ToolDefinition],
        temperature: f32,
    ) -> Result<ModelTurn, LlmError>;

    /// Provider name for logging/debugging (e.g., "gemini")
    fn provider_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Authentication failed")]
    AuthError,
}

/// Scripted model backend for testing the orchestrator without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::conversation::ModelPart;
    use crate::tool::ToolCall;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum Step {
        Reply(ModelTurn),
        Fail(String),
        Stall,
    }

    /// A model that replays queued turns in order and records every history
    /// it was shown.
    #[derive(Default)]
    pub struct ScriptedModel {
        steps: Mutex<VecDeque<Step>>,
        seen: Mutex<Vec<Vec<Turn>>>,
        tools_seen: Mutex<Vec<Vec<ToolDefinition>>>,
        next_id: Mutex<u32>,
    }

    impl ScriptedModel {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a full model turn.
        pub fn then_turn(self, turn: ModelTurn) -> Self {
            self.steps.lock().unwrap().push_back(Step::Reply(turn));
            self
        }

        /// Queue a final text answer.
        pub fn then_text(self, text: &str) -> Self {
            self.then_turn(ModelTurn::text(text))
        }

        /// Queue a single tool call with a generated id.
        pub fn then_call(self, name: &str, input: serde_json::Value) -> Self {
            let call = self.call(name, input);
            self.then_turn(ModelTurn::tool_call(call))
        }

        /// Queue a turn holding several tool calls.
        pub fn then_calls(self, calls: Vec<(&str, serde_json::Value)>) -> Self {
            let parts = calls
                .into_iter()
                .map(|(name, input)| ModelPart::ToolCall(self.call(name, input)))
                .collect();
            self.then_turn(ModelTurn { parts })
        }

        /// Queue a backend failure.
        pub fn then_error(self, message: &str) -> Self {
            self.steps
                .lock()
                .unwrap()
                .push_back(Step::Fail(message.to_string()));
            self
        }

        /// Queue a round-trip that never completes.
        pub fn then_stall(self) -> Self {
            self.steps.lock().unwrap().push_back(Step::Stall);
            self
        }

        /// Build a tool call with the next scripted id.
        pub fn call(&self, name: &str, input: serde_json::Value) -> ToolCall {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            ToolCall {
                id: format!("call_{}", *next),
                name: name.to_string(),
                input,
            }
        }

        /// Every history snapshot passed to `generate`, in call order.
        pub fn histories(&self) -> Vec<Vec<Turn>> {
            self.seen.lock().unwrap().clone()
        }

        /// Every tool catalog passed to `generate`, in call order.
        pub fn tool_catalogs(&self) -> Vec<Vec<ToolDefinition>> {
            self.tools_seen.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedModel {
        async fn generate(
            &self,
            history: &[Turn],
            tools: &[ToolDefinition],
            _temperature: f32,
        ) -> Result<ModelTurn, LlmError> {
            self.seen.lock().unwrap().push(history.to_vec());
            self.tools_seen.lock().unwrap().push(tools.to_vec());

            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(turn)) => Ok(turn),
                Some(Step::Fail(message)) => Err(LlmError::ApiError {
                    status: 500,
                    message,
                }),
                Some(Step::Stall) => std::future::pending().await,
                None => Err(LlmError::InvalidResponse("script exhausted".to_string())),
            }
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }
    }
}
