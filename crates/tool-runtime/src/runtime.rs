use crate::conversation::{Conversation, ModelPart, ModelTurn};
use crate::provider::{LlmError, ModelBackend};
use crate::session::{SessionConnector, SessionError, ToolSession};
use crate::tool::{ToolCall, ToolDefinition};
use repoctx_core::config::{OrchestratorConfig, ToolCallPolicy};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Drives one user request to completion.
///
/// Flow: prompt → model → tool call → executor → result → model → ... → final text.
/// Each run opens its own session through the connector and closes it on
/// every exit path; a cancelled run drops the session, which tears it down.
pub struct Orchestrator {
    model: Arc<dyn ModelBackend>,
    connector: Arc<dyn SessionConnector>,
    config: OrchestratorConfig,
}

/// Final state of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub answer: String,
    pub conversation: Conversation,
    /// Tool invocations performed
    pub dispatches: usize,
}

enum Step {
    Answer(String),
    Dispatch(Vec<ToolCall>),
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelBackend>,
        connector: Arc<dyn SessionConnector>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            model,
            connector,
            config,
        }
    }

    pub fn with_policy(mut self, policy: ToolCallPolicy) -> Self {
        self.config.tool_call_policy = policy;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.config.temperature = temp;
        self
    }

    pub fn with_tool_pacing(mut self, pacing: Duration) -> Self {
        self.config.tool_pacing = pacing;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.model_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run `prompt` to completion and return the model's final answer.
    pub async fn run(&self, prompt: &str) -> Result<String, OrchestratorError> {
        Ok(self.run_with_history(prompt).await?.answer)
    }

    /// Like [`run`](Self::run), also returning the history and dispatch count.
    pub async fn run_with_history(&self, prompt: &str) -> Result<RunOutput, OrchestratorError> {
        // Spawn and handshake count against the tool timeout.
        let mut session = bounded(Stage::Tool, self.config.tool_timeout, self.connector.connect())
            .await?
            .map_err(OrchestratorError::Connection)?;
        info!(provider = self.model.provider_name(), "session established");

        let outcome = self.drive(session.as_mut(), prompt).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "session close failed");
        }
        info!(ok = outcome.is_ok(), "session closed");
        outcome
    }

    async fn drive(
        &self,
        session: &mut dyn ToolSession,
        prompt: &str,
    ) -> Result<RunOutput, OrchestratorError> {
        let tools = bounded(Stage::Tool, self.config.tool_timeout, session.list_tools())
            .await?
            .map_err(OrchestratorError::Connection)?;
        let catalog: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        debug!(tools = tools.len(), "tool catalog discovered");

        let mut conversation = Conversation::seeded(prompt);
        let mut dispatches = 0usize;

        for iteration in 0..self.config.max_iterations {
            debug!(iteration, history = conversation.len(), "awaiting model");
            let response = self.ask_model(&conversation, &tools).await?;

            match self.decide(&response)? {
                Step::Answer(answer) => {
                    conversation.add_model_turn(self.recorded_turn(&response, &[]));
                    info!(iteration, dispatches, "final answer received");
                    return Ok(RunOutput {
                        answer,
                        conversation,
                        dispatches,
                    });
                }
                Step::Dispatch(calls) => {
                    if let Some(unknown) = calls.iter().find(|c| !catalog.contains(c.name.as_str()))
                    {
                        return Err(OrchestratorError::UnknownTool(unknown.name.clone()));
                    }
                    conversation.add_model_turn(self.recorded_turn(&response, &calls));

                    for call in &calls {
                        if dispatches > 0 && !self.config.tool_pacing.is_zero() {
                            tokio::time::sleep(self.config.tool_pacing).await;
                        }
                        info!(iteration, tool = %call.name, id = %call.id, "dispatching tool");
                        let output = bounded(
                            Stage::Tool,
                            self.config.tool_timeout,
                            session.call_tool(&call.name, call.input.clone()),
                        )
                        .await?
                        .map_err(OrchestratorError::Connection)?;
                        dispatches += 1;

                        if output.is_error {
                            warn!(tool = %call.name, error = %output.content, "tool reported failure");
                        }
                        conversation.add_tool_result(output.into_result(call));
                    }
                }
            }
        }

        Err(OrchestratorError::MaxIterations(self.config.max_iterations))
    }

    async fn ask_model(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, OrchestratorError> {
        let mut turn = bounded(
            Stage::Model,
            self.config.model_timeout,
            self.model
                .generate(conversation.turns(), tools, self.config.temperature),
        )
        .await?
        .map_err(OrchestratorError::ModelInvocation)?;

        // Calls without an id cannot be matched to their results.
        for part in &mut turn.parts {
            if let ModelPart::ToolCall(call) = part {
                if call.id.is_empty() {
                    call.id = uuid::Uuid::new_v4().to_string();
                }
            }
        }
        Ok(turn)
    }

    fn decide(&self, response: &ModelTurn) -> Result<Step, OrchestratorError> {
        let empty = || {
            OrchestratorError::ModelInvocation(LlmError::InvalidResponse(
                "response has neither text nor tool calls".to_string(),
            ))
        };

        match self.config.tool_call_policy {
            ToolCallPolicy::FirstOnly => match response.first_part() {
                Some(ModelPart::ToolCall(call)) => Ok(Step::Dispatch(vec![call.clone()])),
                Some(ModelPart::Text(_)) => response.joined_text().map(Step::Answer).ok_or_else(empty),
                None => Err(empty()),
            },
            ToolCallPolicy::All => {
                let calls: Vec<ToolCall> = response.tool_calls().cloned().collect();
                if calls.is_empty() {
                    response.joined_text().map(Step::Answer).ok_or_else(empty)
                } else {
                    Ok(Step::Dispatch(calls))
                }
            }
        }
    }

    /// The model turn as it enters history: under `FirstOnly` only the
    /// honoured calls are kept so every recorded call has a result.
    fn recorded_turn(&self, response: &ModelTurn, honoured: &[ToolCall]) -> ModelTurn {
        match self.config.tool_call_policy {
            ToolCallPolicy::All => response.clone(),
            ToolCallPolicy::FirstOnly => {
                response.retaining_call(honoured.first().map_or("", |c| c.id.as_str()))
            }
        }
    }
}

async fn bounded<F: Future>(
    stage: Stage,
    limit: Option<Duration>,
    fut: F,
) -> Result<F::Output, OrchestratorError> {
    match limit {
        None => Ok(fut.await),
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| OrchestratorError::Timeout { stage, after }),
    }
}

/// Suspension point that can time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Model,
    Tool,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Model => f.write_str("model"),
            Stage::Tool => f.write_str("tool"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Tool session error: {0}")]
    Connection(#[source] SessionError),
    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[source] LlmError),
    #[error("Model requested unknown tool '{0}'")]
    UnknownTool(String),
    #[error("Timed out waiting for {stage} after {after:?}")]
    Timeout { stage: Stage, after: Duration },
    #[error("Max iterations ({0}) exceeded")]
    MaxIterations(usize),
}
