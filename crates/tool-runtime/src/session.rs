//! Live connection to a tool executor.
//!
//! A session is owned by exactly one orchestrator run. Implementations must
//! release their resources when dropped so that a cancelled run still tears
//! the executor down; [`ToolSession::close`] is the orderly variant used on
//! normal exit paths.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::{ToolCall, ToolDefinition, ToolResult};

/// Outcome of one tool invocation as reported by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// JSON text on success, error description on failure
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(payload: &Value) -> Self {
        Self {
            content: payload.to_string(),
            is_error: false,
        }
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            content: description.into(),
            is_error: true,
        }
    }

    /// Attach the output to the call that produced it.
    pub fn into_result(self, call: &ToolCall) -> ToolResult {
        ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: self.content,
            is_error: self.is_error,
        }
    }
}

#[async_trait]
pub trait ToolSession: Send {
    /// Tool descriptors advertised by the executor.
    async fn list_tools(&mut self) -> Result<Vec<ToolDefinition>, SessionError>;

    /// Invoke a tool. Tool failures come back as `Ok` with `is_error` set;
    /// `Err` means the session itself is broken.
    async fn call_tool(&mut self, name: &str, arguments: Value)
        -> Result<ToolOutput, SessionError>;

    /// Close the transport and stop the executor.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Opens an independent session per run.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ToolSession>, SessionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to start tool executor: {0}")]
    Spawn(String),
    #[error("Handshake failed: {0}")]
    Handshake(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Session closed")]
    Closed,
}

/// Scripted tool executor for testing the orchestrator without a subprocess.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    enum Step {
        Output(ToolOutput),
        Lost(String),
        Stall,
    }

    #[derive(Default)]
    struct Script {
        tools: Vec<ToolDefinition>,
        steps: Mutex<VecDeque<Step>>,
        calls: Mutex<Vec<(String, Value)>>,
        connects: AtomicUsize,
        live: AtomicUsize,
        closed_explicitly: AtomicBool,
        refuse: Option<String>,
        hang_on_connect: bool,
    }

    /// Connector handing out sessions that replay queued tool outputs.
    ///
    /// Cloning shares the script, so a test can keep a handle for
    /// inspection after moving one into the orchestrator.
    #[derive(Clone, Default)]
    pub struct ScriptedConnector {
        script: Arc<Script>,
    }

    impl ScriptedConnector {
        pub fn new(tools: Vec<ToolDefinition>) -> Self {
            Self {
                script: Arc::new(Script {
                    tools,
                    ..Default::default()
                }),
            }
        }

        /// A connector whose every connection attempt fails.
        pub fn refusing(reason: &str) -> Self {
            Self {
                script: Arc::new(Script {
                    refuse: Some(reason.to_string()),
                    ..Default::default()
                }),
            }
        }

        /// A connector whose connection attempts never complete.
        pub fn hanging() -> Self {
            Self {
                script: Arc::new(Script {
                    hang_on_connect: true,
                    ..Default::default()
                }),
            }
        }

        pub fn then_output(self, output: ToolOutput) -> Self {
            self.push(Step::Output(output))
        }

        pub fn then_success(self, payload: Value) -> Self {
            self.then_output(ToolOutput::success(&payload))
        }

        pub fn then_failure(self, description: &str) -> Self {
            self.then_output(ToolOutput::failure(description))
        }

        /// The next call reports a broken transport.
        pub fn then_lost(self, reason: &str) -> Self {
            self.push(Step::Lost(reason.to_string()))
        }

        /// The next call never completes.
        pub fn then_stall(self) -> Self {
            self.push(Step::Stall)
        }

        fn push(self, step: Step) -> Self {
            self.script.steps.lock().unwrap().push_back(step);
            self
        }

        /// Every (tool name, arguments) dispatched so far.
        pub fn calls(&self) -> Vec<(String, Value)> {
            self.script.calls.lock().unwrap().clone()
        }

        pub fn connects(&self) -> usize {
            self.script.connects.load(Ordering::SeqCst)
        }

        /// Number of sessions still alive.
        pub fn live_sessions(&self) -> usize {
            self.script.live.load(Ordering::SeqCst)
        }

        pub fn closed_explicitly(&self) -> bool {
            self.script.closed_explicitly.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionConnector for ScriptedConnector {
        async fn connect(&self) -> Result<Box<dyn ToolSession>, SessionError> {
            if let Some(reason) = &self.script.refuse {
                return Err(SessionError::Spawn(reason.clone()));
            }
            if self.script.hang_on_connect {
                std::future::pending::<()>().await;
            }
            self.script.connects.fetch_add(1, Ordering::SeqCst);
            self.script.live.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSession {
                script: self.script.clone(),
                open: true,
            }))
        }
    }

    struct ScriptedSession {
        script: Arc<Script>,
        open: bool,
    }

    impl ScriptedSession {
        fn release(&mut self) {
            if self.open {
                self.open = false;
                self.script.live.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl ToolSession for ScriptedSession {
        async fn list_tools(&mut self) -> Result<Vec<ToolDefinition>, SessionError> {
            if !self.open {
                return Err(SessionError::Closed);
            }
            Ok(self.script.tools.clone())
        }

        async fn call_tool(
            &mut self,
            name: &str,
            arguments: Value,
        ) -> Result<ToolOutput, SessionError> {
            if !self.open {
                return Err(SessionError::Closed);
            }
            self.script
                .calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments));

            let step = self.script.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Output(output)) => Ok(output),
                Some(Step::Lost(reason)) => Err(SessionError::Transport(reason)),
                Some(Step::Stall) => std::future::pending().await,
                None => Ok(ToolOutput::failure("no scripted output")),
            }
        }

        async fn close(&mut self) -> Result<(), SessionError> {
            self.script.closed_explicitly.store(true, Ordering::SeqCst);
            self.release();
            Ok(())
        }
    }

    impl Drop for ScriptedSession {
        fn drop(&mut self) {
            self.release();
        }
    }
}
