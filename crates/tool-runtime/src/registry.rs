use crate::args::{ToolArgs, TOOL_NAMES};
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError};
use crate::tools::{
    BrowseFolderTool, CheckoutGitRepoTool, CombinePathDictionaryTool, ServerStatusTool,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Manages available tools, their schemas, and lookup.
/// Thread-safe via Arc wrapping of individual tools.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Registry holding the four built-in tools.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        let builtins: [Arc<dyn Tool>; 4] = [
            Arc::new(BrowseFolderTool),
            Arc::new(CheckoutGitRepoTool),
            Arc::new(CombinePathDictionaryTool),
            Arc::new(ServerStatusTool),
        ];
        for tool in builtins {
            let name = tool.definition().name;
            registry.tools.insert(name, tool);
        }
        registry
    }

    /// Register a tool. Fails when the name is taken or when no argument
    /// decoder exists for it, since such a tool could never be invoked.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        let def = tool.definition();
        if !TOOL_NAMES.contains(&def.name.as_str()) {
            return Err(RegistryError::UnsupportedTool(def.name));
        }
        if self.tools.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        self.tools.insert(def.name, Arc::new(tool));
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool definitions, ordered by name.
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Validate raw arguments and run the named tool.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Value,
        context: &ToolContext,
    ) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args = ToolArgs::parse(name, arguments)?;
        debug!(tool = %name, "invoking tool");
        tool.execute(args, context).await
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool with name '{0}' is already registered")]
    DuplicateName(String),
    #[error("Tool '{0}' has no argument decoder")]
    UnsupportedTool(String),
}
