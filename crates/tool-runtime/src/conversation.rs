use crate::tool::{ToolCall, ToolResult};
use serde::{Deserialize, Serialize};

/// One entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Turn {
    /// User's text input
    User(String),
    /// Model response (may contain text and/or tool calls)
    Model(ModelTurn),
    /// Result of a tool execution
    ToolResult(ToolResult),
}

/// A single part of a model response, in the order the model produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelPart {
    Text(String),
    ToolCall(ToolCall),
}

/// Everything the model produced in one round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTurn {
    pub parts: Vec<ModelPart>,
}

impl ModelTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ModelPart::Text(text.into())],
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            parts: vec![ModelPart::ToolCall(call)],
        }
    }

    pub fn first_part(&self) -> Option<&ModelPart> {
        self.parts.first()
    }

    /// All text parts joined, or `None` if there are none.
    pub fn joined_text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|p| match p {
                ModelPart::Text(t) => Some(t.as_str()),
                ModelPart::ToolCall(_) => None,
            })
            .collect();
        (!texts.is_empty()).then(|| texts.concat())
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.parts.iter().filter_map(|p| match p {
            ModelPart::ToolCall(call) => Some(call),
            ModelPart::Text(_) => None,
        })
    }

    /// Copy of this turn keeping every text part and only the given call.
    pub fn retaining_call(&self, call_id: &str) -> Self {
        let parts = self
            .parts
            .iter()
            .filter(|p| match p {
                ModelPart::Text(_) => true,
                ModelPart::ToolCall(call) => call.id == call_id,
            })
            .cloned()
            .collect();
        Self { parts }
    }
}

/// Ordered, append-only conversation history for one run.
///
/// Entries are never rewritten, removed or compacted: the model backend
/// always receives the full causal chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// History seeded with a single user turn.
    pub fn seeded(prompt: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.add_user_message(prompt);
        conversation
    }

    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::User(text.into()));
    }

    pub fn add_model_turn(&mut self, turn: ModelTurn) {
        self.turns.push(Turn::Model(turn));
    }

    pub fn add_tool_result(&mut self, result: ToolResult) {
        self.turns.push(Turn::ToolResult(result));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of tool-result turns recorded so far.
    pub fn tool_result_count(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| matches!(t, Turn::ToolResult(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            input: serde_json::json!({}),
        }
    }

    #[test]
    fn test_seeded_history() {
        let conv = Conversation::seeded("scan the repo");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.turns()[0], Turn::User("scan the repo".to_string()));
    }

    #[test]
    fn test_append_order() {
        let mut conv = Conversation::seeded("hi");
        conv.add_model_turn(ModelTurn::tool_call(call("c1", "server_status")));
        conv.add_tool_result(ToolResult {
            tool_call_id: "c1".to_string(),
            name: "server_status".to_string(),
            content: r#"{"status":"online"}"#.to_string(),
            is_error: false,
        });
        conv.add_model_turn(ModelTurn::text("online"));

        assert_eq!(conv.len(), 4);
        assert_eq!(conv.tool_result_count(), 1);
        assert!(matches!(conv.turns()[1], Turn::Model(_)));
        assert!(matches!(conv.turns()[2], Turn::ToolResult(_)));
    }

    #[test]
    fn test_joined_text_and_calls() {
        let turn = ModelTurn {
            parts: vec![
                ModelPart::Text("Let me ".to_string()),
                ModelPart::ToolCall(call("c1", "browse_folder")),
                ModelPart::Text("look.".to_string()),
                ModelPart::ToolCall(call("c2", "server_status")),
            ],
        };
        assert_eq!(turn.joined_text().as_deref(), Some("Let me look."));
        assert_eq!(turn.tool_calls().count(), 2);

        let kept = turn.retaining_call("c2");
        let names: Vec<&str> = kept.tool_calls().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["server_status"]);
        assert_eq!(kept.parts.len(), 3);
    }

    #[test]
    fn test_no_text() {
        assert_eq!(ModelTurn::tool_call(call("c", "x")).joined_text(), None);
        assert_eq!(ModelTurn::default().first_part(), None);
    }

    #[test]
    fn test_serialization() {
        let conv = Conversation::seeded("test");
        let json = serde_json::to_string(&conv.turns()[0]).unwrap();
        let roundtrip: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip, conv.turns()[0]);
    }
}
