//! Model backends for repoctx.
//!
//! [`GeminiProvider`] drives the tool-calling loop as a
//! [`repoctx_tool_runtime::ModelBackend`] and serves plain completions as an
//! [`LlmProvider`]; [`ArtifactGenerator`] builds unit tests and commented
//! sources on top of the latter.

pub mod artifacts;
pub mod provider;
pub mod providers;

pub use artifacts::{ArtifactError, ArtifactGenerator, ArtifactKind};
pub use provider::{LlmError, LlmProvider, Message, Role};
pub use providers::GeminiProvider;
