pub mod config;
pub mod error;

pub use config::{Config, ToolCallPolicy};
pub use error::*;
