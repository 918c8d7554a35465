//! Typed, validated arguments for the built-in tools.
//!
//! Model-issued arguments arrive as loose JSON. They are turned into one
//! [`ToolArgs`] variant at the executor boundary; anything that does not fit
//! the tool's schema becomes a [`ToolError::InvalidInput`], which the server
//! reports back as a failed tool result rather than a protocol error.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::tool::ToolError;

pub const BROWSE_FOLDER: &str = "browse_folder";
pub const CHECKOUT_GIT_REPO: &str = "checkout_git_repo";
pub const COMBINE_PATH_DICTIONARY: &str = "combine_path_dictionary";
pub const SERVER_STATUS: &str = "server_status";

/// Every tool name [`ToolArgs::parse`] can decode arguments for.
pub const TOOL_NAMES: [&str; 4] = [BROWSE_FOLDER, CHECKOUT_GIT_REPO, COMBINE_PATH_DICTIONARY, SERVER_STATUS];

/// Mapping from unique file id to file path, ordered by id.
pub type PathDictionary = BTreeMap<u64, PathBuf>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrowseFolderArgs {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckoutGitRepoArgs {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CombinePathDictionaryArgs {
    pub tree_string: String,
    pub path_dictionary: PathDictionary,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerStatusArgs {}

/// One variant per known tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArgs {
    BrowseFolder(BrowseFolderArgs),
    CheckoutGitRepo(CheckoutGitRepoArgs),
    CombinePathDictionary(CombinePathDictionaryArgs),
    ServerStatus(ServerStatusArgs),
}

impl ToolArgs {
    /// Validate raw arguments for the named tool.
    pub fn parse(name: &str, arguments: Value) -> Result<Self, ToolError> {
        // A missing argument object is the same as an empty one.
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        let args = match name {
            BROWSE_FOLDER => Self::BrowseFolder(decode(name, arguments)?),
            CHECKOUT_GIT_REPO => Self::CheckoutGitRepo(decode(name, arguments)?),
            COMBINE_PATH_DICTIONARY => Self::CombinePathDictionary(decode(name, arguments)?),
            SERVER_STATUS => Self::ServerStatus(decode(name, arguments)?),
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };

        args.check()?;
        Ok(args)
    }

    /// Name of the tool these arguments belong to.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::BrowseFolder(_) => BROWSE_FOLDER,
            Self::CheckoutGitRepo(_) => CHECKOUT_GIT_REPO,
            Self::CombinePathDictionary(_) => COMBINE_PATH_DICTIONARY,
            Self::ServerStatus(_) => SERVER_STATUS,
        }
    }

    /// Constraints the JSON schema cannot express through serde alone.
    fn check(&self) -> Result<(), ToolError> {
        match self {
            Self::BrowseFolder(a) if a.path.trim().is_empty() => {
                Err(ToolError::InvalidInput("'path' must not be empty".to_string()))
            }
            Self::CheckoutGitRepo(a) if a.url.trim().is_empty() => {
                Err(ToolError::InvalidInput("'url' must not be empty".to_string()))
            }
            _ => Ok(()),
        }
    }
}

fn decode<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    if !arguments.is_object() {
        return Err(ToolError::InvalidInput(format!(
            "arguments for '{}' must be an object",
            tool
        )));
    }
    serde_json::from_value(arguments)
        .map_err(|e| ToolError::InvalidInput(format!("{}: {}", tool, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_browse_folder() {
        let args = ToolArgs::parse(BROWSE_FOLDER, json!({"path": "/repo"})).unwrap();
        assert_eq!(
            args,
            ToolArgs::BrowseFolder(BrowseFolderArgs {
                path: "/repo".to_string()
            })
        );
        assert_eq!(args.tool_name(), BROWSE_FOLDER);
    }

    #[test]
    fn test_parse_combine_with_string_keys() {
        let args = ToolArgs::parse(
            COMBINE_PATH_DICTIONARY,
            json!({
                "tree_string": "root/",
                "path_dictionary": {"2": "/r/b.py", "1": "/r/a.py"}
            }),
        )
        .unwrap();

        let ToolArgs::CombinePathDictionary(combine) = args else {
            panic!("wrong variant");
        };
        let ids: Vec<u64> = combine.path_dictionary.keys().copied().collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(combine.path_dictionary[&1], PathBuf::from("/r/a.py"));
    }

    #[test]
    fn test_status_accepts_null_and_empty() {
        assert!(ToolArgs::parse(SERVER_STATUS, Value::Null).is_ok());
        assert!(ToolArgs::parse(SERVER_STATUS, json!({})).is_ok());
    }

    #[test]
    fn test_missing_field_is_invalid_input() {
        let err = ToolArgs::parse(BROWSE_FOLDER, json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_wrong_type_is_invalid_input() {
        let err = ToolArgs::parse(CHECKOUT_GIT_REPO, json!({"url": 42})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn test_non_numeric_id_is_invalid_input() {
        let err = ToolArgs::parse(
            COMBINE_PATH_DICTIONARY,
            json!({"tree_string": "", "path_dictionary": {"first": "/a.py"}}),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ToolArgs::parse(BROWSE_FOLDER, json!({"path": "/r", "depth": 2})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn test_blank_values_rejected() {
        assert!(ToolArgs::parse(BROWSE_FOLDER, json!({"path": "  "})).is_err());
        assert!(ToolArgs::parse(CHECKOUT_GIT_REPO, json!({"url": ""})).is_err());
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        let err = ToolArgs::parse(BROWSE_FOLDER, json!(["/repo"])).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_tool() {
        let err = ToolArgs::parse("rm_rf", json!({})).unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "rm_rf"));
    }
}
