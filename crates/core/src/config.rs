use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Resolves profiled keys against some key/value source.
///
/// `{PROFILE}_{KEY}` wins over `{KEY}`; empty values count as unset.
struct Profiled<'a, F: Fn(&str) -> Option<String>> {
    profile: &'a str,
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Profiled<'_, F> {
    fn opt(&self, key: &str) -> Option<String> {
        let read = |k: &str| (self.lookup)(k).filter(|s| !s.is_empty());
        if !self.profile.is_empty() {
            if let Some(v) = read(&format!("{}_{}", self.profile, key)) {
                return Some(v);
            }
        }
        read(key)
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.opt(key) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %raw, "unparseable config value, using default");
                default
            }),
            None => default,
        }
    }

    /// Seconds, where 0 means "no limit".
    fn timeout(&self, key: &str, default_secs: u64) -> Option<Duration> {
        match self.parsed(key, default_secs) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Process-wide configuration, built once at startup and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub gemini: GeminiConfig,
    pub orchestrator: OrchestratorConfig,
    pub server: ToolServerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `REPOCTX_PROFILE`. When set (e.g. `DEV`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env::var("REPOCTX_PROFILE").unwrap_or_default();
        Self::from_lookup(&profile, |key| env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(profile: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let profile = profile.to_uppercase();
        let src = Profiled {
            profile: &profile,
            lookup,
        };
        Self {
            profile: profile.clone(),
            gemini: GeminiConfig::from_source(&src),
            orchestrator: OrchestratorConfig::from_source(&src),
            server: ToolServerConfig::from_source(&src),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  gemini:       model={}, key={}",
            self.gemini.model,
            if self.gemini.api_key.is_some() { "set" } else { "missing" }
        );
        tracing::info!(
            "  orchestrator: policy={}, max_iterations={}, model_timeout={:?}, tool_timeout={:?}, pacing={:?}",
            self.orchestrator.tool_call_policy,
            self.orchestrator.max_iterations,
            self.orchestrator.model_timeout,
            self.orchestrator.tool_timeout,
            self.orchestrator.tool_pacing,
        );
        tracing::info!(
            "  server:       command={} {}, cwd={}",
            self.server.command,
            self.server.args.join(" "),
            self.server.working_dir.display()
        );
    }
}

// ── Gemini ────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(src: &Profiled<'_, F>) -> Self {
        Self {
            api_key: src.opt("GEMINI_API_KEY"),
            model: src.or("GEMINI_MODEL", "gemini-2.5-flash"),
            base_url: src.or("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com"),
        }
    }

    /// The API key, or an error naming the missing variable.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ── Orchestrator ──────────────────────────────────────────────

/// How many tool calls of a single model response get dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallPolicy {
    /// Only the first part of a response decides between final answer and
    /// tool call; at most one dispatch per iteration.
    #[default]
    FirstOnly,
    /// Every tool call of a response is dispatched, in order, before the
    /// model is consulted again.
    All,
}

impl FromStr for ToolCallPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "first_only" | "first-only" => Ok(Self::FirstOnly),
            "all" => Ok(Self::All),
            _ => Err(ConfigError::InvalidValue {
                key: "REPOCTX_TOOL_CALL_POLICY".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ToolCallPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstOnly => f.write_str("first"),
            Self::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub temperature: f32,
    pub max_iterations: usize,
    /// Bound on one model round-trip; `None` waits forever.
    pub model_timeout: Option<Duration>,
    /// Bound on one tool round-trip; `None` waits forever.
    pub tool_timeout: Option<Duration>,
    /// Fixed delay inserted before every tool dispatch after the first.
    pub tool_pacing: Duration,
    pub tool_call_policy: ToolCallPolicy,
}

impl OrchestratorConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(src: &Profiled<'_, F>) -> Self {
        Self {
            temperature: src.parsed("REPOCTX_TEMPERATURE", 0.0),
            max_iterations: src.parsed("REPOCTX_MAX_ITERATIONS", 25),
            model_timeout: src.timeout("REPOCTX_MODEL_TIMEOUT_SECS", 120),
            tool_timeout: src.timeout("REPOCTX_TOOL_TIMEOUT_SECS", 300),
            tool_pacing: Duration::from_millis(src.parsed("REPOCTX_TOOL_PACING_MS", 0)),
            tool_call_policy: src.parsed("REPOCTX_TOOL_CALL_POLICY", ToolCallPolicy::FirstOnly),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_iterations: 25,
            model_timeout: Some(Duration::from_secs(120)),
            tool_timeout: Some(Duration::from_secs(300)),
            tool_pacing: Duration::ZERO,
            tool_call_policy: ToolCallPolicy::FirstOnly,
        }
    }
}

// ── Tool server (subordinate process) ─────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Where tools create clones and combined artifacts.
    pub scratch_dir: PathBuf,
}

impl ToolServerConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(src: &Profiled<'_, F>) -> Self {
        Self {
            command: src.or("REPOCTX_SERVER_COMMAND", "repoctx-mcp-server"),
            args: src
                .opt("REPOCTX_SERVER_ARGS")
                .map(|a| a.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            working_dir: PathBuf::from(src.or("REPOCTX_SERVER_CWD", ".")),
            scratch_dir: src
                .opt("REPOCTX_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(profile: &str, pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(profile, move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from("", &[]);
        assert_eq!(config.profile_label(), "default");
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.orchestrator.tool_call_policy, ToolCallPolicy::FirstOnly);
        assert_eq!(config.orchestrator.max_iterations, 25);
        assert_eq!(config.orchestrator.tool_pacing, Duration::ZERO);
        assert_eq!(config.server.command, "repoctx-mcp-server");
        assert!(config.server.args.is_empty());
        assert!(config.gemini.require_api_key().is_err());
    }

    #[test]
    fn test_profile_prefix_wins() {
        let config = config_from(
            "dev",
            &[
                ("GEMINI_API_KEY", "base-key"),
                ("DEV_GEMINI_API_KEY", "dev-key"),
                ("GEMINI_MODEL", "gemini-2.0-flash"),
            ],
        );
        assert_eq!(config.profile, "DEV");
        assert_eq!(config.gemini.require_api_key().unwrap(), "dev-key");
        // Unprefixed fallback
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_empty_value_counts_as_unset() {
        let config = config_from("", &[("GEMINI_API_KEY", "")]);
        assert!(matches!(config.gemini.require_api_key(), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_orchestrator_overrides() {
        let config = config_from(
            "",
            &[
                ("REPOCTX_TOOL_CALL_POLICY", "all"),
                ("REPOCTX_TOOL_PACING_MS", "250"),
                ("REPOCTX_MODEL_TIMEOUT_SECS", "0"),
                ("REPOCTX_TOOL_TIMEOUT_SECS", "15"),
                ("REPOCTX_MAX_ITERATIONS", "not-a-number"),
            ],
        );
        let orch = &config.orchestrator;
        assert_eq!(orch.tool_call_policy, ToolCallPolicy::All);
        assert_eq!(orch.tool_pacing, Duration::from_millis(250));
        assert_eq!(orch.model_timeout, None);
        assert_eq!(orch.tool_timeout, Some(Duration::from_secs(15)));
        assert_eq!(orch.max_iterations, 25);
    }

    #[test]
    fn test_server_args_split() {
        let config = config_from(
            "",
            &[
                ("REPOCTX_SERVER_COMMAND", "cargo"),
                ("REPOCTX_SERVER_ARGS", "run -q --bin repoctx-mcp-server"),
            ],
        );
        assert_eq!(config.server.command, "cargo");
        assert_eq!(config.server.args, vec!["run", "-q", "--bin", "repoctx-mcp-server"]);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("first".parse::<ToolCallPolicy>().unwrap(), ToolCallPolicy::FirstOnly);
        assert_eq!("ALL".parse::<ToolCallPolicy>().unwrap(), ToolCallPolicy::All);
        assert!("some".parse::<ToolCallPolicy>().is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = config_from("", &[("GEMINI_API_KEY", "sk-secret")]);
        let rendered = format!("{:?}", config.gemini);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
