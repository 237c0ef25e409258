//! Configuration loading and validation.
//!
//! Reads `toolbox.yaml` and resolves environment variables. Config is the
//! single source of truth for the model endpoint, the retry policy and the
//! planner limits. Every section is optional; a missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::errors::InferenceError;

/// Config file name searched for by [`find_config_path`].
pub const CONFIG_FILE_NAME: &str = "toolbox.yaml";

/// Env var that pins the config file location.
pub const CONFIG_ENV_VAR: &str = "SMART_TOOLBOX_CONFIG";

// ─── Public Types ────────────────────────────────────────────────────────────

/// The chat-completions endpoint and its sampling defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Sent as a bearer token when present. Usually `${OPENAI_API_KEY}`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Optional system message sent ahead of every prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model_name: default_model_name(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}

/// Retry policy for a single model call.
///
/// Immutable; each call keeps its own attempt counter.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (so `max_retries + 1` attempts total).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based): doubles from
    /// `initial_backoff_ms`, capped at `max_backoff_ms`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(20);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    1000
}
fn default_max_backoff_ms() -> u64 {
    8000
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_connect_timeout_secs() -> u64 {
    5
}

/// What the reconciler does with tool names that are not in the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownToolPolicy {
    /// Keep unknown names in the tool order and report them.
    #[default]
    PassThrough,
    /// Remove unknown names before ranking.
    Drop,
}

/// Limits and sampling for the planning pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Cap on the primary tools shown in the toolbox (default: 8).
    #[serde(default = "default_max_primary_tools")]
    pub max_primary_tools: usize,
    /// Cap on the secondary tools shown in the toolbox (default: 10).
    #[serde(default = "default_max_secondary_tools")]
    pub max_secondary_tools: usize,
    #[serde(default)]
    pub unknown_tools: UnknownToolPolicy,
    #[serde(default = "default_secondary_temperature")]
    pub secondary_temperature: f32,
    #[serde(default = "default_secondary_max_tokens")]
    pub secondary_max_tokens: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_primary_tools: default_max_primary_tools(),
            max_secondary_tools: default_max_secondary_tools(),
            unknown_tools: UnknownToolPolicy::default(),
            secondary_temperature: default_secondary_temperature(),
            secondary_max_tokens: default_secondary_max_tokens(),
        }
    }
}

fn default_max_primary_tools() -> usize {
    8
}
fn default_max_secondary_tools() -> usize {
    10
}
fn default_secondary_temperature() -> f32 {
    0.5
}
fn default_secondary_max_tokens() -> u32 {
    200
}

/// Top-level configuration (mirrors `toolbox.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolboxConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    /// YAML or JSON list of tool descriptors. When absent the built-in
    /// catalog is used.
    #[serde(default)]
    pub taxonomy_path: Option<PathBuf>,
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate `toolbox.yaml`.
///
/// Checks `SMART_TOOLBOX_CONFIG` first, then searches upward from `start`.
/// Returns `None` when no file exists; callers fall back to defaults.
pub fn find_config_path(start: &Path) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(expand_tilde(&path));
        if candidate.exists() {
            return Some(candidate);
        }
        tracing::warn!(path = %candidate.display(), "{CONFIG_ENV_VAR} points at a missing file");
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// A loaded config plus the directory its relative paths are resolved against.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub config: ToolboxConfig,
    /// Directory of the config file; `None` when running on defaults.
    pub base_dir: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Load `explicit` if given, else search from `start`, else use defaults.
    pub fn resolve(explicit: Option<&Path>, start: &Path) -> Result<Self, InferenceError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_path(start),
        };

        let Some(path) = path else {
            tracing::info!("no {CONFIG_FILE_NAME} found, using defaults");
            return Ok(Self::default());
        };

        let config = load_config(&path)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(Self {
            config,
            base_dir: path.parent().map(Path::to_path_buf),
        })
    }

    /// The configured taxonomy file, with a relative path joined to the
    /// config file's directory.
    pub fn taxonomy_path(&self) -> Option<PathBuf> {
        let path = self.config.taxonomy_path.as_ref()?;
        let path = PathBuf::from(expand_tilde(&path.to_string_lossy()));
        match &self.base_dir {
            Some(dir) if path.is_relative() => Some(dir.join(path)),
            _ => Some(path),
        }
    }
}

/// Load and parse a configuration file.
///
/// Performs environment-variable interpolation on string values matching
/// `${VAR_NAME}` or `${VAR_NAME:-default}`.
pub fn load_config(path: &Path) -> Result<ToolboxConfig, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    parse_config(&raw)
}

/// Parse configuration text (after env-var interpolation) and validate it.
pub fn parse_config(raw: &str) -> Result<ToolboxConfig, InferenceError> {
    let interpolated = interpolate_env_vars(raw);

    // An empty file is a valid "all defaults" config.
    if interpolated.trim().is_empty() {
        return Ok(ToolboxConfig::default());
    }

    let mut config: ToolboxConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| InferenceError::ConfigError {
            reason: format!("failed to parse config: {e}"),
        })?;

    // `api_key: ${OPENAI_API_KEY}` with the var unset interpolates to "".
    if config.model.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
        config.model.api_key = None;
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &ToolboxConfig) -> Result<(), InferenceError> {
    if config.model.base_url.trim().is_empty() {
        return Err(InferenceError::ConfigError {
            reason: "model.base_url must not be empty".into(),
        });
    }
    if config.planner.max_primary_tools == 0 {
        return Err(InferenceError::ConfigError {
            reason: "planner.max_primary_tools must be at least 1".into(),
        });
    }
    if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
        return Err(InferenceError::ConfigError {
            reason: format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                config.retry.initial_backoff_ms, config.retry.max_backoff_ms
            ),
        });
    }
    Ok(())
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
///
/// An unterminated `${` is kept as written.
fn interpolate_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let expr_start = &rest[open + 2..];
        let Some(close) = expr_start.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        out.push_str(&resolve_var_expr(&expr_start[..close]));
        rest = &expr_start[close + 1..];
    }

    out.push_str(rest);
    out
}

/// `VAR` or `VAR:-fallback`; an unset `VAR` without fallback is empty.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, fallback)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(fallback)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env_vars_with_default() {
        std::env::remove_var("__TOOLBOX_TEST_NONEXISTENT_VAR__");
        let input = "${__TOOLBOX_TEST_NONEXISTENT_VAR__:-/fallback/path}";
        assert_eq!(interpolate_env_vars(input), "/fallback/path");
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__TOOLBOX_TEST_VAR__", "sk-test");
        let input = "api_key: ${__TOOLBOX_TEST_VAR__:-none}";
        assert_eq!(interpolate_env_vars(input), "api_key: sk-test");
        std::env::remove_var("__TOOLBOX_TEST_VAR__");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with no variables";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_interpolate_several_and_unterminated() {
        std::env::set_var("__TOOLBOX_TEST_HOST__", "localhost");
        std::env::remove_var("__TOOLBOX_TEST_PORT__");
        let input = "http://${__TOOLBOX_TEST_HOST__}:${__TOOLBOX_TEST_PORT__:-8080}/v1 ${oops";
        assert_eq!(interpolate_env_vars(input), "http://localhost:8080/v1 ${oops");
        std::env::remove_var("__TOOLBOX_TEST_HOST__");
    }

    #[test]
    fn test_expand_tilde() {
        let result = expand_tilde("~/tools.yaml");
        assert!(!result.starts_with('~'), "tilde should be expanded");
        assert!(result.ends_with("/tools.yaml"));
    }

    #[test]
    fn test_empty_config_is_all_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.model.model_name, "gpt-4o-mini");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.planner.max_primary_tools, 8);
        assert_eq!(config.planner.max_secondary_tools, 10);
        assert_eq!(config.planner.unknown_tools, UnknownToolPolicy::PassThrough);
        assert!(config.taxonomy_path.is_none());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let yaml = r#"
            model:
              base_url: "http://localhost:11434/v1"
              model_name: llama3
            planner:
              unknown_tools: drop
        "#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.model.base_url, "http://localhost:11434/v1");
        assert_eq!(config.model.model_name, "llama3");
        assert_eq!(config.model.max_tokens, 1000);
        assert_eq!(config.planner.unknown_tools, UnknownToolPolicy::Drop);
        assert_eq!(config.planner.max_primary_tools, 8);
        assert_eq!(config.retry.initial_backoff_ms, 1000);
    }

    #[test]
    fn test_unset_api_key_becomes_none() {
        std::env::remove_var("__TOOLBOX_TEST_MISSING_KEY__");
        let yaml = "model:\n  api_key: \"${__TOOLBOX_TEST_MISSING_KEY__}\"\n";
        let config = parse_config(yaml).unwrap();
        assert!(config.model.api_key.is_none());
    }

    #[test]
    fn test_zero_primary_tools_rejected() {
        let yaml = "planner:\n  max_primary_tools: 0\n";
        assert!(matches!(
            parse_config(yaml),
            Err(InferenceError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_backoff_inverted_rejected() {
        let yaml = "retry:\n  initial_backoff_ms: 5000\n  max_backoff_ms: 100\n";
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff(1), Duration::from_millis(1000));
        assert_eq!(retry.backoff(2), Duration::from_millis(2000));
        assert_eq!(retry.backoff(3), Duration::from_millis(4000));
        assert_eq!(retry.backoff(4), Duration::from_millis(8000));
        assert_eq!(retry.backoff(9), Duration::from_millis(8000));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "retry:\n  max_retries: 1\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.retry.max_retries, 1);
    }

    #[test]
    fn test_find_config_path_walks_upward() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        let found = find_config_path(&nested).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_resolve_explicit_path_sets_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(&path, "taxonomy_path: tools/cad.yaml\n").unwrap();

        let resolved = ResolvedConfig::resolve(Some(&path), Path::new("/")).unwrap();
        assert_eq!(resolved.base_dir.as_deref(), Some(dir.path()));
        assert_eq!(
            resolved.taxonomy_path(),
            Some(dir.path().join("tools/cad.yaml"))
        );
    }

    #[test]
    fn test_resolve_searches_from_start() {
        std::env::remove_var(CONFIG_ENV_VAR);
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("project/src");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "planner:\n  max_primary_tools: 4\n",
        )
        .unwrap();

        let resolved = ResolvedConfig::resolve(None, &nested).unwrap();
        assert_eq!(resolved.config.planner.max_primary_tools, 4);
        assert_eq!(resolved.base_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_resolve_explicit_missing_file_is_error() {
        let missing = Path::new("/nonexistent/toolbox.yaml");
        let result = ResolvedConfig::resolve(Some(missing), Path::new("/"));
        assert!(matches!(result, Err(InferenceError::ConfigError { .. })));
    }

    #[test]
    fn test_taxonomy_path_absolute_or_without_config_dir() {
        let mut resolved = ResolvedConfig::default();
        assert!(resolved.taxonomy_path().is_none());

        resolved.config.taxonomy_path = Some(PathBuf::from("tools.yaml"));
        assert_eq!(resolved.taxonomy_path(), Some(PathBuf::from("tools.yaml")));

        resolved.base_dir = Some(PathBuf::from("/etc/toolbox"));
        resolved.config.taxonomy_path = Some(PathBuf::from("/srv/tools.yaml"));
        assert_eq!(resolved.taxonomy_path(), Some(PathBuf::from("/srv/tools.yaml")));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/toolbox.yaml"));
        assert!(matches!(result, Err(InferenceError::ConfigError { .. })));
    }
}
