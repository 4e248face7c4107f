//! Tool configuration (`dispatcher-lint.toml`).

use crate::include::{IncludeLimits, DEFAULT_MAX_INCLUDE_DEPTH, DEFAULT_MAX_LINES};
use crate::types::{Severity, ViolationVerbosity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Analyzer configuration.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Per-rule overrides, keyed by rule id.
    #[serde(default)]
    pub rules: BTreeMap<String, RuleConfig>,
}

impl Config {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Gets the enable override for a rule. `None` keeps the rule's own flag.
    #[must_use]
    pub fn rule_enabled(&self, rule_id: &str) -> Option<bool> {
        self.rules.get(rule_id).and_then(|c| c.enabled)
    }

    /// Gets the severity override for a rule.
    #[must_use]
    pub fn rule_severity(&self, rule_id: &str) -> Option<Severity> {
        self.rules.get(rule_id).and_then(|c| c.severity)
    }

    /// Returns the include limits.
    #[must_use]
    pub fn limits(&self) -> IncludeLimits {
        IncludeLimits {
            max_depth: self.analyzer.max_include_depth,
            max_lines: self.analyzer.max_lines,
        }
    }
}

/// Analyzer-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Repository root (default: current directory).
    #[serde(default = "default_repo")]
    pub repo: PathBuf,

    /// Dispatcher entry file, relative to the repository root.
    #[serde(default)]
    pub dispatcher_entry: Option<String>,

    /// HTTPD entry file, relative to the repository root.
    #[serde(default)]
    pub httpd_entry: Option<String>,

    /// Directory that relative HTTPD includes resolve against.
    #[serde(default)]
    pub server_root: Option<PathBuf>,

    /// Reporting verbosity.
    #[serde(default)]
    pub verbosity: ViolationVerbosity,

    /// Folder of additional `*.json` rule files.
    #[serde(default)]
    pub rules_folder: Option<PathBuf>,

    /// Maximum include nesting depth.
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,

    /// Maximum number of resolved lines.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            repo: default_repo(),
            dispatcher_entry: None,
            httpd_entry: None,
            server_root: None,
            verbosity: ViolationVerbosity::default(),
            rules_folder: None,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

fn default_repo() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_include_depth() -> usize {
    DEFAULT_MAX_INCLUDE_DEPTH
}

fn default_max_lines() -> usize {
    DEFAULT_MAX_LINES
}

/// Per-rule overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Whether this rule is enabled.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Severity override for this rule.
    #[serde(default)]
    pub severity: Option<Severity>,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Parse error in config file.
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Parse error message.
        message: String,
    },
}
