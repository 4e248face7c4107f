//! # dispatcher-lint-rules
//!
//! Built-in rule set for dispatcher-lint.
//!
//! The rules live in `rules/core-rules.json` and are compiled into the
//! binary. External rule folders merge on top of them.
//!
//! ## Available Rules
//!
//! | Id | Element | Farms |
//! |----|---------|-------|
//! | `default-filter-deny-rules` | `farm.filter` | all |
//! | `cache-rules-deny-all-first` | `farm.cache.rules` | publish |
//! | `statfileslevel-minimum` | `farm.cache.statfileslevel` | publish |
//! | `serve-stale-on-error` | `farm.cache.serveStaleOnError` | publish |
//! | `grace-period-enabled` | `farm.cache.gracePeriod` | publish |
//! | `enable-ttl` | `farm.cache.enableTTL` | publish |
//! | `ignore-url-params-deny-first` | `farm.cache.ignoreUrlParams` | publish |
//! | `invalidate-deny-all-first` | `farm.cache.invalidate` | publish |
//! | `allow-authorized-disabled` | `farm.cache.allowAuthorized` | publish |
//! | `unique-farm-labels` | `farm` | all |
//! | `cache-headers-configured` (off) | `farm.cache.headers` | publish |
//! | `require-all-granted` | `httpd.directory.root` | |
//! | `vhost-document-root` | `httpd.vhost` | |
//! | `no-server-signature` | `httpd.vhost` | |
//!
//! ## Usage
//!
//! ```ignore
//! use dispatcher_lint_core::{Analyzer, Config};
//! use dispatcher_lint_rules::load_rule_list;
//!
//! let config = Config::default();
//! let analyzer = Analyzer::builder()
//!     .repo("./dispatcher/src")
//!     .dispatcher_entry("conf.dispatcher.d/dispatcher.any")
//!     .rules(load_rule_list(None, &config).into())
//!     .config(config)
//!     .build()?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod presets;

pub use presets::Preset;

use dispatcher_lint_core::rules::{parse_rule_list, RuleListLoader};
use dispatcher_lint_core::{AnalyzerRuleList, Config};
use std::path::Path;
use tracing::{error, warn};

/// JSON text of the embedded rule list.
pub const CORE_RULES_JSON: &str = include_str!("../rules/core-rules.json");

/// Origin tag of the embedded rules.
pub const CORE_RULES_ORIGIN: &str = "core-rules.json";

/// Returns the embedded rule list.
///
/// The embedded file is validated by this crate's tests; should it ever
/// fail to load, the error is logged and an empty list is returned.
#[must_use]
pub fn default_rule_list() -> AnalyzerRuleList {
    parse_rule_list(CORE_RULES_JSON, CORE_RULES_ORIGIN).unwrap_or_else(|e| {
        error!("Embedded rule list is invalid: {e}");
        AnalyzerRuleList::empty()
    })
}

/// Builds the rule list used for an analysis from the embedded rules.
///
/// See [`build_rule_list`].
#[must_use]
pub fn load_rule_list(rules_folder: Option<&Path>, config: &Config) -> AnalyzerRuleList {
    build_rule_list(default_rule_list(), rules_folder, config)
}

/// Merges every `*.json` file in `rules_folder` onto `base` in file-name
/// order, then applies the per-rule overrides from `config`.
#[must_use]
pub fn build_rule_list(base: AnalyzerRuleList, rules_folder: Option<&Path>, config: &Config) -> AnalyzerRuleList {
    let mut loader = RuleListLoader::new(base);
    if let Some(folder) = rules_folder {
        loader.merge_folder(folder);
    }
    if !loader.skipped().is_empty() {
        warn!("{} rule source(s) skipped", loader.skipped().len());
    }
    let list = loader.finish();
    for id in config.rules.keys() {
        if list.get(id).is_none() {
            warn!("Configuration overrides unknown rule '{id}'");
        }
    }
    list.with_overrides(config)
}

/// Re-export core types for convenience.
pub use dispatcher_lint_core::{AnalyzerRule, Severity, Violation};

#[cfg(test)]
mod tests {
    use super::*;
    use dispatcher_lint_core::{FarmType, MergeMode};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn embedded_rules_load() {
        let list = parse_rule_list(CORE_RULES_JSON, CORE_RULES_ORIGIN).unwrap();
        assert_eq!(list.merge_mode(), MergeMode::Extend);
        assert!(list.rules().iter().all(|r| r.origin() == CORE_RULES_ORIGIN));
        assert!(list.rules().iter().all(|r| !r.description().is_empty()));
        assert!(list.get("default-filter-deny-rules").is_some());
        assert!(list.get("require-all-granted").is_some());
    }

    #[test]
    fn cache_headers_rule_ships_disabled() {
        let list = default_rule_list();
        let rule = list.get("cache-headers-configured").unwrap();
        assert!(!rule.is_enabled());
        assert!(rule.applies_to(FarmType::Publish));
        assert!(!rule.applies_to(FarmType::Author));
    }

    #[test]
    fn config_overrides_apply_after_merge() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("custom.json"),
            r#"{"rules": [{"id": "statfileslevel-minimum", "element": "farm.cache.statfileslevel",
                "severity": "MAJOR",
                "checks": [{"condition": "INTEGER_GREATER_OR_EQUAL", "value": 3}]}]}"#,
        )
        .unwrap();
        let config = Config::parse(
            r#"
[rules.statfileslevel-minimum]
severity = "CRITICAL"

[rules.enable-ttl]
enabled = false
"#,
        )
        .unwrap();

        let list = load_rule_list(Some(dir.path()), &config);
        let statfileslevel = list.get("statfileslevel-minimum").unwrap();
        assert_eq!(statfileslevel.origin(), "custom.json");
        assert_eq!(statfileslevel.severity(), Severity::Critical);
        assert!(!list.get("enable-ttl").unwrap().is_enabled());
        assert_eq!(list.len(), default_rule_list().len());
    }

    #[test]
    fn replace_folder_discards_embedded_rules() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("only.json"),
            r#"{"mergeMode": "REPLACE", "rules": [{"id": "mine", "element": "farm",
                "checks": [{"condition": "IS_UNIQUE_LABEL"}]}]}"#,
        )
        .unwrap();
        let list = load_rule_list(Some(dir.path()), &Config::default());
        assert_eq!(list.len(), 1);
        assert!(list.get("mine").is_some());
    }
}
