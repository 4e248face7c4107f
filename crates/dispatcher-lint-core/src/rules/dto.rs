//! JSON deserialization types for rule files.
//!
//! These types exist solely for serde. The loader converts them into the
//! validated model in [`super::model`].

use serde::Deserialize;

/// Raw JSON representation of a rule file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerRuleListDto {
    /// `EXTEND` (default) or `REPLACE`.
    #[serde(default)]
    pub merge_mode: Option<String>,
    /// Rules in file order.
    #[serde(default)]
    pub rules: Vec<AnalyzerRuleDto>,
}

/// Raw JSON representation of one rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerRuleDto {
    /// Unique rule id.
    pub id: String,
    /// Rule type (default: `CODE_SMELL`).
    #[serde(default, rename = "type")]
    pub rule_type: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Remediation effort, e.g. `"10min"`.
    #[serde(default)]
    pub effort: Option<String>,
    /// Severity (default: `MAJOR`).
    #[serde(default = "default_severity")]
    pub severity: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Dotted element path.
    pub element: String,
    /// Farm types; empty means all.
    #[serde(default)]
    pub farm_type_list: Vec<String>,
    /// Checks in evaluation order.
    #[serde(default)]
    pub checks: Vec<CheckDto>,
    /// Whether the rule runs (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Link to further documentation.
    #[serde(default, rename = "documentationURL")]
    pub documentation_url: Option<String>,
}

/// Raw JSON representation of a check.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDto {
    /// Condition name, e.g. `RULE_LIST_STARTS_WITH`.
    pub condition: String,
    /// Comparison value; its shape depends on the condition.
    #[serde(default)]
    pub value: serde_json::Value,
    /// Polarity flag.
    #[serde(default)]
    pub fail_if: bool,
    /// Free-text context reported on failure.
    #[serde(default)]
    pub context: Option<String>,
}

/// Raw filter pattern used by `FILTER_LIST_*` values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct FilterPatternDto {
    #[serde(default, rename = "type")]
    pub filter_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub glob: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub selectors: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

/// Raw rule pattern used by `RULE_LIST_*` values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct RulePatternDto {
    #[serde(default, rename = "type")]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub glob: Option<String>,
}

fn default_severity() -> String {
    "MAJOR".to_string()
}

fn default_enabled() -> bool {
    true
}
