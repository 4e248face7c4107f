//! Rule presets for common configurations.

use crate::default_rule_list;
use dispatcher_lint_core::{AnalyzerRuleList, Severity};

/// Preset configurations for dispatcher-lint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Preset {
    /// The embedded rules as shipped.
    #[default]
    Recommended,
    /// Every embedded rule, including those shipped disabled.
    Strict,
    /// Only critical and blocker rules, for gradual adoption.
    Minimal,
}

impl Preset {
    /// Parses a preset name case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "recommended" => Some(Self::Recommended),
            "strict" => Some(Self::Strict),
            "minimal" => Some(Self::Minimal),
            _ => None,
        }
    }

    /// Returns the rules for this preset.
    #[must_use]
    pub fn rules(self) -> AnalyzerRuleList {
        let list = default_rule_list();
        match self {
            Self::Recommended => list,
            Self::Strict => list.with_all_enabled(),
            Self::Minimal => {
                let kept = list
                    .rules()
                    .iter()
                    .filter(|r| r.severity() >= Severity::Critical)
                    .map(|r| (**r).clone())
                    .collect();
                AnalyzerRuleList::new(list.merge_mode(), kept)
            }
        }
    }
}
