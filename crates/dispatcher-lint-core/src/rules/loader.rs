//! DTO → model conversion with validation.

use super::dto::{AnalyzerRuleDto, AnalyzerRuleListDto, CheckDto, FilterPatternDto, RulePatternDto};
use super::model::{
    AnalyzerRule, AnalyzerRuleList, Check, Condition, DirectivePattern, FilterPattern, MergeMode,
    RulePattern,
};
use crate::types::{FarmType, RuleType, Severity};
use serde_json::Value;

/// Errors during DTO → model conversion.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A required text field is empty.
    #[error("rule `{rule}`: `{field}` must not be empty")]
    EmptyField {
        /// Rule id, or its index when the id itself is empty.
        rule: String,
        /// The empty field.
        field: &'static str,
    },

    /// Unknown severity string.
    #[error("rule `{rule}`: unknown severity `{value}`, expected INFO, MINOR, MAJOR, CRITICAL or BLOCKER")]
    UnknownSeverity {
        /// Rule id.
        rule: String,
        /// The invalid value.
        value: String,
    },

    /// Unknown farm type string.
    #[error("rule `{rule}`: unknown farm type `{value}`, expected AUTHOR or PUBLISH")]
    UnknownFarmType {
        /// Rule id.
        rule: String,
        /// The invalid value.
        value: String,
    },

    /// Unknown rule type string.
    #[error("rule `{rule}`: unknown type `{value}`")]
    UnknownRuleType {
        /// Rule id.
        rule: String,
        /// The invalid value.
        value: String,
    },

    /// Unknown merge mode string.
    #[error("unknown merge mode `{value}`, expected EXTEND or REPLACE")]
    UnknownMergeMode {
        /// The invalid value.
        value: String,
    },

    /// Unknown condition name.
    #[error("rule `{rule}`: unknown condition `{value}`")]
    UnknownCondition {
        /// Rule id.
        rule: String,
        /// The invalid value.
        value: String,
    },

    /// A check value does not fit its condition.
    #[error("rule `{rule}`: invalid value for {condition}: {message}")]
    InvalidCheckValue {
        /// Rule id.
        rule: String,
        /// Condition name.
        condition: String,
        /// What was wrong.
        message: String,
    },

    /// A rule mixes per-target and whole-collection checks.
    #[error("rule `{rule}`: IS_UNIQUE_LABEL cannot be combined with per-target checks")]
    MixedTargets {
        /// Rule id.
        rule: String,
    },
}

/// Converts a rule file DTO into a validated list tagged with `origin`.
///
/// # Errors
///
/// Returns the first error encountered during conversion.
pub fn load(dto: AnalyzerRuleListDto, origin: &str) -> Result<AnalyzerRuleList, LoadError> {
    let merge_mode = match dto.merge_mode.as_deref().map(str::to_ascii_uppercase).as_deref() {
        None | Some("EXTEND") => MergeMode::Extend,
        Some("REPLACE") => MergeMode::Replace,
        Some(other) => {
            return Err(LoadError::UnknownMergeMode {
                value: other.to_string(),
            })
        }
    };

    let rules = dto
        .rules
        .into_iter()
        .enumerate()
        .map(|(i, r)| convert_rule(r, i, origin))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AnalyzerRuleList::new(merge_mode, rules))
}

fn convert_rule(dto: AnalyzerRuleDto, index: usize, origin: &str) -> Result<AnalyzerRule, LoadError> {
    if dto.id.trim().is_empty() {
        return Err(LoadError::EmptyField {
            rule: format!("rules[{index}]"),
            field: "id",
        });
    }
    let id = dto.id;
    if dto.element.trim().is_empty() {
        return Err(LoadError::EmptyField { rule: id, field: "element" });
    }

    let severity = Severity::parse(&dto.severity).ok_or_else(|| LoadError::UnknownSeverity {
        rule: id.clone(),
        value: dto.severity.clone(),
    })?;

    let rule_type = match dto.rule_type.as_deref() {
        None => RuleType::default(),
        Some(value) => RuleType::parse(value).ok_or_else(|| LoadError::UnknownRuleType {
            rule: id.clone(),
            value: value.to_string(),
        })?,
    };

    let farm_types = if dto.farm_type_list.is_empty() {
        vec![FarmType::Author, FarmType::Publish]
    } else {
        dto.farm_type_list
            .iter()
            .map(|value| {
                FarmType::parse(value).ok_or_else(|| LoadError::UnknownFarmType {
                    rule: id.clone(),
                    value: value.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let checks = dto
        .checks
        .into_iter()
        .map(|c| convert_check(c, &id))
        .collect::<Result<Vec<_>, _>>()?;

    let multi = checks.iter().filter(|c| c.condition().is_multi_target()).count();
    if multi != 0 && multi != checks.len() {
        return Err(LoadError::MixedTargets { rule: id });
    }

    let mut rule = AnalyzerRule::new(id, dto.element)
        .with_description(dto.description)
        .with_severity(severity)
        .with_rule_type(rule_type)
        .with_farm_types(farm_types)
        .with_tags(dto.tags)
        .with_effort(dto.effort)
        .with_enabled(dto.enabled)
        .with_documentation_url(dto.documentation_url)
        .with_origin(origin);
    for check in checks {
        rule = rule.with_check(check);
    }
    Ok(rule)
}

fn convert_check(dto: CheckDto, rule: &str) -> Result<Check, LoadError> {
    let name = dto.condition.to_ascii_uppercase();
    let invalid = |message: String| LoadError::InvalidCheckValue {
        rule: rule.to_string(),
        condition: name.clone(),
        message,
    };

    let condition = match name.as_str() {
        "BOOLEAN_EQUALS" => Condition::BooleanEquals(boolean(&dto.value).ok_or_else(|| invalid(expected("a boolean", &dto.value)))?),
        "INTEGER_EQUALS" => Condition::IntegerEquals(integer(&dto.value).ok_or_else(|| invalid(expected("an integer", &dto.value)))?),
        "INTEGER_GREATER_OR_EQUAL" => {
            Condition::IntegerGreaterOrEqual(integer(&dto.value).ok_or_else(|| invalid(expected("an integer", &dto.value)))?)
        }
        "INTEGER_LESS_OR_EQUAL" => {
            Condition::IntegerLessOrEqual(integer(&dto.value).ok_or_else(|| invalid(expected("an integer", &dto.value)))?)
        }
        "STRING_EQUALS" => Condition::StringEquals(text(&dto.value).ok_or_else(|| invalid(expected("a string", &dto.value)))?),
        "STRING_LIST_INCLUDES" => {
            Condition::StringListIncludes(text(&dto.value).ok_or_else(|| invalid(expected("a string", &dto.value)))?)
        }
        "IS_PRESENT" => Condition::IsPresent,
        "IS_UNIQUE_LABEL" => Condition::IsUniqueLabel,
        "FILTER_LIST_INCLUDES" => Condition::FilterListIncludes(filter_pattern(&dto.value).map_err(invalid)?),
        "FILTER_LIST_STARTS_WITH" => Condition::FilterListStartsWith(filter_pattern(&dto.value).map_err(invalid)?),
        "RULE_LIST_INCLUDES" => Condition::RuleListIncludes(rule_pattern(&dto.value).map_err(invalid)?),
        "RULE_LIST_STARTS_WITH" => Condition::RuleListStartsWith(rule_pattern(&dto.value).map_err(invalid)?),
        "HAS_DIRECTIVE" => Condition::HasDirective(directive_pattern(&dto.value).map_err(invalid)?),
        _ => {
            return Err(LoadError::UnknownCondition {
                rule: rule.to_string(),
                value: dto.condition,
            })
        }
    };

    let mut check = Check::new(condition).with_fail_if(dto.fail_if);
    if let Some(context) = dto.context.filter(|c| !c.is_empty()) {
        check = check.with_context(context);
    }
    Ok(check)
}

fn expected(what: &str, value: &Value) -> String {
    format!("expected {what}, found {value}")
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn filter_pattern(value: &Value) -> Result<FilterPattern, String> {
    let dto: FilterPatternDto = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    let pattern = FilterPattern {
        filter_type: dto.filter_type,
        url: dto.url,
        glob: dto.glob,
        method: dto.method,
        query: dto.query,
        protocol: dto.protocol,
        path: dto.path,
        selectors: dto.selectors,
        extension: dto.extension,
        suffix: dto.suffix,
    };
    if pattern == FilterPattern::default() {
        return Err("filter pattern sets no fields".to_string());
    }
    Ok(pattern)
}

fn rule_pattern(value: &Value) -> Result<RulePattern, String> {
    let dto: RulePatternDto = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    if dto.rule_type.is_none() && dto.glob.is_none() {
        return Err("rule pattern sets no fields".to_string());
    }
    Ok(RulePattern {
        rule_type: dto.rule_type,
        glob: dto.glob,
    })
}

fn directive_pattern(value: &Value) -> Result<DirectivePattern, String> {
    let Some(text) = value.as_str() else {
        return Err(expected("a directive string", value));
    };
    let mut words = text.split_whitespace().map(str::to_string);
    let Some(name) = words.next() else {
        return Err("directive must not be empty".to_string());
    };
    Ok(DirectivePattern {
        name,
        arguments: words.collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<AnalyzerRuleList, LoadError> {
        let dto: AnalyzerRuleListDto = serde_json::from_str(json).unwrap();
        load(dto, "test.json")
    }

    #[test]
    fn converts_full_rule() {
        let list = parse(
            r#"{
                "mergeMode": "EXTEND",
                "rules": [{
                    "id": "cache-rules-deny-all-first",
                    "type": "VULNERABILITY",
                    "severity": "critical",
                    "description": "Cache rules should start by denying everything",
                    "element": "farm.cache.rules",
                    "farmTypeList": ["PUBLISH"],
                    "tags": ["security"],
                    "effort": "5min",
                    "checks": [{
                        "condition": "RULE_LIST_STARTS_WITH",
                        "value": {"type": "deny", "glob": "*"},
                        "context": "first rule must deny"
                    }],
                    "documentationURL": "https://example.com/docs"
                }]
            }"#,
        )
        .unwrap();
        let rule = &list.rules()[0];
        assert_eq!(rule.severity(), Severity::Critical);
        assert_eq!(rule.rule_type(), RuleType::Vulnerability);
        assert!(rule.applies_to(FarmType::Publish));
        assert!(!rule.applies_to(FarmType::Author));
        assert_eq!(rule.origin(), "test.json");
        assert_eq!(rule.checks()[0].context(), Some("first rule must deny"));
        assert_eq!(rule.documentation_url(), Some("https://example.com/docs"));
        assert!(matches!(
            rule.checks()[0].condition(),
            Condition::RuleListStartsWith(RulePattern { rule_type: Some(t), .. }) if t == "deny"
        ));
    }

    #[test]
    fn defaults_apply() {
        let list = parse(r#"{"rules": [{"id": "a", "element": "farm.cache"}]}"#).unwrap();
        let rule = &list.rules()[0];
        assert_eq!(list.merge_mode(), MergeMode::Extend);
        assert_eq!(rule.severity(), Severity::Major);
        assert!(rule.is_enabled());
        assert!(rule.applies_to(FarmType::Author) && rule.applies_to(FarmType::Publish));
    }

    #[test]
    fn directive_value_is_split() {
        let list = parse(
            r#"{"rules": [{"id": "a", "element": "httpd.vhost",
                "checks": [{"condition": "HAS_DIRECTIVE", "value": "Require all granted"}]}]}"#,
        )
        .unwrap();
        assert_eq!(
            list.rules()[0].checks()[0].condition(),
            &Condition::HasDirective(DirectivePattern {
                name: "Require".into(),
                arguments: vec!["all".into(), "granted".into()],
            })
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(r#"{"rules": [{"id": "a", "element": "farm", "severity": "FATAL"}]}"#),
            Err(LoadError::UnknownSeverity { .. })
        ));
        assert!(matches!(
            parse(r#"{"mergeMode": "MERGE", "rules": []}"#),
            Err(LoadError::UnknownMergeMode { .. })
        ));
        assert!(matches!(
            parse(r#"{"rules": [{"id": "a", "element": "farm", "checks": [{"condition": "IS_GREEN"}]}]}"#),
            Err(LoadError::UnknownCondition { .. })
        ));
        assert!(matches!(
            parse(r#"{"rules": [{"id": "a", "element": "farm.cache.statfileslevel",
                "checks": [{"condition": "INTEGER_EQUALS", "value": "two"}]}]}"#),
            Err(LoadError::InvalidCheckValue { .. })
        ));
        assert!(matches!(
            parse(r#"{"rules": [{"id": "a", "element": "farm", "farmTypeList": ["EDGE"]}]}"#),
            Err(LoadError::UnknownFarmType { .. })
        ));
    }

    #[test]
    fn rejects_mixed_targets() {
        let result = parse(
            r#"{"rules": [{"id": "a", "element": "farm", "checks": [
                {"condition": "IS_UNIQUE_LABEL"},
                {"condition": "IS_PRESENT"}
            ]}]}"#,
        );
        assert!(matches!(result, Err(LoadError::MixedTargets { .. })));
    }
}
