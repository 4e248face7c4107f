//! Check evaluation against a located target.

use super::target::CheckTarget;
use super::EvaluationErrorKind;
use crate::dispatcher::{Filter, Rule};
use crate::httpd::SectionRef;
use crate::rules::{Check, Condition, DirectivePattern, FilterPattern, RulePattern};
use crate::source::ConfigurationSource;
use std::collections::HashMap;

/// Outcome of one check against one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Whether the target satisfied the check.
    pub passed: bool,
    /// Failure detail; empty when passed.
    pub details: String,
    /// The most specific location of the failure, if known.
    pub source: Option<ConfigurationSource>,
}

impl CheckResult {
    fn pass() -> Self {
        Self {
            passed: true,
            details: String::new(),
            source: None,
        }
    }
}

/// Whether the condition holds, what was found, and where.
struct Observation {
    holds: bool,
    found: String,
    source: Option<ConfigurationSource>,
}

impl Observation {
    fn new(holds: bool, found: impl Into<String>, source: Option<&ConfigurationSource>) -> Self {
        Self {
            holds,
            found: found.into(),
            source: source.cloned(),
        }
    }
}

impl Check {
    /// Evaluates this check.
    ///
    /// The check passes when the condition's truth differs from `fail_if`.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationErrorKind::IncompatibleTarget`] when the condition
    /// cannot be applied to this kind of target.
    pub fn perform_check(&self, target: &CheckTarget<'_>) -> Result<CheckResult, EvaluationErrorKind> {
        let observation = observe(self.condition(), target)?;
        if observation.holds != self.fail_if() {
            return Ok(CheckResult::pass());
        }
        let details = if self.fail_if() {
            format!("did not expect {}; found {}", self.condition(), observation.found)
        } else {
            format!("expected {}; found {}", self.condition(), observation.found)
        };
        Ok(CheckResult {
            passed: false,
            details,
            source: observation.source,
        })
    }
}

fn observe(condition: &Condition, target: &CheckTarget<'_>) -> Result<Observation, EvaluationErrorKind> {
    let missing = || Observation::new(false, "nothing configured", None);
    let observation = match (condition, target) {
        (Condition::IsPresent, CheckTarget::Missing) => missing(),
        (Condition::IsPresent, other) => Observation::new(true, "a configured value", other.source()),

        (
            Condition::BooleanEquals(_)
            | Condition::IntegerEquals(_)
            | Condition::IntegerGreaterOrEqual(_)
            | Condition::IntegerLessOrEqual(_)
            | Condition::StringEquals(_)
            | Condition::StringListIncludes(_)
            | Condition::FilterListIncludes(_)
            | Condition::FilterListStartsWith(_)
            | Condition::RuleListIncludes(_)
            | Condition::RuleListStartsWith(_),
            CheckTarget::Missing,
        ) => missing(),

        (Condition::BooleanEquals(expected), CheckTarget::Boolean(v)) => {
            Observation::new(v.value() == expected, v.value().to_string(), Some(v.source()))
        }
        (Condition::IntegerEquals(expected), CheckTarget::Integer(v)) => {
            Observation::new(v.value() == expected, v.value().to_string(), Some(v.source()))
        }
        (Condition::IntegerGreaterOrEqual(min), CheckTarget::Integer(v)) => {
            Observation::new(v.value() >= min, v.value().to_string(), Some(v.source()))
        }
        (Condition::IntegerLessOrEqual(max), CheckTarget::Integer(v)) => {
            Observation::new(v.value() <= max, v.value().to_string(), Some(v.source()))
        }
        (Condition::StringEquals(expected), CheckTarget::Text(v)) => {
            Observation::new(v.value() == expected, format!("\"{}\"", v.value()), Some(v.source()))
        }
        (Condition::StringListIncludes(expected), CheckTarget::TextList(v)) => Observation::new(
            v.value().iter().any(|s| s == expected),
            format!("[{}]", v.value().join(", ")),
            Some(v.source()),
        ),

        (Condition::FilterListIncludes(pattern), CheckTarget::Filters(v)) => Observation::new(
            v.value().iter().any(|f| filter_matches(pattern, f)),
            format!("{} filter(s) without a match", v.value().len()),
            Some(v.source()),
        ),
        (Condition::FilterListStartsWith(pattern), CheckTarget::Filters(v)) => {
            let first = v.value().first();
            Observation::new(
                first.is_some_and(|f| filter_matches(pattern, f)),
                first.map_or_else(|| "an empty filter list".to_string(), describe_filter),
                Some(v.source()),
            )
        }
        (Condition::RuleListIncludes(pattern), CheckTarget::Rules(v)) => Observation::new(
            v.value().iter().any(|r| rule_matches(pattern, r)),
            format!("{} rule(s) without a match", v.value().len()),
            Some(v.source()),
        ),
        (Condition::RuleListStartsWith(pattern), CheckTarget::Rules(v)) => {
            let first = v.value().first();
            Observation::new(
                first.is_some_and(|r| rule_matches(pattern, r)),
                first.map_or_else(|| "an empty rule list".to_string(), describe_rule),
                Some(v.source()),
            )
        }

        (Condition::IsUniqueLabel, CheckTarget::Farms(farms)) => {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            let mut duplicates: Vec<&str> = Vec::new();
            let mut first_duplicate = None;
            for farm in farms {
                let label = farm.label.value().as_str();
                let count = seen.entry(label).or_insert(0);
                *count += 1;
                if *count == 2 {
                    duplicates.push(label);
                    first_duplicate.get_or_insert(farm.source());
                }
            }
            let found = if duplicates.is_empty() {
                "unique labels".to_string()
            } else {
                format!("duplicate label(s) {}", duplicates.join(", "))
            };
            Observation::new(duplicates.is_empty(), found, first_duplicate)
        }

        (Condition::HasDirective(pattern), CheckTarget::Section(section)) => has_directive(pattern, *section),

        (condition, target) => {
            return Err(EvaluationErrorKind::IncompatibleTarget {
                condition: condition.name(),
                target: target.kind_name(),
            })
        }
    };
    Ok(observation)
}

fn field_matches(expected: Option<&String>, actual: Option<&str>) -> bool {
    expected.map_or(true, |e| actual == Some(e.as_str()))
}

fn filter_matches(pattern: &FilterPattern, filter: &Filter) -> bool {
    field_matches(pattern.filter_type.as_ref(), filter.filter_type.as_deref())
        && field_matches(pattern.url.as_ref(), filter.url.as_deref())
        && field_matches(pattern.glob.as_ref(), filter.glob.as_deref())
        && field_matches(pattern.method.as_ref(), filter.method.as_deref())
        && field_matches(pattern.query.as_ref(), filter.query.as_deref())
        && field_matches(pattern.protocol.as_ref(), filter.protocol.as_deref())
        && field_matches(pattern.path.as_ref(), filter.path.as_deref())
        && field_matches(pattern.selectors.as_ref(), filter.selectors.as_deref())
        && field_matches(pattern.extension.as_ref(), filter.extension.as_deref())
        && field_matches(pattern.suffix.as_ref(), filter.suffix.as_deref())
}

fn rule_matches(pattern: &RulePattern, rule: &Rule) -> bool {
    field_matches(pattern.rule_type.as_ref(), rule.rule_type.as_deref())
        && field_matches(pattern.glob.as_ref(), rule.glob.as_deref())
}

fn describe_filter(filter: &Filter) -> String {
    let fields: Vec<String> = ["type", "url", "glob", "method", "path", "extension"]
        .iter()
        .filter_map(|name| filter.field(name).map(|v| format!("/{name} \"{v}\"")))
        .collect();
    format!("/{} {{ {} }}", filter.label, fields.join(" "))
}

fn describe_rule(rule: &Rule) -> String {
    let mut fields = Vec::new();
    if let Some(t) = &rule.rule_type {
        fields.push(format!("/type \"{t}\""));
    }
    if let Some(g) = &rule.glob {
        fields.push(format!("/glob \"{g}\""));
    }
    format!("/{} {{ {} }}", rule.label, fields.join(" "))
}

/// The nearest section declaring the directive decides; any of its
/// same-named directives may match the expected arguments.
fn has_directive(pattern: &DirectivePattern, section: SectionRef<'_>) -> Observation {
    let Some(owner) = section
        .ancestors_and_self()
        .find(|s| s.directive(&pattern.name).is_some())
    else {
        return Observation::new(false, format!("no {} directive", pattern.name), Some(section.source()));
    };

    let mut candidates = owner.directives().iter().filter(|d| d.is_named(&pattern.name));
    let matching = candidates.clone().find(|d| {
        pattern.arguments.is_empty()
            || (d.arguments().len() == pattern.arguments.len()
                && d.arguments()
                    .iter()
                    .zip(&pattern.arguments)
                    .all(|(a, e)| a.eq_ignore_ascii_case(e)))
    });
    match matching {
        Some(directive) => Observation::new(true, directive.to_string(), Some(directive.source())),
        None => {
            let nearest = candidates.next_back();
            Observation::new(
                false,
                nearest.map_or_else(String::new, ToString::to_string),
                Some(section.source()),
            )
        }
    }
}
