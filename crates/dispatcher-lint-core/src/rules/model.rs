//! Pure domain model for analyzer rules.
//!
//! This module contains no serde and no I/O. Rule lists enforce id
//! uniqueness at construction time and on every merge.

use crate::include::Dialect;
use crate::types::{FarmType, RuleType, Severity};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

// ────────────────────────────────────────────
// Check values
// ────────────────────────────────────────────

/// Expected shape of a dispatcher filter entry.
///
/// Every field that is set must equal the filter's field; unset fields
/// match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPattern {
    /// `allow` or `deny`.
    pub filter_type: Option<String>,
    /// Value of `/url`.
    pub url: Option<String>,
    /// Value of `/glob`.
    pub glob: Option<String>,
    /// Value of `/method`.
    pub method: Option<String>,
    /// Value of `/query`.
    pub query: Option<String>,
    /// Value of `/protocol`.
    pub protocol: Option<String>,
    /// Value of `/path`.
    pub path: Option<String>,
    /// Value of `/selectors`.
    pub selectors: Option<String>,
    /// Value of `/extension`.
    pub extension: Option<String>,
    /// Value of `/suffix`.
    pub suffix: Option<String>,
}

impl FilterPattern {
    fn fields(&self) -> [(&'static str, Option<&str>); 10] {
        [
            ("type", self.filter_type.as_deref()),
            ("url", self.url.as_deref()),
            ("glob", self.glob.as_deref()),
            ("method", self.method.as_deref()),
            ("query", self.query.as_deref()),
            ("protocol", self.protocol.as_deref()),
            ("path", self.path.as_deref()),
            ("selectors", self.selectors.as_deref()),
            ("extension", self.extension.as_deref()),
            ("suffix", self.suffix.as_deref()),
        ]
    }
}

impl fmt::Display for FilterPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields()
            .iter()
            .filter_map(|(name, value)| value.map(|v| format!("/{name} \"{v}\"")))
            .collect();
        write!(f, "{{ {} }}", parts.join(" "))
    }
}

/// Expected shape of a cache rule entry (`/rules`, `/invalidate`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RulePattern {
    /// `allow` or `deny`.
    pub rule_type: Option<String>,
    /// Value of `/glob`.
    pub glob: Option<String>,
}

impl fmt::Display for RulePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(t) = &self.rule_type {
            parts.push(format!("/type \"{t}\""));
        }
        if let Some(g) = &self.glob {
            parts.push(format!("/glob \"{g}\""));
        }
        write!(f, "{{ {} }}", parts.join(" "))
    }
}

/// Expected httpd directive, e.g. `Require all granted`.
///
/// An empty argument list matches the directive regardless of arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectivePattern {
    /// Directive name, compared case-insensitively.
    pub name: String,
    /// Expected arguments, compared case-insensitively.
    pub arguments: Vec<String>,
}

impl fmt::Display for DirectivePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arguments.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} {}", self.name, self.arguments.join(" "))
        }
    }
}

// ────────────────────────────────────────────
// Checks
// ────────────────────────────────────────────

/// The closed set of conditions a check can evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// A boolean property equals the value.
    BooleanEquals(bool),
    /// An integer property equals the value.
    IntegerEquals(i64),
    /// An integer property is at least the value.
    IntegerGreaterOrEqual(i64),
    /// An integer property is at most the value.
    IntegerLessOrEqual(i64),
    /// A string property equals the value.
    StringEquals(String),
    /// A string list property contains the value.
    StringListIncludes(String),
    /// The property is configured at all.
    IsPresent,
    /// The filter list contains a matching entry.
    FilterListIncludes(FilterPattern),
    /// The filter list's first entry matches.
    FilterListStartsWith(FilterPattern),
    /// The rule list contains a matching entry.
    RuleListIncludes(RulePattern),
    /// The rule list's first entry matches.
    RuleListStartsWith(RulePattern),
    /// Every farm label is unique across the farm collection.
    IsUniqueLabel,
    /// The section, or one of its ancestors, declares the directive.
    HasDirective(DirectivePattern),
}

impl Condition {
    /// Returns the rule-file name of this condition.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BooleanEquals(_) => "BOOLEAN_EQUALS",
            Self::IntegerEquals(_) => "INTEGER_EQUALS",
            Self::IntegerGreaterOrEqual(_) => "INTEGER_GREATER_OR_EQUAL",
            Self::IntegerLessOrEqual(_) => "INTEGER_LESS_OR_EQUAL",
            Self::StringEquals(_) => "STRING_EQUALS",
            Self::StringListIncludes(_) => "STRING_LIST_INCLUDES",
            Self::IsPresent => "IS_PRESENT",
            Self::FilterListIncludes(_) => "FILTER_LIST_INCLUDES",
            Self::FilterListStartsWith(_) => "FILTER_LIST_STARTS_WITH",
            Self::RuleListIncludes(_) => "RULE_LIST_INCLUDES",
            Self::RuleListStartsWith(_) => "RULE_LIST_STARTS_WITH",
            Self::IsUniqueLabel => "IS_UNIQUE_LABEL",
            Self::HasDirective(_) => "HAS_DIRECTIVE",
        }
    }

    /// Whether the condition runs once over the whole target collection.
    #[must_use]
    pub fn is_multi_target(&self) -> bool {
        matches!(self, Self::IsUniqueLabel)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BooleanEquals(v) => write!(f, "value to be {v}"),
            Self::IntegerEquals(v) => write!(f, "value to be {v}"),
            Self::IntegerGreaterOrEqual(v) => write!(f, "value to be at least {v}"),
            Self::IntegerLessOrEqual(v) => write!(f, "value to be at most {v}"),
            Self::StringEquals(v) => write!(f, "value to be \"{v}\""),
            Self::StringListIncludes(v) => write!(f, "list to include \"{v}\""),
            Self::IsPresent => write!(f, "property to be configured"),
            Self::FilterListIncludes(p) => write!(f, "filter list to include {p}"),
            Self::FilterListStartsWith(p) => write!(f, "filter list to start with {p}"),
            Self::RuleListIncludes(p) => write!(f, "rule list to include {p}"),
            Self::RuleListStartsWith(p) => write!(f, "rule list to start with {p}"),
            Self::IsUniqueLabel => write!(f, "farm labels to be unique"),
            Self::HasDirective(p) => write!(f, "directive `{p}`"),
        }
    }
}

/// One check of a rule: a condition with polarity and optional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    condition: Condition,
    fail_if: bool,
    context: Option<String>,
}

impl Check {
    /// Creates a check that fails when the condition does not hold.
    #[must_use]
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            fail_if: false,
            context: None,
        }
    }

    /// Inverts the polarity: the check fails when the condition holds.
    #[must_use]
    pub fn with_fail_if(mut self, fail_if: bool) -> Self {
        self.fail_if = fail_if;
        self
    }

    /// Adds free-text context reported with failures.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Returns the condition.
    #[must_use]
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Returns the polarity flag.
    #[must_use]
    pub fn fail_if(&self) -> bool {
        self.fail_if
    }

    /// Returns the free-text context.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

// ────────────────────────────────────────────
// Rules
// ────────────────────────────────────────────

/// A data-driven analyzer rule. Identity is the `id`.
#[derive(Debug, Clone)]
pub struct AnalyzerRule {
    id: String,
    description: String,
    severity: Severity,
    element: String,
    farm_types: BTreeSet<FarmType>,
    checks: Vec<Check>,
    tags: Vec<String>,
    effort: Option<String>,
    enabled: bool,
    origin: String,
    rule_type: RuleType,
    documentation_url: Option<String>,
}

impl AnalyzerRule {
    /// Creates an enabled rule with no checks that applies to every farm type.
    #[must_use]
    pub fn new(id: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            severity: Severity::Major,
            element: element.into(),
            farm_types: [FarmType::Author, FarmType::Publish].into_iter().collect(),
            checks: Vec::new(),
            tags: Vec::new(),
            effort: None,
            enabled: true,
            origin: String::new(),
            rule_type: RuleType::default(),
            documentation_url: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Restricts the rule to the given farm types.
    #[must_use]
    pub fn with_farm_types(mut self, farm_types: impl IntoIterator<Item = FarmType>) -> Self {
        self.farm_types = farm_types.into_iter().collect();
        self
    }

    /// Appends a check.
    #[must_use]
    pub fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the remediation effort, e.g. `"10min"`.
    #[must_use]
    pub fn with_effort(mut self, effort: Option<String>) -> Self {
        self.effort = effort;
        self
    }

    /// Enables or disables the rule.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the name of the source the rule was loaded from.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Sets the rule type.
    #[must_use]
    pub fn with_rule_type(mut self, rule_type: RuleType) -> Self {
        self.rule_type = rule_type;
        self
    }

    /// Sets the documentation link.
    #[must_use]
    pub fn with_documentation_url(mut self, url: Option<String>) -> Self {
        self.documentation_url = url;
        self
    }

    /// Returns the rule id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the severity.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the dotted element path, e.g. `farm.cache.rules`.
    #[must_use]
    pub fn element(&self) -> &str {
        &self.element
    }

    /// Returns the farm types the rule applies to.
    #[must_use]
    pub fn farm_types(&self) -> &BTreeSet<FarmType> {
        &self.farm_types
    }

    /// Returns the checks in declared order.
    #[must_use]
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Returns the tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the remediation effort.
    #[must_use]
    pub fn effort(&self) -> Option<&str> {
        self.effort.as_deref()
    }

    /// Returns whether the rule is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the name of the source the rule was loaded from.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the rule type.
    #[must_use]
    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    /// Returns the documentation link.
    #[must_use]
    pub fn documentation_url(&self) -> Option<&str> {
        self.documentation_url.as_deref()
    }

    /// Returns the dialect addressed by the element's first token.
    #[must_use]
    pub fn dialect(&self) -> Option<Dialect> {
        match self.element.split('.').next() {
            Some("farm") => Some(Dialect::Any),
            Some("httpd") => Some(Dialect::Httpd),
            _ => None,
        }
    }

    /// Whether the rule's checks run once over the whole farm collection.
    #[must_use]
    pub fn is_multi_target(&self) -> bool {
        self.checks
            .first()
            .is_some_and(|c| c.condition.is_multi_target())
    }

    /// Whether the rule applies to farms of the given type.
    #[must_use]
    pub fn applies_to(&self, farm_type: FarmType) -> bool {
        self.farm_types.contains(&farm_type)
    }

    /// Heuristic for an unintentional duplicate of `self` under another id.
    #[must_use]
    pub fn is_close_match(&self, other: &AnalyzerRule) -> bool {
        self.severity == other.severity
            && self.enabled == other.enabled
            && self.description == other.description
            && self.farm_types.is_superset(&other.farm_types)
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn set_severity(&mut self, severity: Severity) {
        self.severity = severity;
    }
}

impl PartialEq for AnalyzerRule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AnalyzerRule {}

impl std::hash::Hash for AnalyzerRule {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ────────────────────────────────────────────
// Rule list (aggregate root)
// ────────────────────────────────────────────

/// How an incoming rule list combines with the accumulated one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeMode {
    /// Add new rules and replace rules that share an id.
    #[default]
    Extend,
    /// Discard everything accumulated so far.
    Replace,
}

/// An ordered list of rules, unique by id.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerRuleList {
    merge_mode: MergeMode,
    rules: Vec<Arc<AnalyzerRule>>,
}

impl AnalyzerRuleList {
    /// Creates a list; a later rule with a repeated id replaces the earlier one in place.
    #[must_use]
    pub fn new(merge_mode: MergeMode, rules: Vec<AnalyzerRule>) -> Self {
        let mut list = Self {
            merge_mode,
            rules: Vec::with_capacity(rules.len()),
        };
        for rule in rules {
            if let Some(pos) = list.position(rule.id()) {
                warn!("Duplicate rule id '{}' in {}, keeping the last one", rule.id(), rule.origin());
                list.rules[pos] = Arc::new(rule);
            } else {
                list.rules.push(Arc::new(rule));
            }
        }
        list
    }

    /// Creates an empty list.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the merge mode.
    #[must_use]
    pub fn merge_mode(&self) -> MergeMode {
        self.merge_mode
    }

    /// Returns all rules in order.
    #[must_use]
    pub fn rules(&self) -> &[Arc<AnalyzerRule>] {
        &self.rules
    }

    /// Returns the enabled rules in order.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &Arc<AnalyzerRule>> {
        self.rules.iter().filter(|r| r.is_enabled())
    }

    /// Returns the rule with the given id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<AnalyzerRule>> {
        self.rules.iter().find(|r| r.id() == id)
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.id() == id)
    }

    /// Merges an incoming list into this one.
    ///
    /// An empty accumulator or a `Replace` list takes over wholesale.
    /// Otherwise rules sharing an id are replaced in place and new rules
    /// are appended, with a warning when a new rule closely matches an
    /// existing one.
    pub fn merge(&mut self, incoming: AnalyzerRuleList) {
        if self.rules.is_empty() || incoming.merge_mode == MergeMode::Replace {
            info!(
                "Rule list replaced by {} rule(s) ({:?})",
                incoming.rules.len(),
                incoming.merge_mode
            );
            *self = incoming;
            return;
        }

        for rule in incoming.rules {
            if let Some(pos) = self.position(rule.id()) {
                info!("Rule '{}' overridden by {}", rule.id(), rule.origin());
                self.rules[pos] = rule;
                continue;
            }
            if let Some(existing) = self.rules.iter().find(|r| r.is_close_match(&rule)) {
                warn!(
                    "Rule '{}' from {} looks like a duplicate of '{}' from {}",
                    rule.id(),
                    rule.origin(),
                    existing.id(),
                    existing.origin()
                );
            }
            self.rules.push(rule);
        }
    }

    /// Applies per-rule enable and severity overrides.
    #[must_use]
    pub fn with_overrides(mut self, config: &crate::config::Config) -> Self {
        for rule in &mut self.rules {
            let enabled = config.rule_enabled(rule.id());
            let severity = config.rule_severity(rule.id());
            if enabled.is_none() && severity.is_none() {
                continue;
            }
            let rule = Arc::make_mut(rule);
            if let Some(enabled) = enabled {
                rule.set_enabled(enabled);
            }
            if let Some(severity) = severity {
                rule.set_severity(severity);
            }
        }
        self
    }

    /// Enables every rule, including those shipped disabled.
    #[must_use]
    pub fn with_all_enabled(mut self) -> Self {
        for rule in self.rules.iter_mut().filter(|r| !r.is_enabled()) {
            Arc::make_mut(rule).set_enabled(true);
        }
        self
    }
}

// ────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────
