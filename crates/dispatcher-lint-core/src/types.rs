//! Core types for violations and parse results.

use crate::aggregate::reduce;
use crate::rules::AnalyzerRule;
use crate::source::ConfigurationSource;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Severity level of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational finding.
    Info,
    /// Minor issue.
    Minor,
    /// Major issue.
    Major,
    /// Critical issue.
    Critical,
    /// Blocks a release.
    Blocker,
}

impl Severity {
    /// Parses a severity name case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "INFO" => Some(Self::Info),
            "MINOR" => Some(Self::Minor),
            "MAJOR" => Some(Self::Major),
            "CRITICAL" => Some(Self::Critical),
            "BLOCKER" => Some(Self::Blocker),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Minor => write!(f, "MINOR"),
            Self::Major => write!(f, "MAJOR"),
            Self::Critical => write!(f, "CRITICAL"),
            Self::Blocker => write!(f, "BLOCKER"),
        }
    }
}

/// Role of a dispatcher farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FarmType {
    /// Farm in front of an author instance.
    Author,
    /// Farm in front of a publish instance.
    Publish,
}

impl FarmType {
    /// Parses a farm type name case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "AUTHOR" => Some(Self::Author),
            "PUBLISH" => Some(Self::Publish),
            _ => None,
        }
    }
}

/// Classification of a rule, as used by code-quality dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    /// Maintainability issue.
    #[default]
    CodeSmell,
    /// Functional defect.
    Bug,
    /// Security weakness.
    Vulnerability,
    /// Security-sensitive setting to review.
    SecurityHotspot,
}

impl RuleType {
    /// Parses a rule type name case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "CODE_SMELL" => Some(Self::CodeSmell),
            "BUG" => Some(Self::Bug),
            "VULNERABILITY" => Some(Self::Vulnerability),
            "SECURITY_HOTSPOT" => Some(Self::SecurityHotspot),
            _ => None,
        }
    }
}

/// How much repetition to keep when reporting violations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationVerbosity {
    /// Every violation, in original order.
    Full,
    /// Identical violations (rule, context, file, line) collapsed with a count.
    #[default]
    Partial,
    /// One violation per rule, with a count.
    Minimized,
}

/// A rule violation found during parsing or rule evaluation.
///
/// Violations returned by [`reduce`] at `Partial` or `Minimized` verbosity
/// carry an occurrence count; all others count as a single occurrence.
#[derive(Debug, Clone)]
pub struct Violation {
    rule: Arc<AnalyzerRule>,
    context: String,
    source: Option<ConfigurationSource>,
    count: Option<NonZeroUsize>,
}

impl Violation {
    /// Creates a new violation.
    #[must_use]
    pub fn new(
        rule: Arc<AnalyzerRule>,
        context: impl Into<String>,
        source: Option<ConfigurationSource>,
    ) -> Self {
        Self {
            rule,
            context: context.into(),
            source,
            count: None,
        }
    }

    /// Marks this violation as the representative of `count` occurrences.
    #[must_use]
    pub(crate) fn counted(mut self, count: NonZeroUsize) -> Self {
        self.count = Some(count);
        self
    }

    /// Returns the rule that was violated.
    #[must_use]
    pub fn analyzer_rule(&self) -> &AnalyzerRule {
        &self.rule
    }

    /// Returns a shared handle to the violated rule.
    #[must_use]
    pub fn analyzer_rule_arc(&self) -> &Arc<AnalyzerRule> {
        &self.rule
    }

    /// Returns the human-readable context.
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Returns the location of the offending configuration, if known.
    #[must_use]
    pub fn configuration_source(&self) -> Option<&ConfigurationSource> {
        self.source.as_ref()
    }

    /// Returns how many violations this entry stands for.
    #[must_use]
    pub fn occurrences(&self) -> usize {
        self.count.map_or(1, NonZeroUsize::get)
    }

    /// Returns true if this is a counted representative produced by reduction.
    #[must_use]
    pub fn is_counted(&self) -> bool {
        self.count.is_some()
    }

    /// Returns the severity of the violated rule.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.rule.severity()
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{source}: ")?,
            None => write!(f, "<unknown>: ")?,
        }
        write!(
            f,
            "{} [{}] {}",
            self.rule.severity(),
            self.rule.id(),
            self.context
        )?;
        if let Some(count) = self.count {
            write!(f, " (x{count})")?;
        }
        Ok(())
    }
}

/// Flat serialized form of a [`Violation`].
#[derive(Serialize)]
struct ViolationRecord<'a> {
    rule: &'a str,
    severity: Severity,
    description: &'a str,
    context: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    included_from: Option<&'a str>,
    occurrences: usize,
}

impl Serialize for Violation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ViolationRecord {
            rule: self.rule.id(),
            severity: self.rule.severity(),
            description: self.rule.description(),
            context: &self.context,
            file: self.source.as_ref().and_then(ConfigurationSource::file_name),
            line: self.source.as_ref().and_then(ConfigurationSource::line_number),
            included_from: self
                .source
                .as_ref()
                .and_then(ConfigurationSource::included_from),
            occurrences: self.occurrences(),
        }
        .serialize(serializer)
    }
}

/// Output of a dialect factory: the parsed tree plus parse-time violations.
#[derive(Debug, Clone)]
pub struct ConfigurationParseResults<T> {
    configuration: T,
    violations: Vec<Violation>,
}

impl<T> ConfigurationParseResults<T> {
    /// Creates a new parse result.
    #[must_use]
    pub fn new(configuration: T, violations: Vec<Violation>) -> Self {
        Self {
            configuration,
            violations,
        }
    }

    /// Returns the parsed configuration.
    #[must_use]
    pub fn configuration(&self) -> &T {
        &self.configuration
    }

    /// Returns the parse-time violations reduced to the given verbosity.
    #[must_use]
    pub fn violations(&self, verbosity: ViolationVerbosity) -> Vec<Violation> {
        reduce(self.violations.clone(), verbosity)
    }

    /// Returns the unreduced parse-time violations.
    #[must_use]
    pub fn raw_violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Splits the result into its configuration and violations.
    #[must_use]
    pub fn into_parts(self) -> (T, Vec<Violation>) {
        (self.configuration, self.violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_violation(severity: Severity) -> Violation {
        let rule = AnalyzerRule::new("default-filter-deny-rules", "farm.filter")
            .with_severity(severity)
            .with_description("Filters should start by denying everything");
        Violation::new(
            Arc::new(rule),
            "farm.filter: expected deny first",
            Some(ConfigurationSource::new("conf.dispatcher.d/filters.any", 3)),
        )
    }

    #[test]
    fn severity_orders_from_info_to_blocker() {
        assert!(Severity::Info < Severity::Minor);
        assert!(Severity::Major < Severity::Critical);
        assert!(Severity::Critical < Severity::Blocker);
        assert_eq!(Severity::parse("major"), Some(Severity::Major));
        assert_eq!(Severity::parse("fatal"), None);
    }

    #[test]
    fn violation_display() {
        let v = make_violation(Severity::Major);
        insta::assert_snapshot!(
            v.to_string(),
            @"conf.dispatcher.d/filters.any:3: MAJOR [default-filter-deny-rules] farm.filter: expected deny first"
        );
    }

    #[test]
    fn counted_violation_display_shows_count() {
        let v = make_violation(Severity::Minor).counted(NonZeroUsize::new(4).unwrap());
        assert!(v.to_string().ends_with("(x4)"));
        assert_eq!(v.occurrences(), 4);
        assert!(v.is_counted());
    }

    #[test]
    fn violation_serializes_flat() {
        let v = make_violation(Severity::Major);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["rule"], "default-filter-deny-rules");
        assert_eq!(json["severity"], "MAJOR");
        assert_eq!(json["line"], 3);
        assert_eq!(json["occurrences"], 1);
        assert!(json.get("included_from").is_none());
    }
}
