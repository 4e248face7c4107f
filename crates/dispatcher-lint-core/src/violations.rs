//! Parse-time syntax violations and their accumulator.
//!
//! Syntax problems that do not stop parsing are reported as ordinary
//! [`Violation`]s against built-in rules, so they flow through the same
//! reduction and output as rule engine findings.

use crate::rules::AnalyzerRule;
use crate::source::ConfigurationSource;
use crate::types::{RuleType, Severity, Violation};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// A recoverable syntax problem found while reading configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxFault {
    /// A label without a value, or a `}` with no open block.
    AnyBraceMissing,
    /// A block still open at end of input.
    AnyBraceUnclosed,
    /// A label the dispatcher does not know.
    AnyUnknownLabel,
    /// A value that should be an integer but is not.
    AnyInvalidInteger,
    /// A value of the wrong shape for its label.
    AnyUnexpectedValue,
    /// A quoted value with no closing quote.
    AnyUnmatchedQuote,
    /// A label that is still accepted but deprecated.
    AnyDeprecatedProperty,
    /// A `$include` glob that matched nothing.
    AnyIncludeNoMatch,
    /// A `<Section` opener without a closing `>`.
    HttpdMalformedSection,
    /// A section still open at end of input or when an outer section closed.
    HttpdUnclosedSection,
    /// A `</Section>` with no matching opener.
    HttpdUnexpectedSectionClose,
    /// A directive argument with no closing quote.
    HttpdUnmatchedQuote,
    /// An `Include` that matched nothing.
    HttpdIncludeFailed,
}

impl SyntaxFault {
    /// All faults, in declaration order.
    pub const ALL: [SyntaxFault; 13] = [
        Self::AnyBraceMissing,
        Self::AnyBraceUnclosed,
        Self::AnyUnknownLabel,
        Self::AnyInvalidInteger,
        Self::AnyUnexpectedValue,
        Self::AnyUnmatchedQuote,
        Self::AnyDeprecatedProperty,
        Self::AnyIncludeNoMatch,
        Self::HttpdMalformedSection,
        Self::HttpdUnclosedSection,
        Self::HttpdUnexpectedSectionClose,
        Self::HttpdUnmatchedQuote,
        Self::HttpdIncludeFailed,
    ];

    /// Returns the rule id reported for this fault.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::AnyBraceMissing => "any-brace-missing",
            Self::AnyBraceUnclosed => "any-brace-unclosed",
            Self::AnyUnknownLabel => "any-unknown-label",
            Self::AnyInvalidInteger => "any-invalid-integer",
            Self::AnyUnexpectedValue => "any-unexpected-value",
            Self::AnyUnmatchedQuote => "any-unmatched-quote",
            Self::AnyDeprecatedProperty => "any-deprecated-property",
            Self::AnyIncludeNoMatch => "any-include-no-match",
            Self::HttpdMalformedSection => "httpd-malformed-section",
            Self::HttpdUnclosedSection => "httpd-unclosed-section",
            Self::HttpdUnexpectedSectionClose => "httpd-unexpected-section-close",
            Self::HttpdUnmatchedQuote => "httpd-unmatched-quote",
            Self::HttpdIncludeFailed => "httpd-include-failed",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::AnyBraceMissing => "Every label must be followed by a value or a block",
            Self::AnyBraceUnclosed => "Every opened block must be closed",
            Self::AnyUnknownLabel => "Only known dispatcher properties may be used",
            Self::AnyInvalidInteger => "Numeric properties must hold integers",
            Self::AnyUnexpectedValue => "Property values must have the expected shape",
            Self::AnyUnmatchedQuote => "Quoted values must be closed",
            Self::AnyDeprecatedProperty => "Deprecated properties should be replaced",
            Self::AnyIncludeNoMatch => "Include patterns should match at least one file",
            Self::HttpdMalformedSection => "Section openers must end with '>'",
            Self::HttpdUnclosedSection => "Every opened section must be closed",
            Self::HttpdUnexpectedSectionClose => "Section closers must match an open section",
            Self::HttpdUnmatchedQuote => "Quoted arguments must be closed",
            Self::HttpdIncludeFailed => "Include directives must match at least one file",
        }
    }

    fn severity(self) -> Severity {
        match self {
            Self::AnyDeprecatedProperty | Self::AnyIncludeNoMatch => Severity::Minor,
            Self::HttpdIncludeFailed | Self::AnyUnknownLabel => Severity::Major,
            _ => Severity::Critical,
        }
    }

    fn element(self) -> &'static str {
        if self.id().starts_with("httpd") {
            "httpd"
        } else {
            "farm"
        }
    }

    /// Returns the shared built-in rule for this fault.
    #[must_use]
    pub fn rule(self) -> Arc<AnalyzerRule> {
        static RULES: OnceLock<Vec<Arc<AnalyzerRule>>> = OnceLock::new();
        let rules = RULES.get_or_init(|| {
            Self::ALL
                .iter()
                .map(|fault| {
                    Arc::new(
                        AnalyzerRule::new(fault.id(), fault.element())
                            .with_description(fault.description())
                            .with_severity(fault.severity())
                            .with_rule_type(RuleType::Bug)
                            .with_tags(vec!["syntax".to_string()])
                            .with_origin("built-in"),
                    )
                })
                .collect()
        });
        Arc::clone(&rules[self as usize])
    }
}

/// Caller-owned accumulator for parse-time violations.
///
/// One accumulator is threaded through a single parse, so concurrent
/// parses never share state.
#[derive(Debug, Default)]
pub struct ConfigurationViolations {
    violations: Vec<Violation>,
}

impl ConfigurationViolations {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a syntax fault.
    pub fn add(&mut self, fault: SyntaxFault, context: impl Into<String>, source: &ConfigurationSource) {
        let context = context.into();
        debug!("{} at {}: {}", fault.id(), source, context);
        self.violations
            .push(Violation::new(fault.rule(), context, Some(source.clone())));
    }

    /// Returns the number of recorded violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns the recorded violations in order.
    #[must_use]
    pub fn as_slice(&self) -> &[Violation] {
        &self.violations
    }

    /// Consumes the accumulator.
    #[must_use]
    pub fn into_vec(self) -> Vec<Violation> {
        self.violations
    }
}
