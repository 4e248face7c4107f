//! Rule evaluation over parsed configuration trees.

mod check;
mod target;

pub use check::CheckResult;
pub use target::{locate_in_farm, select_sections, CheckTarget};

use crate::dispatcher::{DispatcherConfiguration, Farm};
use crate::httpd::HttpdConfiguration;
use crate::include::Dialect;
use crate::rules::{AnalyzerRule, AnalyzerRuleList};
use crate::source::ConfigurationSource;
use crate::types::Violation;
use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Why a rule could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationErrorKind {
    /// The element path does not name anything.
    #[error("unknown element")]
    UnknownElement,
    /// The element path's first token is not the dialect's root.
    #[error("element must start with `{expected}`")]
    WrongRoot {
        /// The expected root token.
        expected: &'static str,
    },
    /// A path token after the second position is unknown.
    #[error("unknown path token `{token}`")]
    UnknownPathToken {
        /// The offending token.
        token: String,
    },
    /// The condition does not apply to the located target.
    #[error("{condition} cannot be applied to a {target}")]
    IncompatibleTarget {
        /// Condition name.
        condition: &'static str,
        /// Target kind.
        target: &'static str,
    },
}

/// A rule whose definition does not fit the configuration model.
///
/// These are rule-authoring mistakes, not configuration findings, so they
/// abort evaluation instead of becoming violations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("rule `{rule}` (element `{element}`): {kind}")]
#[diagnostic(code(dispatcher_lint::evaluation), help("fix the rule definition"))]
pub struct EvaluationError {
    /// Rule id.
    pub rule: String,
    /// The rule's element path.
    pub element: String,
    /// What went wrong.
    pub kind: EvaluationErrorKind,
}

impl EvaluationError {
    fn new(rule: &AnalyzerRule, kind: EvaluationErrorKind) -> Self {
        Self {
            rule: rule.id().to_string(),
            element: rule.element().to_string(),
            kind,
        }
    }
}

/// A parsed tree handed to the engine.
#[derive(Debug, Clone, Copy)]
pub enum ConfigurationTree<'a> {
    /// A dispatcher configuration.
    Dispatcher(&'a DispatcherConfiguration),
    /// An HTTPD configuration.
    Httpd(&'a HttpdConfiguration),
}

impl ConfigurationTree<'_> {
    fn dialect(self) -> Dialect {
        match self {
            Self::Dispatcher(_) => Dialect::Any,
            Self::Httpd(_) => Dialect::Httpd,
        }
    }
}

/// Evaluates a shared rule list against configuration trees.
#[derive(Debug, Clone, Copy)]
pub struct RuleEngine<'r> {
    rules: &'r AnalyzerRuleList,
}

impl<'r> RuleEngine<'r> {
    /// Creates an engine over the given rules.
    #[must_use]
    pub fn new(rules: &'r AnalyzerRuleList) -> Self {
        Self { rules }
    }

    /// Runs every enabled rule for the tree's dialect.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] for a rule whose element or conditions
    /// cannot be evaluated.
    pub fn evaluate(&self, tree: ConfigurationTree<'_>) -> Result<Vec<Violation>, EvaluationError> {
        let mut violations = Vec::new();
        for rule in self.rules.enabled_rules() {
            match rule.dialect() {
                Some(dialect) if dialect == tree.dialect() => {}
                Some(_) => continue,
                None => {
                    return Err(EvaluationError::new(
                        rule,
                        EvaluationErrorKind::WrongRoot {
                            expected: tree.dialect().root_token(),
                        },
                    ))
                }
            }
            let before = violations.len();
            match tree {
                ConfigurationTree::Dispatcher(config) => evaluate_dispatcher(rule, config, &mut violations)?,
                ConfigurationTree::Httpd(config) => evaluate_httpd(rule, config, &mut violations)?,
            }
            debug!("Rule {} produced {} violation(s)", rule.id(), violations.len() - before);
        }
        Ok(violations)
    }
}

fn evaluate_dispatcher(
    rule: &Arc<AnalyzerRule>,
    config: &DispatcherConfiguration,
    violations: &mut Vec<Violation>,
) -> Result<(), EvaluationError> {
    let farms: Vec<&Farm> = config
        .farms
        .iter()
        .filter(|f| rule.applies_to(f.farm_type()))
        .collect();
    if farms.is_empty() {
        return Ok(());
    }

    if rule.is_multi_target() {
        let fallback = farms.first().map(|f| f.source().clone());
        let target = CheckTarget::Farms(farms);
        if let Some(v) = run_checks(rule, &target, fallback.as_ref())? {
            violations.push(v);
        }
        return Ok(());
    }

    for farm in farms {
        let target = locate_in_farm(farm, rule.element()).map_err(|kind| EvaluationError::new(rule, kind))?;
        if let Some(v) = run_checks(rule, &target, Some(farm.source()))? {
            violations.push(v);
        }
    }
    Ok(())
}

fn evaluate_httpd(
    rule: &Arc<AnalyzerRule>,
    config: &HttpdConfiguration,
    violations: &mut Vec<Violation>,
) -> Result<(), EvaluationError> {
    let sections = select_sections(config, rule.element()).map_err(|kind| EvaluationError::new(rule, kind))?;
    for id in sections {
        let section = config.section(id);
        if let Some(v) = run_checks(rule, &CheckTarget::Section(section), Some(section.source()))? {
            violations.push(v);
        }
    }
    Ok(())
}

/// Runs the rule's checks in order; the first failure becomes the violation.
fn run_checks(
    rule: &Arc<AnalyzerRule>,
    target: &CheckTarget<'_>,
    fallback: Option<&ConfigurationSource>,
) -> Result<Option<Violation>, EvaluationError> {
    for check in rule.checks() {
        let result = check
            .perform_check(target)
            .map_err(|kind| EvaluationError::new(rule, kind))?;
        if result.passed {
            continue;
        }
        let context = [Some(rule.element()), check.context(), Some(result.details.as_str())]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(": ");
        let source = result.source.or_else(|| fallback.cloned());
        return Ok(Some(Violation::new(Arc::clone(rule), context, source)));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatcherConfigurationFactory;
    use crate::httpd::HttpdConfigurationFactory;
    use crate::rules::{Check, Condition, DirectivePattern, MergeMode, RulePattern};
    use crate::types::FarmType;

    fn dispatcher(raw: &str) -> DispatcherConfiguration {
        DispatcherConfigurationFactory::new(".")
            .parse_str(raw, "dispatcher.any")
            .unwrap()
            .into_parts()
            .0
    }

    fn list(rules: Vec<AnalyzerRule>) -> AnalyzerRuleList {
        AnalyzerRuleList::new(MergeMode::Extend, rules)
    }

    const TWO_FARMS: &str = "/farms {\n\
        /publish { /cache { /statfileslevel \"0\" } }\n\
        /author { /cache { /statfileslevel \"0\" } }\n\
        /publish { }\n\
    }";

    #[test]
    fn farm_type_filter_and_first_failure() {
        let config = dispatcher(TWO_FARMS);
        let rule = AnalyzerRule::new("statfileslevel", "farm.cache.statfileslevel")
            .with_farm_types([FarmType::Publish])
            .with_check(Check::new(Condition::IntegerGreaterOrEqual(2)).with_context("invalidation is too coarse"))
            .with_check(Check::new(Condition::IntegerLessOrEqual(-1)));
        let rules = list(vec![rule]);
        let violations = RuleEngine::new(&rules).evaluate(ConfigurationTree::Dispatcher(&config)).unwrap();

        assert_eq!(violations.len(), 2);
        assert_eq!(
            violations[0].context(),
            "farm.cache.statfileslevel: invalidation is too coarse: expected value to be at least 2; found 0"
        );
        assert_eq!(violations[0].configuration_source().unwrap().line_number(), Some(2));
        // Missing cache falls back to the farm's own line.
        assert_eq!(violations[1].configuration_source().unwrap().line_number(), Some(4));
    }

    #[test]
    fn multi_target_rule_yields_single_violation() {
        let config = dispatcher(TWO_FARMS);
        let rule = AnalyzerRule::new("unique-farm-labels", "farm").with_check(Check::new(Condition::IsUniqueLabel));
        let rules = list(vec![rule]);
        let violations = RuleEngine::new(&rules).evaluate(ConfigurationTree::Dispatcher(&config)).unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].context().ends_with("found duplicate label(s) publish"));
        assert_eq!(violations[0].configuration_source().unwrap().line_number(), Some(4));
    }

    #[test]
    fn disabled_and_other_dialect_rules_are_skipped() {
        let config = dispatcher(TWO_FARMS);
        let rules = list(vec![
            AnalyzerRule::new("off", "farm.cache")
                .with_enabled(false)
                .with_check(Check::new(Condition::IsPresent).with_fail_if(true)),
            AnalyzerRule::new("httpd-only", "httpd.vhost").with_check(Check::new(Condition::HasDirective(
                DirectivePattern {
                    name: "DocumentRoot".into(),
                    arguments: vec![],
                },
            ))),
        ]);
        let violations = RuleEngine::new(&rules).evaluate(ConfigurationTree::Dispatcher(&config)).unwrap();
        assert!(violations.is_empty());
    }

    #[test]
    fn unknown_element_aborts_evaluation() {
        let config = dispatcher(TWO_FARMS);
        let rules = list(vec![AnalyzerRule::new("bad", "farm.cache.nope").with_check(Check::new(Condition::IsPresent))]);
        let err = RuleEngine::new(&rules)
            .evaluate(ConfigurationTree::Dispatcher(&config))
            .unwrap_err();
        assert_eq!(err.kind, EvaluationErrorKind::UnknownElement);
        assert_eq!(err.rule, "bad");
    }

    #[test]
    fn rule_list_check_against_missing_list() {
        let config = dispatcher("/farms { /publish { } }");
        let rules = list(vec![AnalyzerRule::new("deny-first", "farm.cache.rules").with_check(Check::new(
            Condition::RuleListStartsWith(RulePattern {
                rule_type: Some("deny".into()),
                glob: Some("*".into()),
            }),
        ))]);
        let violations = RuleEngine::new(&rules).evaluate(ConfigurationTree::Dispatcher(&config)).unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].context().ends_with("found nothing configured"));
    }

    #[test]
    fn httpd_rule_targets_each_section() {
        let config = HttpdConfigurationFactory::new(".")
            .parse_str(
                "<VirtualHost *:80>\nDocumentRoot /a\n</VirtualHost>\n<VirtualHost *:81>\n</VirtualHost>\n",
                "httpd.conf",
            )
            .unwrap()
            .into_parts()
            .0;
        let rules = list(vec![AnalyzerRule::new("vhost-document-root", "httpd.vhost").with_check(
            Check::new(Condition::HasDirective(DirectivePattern {
                name: "DocumentRoot".into(),
                arguments: vec![],
            })),
        )]);
        let violations = RuleEngine::new(&rules).evaluate(ConfigurationTree::Httpd(&config)).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].configuration_source().unwrap().line_number(), Some(4));
    }
}
