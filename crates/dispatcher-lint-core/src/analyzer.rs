//! Analyzer facade: parse each configured dialect, run the rules, reduce.

use crate::aggregate::reduce;
use crate::config::{Config, ConfigError};
use crate::dispatcher::{DispatcherConfiguration, DispatcherConfigurationFactory};
use crate::engine::{ConfigurationTree, EvaluationError, RuleEngine};
use crate::httpd::{HttpdConfiguration, HttpdConfigurationFactory};
use crate::include::{ConfigurationSyntaxError, IncludeLimits};
use crate::rules::{AnalyzerRuleList, LoadRulesError};
use crate::types::{ConfigurationParseResults, Severity, Violation, ViolationVerbosity};

use miette::Diagnostic;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort an analysis.
#[derive(Debug, Error, Diagnostic)]
pub enum AnalyzerError {
    /// A configuration could not be parsed at all.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] ConfigurationSyntaxError),

    /// A rule could not be evaluated.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Evaluation(#[from] EvaluationError),

    /// Tool configuration error.
    #[error("Configuration error: {0}")]
    #[diagnostic(code(dispatcher_lint::config))]
    Config(#[from] ConfigError),

    /// A rule source could not be loaded.
    #[error("Rule loading error: {0}")]
    #[diagnostic(code(dispatcher_lint::rules))]
    Rules(#[from] LoadRulesError),

    /// Neither a dispatcher nor an HTTPD entry file was given.
    #[error("no entry file configured")]
    #[diagnostic(
        code(dispatcher_lint::no_entry),
        help("set `dispatcher_entry` or `httpd_entry` under [analyzer]")
    )]
    NothingToAnalyze,
}

/// Builder for configuring an [`Analyzer`].
#[derive(Debug, Default)]
pub struct AnalyzerBuilder {
    repo: Option<PathBuf>,
    dispatcher_entry: Option<String>,
    httpd_entry: Option<String>,
    server_root: Option<PathBuf>,
    limits: Option<IncludeLimits>,
    verbosity: Option<ViolationVerbosity>,
    rules: Option<Arc<AnalyzerRuleList>>,
    config: Option<Config>,
}

impl AnalyzerBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the repository root.
    #[must_use]
    pub fn repo(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo = Some(path.into());
        self
    }

    /// Sets the dispatcher entry file, relative to the repository root.
    #[must_use]
    pub fn dispatcher_entry(mut self, entry: impl Into<String>) -> Self {
        self.dispatcher_entry = Some(entry.into());
        self
    }

    /// Sets the HTTPD entry file, relative to the repository root.
    #[must_use]
    pub fn httpd_entry(mut self, entry: impl Into<String>) -> Self {
        self.httpd_entry = Some(entry.into());
        self
    }

    /// Sets the directory relative HTTPD includes resolve against.
    #[must_use]
    pub fn server_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.server_root = Some(path.into());
        self
    }

    /// Overrides the include limits.
    #[must_use]
    pub fn limits(mut self, limits: IncludeLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Sets the reporting verbosity.
    #[must_use]
    pub fn verbosity(mut self, verbosity: ViolationVerbosity) -> Self {
        self.verbosity = Some(verbosity);
        self
    }

    /// Sets the shared rule list.
    #[must_use]
    pub fn rules(mut self, rules: Arc<AnalyzerRuleList>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Sets the configuration. Explicit builder settings take precedence.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the analyzer.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository root doesn't exist or no entry
    /// file is configured.
    pub fn build(self) -> Result<Analyzer, AnalyzerError> {
        let config = self.config.unwrap_or_default();
        let repo = self.repo.unwrap_or_else(|| config.analyzer.repo.clone());
        if !repo.is_dir() {
            return Err(ConfigurationSyntaxError::RepositoryMissing { path: repo }.into());
        }

        let dispatcher_entry = self
            .dispatcher_entry
            .or_else(|| config.analyzer.dispatcher_entry.clone());
        let httpd_entry = self.httpd_entry.or_else(|| config.analyzer.httpd_entry.clone());
        if dispatcher_entry.is_none() && httpd_entry.is_none() {
            return Err(AnalyzerError::NothingToAnalyze);
        }

        let server_root = self.server_root.or_else(|| config.analyzer.server_root.clone());

        let rules = self.rules.unwrap_or_else(|| {
            warn!("No rule list given, only syntax violations will be reported");
            Arc::new(AnalyzerRuleList::empty())
        });

        Ok(Analyzer {
            repo,
            dispatcher_entry,
            httpd_entry,
            server_root,
            limits: self.limits.unwrap_or_else(|| config.limits()),
            verbosity: self.verbosity.unwrap_or(config.analyzer.verbosity),
            rules,
        })
    }
}

/// Runs both dialect parsers and the rule engine over one repository.
///
/// Use [`Analyzer::builder()`] to construct an instance. An analyzer holds
/// no mutable state, so one instance may serve concurrent callers.
#[derive(Debug, Clone)]
pub struct Analyzer {
    repo: PathBuf,
    dispatcher_entry: Option<String>,
    httpd_entry: Option<String>,
    server_root: Option<PathBuf>,
    limits: IncludeLimits,
    verbosity: ViolationVerbosity,
    rules: Arc<AnalyzerRuleList>,
}

impl Analyzer {
    /// Creates a new builder for configuring an analyzer.
    #[must_use]
    pub fn builder() -> AnalyzerBuilder {
        AnalyzerBuilder::new()
    }

    /// Returns the repository root being analyzed.
    #[must_use]
    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Returns the shared rule list.
    #[must_use]
    pub fn rules(&self) -> &AnalyzerRuleList {
        &self.rules
    }

    /// Returns the reporting verbosity.
    #[must_use]
    pub fn verbosity(&self) -> ViolationVerbosity {
        self.verbosity
    }

    /// Parses every configured entry and evaluates the rules against it.
    ///
    /// Syntax violations from parsing come first, followed by rule
    /// violations, dispatcher before HTTPD.
    ///
    /// # Errors
    ///
    /// Returns an error for a fatal parse failure or a rule that cannot be
    /// evaluated.
    pub fn analyze(&self) -> Result<AnalysisResult, AnalyzerError> {
        info!("Starting analysis at {}", self.repo.display());
        let engine = RuleEngine::new(&self.rules);
        let mut violations = Vec::new();

        let dispatcher = match &self.dispatcher_entry {
            Some(entry) => {
                let parsed = DispatcherConfigurationFactory::new(&self.repo)
                    .with_limits(self.limits)
                    .parse(entry)?;
                violations.extend_from_slice(parsed.raw_violations());
                violations.extend(engine.evaluate(ConfigurationTree::Dispatcher(parsed.configuration()))?);
                Some(parsed)
            }
            None => None,
        };

        let httpd = match &self.httpd_entry {
            Some(entry) => {
                let mut factory = HttpdConfigurationFactory::new(&self.repo).with_limits(self.limits);
                if let Some(server_root) = &self.server_root {
                    factory = factory.with_server_root(server_root);
                }
                let parsed = factory.parse(entry)?;
                violations.extend_from_slice(parsed.raw_violations());
                violations.extend(engine.evaluate(ConfigurationTree::Httpd(parsed.configuration()))?);
                Some(parsed)
            }
            None => None,
        };

        let total = violations.len();
        let violations = reduce(violations, self.verbosity);
        debug!("Reduced {} violation(s) to {}", total, violations.len());
        info!("Analysis complete: {} violation(s)", violations.len());

        Ok(AnalysisResult {
            dispatcher,
            httpd,
            violations,
            verbosity: self.verbosity,
        })
    }
}

/// The outcome of one [`Analyzer::analyze`] run.
#[derive(Debug)]
pub struct AnalysisResult {
    /// Dispatcher parse results, when a dispatcher entry was configured.
    pub dispatcher: Option<ConfigurationParseResults<DispatcherConfiguration>>,
    /// HTTPD parse results, when an HTTPD entry was configured.
    pub httpd: Option<ConfigurationParseResults<HttpdConfiguration>>,
    /// Syntax and rule violations, reduced at `verbosity`.
    pub violations: Vec<Violation>,
    /// The verbosity the violations were reduced at.
    pub verbosity: ViolationVerbosity,
}

impl AnalysisResult {
    /// Returns true if any violation is at or above `severity`.
    #[must_use]
    pub fn has_violations_at(&self, severity: Severity) -> bool {
        self.violations.iter().any(|v| v.severity() >= severity)
    }

    /// Returns violations with exactly the given severity.
    #[must_use]
    pub fn by_severity(&self, severity: Severity) -> Vec<&Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity() == severity)
            .collect()
    }

    /// Counts occurrences per severity, weighting counted violations.
    #[must_use]
    pub fn count_by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for v in &self.violations {
            *counts.entry(v.severity()).or_insert(0) += v.occurrences();
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{AnalyzerRule, Check, Condition, MergeMode};
    use std::fs;
    use tempfile::TempDir;

    fn repo(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn statfileslevel_rule() -> Arc<AnalyzerRuleList> {
        Arc::new(AnalyzerRuleList::new(
            MergeMode::Extend,
            vec![AnalyzerRule::new("statfileslevel-minimum", "farm.cache.statfileslevel")
                .with_severity(Severity::Minor)
                .with_check(Check::new(Condition::IntegerGreaterOrEqual(2)))],
        ))
    }

    #[test]
    fn missing_repository_is_fatal() {
        let err = Analyzer::builder()
            .repo("/no/such/repository")
            .dispatcher_entry("dispatcher.any")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::Syntax(ConfigurationSyntaxError::RepositoryMissing { .. })
        ));
    }

    #[test]
    fn an_entry_is_required() {
        let dir = repo(&[]);
        let err = Analyzer::builder().repo(dir.path()).build().unwrap_err();
        assert!(matches!(err, AnalyzerError::NothingToAnalyze));
    }

    #[test]
    fn config_supplies_defaults() {
        let dir = repo(&[("conf/dispatcher.any", "/farms { }")]);
        let mut config = Config::default();
        config.analyzer.repo = dir.path().to_path_buf();
        config.analyzer.dispatcher_entry = Some("conf/dispatcher.any".into());
        config.analyzer.verbosity = ViolationVerbosity::Full;

        let analyzer = Analyzer::builder().config(config).build().unwrap();
        assert_eq!(analyzer.repo(), dir.path());
        assert_eq!(analyzer.verbosity(), ViolationVerbosity::Full);
        assert!(analyzer.rules().is_empty());
    }

    #[test]
    fn parse_and_rule_violations_are_combined() {
        let dir = repo(&[(
            "dispatcher.any",
            "/farms {\n/publish { /cache { /statfileslevel \"0\" } }\n/publishb { /cache { /statfileslevel \"1\" } /bogus \"x\" }\n}\n",
        )]);
        let result = Analyzer::builder()
            .repo(dir.path())
            .dispatcher_entry("dispatcher.any")
            .rules(statfileslevel_rule())
            .verbosity(ViolationVerbosity::Full)
            .build()
            .unwrap()
            .analyze()
            .unwrap();

        let ids: Vec<&str> = result.violations.iter().map(|v| v.analyzer_rule().id()).collect();
        assert_eq!(
            ids,
            vec!["any-unknown-label", "statfileslevel-minimum", "statfileslevel-minimum"]
        );
        assert!(result.dispatcher.is_some());
        assert!(result.httpd.is_none());
        assert!(result.has_violations_at(Severity::Minor));
        assert!(!result.has_violations_at(Severity::Critical));
    }

    #[test]
    fn minimized_counts_survive_in_totals() {
        let dir = repo(&[(
            "dispatcher.any",
            "/farms {\n/a { /cache { /statfileslevel \"0\" } }\n/b { /cache { /statfileslevel \"0\" } }\n}\n",
        )]);
        let result = Analyzer::builder()
            .repo(dir.path())
            .dispatcher_entry("dispatcher.any")
            .rules(statfileslevel_rule())
            .verbosity(ViolationVerbosity::Minimized)
            .build()
            .unwrap()
            .analyze()
            .unwrap();

        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.count_by_severity().get(&Severity::Minor), Some(&2));
        assert_eq!(result.by_severity(Severity::Minor).len(), 1);
    }

    #[test]
    fn httpd_entry_uses_repo_relative_server_root() {
        let dir = repo(&[
            ("conf/httpd.conf", "Include conf.d/*.conf\n"),
            ("conf.d/vhost.conf", "<VirtualHost *:80>\n</VirtualHost>\n"),
        ]);
        let result = Analyzer::builder()
            .repo(dir.path())
            .httpd_entry("conf/httpd.conf")
            .server_root(".")
            .build()
            .unwrap()
            .analyze()
            .unwrap();

        let httpd = result.httpd.unwrap();
        assert_eq!(httpd.configuration().len(), 2);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn missing_entry_file_is_fatal() {
        let dir = repo(&[]);
        let err = Analyzer::builder()
            .repo(dir.path())
            .dispatcher_entry("dispatcher.any")
            .build()
            .unwrap()
            .analyze()
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::Syntax(ConfigurationSyntaxError::EntryMissing { .. })
        ));
    }
}
