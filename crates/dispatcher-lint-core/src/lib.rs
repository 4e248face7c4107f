//! # dispatcher-lint-core
//!
//! Static analysis for AEM dispatcher (`.any`) and Apache HTTPD
//! configuration repositories.
//!
//! This crate provides the parsing and evaluation pipeline:
//!
//! - [`IncludeResolver`] for flattening include trees with provenance
//! - [`DispatcherConfigurationFactory`] and [`HttpdConfigurationFactory`]
//!   for the two configuration dialects
//! - [`AnalyzerRuleList`] and the JSON rule loader in [`rules`]
//! - [`RuleEngine`] for evaluating rules against parsed trees
//! - [`reduce`] for collapsing repeated violations
//! - [`Analyzer`] for orchestrating all of the above
//!
//! ## Example
//!
//! ```ignore
//! use dispatcher_lint_core::{Analyzer, ViolationVerbosity};
//!
//! let analyzer = Analyzer::builder()
//!     .repo("./dispatcher/src")
//!     .dispatcher_entry("conf.dispatcher.d/dispatcher.any")
//!     .httpd_entry("conf/httpd.conf")
//!     .rules(rules)
//!     .verbosity(ViolationVerbosity::Partial)
//!     .build()?;
//!
//! for violation in analyzer.analyze()?.violations {
//!     println!("{violation}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod aggregate;
mod analyzer;
mod config;
mod include;
mod source;
mod types;
mod violations;

pub mod dispatcher;
pub mod engine;
pub mod httpd;
pub mod rules;

pub use aggregate::reduce;
pub use analyzer::{AnalysisResult, Analyzer, AnalyzerBuilder, AnalyzerError};
pub use config::{AnalyzerConfig, Config, ConfigError, RuleConfig};
pub use dispatcher::{DispatcherConfiguration, DispatcherConfigurationFactory};
pub use engine::{ConfigurationTree, EvaluationError, EvaluationErrorKind, RuleEngine};
pub use httpd::{HttpdConfiguration, HttpdConfigurationFactory};
pub use include::{
    ConfigurationSyntaxError, Dialect, IncludeLimits, IncludeResolver, DEFAULT_MAX_INCLUDE_DEPTH,
    DEFAULT_MAX_LINES,
};
pub use rules::{AnalyzerRule, AnalyzerRuleList, LoadRulesError, MergeMode};
pub use source::{ConfigurationLine, ConfigurationSource, ConfigurationValue};
pub use types::{
    ConfigurationParseResults, FarmType, RuleType, Severity, Violation, ViolationVerbosity,
};
pub use violations::{ConfigurationViolations, SyntaxFault};
