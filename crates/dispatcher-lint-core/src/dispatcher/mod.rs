//! The dispatcher ANY dialect.
//!
//! Parsing runs in three stages: include resolution, tokenizing into an
//! untyped block tree, and decoding into [`DispatcherConfiguration`].

mod model;
mod parser;
mod reader;

pub use model::{Cache, DispatcherConfiguration, Farm, Filter, Render, Rule};

use crate::include::{ConfigurationSyntaxError, Dialect, IncludeLimits, IncludeResolver};
use crate::source::ConfigurationLine;
use crate::types::ConfigurationParseResults;
use crate::violations::ConfigurationViolations;
use std::path::PathBuf;
use tracing::info;

/// Parses dispatcher configurations below a repository root.
#[derive(Debug, Clone)]
pub struct DispatcherConfigurationFactory {
    resolver: IncludeResolver,
}

impl DispatcherConfigurationFactory {
    /// Creates a factory for the given repository root.
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            resolver: IncludeResolver::new(Dialect::Any, repo_root),
        }
    }

    /// Overrides the include limits.
    #[must_use]
    pub fn with_limits(mut self, limits: IncludeLimits) -> Self {
        self.resolver = self.resolver.with_limits(limits);
        self
    }

    /// Enables or disables the Windows symlink rewrite.
    #[must_use]
    pub fn with_symlink_workaround(mut self, enabled: bool) -> Self {
        self.resolver = self.resolver.with_symlink_workaround(enabled);
        self
    }

    /// Parses the entry file, given relative to the repository root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationSyntaxError`] when the entry cannot be read or
    /// include expansion fails. Recoverable faults are reported in the
    /// result's violations instead.
    pub fn parse(
        &self,
        entry: &str,
    ) -> Result<ConfigurationParseResults<DispatcherConfiguration>, ConfigurationSyntaxError> {
        let mut violations = ConfigurationViolations::new();
        let lines = self.resolver.resolve_file(entry, &mut violations)?;
        Ok(Self::build(&lines, violations, entry))
    }

    /// Parses in-memory text attributed to `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationSyntaxError`] when include expansion fails.
    pub fn parse_str(
        &self,
        raw: &str,
        file_name: &str,
    ) -> Result<ConfigurationParseResults<DispatcherConfiguration>, ConfigurationSyntaxError> {
        let mut violations = ConfigurationViolations::new();
        let lines = self.resolver.resolve(raw, file_name, &mut violations)?;
        Ok(Self::build(&lines, violations, file_name))
    }

    fn build(
        lines: &[ConfigurationLine],
        mut violations: ConfigurationViolations,
        entry: &str,
    ) -> ConfigurationParseResults<DispatcherConfiguration> {
        let tokens = reader::tokenize(lines, &mut violations);
        let tree = reader::build_tree(tokens, &mut violations);
        let configuration = parser::Decoder::new(&mut violations).configuration(&tree);
        info!(
            "Parsed {}: {} farm(s), {} syntax violation(s)",
            entry,
            configuration.farms.len(),
            violations.len()
        );
        ConfigurationParseResults::new(configuration, violations.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FarmType, ViolationVerbosity};

    const SAMPLE: &str = r#"
/name "sample"
/ignoreEINTR "1"
/farms {
  /publishfarm {
    /clientheaders { "*" }
    /virtualhosts { "*" }
    /renders {
      /rend01 { /hostname "127.0.0.1" /port "4503" /timeout "10000" }
    }
    /filter {
      /0001 { /type "deny" /url "*" }
      /0002 { /type "allow" /url "/content/*" }
    }
    /cache {
      /docroot "${DOCROOT}"
      /statfileslevel "2"
      /serveStaleOnError "1"
      /rules {
        /0000 { /glob "*" /type "deny" }
      }
      /headers { "Cache-Control" "Expires" }
    }
    /retryDelay "1"
    /failover "0"
  }
  /authorfarm {
    /cache { /statfileslevel "many" }
    /homepage "/index.html"
    /bogus "1"
  }
}
"#;

    fn ids(results: &ConfigurationParseResults<DispatcherConfiguration>) -> Vec<String> {
        results
            .violations(ViolationVerbosity::Full)
            .iter()
            .map(|v| v.analyzer_rule().id().to_string())
            .collect()
    }

    #[test]
    fn parses_typed_farm_tree() {
        let results = DispatcherConfigurationFactory::new(".")
            .parse_str(SAMPLE, "dispatcher.any")
            .unwrap();
        let config = results.configuration();
        assert_eq!(config.name.as_ref().unwrap().value(), "sample");
        assert_eq!(config.ignore_eintr.as_ref().map(|v| *v.value()), Some(true));
        assert_eq!(config.farms.len(), 2);

        let publish = &config.farms[0];
        assert_eq!(publish.farm_type(), FarmType::Publish);
        assert_eq!(publish.source().line_number(), Some(5));
        let filter = publish.filter.as_ref().unwrap();
        assert_eq!(filter.source().line_number(), Some(11));
        assert_eq!(filter.value()[0].filter_type.as_deref(), Some("deny"));
        assert_eq!(filter.value()[1].url.as_deref(), Some("/content/*"));
        let cache = publish.cache.as_ref().unwrap();
        assert_eq!(*cache.statfileslevel.as_ref().unwrap().value(), 2);
        assert_eq!(cache.docroot.as_ref().unwrap().value(), "${DOCROOT}");
        assert_eq!(cache.rules.as_ref().unwrap().value()[0].glob.as_deref(), Some("*"));
        assert_eq!(
            cache.headers.as_ref().unwrap().value(),
            &vec!["Cache-Control".to_string(), "Expires".to_string()]
        );
        assert_eq!(publish.renders.as_ref().unwrap().value()[0].timeout, Some(10000));
        assert_eq!(publish.failover.as_ref().map(|v| *v.value()), Some(false));

        assert_eq!(config.farms[1].farm_type(), FarmType::Author);
    }

    #[test]
    fn recoverable_faults_become_violations() {
        let results = DispatcherConfigurationFactory::new(".")
            .parse_str(SAMPLE, "dispatcher.any")
            .unwrap();
        assert_eq!(
            ids(&results),
            vec!["any-invalid-integer", "any-deprecated-property", "any-unknown-label"]
        );
        let author_cache = results.configuration().farms[1].cache.as_ref().unwrap();
        assert_eq!(*author_cache.statfileslevel.as_ref().unwrap().value(), 0);
    }

    #[test]
    fn deprecated_filter_glob_is_reported() {
        let raw = "/farms { /f { /filter { /0001 { /type \"deny\" /glob \"*\" } } } }";
        let results = DispatcherConfigurationFactory::new(".")
            .parse_str(raw, "dispatcher.any")
            .unwrap();
        assert_eq!(ids(&results), vec!["any-deprecated-property"]);
        let filter = results.configuration().farms[0].filter.as_ref().unwrap();
        assert_eq!(filter.value()[0].glob.as_deref(), Some("*"));
    }

    #[test]
    fn quoted_and_bare_values_decode_alike() {
        let raw = "/farms { /f {\n/filter {\n/0001 { /type \"deny\" /url '*' }\n/0002 { /type allow /url \"/content/*\" }\n}\n/cache { /docroot \"/var/www\" /rules { /0 { /type 'allow' /glob * } } }\n} }";
        let results = DispatcherConfigurationFactory::new(".")
            .parse_str(raw, "dispatcher.any")
            .unwrap();
        assert!(results.raw_violations().is_empty());
        let farm = &results.configuration().farms[0];
        let filter = farm.filter.as_ref().unwrap().value();
        assert_eq!(filter[0].field("url"), Some("*"));
        assert_eq!(filter[1].field("type"), Some("allow"));
        assert_eq!(filter[1].url.as_deref(), Some("/content/*"));
        let cache = farm.cache.as_ref().unwrap();
        assert_eq!(cache.docroot.as_ref().unwrap().value(), "/var/www");
        let rule = &cache.rules.as_ref().unwrap().value()[0];
        assert_eq!((rule.rule_type.as_deref(), rule.glob.as_deref()), (Some("allow"), Some("*")));
    }

    #[test]
    fn farm_missing_close_brace_keeps_following_farm() {
        let raw = "/farms {\n/publish {\n/cache {\n/docroot \"x\"\n}\n/author {\n/cache { /docroot \"y\" }\n}\n}";
        let results = DispatcherConfigurationFactory::new(".")
            .parse_str(raw, "dispatcher.any")
            .unwrap();
        let farms = &results.configuration().farms;
        assert_eq!(farms.len(), 2);
        assert_eq!(farms[1].farm_type(), FarmType::Author);
        assert_eq!(farms[1].cache.as_ref().unwrap().docroot.as_ref().unwrap().value(), "y");

        let violations = results.violations(ViolationVerbosity::Full);
        assert_eq!(ids(&results), vec!["any-brace-unclosed"]);
        assert_eq!(
            violations[0].configuration_source().unwrap().line_number(),
            Some(2)
        );
    }

    #[test]
    fn unclosed_farm_still_yields_tree() {
        let raw = "/farms {\n  /publish {\n    /retryDelay \"x\"\n";
        let results = DispatcherConfigurationFactory::new(".")
            .parse_str(raw, "dispatcher.any")
            .unwrap();
        assert_eq!(results.configuration().farms.len(), 1);
        assert_eq!(
            ids(&results),
            vec!["any-brace-unclosed", "any-brace-unclosed", "any-invalid-integer"]
        );
    }

    #[test]
    fn separate_parses_do_not_share_violations() {
        let factory = DispatcherConfigurationFactory::new(".");
        let bad = factory.parse_str("/bogus \"1\"", "a.any").unwrap();
        let good = factory.parse_str("/name \"ok\"", "b.any").unwrap();
        assert_eq!(bad.raw_violations().len(), 1);
        assert!(good.raw_violations().is_empty());
    }
}
