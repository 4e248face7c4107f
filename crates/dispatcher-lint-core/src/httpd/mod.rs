//! The Apache HTTPD dialect.

mod model;
mod parser;

pub use model::{Directive, HttpdConfiguration, Section, SectionId, SectionKind, SectionRef};

use crate::include::{ConfigurationSyntaxError, Dialect, IncludeLimits, IncludeResolver};
use crate::types::ConfigurationParseResults;
use crate::violations::ConfigurationViolations;
use std::path::PathBuf;
use tracing::info;

/// Parses HTTPD configurations below a repository root.
#[derive(Debug, Clone)]
pub struct HttpdConfigurationFactory {
    resolver: IncludeResolver,
}

impl HttpdConfigurationFactory {
    /// Creates a factory; includes resolve against the repository root.
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            resolver: IncludeResolver::new(Dialect::Httpd, repo_root),
        }
    }

    /// Sets the directory, relative to the repository root, that relative
    /// `Include` paths resolve against.
    #[must_use]
    pub fn with_server_root(mut self, server_root: impl Into<PathBuf>) -> Self {
        self.resolver = self.resolver.with_server_root(server_root);
        self
    }

    /// Overrides the include limits.
    #[must_use]
    pub fn with_limits(mut self, limits: IncludeLimits) -> Self {
        self.resolver = self.resolver.with_limits(limits);
        self
    }

    /// Parses the entry file, given relative to the repository root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationSyntaxError`] when the entry cannot be read or
    /// include limits are exceeded.
    pub fn parse(
        &self,
        entry: &str,
    ) -> Result<ConfigurationParseResults<HttpdConfiguration>, ConfigurationSyntaxError> {
        let mut violations = ConfigurationViolations::new();
        let lines = self.resolver.resolve_file(entry, &mut violations)?;
        let configuration = parser::parse(&lines, &mut violations);
        info!(
            "Parsed {}: {} section(s), {} syntax violation(s)",
            entry,
            configuration.len() - 1,
            violations.len()
        );
        Ok(ConfigurationParseResults::new(configuration, violations.into_vec()))
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
    ) -> Result<ConfigurationParseResults<HttpdConfiguration>, ConfigurationSyntaxError> {
        let mut violations = ConfigurationViolations::new();
        let lines = self.resolver.resolve(raw, file_name, &mut violations)?;
        let configuration = parser::parse(&lines, &mut violations);
        Ok(ConfigurationParseResults::new(configuration, violations.into_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ViolationVerbosity;

    fn parse(raw: &str) -> ConfigurationParseResults<HttpdConfiguration> {
        HttpdConfigurationFactory::new(".").parse_str(raw, "conf/httpd.conf").unwrap()
    }

    fn ids(results: &ConfigurationParseResults<HttpdConfiguration>) -> Vec<String> {
        results
            .violations(ViolationVerbosity::Full)
            .iter()
            .map(|v| v.analyzer_rule().id().to_string())
            .collect()
    }

    #[test]
    fn builds_nested_sections() {
        let results = parse(
            "ServerRoot \"/etc/httpd\"\n\
             <VirtualHost *:80>\n\
               DocumentRoot /var/www\n\
               <Directory \"/\">\n\
                 Options None\n\
               </Directory>\n\
             </VirtualHost>\n",
        );
        assert!(ids(&results).is_empty());
        let config = results.configuration();
        let vhost = config.root().children().next().unwrap();
        assert_eq!(vhost.kind(), SectionKind::VirtualHost);
        assert_eq!(vhost.arguments(), ["*:80".to_string()]);
        let dir = vhost.children().next().unwrap();
        assert_eq!(dir.arguments(), ["/".to_string()]);
        assert_eq!(dir.source().line_number(), Some(4));
        assert_eq!(
            dir.effective_directive("DOCUMENTROOT").unwrap().source().line_number(),
            Some(3)
        );
        assert_eq!(config.root().directives()[0].arguments(), ["/etc/httpd".to_string()]);
    }

    #[test]
    fn recovers_from_section_faults() {
        let results = parse(
            "<VirtualHost *:80\n\
             </Location>\n\
             <VirtualHost *:443>\n\
             <Directory />\n\
             </VirtualHost>\n\
             <IfModule mod_x.c>\n",
        );
        assert_eq!(
            ids(&results),
            vec![
                "httpd-malformed-section",
                "httpd-unexpected-section-close",
                "httpd-unclosed-section",
                "httpd-unclosed-section",
            ]
        );
        let config = results.configuration();
        assert_eq!(config.root().children().count(), 2);
    }

    #[test]
    fn section_names_match_case_insensitively() {
        let results = parse("<directory /srv>\nRequire all denied\n</DIRECTORY>\n");
        assert!(ids(&results).is_empty());
        let dir = results.configuration().root().children().next().unwrap();
        assert_eq!(dir.kind(), SectionKind::Directory);
        assert_eq!(dir.directives()[0].to_string(), "Require all denied");
    }
}
