//! Integration test: include trees, both dialects and JSON rules via Analyzer.
//!
//! Uses the repository under `tests/fixtures/repo/` and the rule file under
//! `tests/fixtures/rules/`.

use dispatcher_lint_core::rules::RuleListLoader;
use dispatcher_lint_core::{
    Analyzer, AnalyzerRuleList, ConfigurationSyntaxError, DispatcherConfigurationFactory,
    FarmType, HttpdConfigurationFactory, IncludeLimits, Severity, ViolationVerbosity,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_rules() -> Arc<AnalyzerRuleList> {
    let mut loader = RuleListLoader::new(AnalyzerRuleList::empty());
    loader.merge_folder(&fixtures().join("rules"));
    assert!(loader.skipped().is_empty(), "fixture rules should load");
    Arc::new(loader.finish())
}

fn analyzer(verbosity: ViolationVerbosity) -> Analyzer {
    Analyzer::builder()
        .repo(fixtures().join("repo"))
        .dispatcher_entry("conf.dispatcher.d/dispatcher.any")
        .httpd_entry("conf/httpd.conf")
        .rules(fixture_rules())
        .verbosity(verbosity)
        .build()
        .expect("analyzer should build")
}

// ── Parsing through include trees ──

#[test]
fn dispatcher_farms_come_from_globbed_includes() {
    let results = DispatcherConfigurationFactory::new(fixtures().join("repo"))
        .parse("conf.dispatcher.d/dispatcher.any")
        .expect("fixture should parse");
    assert!(results.raw_violations().is_empty(), "{:#?}", results.raw_violations());

    let config = results.configuration();
    assert_eq!(config.name.as_ref().map(|n| n.value().as_str()), Some("fixture"));
    let labels: Vec<&str> = config.farms.iter().map(|f| f.label.value().as_str()).collect();
    assert_eq!(labels, vec!["publishfarm", "authorfarm"]);
    assert_eq!(config.farms[1].farm_type(), FarmType::Author);

    let publish = &config.farms[0];
    let headers = publish.client_headers.as_ref().expect("client headers");
    assert_eq!(headers.value(), &vec!["host".to_string(), "user-agent".to_string()]);

    let source = publish.source();
    assert_eq!(source.file_name(), Some("conf.dispatcher.d/enabled_farms/00_publish.farm"));
    assert_eq!(source.line_number(), Some(1));
    assert_eq!(source.included_from(), Some("conf.dispatcher.d/dispatcher.any"));
}

#[test]
fn httpd_sections_nest_across_includes() {
    let results = HttpdConfigurationFactory::new(fixtures().join("repo"))
        .parse("conf/httpd.conf")
        .expect("fixture should parse");
    assert!(results.raw_violations().is_empty());

    let config = results.configuration();
    let vhost = config
        .root()
        .children()
        .find(|s| s.arguments() == ["*:80"])
        .expect("virtual host");
    assert_eq!(
        vhost.directive("documentroot").map(|d| d.arguments().to_vec()),
        Some(vec!["/var/www/html".to_string()])
    );
    assert_eq!(vhost.source().file_name(), Some("conf.d/enabled_vhosts/publish.vhost"));
}

// ── End-to-end analysis ──

#[test]
fn reports_rule_violations_with_provenance() {
    let result = analyzer(ViolationVerbosity::Full).analyze().expect("analysis should succeed");

    let ids: Vec<&str> = result.violations.iter().map(|v| v.analyzer_rule().id()).collect();
    assert_eq!(
        ids,
        vec!["filter-deny-first", "statfileslevel-publish", "root-directory-denied"],
        "{:#?}",
        result.violations.iter().map(ToString::to_string).collect::<Vec<_>>()
    );

    let filter = &result.violations[0];
    assert_eq!(filter.severity(), Severity::Critical);
    assert_eq!(filter.configuration_source().and_then(|s| s.line_number()), Some(9));
    assert!(filter.context().starts_with("farm.filter: allow only what is needed: expected"));

    insta::assert_snapshot!(
        result.violations[1].to_string(),
        @"conf.dispatcher.d/enabled_farms/00_publish.farm:15 (included from conf.dispatcher.d/dispatcher.any): MINOR [statfileslevel-publish] farm.cache.statfileslevel: expected value to be at least 2; found 1"
    );

    let directory = result.violations[2].configuration_source().expect("source");
    assert_eq!(directory.file_name(), Some("conf.d/enabled_vhosts/publish.vhost"));
    assert_eq!(directory.line_number(), Some(4));
}

#[test]
fn verbosity_only_changes_grouping() {
    let full = analyzer(ViolationVerbosity::Full).analyze().expect("full");
    let minimized = analyzer(ViolationVerbosity::Minimized).analyze().expect("minimized");

    let total = |r: &dispatcher_lint_core::AnalysisResult| -> usize {
        r.violations.iter().map(dispatcher_lint_core::Violation::occurrences).sum()
    };
    assert_eq!(total(&full), total(&minimized));
    assert_eq!(full.count_by_severity(), minimized.count_by_severity());
}

#[test]
fn concurrent_analyses_do_not_share_state() {
    let analyzer = Arc::new(analyzer(ViolationVerbosity::Full));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let analyzer = Arc::clone(&analyzer);
            std::thread::spawn(move || analyzer.analyze().map(|r| r.violations.len()))
        })
        .collect();
    for handle in handles {
        let count = handle.join().expect("thread").expect("analysis");
        assert_eq!(count, 3);
    }
}

// ── Fatal errors ──

#[test]
fn include_cycle_hits_depth_limit() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.any"), "/farms {\n$include \"b.any\"\n}\n").unwrap();
    fs::write(dir.path().join("b.any"), "$include \"a.any\"\n").unwrap();

    let err = DispatcherConfigurationFactory::new(dir.path())
        .with_limits(IncludeLimits {
            max_depth: 8,
            ..IncludeLimits::default()
        })
        .parse("a.any")
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigurationSyntaxError::IncludeDepthExceeded { limit: 8, .. }
    ));
}

#[test]
fn missing_literal_include_is_fatal() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("dispatcher.any"), "/farms {\n$include \"farms.any\"\n}\n").unwrap();

    let err = Analyzer::builder()
        .repo(dir.path())
        .dispatcher_entry("dispatcher.any")
        .build()
        .unwrap()
        .analyze()
        .unwrap_err();
    assert!(err.to_string().contains("farms.any"), "{err}");
}
