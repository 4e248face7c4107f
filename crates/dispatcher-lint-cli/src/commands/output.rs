//! Shared output formatting for analysis results.

use anyhow::Result;
use dispatcher_lint_core::{AnalysisResult, Severity, Violation, ViolationVerbosity};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::OutputFormat;

/// Print analysis results in the specified format.
pub fn print(result: &AnalysisResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print_text(result),
        OutputFormat::Json => return print_json(result),
        OutputFormat::Compact => print_compact(result),
    }
    Ok(())
}

fn severity_indicator(severity: Severity) -> &'static str {
    match severity {
        Severity::Blocker => "\x1b[1;31mblocker\x1b[0m",
        Severity::Critical => "\x1b[31mcritical\x1b[0m",
        Severity::Major => "\x1b[33mmajor\x1b[0m",
        Severity::Minor => "\x1b[36mminor\x1b[0m",
        Severity::Info => "\x1b[34minfo\x1b[0m",
    }
}

fn print_text(result: &AnalysisResult) {
    for violation in &result.violations {
        let rule = violation.analyzer_rule();
        let location = violation
            .configuration_source()
            .map_or_else(|| "<unknown>".to_string(), ToString::to_string);
        println!("{} at {}", rule.id(), location);
        println!("  {}: {}", severity_indicator(rule.severity()), violation.context());
        if violation.is_counted() {
            println!("  = occurrences: {}", violation.occurrences());
        }
        if let Some(url) = rule.documentation_url() {
            println!("  = see: {url}");
        }
        println!();
    }

    let counts = result.count_by_severity();
    let total: usize = counts.values().sum();
    let summary_color = if result.has_violations_at(Severity::Critical) {
        "\x1b[31m"
    } else if total > 0 {
        "\x1b[33m"
    } else {
        "\x1b[32m"
    };
    let breakdown: Vec<String> = counts
        .iter()
        .rev()
        .map(|(severity, count)| format!("{count} {}", severity.to_string().to_lowercase()))
        .collect();

    if breakdown.is_empty() {
        println!("{summary_color}No violations found\x1b[0m");
    } else {
        println!(
            "{}Found {} violation(s): {}\x1b[0m",
            summary_color,
            total,
            breakdown.join(", ")
        );
    }
}

/// JSON document written by `--format json`.
#[derive(Serialize)]
struct JsonReport<'a> {
    verbosity: ViolationVerbosity,
    summary: BTreeMap<Severity, usize>,
    violations: &'a [Violation],
}

fn print_json(result: &AnalysisResult) -> Result<()> {
    let report = JsonReport {
        verbosity: result.verbosity,
        summary: result.count_by_severity(),
        violations: &result.violations,
    };
    let json = serde_json::to_string_pretty(&report)?;
    println!("{json}");
    Ok(())
}

fn print_compact(result: &AnalysisResult) {
    for violation in &result.violations {
        println!("{violation}");
    }
}
