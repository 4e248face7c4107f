//! Check command implementation.

use anyhow::{Context, Result};
use clap::Args;
use dispatcher_lint_core::{Analyzer, Severity, ViolationVerbosity};
use dispatcher_lint_rules::{build_rule_list, Preset};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{OutputFormat, PresetArg};

/// Arguments of `dispatcher-lint check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Repository root to analyze (default: `repo` from config, else `.`)
    pub path: Option<PathBuf>,

    /// Dispatcher entry file, relative to the repository root
    #[arg(long)]
    pub dispatcher: Option<String>,

    /// HTTPD entry file, relative to the repository root
    #[arg(long)]
    pub httpd: Option<String>,

    /// Directory relative HTTPD includes resolve against
    #[arg(long)]
    pub server_root: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// How much repetition to keep in the report
    #[arg(long)]
    pub verbosity: Option<VerbosityArg>,

    /// Folder of additional `*.json` rule files
    #[arg(long)]
    pub rules_folder: Option<PathBuf>,

    /// Rule preset to start from
    #[arg(long, default_value = "recommended")]
    pub preset: PresetArg,

    /// Exit with an error when a violation reaches this severity
    #[arg(long, default_value = "major", value_parser = parse_severity)]
    pub fail_on: Severity,
}

/// Violation verbosity.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum VerbosityArg {
    /// Every violation.
    Full,
    /// Identical violations collapsed.
    Partial,
    /// One violation per rule.
    Minimized,
}

impl From<VerbosityArg> for ViolationVerbosity {
    fn from(arg: VerbosityArg) -> Self {
        match arg {
            VerbosityArg::Full => Self::Full,
            VerbosityArg::Partial => Self::Partial,
            VerbosityArg::Minimized => Self::Minimized,
        }
    }
}

fn parse_severity(value: &str) -> Result<Severity, String> {
    Severity::parse(value).ok_or_else(|| format!("unknown severity '{value}'"))
}

/// Runs the check command.
pub fn run(args: &CheckArgs, config_path: Option<&Path>) -> Result<()> {
    let project_dir = args.path.as_deref().unwrap_or(Path::new("."));
    let source = crate::config_resolver::resolve(project_dir, config_path);
    let config = super::load_config(&source)?;

    let rules_folder = args
        .rules_folder
        .clone()
        .or_else(|| config.analyzer.rules_folder.clone());
    let rules = build_rule_list(Preset::from(args.preset).rules(), rules_folder.as_deref(), &config);

    let mut builder = Analyzer::builder().rules(Arc::new(rules)).config(config);
    if let Some(path) = &args.path {
        builder = builder.repo(path);
    }
    if let Some(entry) = &args.dispatcher {
        builder = builder.dispatcher_entry(entry);
    }
    if let Some(entry) = &args.httpd {
        builder = builder.httpd_entry(entry);
    }
    if let Some(root) = &args.server_root {
        builder = builder.server_root(root);
    }
    if let Some(verbosity) = args.verbosity {
        builder = builder.verbosity(verbosity.into());
    }

    let analyzer = match builder.build() {
        Ok(analyzer) => analyzer,
        Err(e) => fatal(e),
    };

    tracing::info!(
        "Analyzing {} with {} enabled rule(s)",
        analyzer.repo().display(),
        analyzer.rules().enabled_rules().count()
    );

    let result = match analyzer.analyze() {
        Ok(result) => result,
        Err(e) => fatal(e),
    };

    super::output::print(&result, args.format).context("Failed to write report")?;

    // Exit with error code if the threshold is reached
    if result.has_violations_at(args.fail_on) {
        std::process::exit(1);
    }

    Ok(())
}

/// Renders a fatal diagnostic and exits.
fn fatal(error: dispatcher_lint_core::AnalyzerError) -> ! {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
    std::process::exit(2);
}
