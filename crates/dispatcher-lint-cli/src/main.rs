//! dispatcher-lint CLI tool.
//!
//! Usage:
//! ```bash
//! dispatcher-lint check [OPTIONS] [PATH]
//! dispatcher-lint list-rules
//! dispatcher-lint init
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config_resolver;

/// Linter for AEM dispatcher and Apache httpd configuration repositories
#[derive(Parser)]
#[command(name = "dispatcher-lint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run lint checks
    Check(commands::check::CheckArgs),

    /// List the rules that would be applied
    ListRules {
        /// Folder of additional `*.json` rule files
        #[arg(long)]
        rules_folder: Option<PathBuf>,

        /// Rule preset to start from
        #[arg(long, default_value = "recommended")]
        preset: PresetArg,
    },

    /// Initialize configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

/// Output format for lint results.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// One-line-per-violation compact format.
    Compact,
}

/// Rule preset selection.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum PresetArg {
    /// Embedded rules as shipped.
    #[default]
    Recommended,
    /// Every embedded rule, including disabled ones.
    Strict,
    /// Critical and blocker rules only.
    Minimal,
}

impl From<PresetArg> for dispatcher_lint_rules::Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Recommended => Self::Recommended,
            PresetArg::Strict => Self::Strict,
            PresetArg::Minimal => Self::Minimal,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check(args) => commands::check::run(&args, cli.config.as_deref()),
        Commands::ListRules {
            rules_folder,
            preset,
        } => commands::list_rules::run(rules_folder.as_deref(), preset.into(), cli.config.as_deref()),
        Commands::Init { force } => commands::init::run(force),
    }
}
