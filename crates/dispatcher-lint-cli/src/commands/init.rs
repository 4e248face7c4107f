//! Init command implementation.

use anyhow::{bail, Result};
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# dispatcher-lint configuration

[analyzer]
# Repository root (default: current directory)
# repo = "./dispatcher/src"

# Entry files, relative to the repository root
dispatcher_entry = "conf.dispatcher.d/dispatcher.any"
httpd_entry = "conf/httpd.conf"

# Directory that relative httpd Include paths resolve against
# server_root = "."

# full | partial | minimized
verbosity = "partial"

# Folder of additional *.json rule files, merged in file-name order
# rules_folder = "dispatcher-rules"

# Guards against runaway include expansion
max_include_depth = 50
max_lines = 1000000

# Rule overrides
# Each rule can be enabled/disabled and have its severity overridden

# [rules.statfileslevel-minimum]
# enabled = false

# [rules.default-filter-deny-rules]
# severity = "CRITICAL"
"#;

/// Runs the init command.
pub fn run(force: bool) -> Result<()> {
    let config_path = Path::new("dispatcher-lint.toml");

    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(config_path, DEFAULT_CONFIG)?;

    println!("Created dispatcher-lint.toml");
    println!("\nNext steps:");
    println!("  1. Point dispatcher_entry and httpd_entry at your entry files");
    println!("  2. Run: dispatcher-lint check");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatcher_lint_core::{Config, ViolationVerbosity};

    #[test]
    fn default_config_parses() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(
            config.analyzer.dispatcher_entry.as_deref(),
            Some("conf.dispatcher.d/dispatcher.any")
        );
        assert_eq!(config.analyzer.verbosity, ViolationVerbosity::Partial);
        assert!(config.rules.is_empty());
    }
}
