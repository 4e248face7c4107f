//! List rules command implementation.

use anyhow::Result;
use dispatcher_lint_rules::{build_rule_list, Preset};
use std::path::Path;

/// Runs the list-rules command.
pub fn run(rules_folder: Option<&Path>, preset: Preset, config_path: Option<&Path>) -> Result<()> {
    let source = crate::config_resolver::resolve(Path::new("."), config_path);
    let config = super::load_config(&source)?;
    let folder = rules_folder
        .map(Path::to_path_buf)
        .or_else(|| config.analyzer.rules_folder.clone());
    let rules = build_rule_list(preset.rules(), folder.as_deref(), &config);

    println!("Rules ({preset:?} preset):\n");
    println!(
        "{:<32} {:<9} {:<8} {:<18} Description",
        "Id", "Severity", "Enabled", "Origin"
    );
    println!("{}", "-".repeat(100));

    for rule in rules.rules() {
        println!(
            "{:<32} {:<9} {:<8} {:<18} {}",
            rule.id(),
            rule.severity(),
            if rule.is_enabled() { "yes" } else { "no" },
            rule.origin(),
            rule.description()
        );
    }

    println!("\nPresets:");
    println!("  recommended  - embedded rules as shipped (default)");
    println!("  strict       - every embedded rule, including disabled ones");
    println!("  minimal      - critical and blocker rules only");

    println!("\nDisable a rule or change its severity in dispatcher-lint.toml, e.g.:");
    println!("  [rules.statfileslevel-minimum]");
    println!("  enabled = false");

    Ok(())
}
