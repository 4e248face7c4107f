//! Subcommand implementations.

pub mod check;
pub mod init;
pub mod list_rules;
pub mod output;

use anyhow::{Context, Result};
use dispatcher_lint_core::Config;
use std::path::Path;

use crate::config_resolver::ConfigSource;

/// Loads the configuration the resolver pointed at.
///
/// Relative `repo` and `rules_folder` paths are taken from the directory
/// holding the configuration file.
pub fn load_config(source: &ConfigSource) -> Result<Config> {
    let Some(path) = source.path() else {
        return Ok(Config::default());
    };
    if source.is_global() {
        tracing::info!("Using global config: {}", path.display());
    }
    let mut config =
        Config::from_file(path).with_context(|| format!("Failed to load config: {}", path.display()))?;

    if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        anchor(&mut config, base);
    }
    Ok(config)
}

fn anchor(config: &mut Config, base: &Path) {
    if config.analyzer.repo.is_relative() {
        config.analyzer.repo = base.join(&config.analyzer.repo);
    }
    if let Some(folder) = config.analyzer.rules_folder.as_mut().filter(|f| f.is_relative()) {
        *folder = base.join(&*folder);
    }
}
