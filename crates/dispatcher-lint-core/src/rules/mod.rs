//! Data-driven analyzer rules.
//!
//! # Architecture
//!
//! ```text
//! JSON rule file
//!   ↓ serde (DTO layer)
//! dto types
//!   ↓ validate + convert
//! AnalyzerRuleList (pure domain model)
//!   ↓ RuleListLoader::merge_*()
//! merged AnalyzerRuleList, shared read-only
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub mod dto;
pub mod loader;
pub mod model;

pub use loader::LoadError;
pub use model::{
    AnalyzerRule, AnalyzerRuleList, Check, Condition, DirectivePattern, FilterPattern, MergeMode,
    RulePattern,
};

/// Errors from reading and validating one rule source.
#[derive(Debug, thiserror::Error)]
pub enum LoadRulesError {
    /// JSON deserialization failed.
    #[error("{origin}: JSON parse error: {source}")]
    Json {
        /// Name of the source.
        origin: String,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// Model validation failed.
    #[error("{origin}: {source}")]
    Load {
        /// Name of the source.
        origin: String,
        /// Underlying error.
        source: LoadError,
    },

    /// The source could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The unreadable file or folder.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Parses one rule file's JSON text, tagging every rule with `origin`.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or fails validation.
pub fn parse_rule_list(content: &str, origin: &str) -> Result<AnalyzerRuleList, LoadRulesError> {
    let dto: dto::AnalyzerRuleListDto = serde_json::from_str(content).map_err(|source| LoadRulesError::Json {
        origin: origin.to_string(),
        source,
    })?;
    loader::load(dto, origin).map_err(|source| LoadRulesError::Load {
        origin: origin.to_string(),
        source,
    })
}

/// Reads and parses a rule list from a stream.
///
/// # Errors
///
/// Returns an error if reading, parsing or validation fails.
pub fn read_rule_list(mut reader: impl Read, origin: &str) -> Result<AnalyzerRuleList, LoadRulesError> {
    let mut content = String::new();
    reader.read_to_string(&mut content).map_err(|source| LoadRulesError::Io {
        path: PathBuf::from(origin),
        source,
    })?;
    parse_rule_list(&content, origin)
}

/// Returns the `*.json` files directly inside `folder`, sorted by file name.
///
/// # Errors
///
/// Returns an error if the folder cannot be listed.
pub fn rule_files_in(folder: &Path) -> Result<Vec<PathBuf>, LoadRulesError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| LoadRulesError::Io {
            path: folder.to_path_buf(),
            source: e.into(),
        })?;
        let is_json = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Accumulates rule sources into one list.
///
/// A source that fails to load is logged and skipped; the merge carries on
/// with the remaining sources.
#[derive(Debug, Default)]
pub struct RuleListLoader {
    list: AnalyzerRuleList,
    skipped: Vec<String>,
}

impl RuleListLoader {
    /// Starts from the embedded rule list.
    #[must_use]
    pub fn new(internal: AnalyzerRuleList) -> Self {
        Self {
            list: internal,
            skipped: Vec::new(),
        }
    }

    /// Merges JSON text.
    pub fn merge_str(&mut self, content: &str, origin: &str) -> &mut Self {
        let result = parse_rule_list(content, origin);
        self.accept(result, origin)
    }

    /// Merges a stream.
    pub fn merge_reader(&mut self, reader: impl Read, origin: &str) -> &mut Self {
        let result = read_rule_list(reader, origin);
        self.accept(result, origin)
    }

    /// Merges one rule file; its file name becomes the origin.
    pub fn merge_file(&mut self, path: &Path) -> &mut Self {
        let origin = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let result = std::fs::read_to_string(path)
            .map_err(|source| LoadRulesError::Io {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|content| parse_rule_list(&content, &origin));
        self.accept(result, &origin)
    }

    /// Merges every `*.json` file in `folder`, in file-name order.
    pub fn merge_folder(&mut self, folder: &Path) -> &mut Self {
        match rule_files_in(folder) {
            Ok(files) => {
                debug!("Found {} rule file(s) in {}", files.len(), folder.display());
                for file in files {
                    self.merge_file(&file);
                }
                self
            }
            Err(e) => {
                warn!("Skipping rule folder: {e}");
                self.skipped.push(folder.display().to_string());
                self
            }
        }
    }

    fn accept(&mut self, result: Result<AnalyzerRuleList, LoadRulesError>, origin: &str) -> &mut Self {
        match result {
            Ok(list) => {
                info!("Merging {} rule(s) from {}", list.len(), origin);
                self.list.merge(list);
            }
            Err(e) => {
                warn!("Skipping rule source: {e}");
                self.skipped.push(origin.to_string());
            }
        }
        self
    }

    /// Returns the origins of sources that were skipped.
    #[must_use]
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Returns the merged list.
    #[must_use]
    pub fn finish(self) -> AnalyzerRuleList {
        self.list
    }
}

/// Merges external rule files into `internal`, in file-name order.
#[must_use]
pub fn load(internal: AnalyzerRuleList, external: &[PathBuf]) -> AnalyzerRuleList {
    let mut sorted: Vec<&PathBuf> = external.iter().collect();
    sorted.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    let mut loader = RuleListLoader::new(internal);
    for path in sorted {
        if path.is_dir() {
            loader.merge_folder(path);
        } else {
            loader.merge_file(path);
        }
    }
    loader.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use std::fs;
    use tempfile::TempDir;

    const BASE: &str = r#"{"rules": [
        {"id": "a", "element": "farm.cache", "description": "A"},
        {"id": "b", "element": "farm.cache", "description": "B"}
    ]}"#;

    fn base() -> AnalyzerRuleList {
        parse_rule_list(BASE, "core-rules.json").unwrap()
    }

    fn ids(list: &AnalyzerRuleList) -> Vec<&str> {
        list.rules().iter().map(|r| r.id()).collect()
    }

    #[test]
    fn folder_files_merge_in_name_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("20-second.json"),
            r#"{"rules": [{"id": "b", "element": "farm.cache", "severity": "MINOR"}]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("10-first.json"),
            r#"{"rules": [{"id": "b", "element": "farm.cache", "severity": "BLOCKER"}, {"id": "c", "element": "farm"}]}"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut loader = RuleListLoader::new(base());
        loader.merge_folder(dir.path());
        let list = loader.finish();
        assert_eq!(ids(&list), vec!["a", "b", "c"]);
        let b = list.get("b").unwrap();
        assert_eq!(b.severity(), Severity::Minor);
        assert_eq!(b.origin(), "20-second.json");
    }

    #[test]
    fn malformed_source_is_skipped() {
        let mut loader = RuleListLoader::new(base());
        loader
            .merge_str("{ not json", "broken.json")
            .merge_str(r#"{"rules": [{"id": "c", "element": "farm"}]}"#, "extra.json");
        assert_eq!(loader.skipped(), ["broken.json".to_string()]);
        assert_eq!(ids(&loader.finish()), vec!["a", "b", "c"]);
    }

    #[test]
    fn replace_is_idempotent() {
        let replacement = r#"{"mergeMode": "REPLACE", "rules": [{"id": "z", "element": "farm"}]}"#;
        let mut once = RuleListLoader::new(base());
        once.merge_str(replacement, "r.json");
        let mut twice = RuleListLoader::new(base());
        twice.merge_str(replacement, "r.json").merge_str(replacement, "r.json");
        assert_eq!(ids(&once.finish()), ids(&twice.finish()));
    }

    #[test]
    fn missing_external_file_is_not_fatal() {
        let list = load(base(), &[PathBuf::from("/no/such/rules.json")]);
        assert_eq!(ids(&list), vec!["a", "b"]);
    }

    #[test]
    fn reader_source_is_accepted() {
        let mut loader = RuleListLoader::new(AnalyzerRuleList::empty());
        loader.merge_reader(BASE.as_bytes(), "stdin");
        let list = loader.finish();
        assert_eq!(list.rules()[0].origin(), "stdin");
    }

    mod merge_laws {
        use super::*;
        use proptest::prelude::*;

        fn list_of(ids: &[u8], mode: MergeMode) -> AnalyzerRuleList {
            let rules = ids
                .iter()
                .map(|i| AnalyzerRule::new(format!("r{i}"), "farm.cache"))
                .collect();
            AnalyzerRuleList::new(mode, rules)
        }

        proptest! {
            #[test]
            fn extend_never_duplicates_ids(
                first in prop::collection::vec(0..12_u8, 0..10),
                second in prop::collection::vec(0..12_u8, 0..10),
            ) {
                let mut list = list_of(&first, MergeMode::Extend);
                let before: Vec<String> = list.rules().iter().map(|r| r.id().to_string()).collect();
                list.merge(list_of(&second, MergeMode::Extend));
                let mut seen = std::collections::HashSet::new();
                prop_assert!(list.rules().iter().all(|r| seen.insert(r.id().to_string())));
                if !before.is_empty() {
                    for (i, id) in before.iter().enumerate() {
                        prop_assert_eq!(list.rules()[i].id(), id.as_str());
                    }
                }
            }
        }
    }
}
