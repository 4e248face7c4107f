//! Include resolution shared by both configuration dialects.
//!
//! The resolver turns an entry file into a flat sequence of
//! [`ConfigurationLine`]s, expanding `$include` (ANY) and
//! `Include`/`IncludeOptional` (HTTPD) in place. Each emitted line keeps the
//! physical file and line it came from.
//!
//! Recursion state (depth and emitted-line count) lives in an accumulator
//! threaded through the calls, so a resolver can be reused freely.

use crate::source::{ConfigurationLine, ConfigurationSource};
use crate::violations::{ConfigurationViolations, SyntaxFault};
use miette::Diagnostic;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Default limit on nested includes.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 50;

/// Default limit on the total number of emitted lines.
pub const DEFAULT_MAX_LINES: usize = 1_000_000;

const ANY_INCLUDE_TOKEN: &str = "$include";

/// The configuration language being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// The dispatcher's nested-brace ANY format.
    Any,
    /// Apache HTTPD directives and sections.
    Httpd,
}

impl Dialect {
    /// Returns the root token used in rule element paths.
    #[must_use]
    pub fn root_token(self) -> &'static str {
        match self {
            Self::Any => "farm",
            Self::Httpd => "httpd",
        }
    }
}

/// Guards against runaway include expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeLimits {
    /// Maximum include nesting depth.
    pub max_depth: usize,
    /// Maximum number of lines emitted across all files.
    pub max_lines: usize,
}

impl Default for IncludeLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

/// Fatal errors that abort a parse. No partial tree is returned.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigurationSyntaxError {
    /// The repository root does not exist.
    #[error("repository root {} does not exist", path.display())]
    #[diagnostic(code(dispatcher_lint::repository_missing))]
    RepositoryMissing {
        /// The missing directory.
        path: PathBuf,
    },

    /// The entry configuration file does not exist.
    #[error("configuration file {} not found", path.display())]
    #[diagnostic(
        code(dispatcher_lint::entry_missing),
        help("pass the entry file relative to the repository root")
    )]
    EntryMissing {
        /// The missing file.
        path: PathBuf,
    },

    /// A configuration file could not be read.
    #[error("failed to read {}", path.display())]
    #[diagnostic(code(dispatcher_lint::io))]
    Io {
        /// The unreadable file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A literal include target does not exist.
    #[error("{file}:{line}: included file '{target}' not found")]
    #[diagnostic(code(dispatcher_lint::include_not_found))]
    IncludeNotFound {
        /// Include target as written.
        target: String,
        /// Including file.
        file: String,
        /// Line of the include.
        line: usize,
    },

    /// An include target names a directory where a file is required.
    #[error("{file}:{line}: include target '{target}' is a directory")]
    #[diagnostic(
        code(dispatcher_lint::include_is_directory),
        help("use a glob such as \"{target}/*.any\" to include the directory's files")
    )]
    IncludeIsDirectory {
        /// Include target as written.
        target: String,
        /// Including file.
        file: String,
        /// Line of the include.
        line: usize,
    },

    /// An include token has no target.
    #[error("{file}:{line}: include without a file name")]
    #[diagnostic(code(dispatcher_lint::missing_include_value))]
    MissingIncludeValue {
        /// Including file.
        file: String,
        /// Line of the include.
        line: usize,
    },

    /// Includes nest deeper than allowed.
    #[error("{file}:{line}: include depth limit of {limit} exceeded")]
    #[diagnostic(
        code(dispatcher_lint::include_depth),
        help("check for a file that includes itself, directly or indirectly")
    )]
    IncludeDepthExceeded {
        /// The configured limit.
        limit: usize,
        /// File whose include crossed the limit.
        file: String,
        /// Line of that include.
        line: usize,
    },

    /// Include expansion produced too many lines.
    #[error("configuration line limit of {limit} exceeded")]
    #[diagnostic(code(dispatcher_lint::line_limit))]
    LineLimitExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// An include glob is not a valid pattern.
    #[error("invalid include pattern '{pattern}'")]
    #[diagnostic(code(dispatcher_lint::include_pattern))]
    InvalidIncludePattern {
        /// The rejected pattern.
        pattern: String,
        /// Underlying error.
        #[source]
        source: glob::PatternError,
    },
}

/// Expands include directives into a flat line sequence.
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    dialect: Dialect,
    repo_root: PathBuf,
    normalized_root: PathBuf,
    server_root: Option<PathBuf>,
    limits: IncludeLimits,
    symlink_workaround: bool,
}

/// Per-resolution accumulator.
struct Expansion<'v> {
    depth: usize,
    lines: Vec<ConfigurationLine>,
    violations: &'v mut ConfigurationViolations,
}

/// Where a line's include points and what to do if it matches nothing.
struct IncludeRequest<'a> {
    target: &'a str,
    optional: bool,
    file: &'a str,
    source: &'a ConfigurationSource,
}

impl IncludeResolver {
    /// Creates a resolver for files under `repo_root`.
    #[must_use]
    pub fn new(dialect: Dialect, repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        Self {
            dialect,
            normalized_root: normalize(&repo_root),
            repo_root,
            server_root: None,
            limits: IncludeLimits::default(),
            symlink_workaround: cfg!(windows),
        }
    }

    /// Overrides the include limits.
    #[must_use]
    pub fn with_limits(mut self, limits: IncludeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the HTTPD `ServerRoot`, relative to the repository root.
    #[must_use]
    pub fn with_server_root(mut self, server_root: impl Into<PathBuf>) -> Self {
        self.server_root = Some(server_root.into());
        self
    }

    /// Enables rewriting a leading `../` line into an include.
    ///
    /// Git checkouts on Windows turn symlinks into one-line text files
    /// holding the link target.
    #[must_use]
    pub fn with_symlink_workaround(mut self, enabled: bool) -> Self {
        self.symlink_workaround = enabled;
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns the repository root.
    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Reads and resolves an entry file given relative to the repository root.
    ///
    /// # Errors
    ///
    /// Fails if the repository or entry file is missing, a file cannot be
    /// read, or include limits are exceeded.
    pub fn resolve_file(
        &self,
        relative: &str,
        violations: &mut ConfigurationViolations,
    ) -> Result<Vec<ConfigurationLine>, ConfigurationSyntaxError> {
        if !self.repo_root.is_dir() {
            return Err(ConfigurationSyntaxError::RepositoryMissing {
                path: self.repo_root.clone(),
            });
        }
        let path = self.repo_root.join(relative);
        if !path.is_file() {
            return Err(ConfigurationSyntaxError::EntryMissing { path });
        }
        let raw = read(&path)?;
        let file_name = self.relative_name(&normalize(&path));
        self.resolve(&raw, &file_name, violations)
    }

    /// Resolves already loaded text attributed to `file_name`.
    ///
    /// # Errors
    ///
    /// Fails if an included file cannot be read or include limits are exceeded.
    pub fn resolve(
        &self,
        raw: &str,
        file_name: &str,
        violations: &mut ConfigurationViolations,
    ) -> Result<Vec<ConfigurationLine>, ConfigurationSyntaxError> {
        let mut state = Expansion {
            depth: 0,
            lines: Vec::new(),
            violations,
        };
        self.expand(raw, file_name, None, &mut state)?;
        debug!("Resolved {} into {} line(s)", file_name, state.lines.len());
        Ok(state.lines)
    }

    fn expand(
        &self,
        raw: &str,
        file_name: &str,
        included_from: Option<&str>,
        state: &mut Expansion<'_>,
    ) -> Result<(), ConfigurationSyntaxError> {
        for (number, text) in self.physical_lines(raw) {
            let text = text.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let source = ConfigurationSource::new(file_name, number).with_included_from(included_from);
            match self.dialect {
                Dialect::Any => self.expand_any_line(text, file_name, &source, state)?,
                Dialect::Httpd => self.expand_httpd_line(text, file_name, &source, state)?,
            }
        }
        Ok(())
    }

    /// Splits text into numbered lines, applying the symlink rewrite and,
    /// for HTTPD, joining `\` continuations onto their first line.
    fn physical_lines(&self, raw: &str) -> Vec<(usize, String)> {
        let mut out: Vec<(usize, String)> = Vec::new();
        let mut pending: Option<(usize, String)> = None;

        for (index, line) in raw.lines().enumerate() {
            let number = index + 1;
            let mut line = line.to_string();
            if index == 0 && self.symlink_workaround && line.trim_start().starts_with("../") {
                debug!("Treating '{}' as a symlink target", line.trim());
                line = match self.dialect {
                    Dialect::Any => format!("{ANY_INCLUDE_TOKEN} \"{}\"", line.trim()),
                    Dialect::Httpd => format!("Include {}", line.trim()),
                };
            }

            if self.dialect != Dialect::Httpd {
                out.push((number, line));
                continue;
            }

            let trimmed = line.trim_end();
            let (body, continues) = match trimmed.strip_suffix('\\') {
                Some(body) => (body, true),
                None => (trimmed, false),
            };
            let joined = match pending.take() {
                Some((first, mut acc)) => {
                    acc.push(' ');
                    acc.push_str(body.trim());
                    (first, acc)
                }
                None => (number, body.trim_end().to_string()),
            };
            if continues {
                pending = Some(joined);
            } else {
                out.push(joined);
            }
        }
        out.extend(pending);
        out
    }

    fn expand_any_line(
        &self,
        text: &str,
        file_name: &str,
        source: &ConfigurationSource,
        state: &mut Expansion<'_>,
    ) -> Result<(), ConfigurationSyntaxError> {
        let mut rest = text;
        while !rest.is_empty() {
            let Some(pos) = rest.find(ANY_INCLUDE_TOKEN) else {
                self.emit(rest, source, state)?;
                break;
            };

            let before = rest[..pos].trim();
            if !before.is_empty() {
                self.emit(before, source, state)?;
            }

            let after = rest[pos + ANY_INCLUDE_TOKEN.len()..].trim_start();
            let (target, trailing) = split_include_target(after, source);
            if target.is_empty() {
                return Err(self.missing_value(file_name, source));
            }
            self.include(
                &IncludeRequest {
                    target,
                    optional: false,
                    file: file_name,
                    source,
                },
                state,
            )?;
            rest = trailing.trim();
        }
        Ok(())
    }

    fn expand_httpd_line(
        &self,
        text: &str,
        file_name: &str,
        source: &ConfigurationSource,
        state: &mut Expansion<'_>,
    ) -> Result<(), ConfigurationSyntaxError> {
        let keyword = text.split_whitespace().next().unwrap_or_default();
        let optional = keyword.eq_ignore_ascii_case("IncludeOptional");
        if !optional && !keyword.eq_ignore_ascii_case("Include") {
            return self.emit(text, source, state);
        }

        let target = strip_quotes(text[keyword.len()..].trim());
        if target.is_empty() {
            return Err(self.missing_value(file_name, source));
        }
        self.include(
            &IncludeRequest {
                target,
                optional,
                file: file_name,
                source,
            },
            state,
        )
    }

    fn include(
        &self,
        request: &IncludeRequest<'_>,
        state: &mut Expansion<'_>,
    ) -> Result<(), ConfigurationSyntaxError> {
        let base = match self.dialect {
            Dialect::Any => self
                .repo_root
                .join(request.file)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            Dialect::Httpd => match &self.server_root {
                Some(server_root) => self.repo_root.join(server_root),
                None => self.repo_root.clone(),
            },
        };
        let full = normalize(&base.join(request.target));
        let is_glob = request.target.contains(['*', '?', '[']);

        let matches = if is_glob {
            let pattern = full.to_string_lossy().into_owned();
            let mut paths: Vec<PathBuf> = glob::glob(&pattern)
                .map_err(|source| ConfigurationSyntaxError::InvalidIncludePattern {
                    pattern: request.target.to_string(),
                    source,
                })?
                .filter_map(Result::ok)
                .collect();
            paths.sort();
            paths
        } else if full.exists() {
            vec![full]
        } else {
            Vec::new()
        };

        if matches.is_empty() {
            return self.no_match(request, is_glob, state);
        }

        for path in matches {
            if !path.is_dir() {
                self.include_file(&path, request, state)?;
                continue;
            }
            if self.dialect == Dialect::Any {
                return Err(ConfigurationSyntaxError::IncludeIsDirectory {
                    target: request.target.to_string(),
                    file: request.file.to_string(),
                    line: request.source.line_number().unwrap_or_default(),
                });
            }
            let mut files: Vec<PathBuf> = WalkDir::new(&path)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
                .map(walkdir::DirEntry::into_path)
                .collect();
            files.sort();
            for file in files {
                self.include_file(&file, request, state)?;
            }
        }
        Ok(())
    }

    fn no_match(
        &self,
        request: &IncludeRequest<'_>,
        is_glob: bool,
        state: &mut Expansion<'_>,
    ) -> Result<(), ConfigurationSyntaxError> {
        match self.dialect {
            Dialect::Httpd if request.optional => {
                debug!("IncludeOptional {} matched nothing, skipping", request.target);
            }
            Dialect::Httpd => state.violations.add(
                SyntaxFault::HttpdIncludeFailed,
                format!("Include {} matched no files", request.target),
                request.source,
            ),
            Dialect::Any if is_glob => state.violations.add(
                SyntaxFault::AnyIncludeNoMatch,
                format!("$include \"{}\" matched no files", request.target),
                request.source,
            ),
            Dialect::Any => {
                return Err(ConfigurationSyntaxError::IncludeNotFound {
                    target: request.target.to_string(),
                    file: request.file.to_string(),
                    line: request.source.line_number().unwrap_or_default(),
                });
            }
        }
        Ok(())
    }

    /// Expands one matched file. A target that matched but cannot be read
    /// as text is fatal in both dialects; only a target that matches
    /// nothing can be recovered from (see `no_match`).
    fn include_file(
        &self,
        path: &Path,
        request: &IncludeRequest<'_>,
        state: &mut Expansion<'_>,
    ) -> Result<(), ConfigurationSyntaxError> {
        state.depth += 1;
        if state.depth > self.limits.max_depth {
            return Err(ConfigurationSyntaxError::IncludeDepthExceeded {
                limit: self.limits.max_depth,
                file: request.file.to_string(),
                line: request.source.line_number().unwrap_or_default(),
            });
        }

        let name = self.relative_name(path);
        debug!("Including {} from {} (depth {})", name, request.file, state.depth);
        let raw = read(path)?;
        self.expand(&raw, &name, Some(request.file), state)?;

        state.depth -= 1;
        Ok(())
    }

    fn emit(
        &self,
        content: &str,
        source: &ConfigurationSource,
        state: &mut Expansion<'_>,
    ) -> Result<(), ConfigurationSyntaxError> {
        state.lines.push(ConfigurationLine::new(content, source.clone()));
        if state.lines.len() > self.limits.max_lines {
            return Err(ConfigurationSyntaxError::LineLimitExceeded {
                limit: self.limits.max_lines,
            });
        }
        Ok(())
    }

    fn missing_value(&self, file_name: &str, source: &ConfigurationSource) -> ConfigurationSyntaxError {
        ConfigurationSyntaxError::MissingIncludeValue {
            file: file_name.to_string(),
            line: source.line_number().unwrap_or_default(),
        }
    }

    /// Repository-relative name with forward slashes.
    fn relative_name(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.normalized_root).unwrap_or(path);
        relative.to_string_lossy().replace('\\', "/")
    }
}

/// Splits `"target" trailing` into its parts, recovering from a missing
/// closing quote by taking the rest of the line.
fn split_include_target<'a>(after: &'a str, source: &ConfigurationSource) -> (&'a str, &'a str) {
    let Some(quoted) = after.strip_prefix('"') else {
        return (after.trim(), "");
    };
    match quoted.find('"') {
        Some(end) => (quoted[..end].trim(), &quoted[end + 1..]),
        None => {
            warn!("{}: missing closing quote in $include, using the rest of the line", source);
            (quoted.trim(), "")
        }
    }
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn read(path: &Path) -> Result<String, ConfigurationSyntaxError> {
    std::fs::read_to_string(path).map_err(|source| ConfigurationSyntaxError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Lexically resolves `.` and `..` without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn repo(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn contents(lines: &[ConfigurationLine]) -> Vec<&str> {
        lines.iter().map(ConfigurationLine::content).collect()
    }

    #[test]
    fn unreadable_include_target_is_fatal_in_both_dialects() {
        let dir = repo(&[("conf/httpd.conf", "ServerName x\n")]);
        fs::write(dir.path().join("conf/binary.conf"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        fs::write(dir.path().join("conf/binary.any"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();

        let mut sink = ConfigurationViolations::new();
        let httpd = IncludeResolver::new(Dialect::Httpd, dir.path())
            .resolve("Include conf/binary.conf\n", "conf/httpd.conf", &mut sink);
        assert!(matches!(httpd, Err(ConfigurationSyntaxError::Io { .. })));

        let any = IncludeResolver::new(Dialect::Any, dir.path())
            .resolve("$include \"binary.any\"\n", "conf/dispatcher.any", &mut sink);
        assert!(matches!(any, Err(ConfigurationSyntaxError::Io { .. })));
        assert!(sink.is_empty());
    }

    #[test]
    fn lines_without_includes_keep_physical_numbers() {
        let resolver = IncludeResolver::new(Dialect::Any, ".");
        let mut sink = ConfigurationViolations::new();
        let lines = resolver
            .resolve("/name \"x\"\n\n# comment\n  /farms {\n}\n", "dispatcher.any", &mut sink)
            .unwrap();
        assert_eq!(contents(&lines), vec!["/name \"x\"", "/farms {", "}"]);
        let numbers: Vec<_> = lines.iter().filter_map(ConfigurationLine::line_number).collect();
        assert_eq!(numbers, vec![1, 4, 5]);
        assert!(lines.iter().all(|l| l.included_from().is_none()));
    }

    #[test]
    fn any_include_splices_in_place_with_surrounding_text() {
        let dir = repo(&[
            ("conf/dispatcher.any", "/farms { $include \"farms/a.any\" }\n/after 1\n"),
            ("conf/farms/a.any", "/a {\n}\n"),
        ]);
        let resolver = IncludeResolver::new(Dialect::Any, dir.path());
        let mut sink = ConfigurationViolations::new();
        let lines = resolver.resolve_file("conf/dispatcher.any", &mut sink).unwrap();
        assert_eq!(contents(&lines), vec!["/farms {", "/a {", "}", "}", "/after 1"]);
        assert_eq!(lines[1].file_name(), Some("conf/farms/a.any"));
        assert_eq!(lines[1].included_from(), Some("conf/dispatcher.any"));
        assert_eq!(lines[3].file_name(), Some("conf/dispatcher.any"));
        assert_eq!(lines[3].line_number(), Some(1));
    }

    #[test]
    fn any_include_recovers_from_missing_closing_quote() {
        let dir = repo(&[("d.any", "$include \"x.any\n"), ("x.any", "/x 1\n")]);
        let resolver = IncludeResolver::new(Dialect::Any, dir.path());
        let mut sink = ConfigurationViolations::new();
        let lines = resolver.resolve_file("d.any", &mut sink).unwrap();
        assert_eq!(contents(&lines), vec!["/x 1"]);
    }

    #[test]
    fn any_glob_expands_sorted_and_reports_empty_match() {
        let dir = repo(&[
            ("d.any", "$include \"farms/*.any\"\n$include \"none/*.any\"\n"),
            ("farms/b.any", "/b 1\n"),
            ("farms/a.any", "/a 1\n"),
        ]);
        let resolver = IncludeResolver::new(Dialect::Any, dir.path());
        let mut sink = ConfigurationViolations::new();
        let lines = resolver.resolve_file("d.any", &mut sink).unwrap();
        assert_eq!(contents(&lines), vec!["/a 1", "/b 1"]);
        assert_eq!(sink.as_slice()[0].analyzer_rule().id(), "any-include-no-match");
    }

    #[test]
    fn any_missing_literal_include_is_fatal() {
        let dir = repo(&[("d.any", "$include \"missing.any\"\n")]);
        let resolver = IncludeResolver::new(Dialect::Any, dir.path());
        let err = resolver
            .resolve_file("d.any", &mut ConfigurationViolations::new())
            .unwrap_err();
        assert!(matches!(err, ConfigurationSyntaxError::IncludeNotFound { line: 1, .. }));
    }

    #[test]
    fn any_directory_include_is_fatal() {
        let dir = repo(&[("d.any", "$include \"farms\"\n"), ("farms/a.any", "/a 1\n")]);
        let resolver = IncludeResolver::new(Dialect::Any, dir.path());
        let err = resolver
            .resolve_file("d.any", &mut ConfigurationViolations::new())
            .unwrap_err();
        assert!(matches!(err, ConfigurationSyntaxError::IncludeIsDirectory { .. }));
    }

    #[test]
    fn empty_include_value_is_fatal() {
        let resolver = IncludeResolver::new(Dialect::Any, ".");
        let err = resolver
            .resolve("$include \"\"\n", "d.any", &mut ConfigurationViolations::new())
            .unwrap_err();
        assert!(matches!(err, ConfigurationSyntaxError::MissingIncludeValue { line: 1, .. }));
    }

    #[test]
    fn self_include_stops_at_depth_limit() {
        let dir = repo(&[("loop.any", "/x 1\n$include \"loop.any\"\n")]);
        let resolver = IncludeResolver::new(Dialect::Any, dir.path());
        let err = resolver
            .resolve_file("loop.any", &mut ConfigurationViolations::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationSyntaxError::IncludeDepthExceeded { limit: 50, .. }
        ));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn line_limit_is_enforced() {
        let resolver = IncludeResolver::new(Dialect::Any, ".").with_limits(IncludeLimits {
            max_depth: 5,
            max_lines: 2,
        });
        let err = resolver
            .resolve("/a 1\n/b 2\n/c 3\n", "d.any", &mut ConfigurationViolations::new())
            .unwrap_err();
        assert!(matches!(err, ConfigurationSyntaxError::LineLimitExceeded { limit: 2 }));
    }

    #[test]
    fn httpd_includes_resolve_against_server_root() {
        let dir = repo(&[
            ("conf/httpd.conf", "ServerName x\nInclude conf.d/*.conf\nIncludeOptional conf.d/none/*.conf\n"),
            ("conf.d/b.conf", "Listen 80\n"),
            ("conf.d/a.conf", "LoadModule a b\n"),
        ]);
        let resolver = IncludeResolver::new(Dialect::Httpd, dir.path());
        let mut sink = ConfigurationViolations::new();
        let lines = resolver.resolve_file("conf/httpd.conf", &mut sink).unwrap();
        assert_eq!(contents(&lines), vec!["ServerName x", "LoadModule a b", "Listen 80"]);
        assert!(sink.is_empty());
    }

    #[test]
    fn httpd_failed_include_is_recoverable() {
        let dir = repo(&[("httpd.conf", "include \"conf.d/missing.conf\"\nListen 80\n")]);
        let resolver = IncludeResolver::new(Dialect::Httpd, dir.path());
        let mut sink = ConfigurationViolations::new();
        let lines = resolver.resolve_file("httpd.conf", &mut sink).unwrap();
        assert_eq!(contents(&lines), vec!["Listen 80"]);
        assert_eq!(sink.as_slice()[0].analyzer_rule().id(), "httpd-include-failed");
    }

    #[test]
    fn httpd_directory_include_reads_all_files() {
        let dir = repo(&[
            ("httpd.conf", "Include conf.modules.d\n"),
            ("conf.modules.d/01.conf", "LoadModule one x\n"),
            ("conf.modules.d/sub/02.conf", "LoadModule two y\n"),
        ]);
        let resolver = IncludeResolver::new(Dialect::Httpd, dir.path());
        let lines = resolver
            .resolve_file("httpd.conf", &mut ConfigurationViolations::new())
            .unwrap();
        assert_eq!(contents(&lines), vec!["LoadModule one x", "LoadModule two y"]);
        assert_eq!(lines[1].file_name(), Some("conf.modules.d/sub/02.conf"));
    }

    #[test]
    fn httpd_continuations_keep_first_line_number() {
        let resolver = IncludeResolver::new(Dialect::Httpd, ".");
        let lines = resolver
            .resolve(
                "RewriteCond %{HTTP_HOST} \\\n    ^example\\.com$\nListen 80\n",
                "httpd.conf",
                &mut ConfigurationViolations::new(),
            )
            .unwrap();
        assert_eq!(contents(&lines), vec!["RewriteCond %{HTTP_HOST} ^example\\.com$", "Listen 80"]);
        assert_eq!(lines[0].line_number(), Some(1));
        assert_eq!(lines[1].line_number(), Some(3));
    }

    #[test]
    fn symlink_workaround_rewrites_first_line() {
        let dir = repo(&[
            ("enabled/farm.any", "../available/farm.any"),
            ("available/farm.any", "/farm 1\n"),
        ]);
        let resolver = IncludeResolver::new(Dialect::Any, dir.path()).with_symlink_workaround(true);
        let lines = resolver
            .resolve_file("enabled/farm.any", &mut ConfigurationViolations::new())
            .unwrap();
        assert_eq!(contents(&lines), vec!["/farm 1"]);
        assert_eq!(lines[0].file_name(), Some("available/farm.any"));
    }

    #[test]
    fn missing_repository_and_entry() {
        let resolver = IncludeResolver::new(Dialect::Any, "/definitely/not/here");
        assert!(matches!(
            resolver.resolve_file("d.any", &mut ConfigurationViolations::new()),
            Err(ConfigurationSyntaxError::RepositoryMissing { .. })
        ));
        let dir = repo(&[]);
        let resolver = IncludeResolver::new(Dialect::Any, dir.path());
        assert!(matches!(
            resolver.resolve_file("d.any", &mut ConfigurationViolations::new()),
            Err(ConfigurationSyntaxError::EntryMissing { .. })
        ));
    }

    #[test]
    fn normalize_collapses_parent_components() {
        assert_eq!(normalize(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
    }
}
