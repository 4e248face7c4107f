//! Source provenance for parsed configuration values.
//!
//! Every line the include resolver emits, and every value the dialect
//! parsers decode from it, carries the file name, line number and the
//! including file so violations can point back at the physical text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a piece of configuration came from.
///
/// Always constructible: an unknown file or line is represented as `None`
/// rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigurationSource {
    file_name: Option<String>,
    line_number: Option<usize>,
    included_from: Option<String>,
}

impl ConfigurationSource {
    /// Creates a source for a 1-indexed line of a repository-relative file.
    #[must_use]
    pub fn new(file_name: impl Into<String>, line_number: usize) -> Self {
        let line_number = if line_number == 0 {
            tracing::debug!("Line number 0 is not 1-indexed, recording it as unknown");
            None
        } else {
            Some(line_number)
        };
        Self {
            file_name: Some(file_name.into()),
            line_number,
            included_from: None,
        }
    }

    /// Creates a source with no known location.
    #[must_use]
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Records the file that included this one.
    #[must_use]
    pub fn with_included_from(mut self, included_from: Option<&str>) -> Self {
        self.included_from = included_from.map(str::to_string);
        self
    }

    /// Returns the repository-relative file name, if known.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Returns the 1-indexed line number, if known.
    #[must_use]
    pub fn line_number(&self) -> Option<usize> {
        self.line_number
    }

    /// Returns the repository-relative path of the including file, if any.
    #[must_use]
    pub fn included_from(&self) -> Option<&str> {
        self.included_from.as_deref()
    }
}

impl fmt::Display for ConfigurationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file_name, self.line_number) {
            (Some(file), Some(line)) => write!(f, "{file}:{line}")?,
            (Some(file), None) => write!(f, "{file}")?,
            (None, _) => write!(f, "<unknown>")?,
        }
        if let Some(parent) = &self.included_from {
            write!(f, " (included from {parent})")?;
        }
        Ok(())
    }
}

/// One logical line after include resolution.
///
/// Never blank and never a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationLine {
    content: String,
    source: ConfigurationSource,
}

impl ConfigurationLine {
    /// Creates a new line.
    #[must_use]
    pub fn new(content: impl Into<String>, source: ConfigurationSource) -> Self {
        Self {
            content: content.into(),
            source,
        }
    }

    /// Returns the trimmed line text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns where the line came from.
    #[must_use]
    pub fn source(&self) -> &ConfigurationSource {
        &self.source
    }

    /// Returns the repository-relative file name.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.source.file_name()
    }

    /// Returns the 1-indexed physical line number.
    #[must_use]
    pub fn line_number(&self) -> Option<usize> {
        self.source.line_number()
    }

    /// Returns the including file, if any.
    #[must_use]
    pub fn included_from(&self) -> Option<&str> {
        self.source.included_from()
    }
}

/// A decoded value together with its provenance.
///
/// Equality compares the value only; the source is metadata.
#[derive(Debug, Clone)]
pub struct ConfigurationValue<T> {
    value: T,
    source: ConfigurationSource,
}

impl<T> ConfigurationValue<T> {
    /// Wraps a value with its source.
    #[must_use]
    pub fn new(value: T, source: ConfigurationSource) -> Self {
        Self { value, source }
    }

    /// Returns the decoded value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns where the value was declared.
    #[must_use]
    pub fn source(&self) -> &ConfigurationSource {
        &self.source
    }

    /// Consumes the wrapper and returns the value.
    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T: PartialEq> PartialEq for ConfigurationValue<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for ConfigurationValue<T> {}

impl<T: fmt::Display> fmt::Display for ConfigurationValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_zero_is_recorded_as_unknown() {
        let source = ConfigurationSource::new("dispatcher.any", 0);
        assert_eq!(source.file_name(), Some("dispatcher.any"));
        assert!(source.line_number().is_none());
    }

    #[test]
    fn display_includes_parent_file() {
        let source = ConfigurationSource::new("farms/publish.farm", 12)
            .with_included_from(Some("dispatcher.any"));
        assert_eq!(
            source.to_string(),
            "farms/publish.farm:12 (included from dispatcher.any)"
        );
        assert_eq!(ConfigurationSource::unknown().to_string(), "<unknown>");
    }

    #[test]
    fn value_equality_ignores_source() {
        let a = ConfigurationValue::new(2_i64, ConfigurationSource::new("a.any", 1));
        let b = ConfigurationValue::new(2_i64, ConfigurationSource::new("b.any", 9));
        let c = ConfigurationValue::new(3_i64, ConfigurationSource::new("a.any", 1));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
