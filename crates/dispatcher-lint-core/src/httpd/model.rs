//! Arena-backed HTTPD section tree.
//!
//! Sections own their children top-down; the parent link is an index into
//! the arena and is only used for lookups.

use crate::source::ConfigurationSource;

/// Index of a section in [`HttpdConfiguration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectionId(usize);

impl SectionId {
    /// The root section.
    pub const ROOT: SectionId = SectionId(0);
}

/// Kind of a section, derived from its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    /// The implicit top-level section.
    Root,
    /// `<VirtualHost>`.
    VirtualHost,
    /// `<Directory>` or `<DirectoryMatch>`.
    Directory,
    /// `<Location>` or `<LocationMatch>`.
    Location,
    /// `<Files>` or `<FilesMatch>`.
    Files,
    /// `<IfModule>`.
    IfModule,
    /// Any other section tag.
    Other,
}

impl SectionKind {
    /// Classifies a tag name case-insensitively.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "virtualhost" => Self::VirtualHost,
            "directory" | "directorymatch" => Self::Directory,
            "location" | "locationmatch" => Self::Location,
            "files" | "filesmatch" => Self::Files,
            "ifmodule" => Self::IfModule,
            _ => Self::Other,
        }
    }
}

/// A directive such as `Require all granted`.
///
/// Equality compares name and arguments; the source is metadata.
#[derive(Debug, Clone)]
pub struct Directive {
    name: String,
    arguments: Vec<String>,
    source: ConfigurationSource,
}

impl Directive {
    /// Creates a directive.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Vec<String>, source: ConfigurationSource) -> Self {
        Self {
            name: name.into(),
            arguments,
            source,
        }
    }

    /// Returns the name as written.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the arguments with quotes removed.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Returns where the directive was declared.
    #[must_use]
    pub fn source(&self) -> &ConfigurationSource {
        &self.source
    }

    /// Case-insensitive name comparison.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl PartialEq for Directive {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.arguments == other.arguments
    }
}

impl Eq for Directive {}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for argument in &self.arguments {
            write!(f, " {argument}")?;
        }
        Ok(())
    }
}

/// One section node.
#[derive(Debug, Clone)]
pub struct Section {
    kind: SectionKind,
    tag: String,
    arguments: Vec<String>,
    directives: Vec<Directive>,
    children: Vec<SectionId>,
    parent: Option<SectionId>,
    source: ConfigurationSource,
}

impl Section {
    /// Returns the kind.
    #[must_use]
    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    /// Returns the tag as written, empty for the root.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the opener's arguments with quotes removed.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Returns the directives declared directly in this section.
    #[must_use]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Returns where the section was opened.
    #[must_use]
    pub fn source(&self) -> &ConfigurationSource {
        &self.source
    }
}

/// A parsed HTTPD configuration. The root section is always present.
#[derive(Debug, Clone)]
pub struct HttpdConfiguration {
    sections: Vec<Section>,
}

impl Default for HttpdConfiguration {
    fn default() -> Self {
        Self::new(ConfigurationSource::unknown())
    }
}

impl HttpdConfiguration {
    /// Creates a configuration holding only the root section.
    #[must_use]
    pub fn new(source: ConfigurationSource) -> Self {
        Self {
            sections: vec![Section {
                kind: SectionKind::Root,
                tag: String::new(),
                arguments: Vec::new(),
                directives: Vec::new(),
                children: Vec::new(),
                parent: None,
                source,
            }],
        }
    }

    /// Returns the root section.
    #[must_use]
    pub fn root(&self) -> SectionRef<'_> {
        self.section(SectionId::ROOT)
    }

    /// Returns a view of a section.
    ///
    /// Ids are only handed out by this configuration, so they always resolve.
    #[must_use]
    pub fn section(&self, id: SectionId) -> SectionRef<'_> {
        SectionRef { config: self, id }
    }

    /// Returns the number of sections, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Always false: the root section exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// All sections in document order.
    pub fn sections(&self) -> impl Iterator<Item = SectionRef<'_>> {
        (0..self.sections.len()).map(|i| self.section(SectionId(i)))
    }

    pub(crate) fn add_section(
        &mut self,
        parent: SectionId,
        tag: &str,
        arguments: Vec<String>,
        source: ConfigurationSource,
    ) -> SectionId {
        let id = SectionId(self.sections.len());
        self.sections.push(Section {
            kind: SectionKind::from_tag(tag),
            tag: tag.to_string(),
            arguments,
            directives: Vec::new(),
            children: Vec::new(),
            parent: Some(parent),
            source,
        });
        if let Some(parent) = self.sections.get_mut(parent.0) {
            parent.children.push(id);
        }
        id
    }

    pub(crate) fn add_directive(&mut self, section: SectionId, directive: Directive) {
        if let Some(section) = self.sections.get_mut(section.0) {
            section.directives.push(directive);
        }
    }

    fn get(&self, id: SectionId) -> &Section {
        &self.sections[id.0]
    }
}

/// Borrowed view of a section inside its configuration.
#[derive(Debug, Clone, Copy)]
pub struct SectionRef<'a> {
    config: &'a HttpdConfiguration,
    id: SectionId,
}

impl<'a> SectionRef<'a> {
    /// Returns the section id.
    #[must_use]
    pub fn id(self) -> SectionId {
        self.id
    }

    /// Returns the underlying section.
    #[must_use]
    pub fn section(self) -> &'a Section {
        self.config.get(self.id)
    }

    /// Returns the kind.
    #[must_use]
    pub fn kind(self) -> SectionKind {
        self.section().kind
    }

    /// Returns the opener's arguments.
    #[must_use]
    pub fn arguments(self) -> &'a [String] {
        &self.section().arguments
    }

    /// Returns the directives declared directly in this section.
    #[must_use]
    pub fn directives(self) -> &'a [Directive] {
        &self.section().directives
    }

    /// Returns where the section was opened.
    #[must_use]
    pub fn source(self) -> &'a ConfigurationSource {
        &self.section().source
    }

    /// Returns the enclosing section, `None` for the root.
    #[must_use]
    pub fn parent(self) -> Option<SectionRef<'a>> {
        self.section().parent.map(|id| self.config.section(id))
    }

    /// Returns the direct child sections in document order.
    pub fn children(self) -> impl Iterator<Item = SectionRef<'a>> {
        let config = self.config;
        self.section().children.iter().map(move |&id| config.section(id))
    }

    /// Returns every section below this one, depth-first in document order.
    #[must_use]
    pub fn descendants(self) -> Vec<SectionRef<'a>> {
        let mut out = Vec::new();
        let mut stack: Vec<SectionId> = self.section().children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let section = self.config.section(id);
            out.push(section);
            stack.extend(section.section().children.iter().rev().copied());
        }
        out
    }

    /// Returns this section and its ancestors, innermost first.
    pub fn ancestors_and_self(self) -> impl Iterator<Item = SectionRef<'a>> {
        std::iter::successors(Some(self), |s| s.parent())
    }

    /// Returns the last matching directive declared directly in this section.
    #[must_use]
    pub fn directive(self, name: &str) -> Option<&'a Directive> {
        self.directives().iter().rev().find(|d| d.is_named(name))
    }

    /// Looks a directive up in this section, then outward through its parents.
    #[must_use]
    pub fn effective_directive(self, name: &str) -> Option<&'a Directive> {
        self.ancestors_and_self().find_map(|s| s.directive(name))
    }
}
