//! Path segments and paths used to address option values.
//!
//! A [`ConfigPath`] is a sequence of [`Segment`]s. Literal sections name a
//! member; the wildcard segments describe repeated structures (array indices
//! and dictionary keys) and are never bound literally.

use serde::{Serialize, Serializer};
use std::fmt;

/// Delimiter between rendered path segments (`Read:0`, `Logging:Level`).
pub const PATH_DELIMITER: char = ':';

/// Case sensitivity policy for option names and command names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionComparer {
    /// Names compare equal regardless of case (the default).
    #[default]
    IgnoreCase,
    /// Names must match exactly.
    Exact,
}

impl OptionComparer {
    /// Compare two names under this policy.
    pub fn equals(&self, a: &str, b: &str) -> bool {
        match self {
            OptionComparer::Exact => a == b,
            OptionComparer::IgnoreCase => a
                .chars()
                .flat_map(char::to_lowercase)
                .eq(b.chars().flat_map(char::to_lowercase)),
        }
    }
}

/// A named path segment with an optional description.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSection {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Literal name match; descriptions are ignored.
    pub fn matches(&self, segment: &str) -> bool {
        self.name == segment
    }
}

impl PartialEq for ConfigSection {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ConfigSection {}

/// One component of a [`ConfigPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A literal member name.
    Section(ConfigSection),
    /// Any list index.
    AnyInteger,
    /// Any integral dictionary key. Renders like [`Segment::AnyInteger`] but
    /// addresses map entries, so negative and sparse keys are allowed.
    AnyIntegerKey,
    /// Any key; stands for a dictionary key.
    AnyString,
}

impl Segment {
    /// Check whether a concrete key segment is matched by this segment.
    pub fn matches(&self, segment: &str, comparer: OptionComparer) -> bool {
        match self {
            Segment::Section(section) => comparer.equals(&section.name, segment),
            Segment::AnyInteger => segment.parse::<usize>().is_ok(),
            Segment::AnyIntegerKey => segment.parse::<i64>().is_ok(),
            Segment::AnyString => !segment.is_empty(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        !matches!(self, Segment::Section(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Section(section) => f.write_str(&section.name),
            Segment::AnyInteger | Segment::AnyIntegerKey => f.write_str("#"),
            Segment::AnyString => f.write_str("*"),
        }
    }
}

impl From<ConfigSection> for Segment {
    fn from(section: ConfigSection) -> Self {
        Segment::Section(section)
    }
}

/// An ordered sequence of segments addressing a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPath {
    segments: Vec<Segment>,
}

impl ConfigPath {
    /// The empty (root) path.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    /// Build a path of literal sections from a whitespace separated name,
    /// e.g. `"remote add"` for a nested subcommand. Empty input is the root.
    pub fn from_words(name: &str) -> Self {
        Self::from_segments(
            name.split_whitespace()
                .map(|word| Segment::Section(ConfigSection::new(word))),
        )
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// The last literal section, used for command descriptions and prompts.
    pub fn last_section(&self) -> Option<&ConfigSection> {
        self.segments.iter().rev().find_map(|segment| match segment {
            Segment::Section(section) => Some(section),
            _ => None,
        })
    }

    /// Return a new path with `segment` appended.
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// Return a new path made of `self` followed by `other`.
    pub fn join(&self, other: &ConfigPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    pub fn has_wildcards(&self) -> bool {
        self.segments.iter().any(Segment::is_wildcard)
    }

    /// Check whether a rendered key (e.g. `Env:HOME`) is described by this
    /// path, segment by segment.
    pub fn matches(&self, key: &str, comparer: OptionComparer) -> bool {
        let parts: Vec<&str> = key.split(PATH_DELIMITER).collect();
        parts.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(&parts)
                .all(|(segment, part)| segment.matches(part, comparer))
    }

    /// Check whether a rendered key addresses something strictly below this
    /// path.
    pub fn is_prefix_of(&self, key: &str, comparer: OptionComparer) -> bool {
        let parts: Vec<&str> = key.split(PATH_DELIMITER).collect();
        parts.len() > self.segments.len()
            && self
                .segments
                .iter()
                .zip(&parts)
                .all(|(segment, part)| segment.matches(part, comparer))
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", PATH_DELIMITER)?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl From<ConfigSection> for ConfigPath {
    fn from(section: ConfigSection) -> Self {
        Self {
            segments: vec![Segment::Section(section)],
        }
    }
}

impl Serialize for ConfigPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str) -> Segment {
        Segment::Section(ConfigSection::new(name))
    }

    #[test]
    fn test_render_joins_with_delimiter() {
        let path = ConfigPath::from_segments([section("Logging"), section("Level")]);
        assert_eq!(path.to_string(), "Logging:Level");
    }

    #[test]
    fn test_render_wildcards() {
        let path = ConfigPath::from_segments([
            section("Servers"),
            Segment::AnyInteger,
            section("Tags"),
            Segment::AnyString,
        ]);
        assert_eq!(path.to_string(), "Servers:#:Tags:*");
        assert!(path.has_wildcards());
    }

    #[test]
    fn test_root_is_empty() {
        let path = ConfigPath::from_words("   ");
        assert!(path.is_empty());
        assert_eq!(path.to_string(), "");
    }

    #[test]
    fn test_from_words_splits_subcommands() {
        let path = ConfigPath::from_words("remote add");
        assert_eq!(path.len(), 2);
        assert_eq!(path.last_section().map(|s| s.name.as_str()), Some("add"));
    }

    #[test]
    fn test_section_equality_ignores_description() {
        let a = ConfigSection::new("file").with_description("The file");
        let b = ConfigSection::new("file");
        assert_eq!(a, b);
        assert!(a.matches("file"));
        assert!(!a.matches("File"));
    }

    #[test]
    fn test_matches_wildcard_key() {
        let path = ConfigPath::from_segments([section("Env"), Segment::AnyString]);
        assert!(path.matches("env:HOME", OptionComparer::IgnoreCase));
        assert!(!path.matches("env:HOME", OptionComparer::Exact));
        assert!(!path.matches("Env", OptionComparer::IgnoreCase));

        let indexed = ConfigPath::from_segments([section("Ports"), Segment::AnyInteger]);
        assert!(indexed.matches("Ports:3", OptionComparer::Exact));
        assert!(!indexed.matches("Ports:x", OptionComparer::Exact));
        assert!(!indexed.matches("Ports:-1", OptionComparer::Exact));

        let keyed = ConfigPath::from_segments([section("Slots"), Segment::AnyIntegerKey]);
        assert!(keyed.matches("Slots:-1", OptionComparer::Exact));
        assert!(!keyed.matches("Slots:x", OptionComparer::Exact));
        assert_eq!(keyed.to_string(), "Slots:#");
    }

    #[test]
    fn test_is_prefix_of_needs_deeper_key() {
        let path = ConfigPath::from_segments([section("Servers"), Segment::AnyInteger]);
        assert!(path.is_prefix_of("servers:0:Host", OptionComparer::IgnoreCase));
        assert!(!path.is_prefix_of("Servers:0", OptionComparer::IgnoreCase));
        assert!(!path.is_prefix_of("Servers:x:Host", OptionComparer::IgnoreCase));
        assert!(!path.is_prefix_of("Proxy:Host", OptionComparer::IgnoreCase));
    }

    #[test]
    fn test_comparer_ignore_case_handles_unicode() {
        assert!(OptionComparer::IgnoreCase.equals("ÄRGER", "ärger"));
        assert!(!OptionComparer::Exact.equals("Read", "read"));
    }

    #[test]
    fn test_serializes_as_string() {
        let path = ConfigPath::from_segments([section("Read"), Segment::AnyInteger]);
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"Read:#\"");
    }
}
