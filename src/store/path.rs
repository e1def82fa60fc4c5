//! Data paths relative to a mount point's root.

use std::fmt;

use serde::{Serialize, Serializer};

/// Slash-separated path to a node inside a store's data tree.
///
/// The empty path addresses the root. Only the first segment may carry a
/// `module:` or `prefix:` qualifier; it names a top-level data node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataPath {
    segments: Vec<String>,
}

impl DataPath {
    /// The root path.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parses `a/b/c`. Leading, trailing and repeated slashes are ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self {
            segments: raw
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Builds a path from segments.
    #[must_use]
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the first segment, which names a top-level data node.
    #[must_use]
    pub fn top_level(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Replaces the first segment, leaving the root path unchanged.
    #[must_use]
    pub fn with_top_level(mut self, name: impl Into<String>) -> Self {
        if let Some(first) = self.segments.first_mut() {
            *first = name.into();
        }
        self
    }

    /// Returns `true` for the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns `true` if `self` is a prefix of `other` (or equal to it).
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Returns `true` if one path contains the other.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

impl Serialize for DataPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ignores_redundant_slashes() {
        let path = DataPath::parse("/interfaces//interface/eth0/");
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.to_string(), "/interfaces/interface/eth0");
        assert_eq!(path.top_level(), Some("interfaces"));
        assert!(DataPath::parse("///").is_empty());
    }

    #[test]
    fn with_top_level_keeps_the_rest() {
        let path = DataPath::parse("ex:system/hostname").with_top_level("system");
        assert_eq!(path.to_string(), "/system/hostname");
        assert!(DataPath::root().with_top_level("system").is_empty());
    }

    #[test]
    fn overlap_is_prefix_relation() {
        let parent = DataPath::parse("a/b");
        let child = DataPath::parse("a/b/c");
        let sibling = DataPath::parse("a/x");
        assert!(parent.overlaps(&child));
        assert!(child.overlaps(&parent));
        assert!(!child.overlaps(&sibling));
        assert!(DataPath::root().overlaps(&sibling));
    }
}
