//! Schema source identity and raw source text.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::CapabilityDescriptor;

/// File extension of cached schema sources.
pub const SOURCE_EXTENSION: &str = "yang";

/// Identifies one schema source: a module name plus optional revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourceIdentifier {
    /// Module name.
    pub name: String,
    /// Revision date (`YYYY-MM-DD`), if pinned.
    pub revision: Option<String>,
}

impl SourceIdentifier {
    /// Creates an identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, revision: Option<String>) -> Self {
        Self {
            name: name.into(),
            revision,
        }
    }

    /// Returns the cache file name: `name@revision.yang` or `name.yang`.
    #[must_use]
    pub fn file_name(&self) -> String {
        match &self.revision {
            Some(revision) => format!("{}@{}.{SOURCE_EXTENSION}", self.name, revision),
            None => format!("{}.{SOURCE_EXTENSION}", self.name),
        }
    }

    /// Parses a cache file name back into an identifier.
    ///
    /// Returns `None` for files that are not schema sources.
    #[must_use]
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(SOURCE_EXTENSION)?.strip_suffix('.')?;
        if stem.is_empty() {
            return None;
        }
        Some(match stem.split_once('@') {
            Some((name, revision)) if !name.is_empty() && !revision.is_empty() => {
                Self::new(name, Some(revision.to_string()))
            }
            Some(_) => return None,
            None => Self::new(stem, None),
        })
    }

    /// Returns `true` if this identifier satisfies a request for `wanted`:
    /// same name, and same revision unless `wanted` leaves it open.
    #[must_use]
    pub fn satisfies(&self, wanted: &Self) -> bool {
        self.name == wanted.name && (wanted.revision.is_none() || self.revision == wanted.revision)
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(revision) => write!(f, "{}@{}", self.name, revision),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&CapabilityDescriptor> for SourceIdentifier {
    fn from(descriptor: &CapabilityDescriptor) -> Self {
        Self::new(descriptor.module.clone(), descriptor.revision.clone())
    }
}

/// Raw schema source text with its identifier.
///
/// Cloning is cheap: the text is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSource {
    /// Source identifier.
    pub id: SourceIdentifier,
    /// Raw module text.
    pub text: Arc<str>,
}

impl SchemaSource {
    /// Creates a source from an identifier and text.
    #[must_use]
    pub fn new(id: SourceIdentifier, text: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// Picks the newest revision among candidates satisfying `wanted`.
///
/// Revisions are ISO dates, so lexical order is chronological; a candidate
/// without revision ranks below any dated one.
pub(crate) fn newest<'a, I>(candidates: I, wanted: &SourceIdentifier) -> Option<&'a SourceIdentifier>
where
    I: IntoIterator<Item = &'a SourceIdentifier>,
{
    candidates
        .into_iter()
        .filter(|id| id.satisfies(wanted))
        .max_by(|a, b| a.revision.cmp(&b.revision))
}
