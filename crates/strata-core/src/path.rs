//! Node paths for addressing within the preference tree
//!
//! Provides [`NodePath`] for absolute, slash-separated node addresses and the
//! [`encode_path`] / [`decode_path`] pair used to flatten `(path, key)` pairs
//! into a single string for persistence and export.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path segment separator
pub const SEPARATOR: char = '/';

/// Marker between path and key when the key itself contains [`SEPARATOR`]
pub const DOUBLE_SEPARATOR: &str = "//";

/// Absolute path of a node in the preference tree
///
/// The first segment is the scope name, the second the qualifier.
///
/// # Examples
/// - `[]` → `/`
/// - `["instance", "app", "editor"]` → `/instance/app/editor`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodePath(Vec<String>);

impl NodePath {
    /// Create new path from segments
    ///
    /// # Errors
    /// Returns error if any segment is empty or contains the separator
    pub fn new(segments: Vec<String>) -> Result<Self, PathError> {
        for seg in &segments {
            validate_segment(seg)?;
        }
        Ok(Self(segments))
    }

    /// The root path `/`
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments (0 for the root)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is the root
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Last segment, the node name (empty for the root)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.last().map_or("", String::as_str)
    }

    /// Scope name (first segment)
    #[inline]
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Qualifier (second segment)
    #[inline]
    #[must_use]
    pub fn qualifier(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    /// Append a segment, returning new path
    ///
    /// # Errors
    /// Returns error if the segment is empty or contains the separator
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, PathError> {
        let segment = segment.into();
        validate_segment(&segment)?;
        let mut new = self.clone();
        new.0.push(segment);
        Ok(new)
    }

    /// Ancestor with exactly `depth` segments
    ///
    /// Returns `None` when the path is shallower than `depth`.
    #[must_use]
    pub fn ancestor(&self, depth: usize) -> Option<Self> {
        if depth > self.0.len() {
            None
        } else {
            Some(Self(self.0[..depth].to_vec()))
        }
    }

    /// Check if this path is a prefix of another
    ///
    /// # Examples
    /// - `/instance` is prefix of `/instance/app`
    /// - `/instance/app` is NOT prefix of `/instance/other`
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        self.0 == other.0[..self.0.len()]
    }

    /// Check if this path is a strict ancestor of another
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }

    /// Relative path from ancestor, joined with [`SEPARATOR`]
    ///
    /// The ancestor itself yields the empty string.
    ///
    /// # Errors
    /// Returns error if `self` is not a descendant of `ancestor`
    pub fn relative_to(&self, ancestor: &Self) -> Result<String, PathError> {
        if !ancestor.is_prefix_of(self) {
            return Err(PathError::NotDescendant {
                path: self.to_string(),
                ancestor: ancestor.to_string(),
            });
        }
        Ok(self.0[ancestor.0.len()..].join("/"))
    }

    /// Resolve a relative (`a/b`) or absolute (`/a/b`) path against this one
    ///
    /// The empty string resolves to `self`.
    ///
    /// # Errors
    /// Returns error for empty segments (`a//b`) or a trailing separator
    pub fn resolve(&self, path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Ok(self.clone());
        }
        if let Some(absolute) = path.strip_prefix(SEPARATOR) {
            return Self::root().resolve_relative(absolute, path);
        }
        self.resolve_relative(path, path)
    }

    fn resolve_relative(&self, relative: &str, original: &str) -> Result<Self, PathError> {
        let mut new = self.clone();
        if relative.is_empty() {
            return Ok(new);
        }
        for seg in relative.split(SEPARATOR) {
            if seg.is_empty() {
                return Err(PathError::EmptySegment(original.to_string()));
            }
            new.0.push(seg.to_string());
        }
        Ok(new)
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn validate_segment(seg: &str) -> Result<(), PathError> {
    if seg.is_empty() {
        Err(PathError::EmptySegment(seg.to_string()))
    } else if seg.contains(SEPARATOR) {
        Err(PathError::InvalidSegment(seg.to_string()))
    } else {
        Ok(())
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for seg in &self.0 {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with(SEPARATOR) {
            return Err(PathError::NotAbsolute(s.to_string()));
        }
        Self::root().resolve(s)
    }
}

/// Flatten a `(path, key)` pair into one string
///
/// `path/key` when the key has no separator, `path//key` otherwise. An empty
/// path yields `key` or `//key`.
#[must_use]
pub fn encode_path(path: &str, key: &str) -> String {
    let marker = if key.contains(SEPARATOR) {
        DOUBLE_SEPARATOR
    } else if path.is_empty() {
        ""
    } else {
        "/"
    };
    let mut out = String::with_capacity(path.len() + marker.len() + key.len());
    out.push_str(path);
    out.push_str(marker);
    out.push_str(key);
    out
}

/// Split an encoded string back into `(path, key)`
///
/// The double separator is searched first; otherwise the last separator
/// splits path from key. A leading separator is stripped from the path and
/// an empty path is returned as `None`.
#[must_use]
pub fn decode_path(encoded: &str) -> (Option<&str>, &str) {
    let (path, key) = if let Some(index) = encoded.find(DOUBLE_SEPARATOR) {
        (Some(&encoded[..index]), &encoded[index + 2..])
    } else if let Some(index) = encoded.rfind(SEPARATOR) {
        (Some(&encoded[..index]), &encoded[index + 1..])
    } else {
        (None, encoded)
    };
    let path = path
        .map(|p| p.strip_prefix(SEPARATOR).unwrap_or(p))
        .filter(|p| !p.is_empty());
    (path, key)
}

/// Errors related to node paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path
    #[error("path contains empty segment: '{0}'")]
    EmptySegment(String),

    /// Segment contains the separator
    #[error("invalid segment: '{0}' (must not contain '/')")]
    InvalidSegment(String),

    /// Path must start with the separator
    #[error("path is not absolute: '{0}'")]
    NotAbsolute(String),

    /// Not a descendant path
    #[error("path '{path}' is not a descendant of '{ancestor}'")]
    NotDescendant { path: String, ancestor: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(s: &str) -> NodePath {
        NodePath::from_str(s).unwrap()
    }

    #[test]
    fn root_display() {
        assert_eq!(NodePath::root().to_string(), "/");
        assert!(NodePath::root().is_root());
    }

    #[test]
    fn parse_and_display() {
        let path = p("/instance/app/editor");
        assert_eq!(path.segments(), &["instance", "app", "editor"]);
        assert_eq!(path.to_string(), "/instance/app/editor");
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn scope_and_qualifier() {
        let path = p("/instance/app/editor");
        assert_eq!(path.scope(), Some("instance"));
        assert_eq!(path.qualifier(), Some("app"));
        assert_eq!(path.name(), "editor");
        assert_eq!(p("/instance").qualifier(), None);
    }

    #[test]
    fn parse_rejects_relative() {
        assert!(matches!(
            NodePath::from_str("instance/app"),
            Err(PathError::NotAbsolute(_))
        ));
    }

    #[test]
    fn parse_rejects_empty_segment() {
        assert!(matches!(
            NodePath::from_str("/instance//app"),
            Err(PathError::EmptySegment(_))
        ));
    }

    #[test]
    fn child_rejects_separator() {
        assert!(matches!(
            NodePath::root().child("a/b"),
            Err(PathError::InvalidSegment(_))
        ));
    }

    #[test]
    fn ancestor_by_depth() {
        let path = p("/instance/app/a/b");
        assert_eq!(path.ancestor(2), Some(p("/instance/app")));
        assert_eq!(path.ancestor(0), Some(NodePath::root()));
        assert_eq!(path.ancestor(5), None);
    }

    #[test]
    fn resolve_relative_and_absolute() {
        let base = p("/instance/app");
        assert_eq!(base.resolve("a/b").unwrap(), p("/instance/app/a/b"));
        assert_eq!(base.resolve("/default/x").unwrap(), p("/default/x"));
        assert_eq!(base.resolve("").unwrap(), base);
        assert_eq!(base.resolve("/").unwrap(), NodePath::root());
        assert!(base.resolve("a/").is_err());
    }

    #[test]
    fn relative_to_ancestor() {
        let full = p("/instance/app/a/b");
        assert_eq!(full.relative_to(&p("/instance/app")).unwrap(), "a/b");
        assert_eq!(full.relative_to(&full).unwrap(), "");
        assert!(matches!(
            full.relative_to(&p("/default")),
            Err(PathError::NotDescendant { .. })
        ));
    }

    #[test]
    fn prefix_and_ancestor() {
        let a = p("/instance");
        let b = p("/instance/app");
        assert!(a.is_prefix_of(&b));
        assert!(a.is_ancestor_of(&b));
        assert!(!b.is_ancestor_of(&a));
        assert!(!a.is_ancestor_of(&a));
    }

    #[test]
    fn encode_plain_key() {
        assert_eq!(encode_path("a/b", "key"), "a/b/key");
        assert_eq!(encode_path("", "key"), "key");
    }

    #[test]
    fn encode_key_with_separator() {
        assert_eq!(encode_path("a/b", "x/y"), "a/b//x/y");
        assert_eq!(encode_path("", "x/y"), "//x/y");
    }

    #[test]
    fn decode_forms() {
        assert_eq!(decode_path("key"), (None, "key"));
        assert_eq!(decode_path("a/b/key"), (Some("a/b"), "key"));
        assert_eq!(decode_path("a/b//x/y"), (Some("a/b"), "x/y"));
        assert_eq!(decode_path("//x/y"), (None, "x/y"));
        assert_eq!(decode_path("/instance/app/key"), (Some("instance/app"), "key"));
    }

    proptest! {
        #[test]
        fn prop_encode_decode_is_bijective(
            segments in prop::collection::vec("[a-z0-9._-]{1,6}", 0..4),
            key in "[a-z0-9/._=-]{1,8}",
        ) {
            let path = segments.join("/");
            let encoded = encode_path(&path, &key);
            let (decoded_path, decoded_key) = decode_path(&encoded);
            prop_assert_eq!(decoded_path.unwrap_or(""), path.as_str());
            prop_assert_eq!(decoded_key, key.as_str());
        }
    }
}
