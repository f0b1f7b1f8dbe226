use std::fmt;

use smallvec::SmallVec;

/// Slash-separated hierarchical address of one scene location.
///
/// The root location is the empty path, displayed as `/`. Paths are cheap
/// to clone and compare; most real hierarchies stay within the inline
/// segment capacity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ScenePath {
    segments: SmallVec<[String; 4]>,
}

impl ScenePath {
    /// The root location `/`.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a slash-separated path. Empty segments are ignored, so
    /// `"/a//b/"` parses the same as `"/a/b"`.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The last segment, or `None` for the root.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The parent location, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].into(),
        })
    }

    /// The path extended by one child segment.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_owned());
        Self { segments }
    }

    /// True if `ancestor` is this path or one of its ancestors.
    #[must_use]
    pub fn starts_with(&self, ancestor: &Self) -> bool {
        self.segments.len() >= ancestor.segments.len()
            && self.segments[..ancestor.segments.len()] == ancestor.segments[..]
    }

    /// The path with its first `n` segments removed.
    ///
    /// Used by nodes that re-root their inputs under a named location and
    /// must remap the path before querying upstream.
    #[must_use]
    pub fn strip_prefix(&self, n: usize) -> Self {
        Self {
            segments: self.segments[n.min(self.segments.len())..].into(),
        }
    }
}

impl fmt::Display for ScenePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for ScenePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_roundtrip() {
        assert_eq!(ScenePath::parse("/a/b").to_string(), "/a/b");
        assert_eq!(ScenePath::parse("/").to_string(), "/");
        assert_eq!(ScenePath::parse("/a//b/"), ScenePath::parse("/a/b"));
    }

    #[test]
    fn parent_and_child() {
        let p = ScenePath::parse("/group/plane");
        assert_eq!(p.parent(), Some(ScenePath::parse("/group")));
        assert_eq!(ScenePath::root().parent(), None);
        assert_eq!(ScenePath::root().child("group").child("plane"), p);
    }

    #[test]
    fn ancestry() {
        let p = ScenePath::parse("/a/b/c");
        assert!(p.starts_with(&ScenePath::parse("/a/b")));
        assert!(p.starts_with(&ScenePath::root()));
        assert!(!p.starts_with(&ScenePath::parse("/a/x")));
        assert_eq!(p.strip_prefix(1), ScenePath::parse("/b/c"));
    }
}
