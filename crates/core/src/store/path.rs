use std::fmt;

/// A slash-joined location in the per-user remote tree, rooted at the user
/// id. Keys the listener table, so it is `Hash + Eq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// Root of one authenticated user's subtree.
    pub fn root(user_id: impl Into<String>) -> Self {
        Self {
            segments: vec![user_id.into()],
        }
    }

    /// Appends a child segment.
    pub fn child(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when `self` is `other` or an ancestor of `other`.
    pub fn contains(&self, other: &StorePath) -> bool {
        other.segments.len() >= self.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}
