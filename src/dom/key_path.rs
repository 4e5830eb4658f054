//! Key-paths: the stable identity of a node across builds.

use smallvec::SmallVec;
use std::fmt;

/// Delimiter joining an expanded node's key with its replacement's key.
pub const LINEAGE_DELIMITER: char = '-';

/// Ordered sequence of keys from the tree root to a node.
///
/// Displayed dot-joined (`Group.Empty1`). Persisted state and handle
/// targets are addressed by key-path, so it must not change between
/// builds of the same tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(SmallVec<[String; 4]>);

impl KeyPath {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Path with a single root key.
    pub fn root(key: impl Into<String>) -> Self {
        let mut path = Self::new();
        path.push(key);
        path
    }

    /// New path extended by one key.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push(key);
        path
    }

    #[inline]
    pub fn push(&mut self, key: impl Into<String>) {
        self.0.push(key.into());
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].iter().cloned().collect()))
    }

    /// The node's own key.
    #[inline]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &KeyPath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// JSON array rendering, used as the namespace key in persisted state.
    pub fn to_json_string(&self) -> String {
        serde_json::Value::from(self.0.to_vec()).to_string()
    }

    /// Parse the JSON array rendering produced by [`KeyPath::to_json_string`].
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        let keys: Vec<String> = serde_json::from_str(s)?;
        Ok(keys.into_iter().collect())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(key)?;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for KeyPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Key of a replacement produced by expanding the node keyed `orig`.
///
/// `App` expanding into a `Group` yields `App-Group`.
#[inline]
pub fn lineage_key(orig: &str, replacement: &str) -> String {
    format!("{orig}{LINEAGE_DELIMITER}{replacement}")
}
