//! Sibling key assignment.
//!
//! The tracker keeps one scope per tree level. Entering a level with
//! [`KeyTracker::path_push`] starts fresh per-type counters under the most
//! recently added key; [`KeyTracker::path_pop`] restores the parent scope.
//!
//! Within a scope, explicit keys are [`reserve`](KeyTracker::reserve)d up
//! front so auto keys (`Name`, `Name1`, `Name2`, ...) can skip them without
//! explicit keys consuming a counter slot.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::dom::KeyPath;

#[derive(Debug, Default)]
struct Scope {
    taken: FxHashSet<String>,
    counters: FxHashMap<String, usize>,
    last: Option<String>,
}

#[derive(Debug)]
pub struct KeyTracker {
    /// Keys of the enclosing levels, root first.
    path: Vec<String>,
    scopes: Vec<Scope>,
}

impl Default for KeyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyTracker {
    pub fn new() -> Self {
        Self {
            path: Vec::new(),
            scopes: vec![Scope::default()],
        }
    }

    fn scope(&mut self) -> &mut Scope {
        if self.scopes.is_empty() {
            self.scopes.push(Scope::default());
        }
        let top = self.scopes.len() - 1;
        &mut self.scopes[top]
    }

    /// Claim an explicit key in the current scope.
    ///
    /// Returns false if a sibling already holds it.
    pub fn reserve(&mut self, key: &str) -> bool {
        self.scope().taken.insert(key.to_string())
    }

    /// Record one sibling of type `name` and return its key.
    ///
    /// An explicit key is used verbatim (and reserved if it was not
    /// already). Otherwise the next free `Name<n>` is generated.
    pub fn add_key(&mut self, name: &str, explicit: Option<&str>) -> String {
        let scope = self.scope();
        let key = match explicit {
            Some(key) => {
                scope.taken.insert(key.to_string());
                key.to_string()
            }
            None => {
                let counter = scope.counters.entry(name.to_string()).or_insert(0);
                let key = loop {
                    let candidate = match *counter {
                        0 => name.to_string(),
                        n => format!("{name}{n}"),
                    };
                    *counter += 1;
                    if !scope.taken.contains(&candidate) {
                        break candidate;
                    }
                };
                scope.taken.insert(key.clone());
                key
            }
        };
        scope.last = Some(key.clone());
        key
    }

    /// Rename the most recently added key, e.g. to its lineage key.
    pub fn set_last_key(&mut self, key: impl Into<String>) {
        let key = key.into();
        let scope = self.scope();
        scope.taken.insert(key.clone());
        scope.last = Some(key);
    }

    /// Enter the level below the most recently added key.
    pub fn path_push(&mut self) {
        let parent = self.scope().last.clone().unwrap_or_default();
        self.path.push(parent);
        self.scopes.push(Scope::default());
    }

    /// Leave the current level, restoring the parent's counters.
    pub fn path_pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
            self.path.pop();
        }
    }

    pub fn last_key(&self) -> Option<&str> {
        self.scopes.last().and_then(|s| s.last.as_deref())
    }

    /// Path from the root to the most recently added key.
    pub fn current_path(&self) -> KeyPath {
        self.path
            .iter()
            .map(String::as_str)
            .chain(self.last_key())
            .collect()
    }

    /// Dot-joined [`KeyTracker::current_path`].
    pub fn last_key_path(&self) -> String {
        self.current_path().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_keys_number_per_type() {
        let mut keys = KeyTracker::new();
        assert_eq!(keys.add_key("Empty", None), "Empty");
        assert_eq!(keys.add_key("Empty", None), "Empty1");
        assert_eq!(keys.add_key("Group", None), "Group");
        assert_eq!(keys.add_key("Empty", None), "Empty2");
    }

    #[test]
    fn test_explicit_keys_do_not_consume_counters() {
        let mut keys = KeyTracker::new();
        assert!(keys.reserve("web"));
        assert_eq!(keys.add_key("Empty", None), "Empty");
        assert_eq!(keys.add_key("Empty", Some("web")), "web");
        assert_eq!(keys.add_key("Empty", None), "Empty1");
    }

    #[test]
    fn test_auto_keys_skip_reserved_names() {
        let mut keys = KeyTracker::new();
        assert!(keys.reserve("Empty1"));
        assert_eq!(keys.add_key("Empty", None), "Empty");
        assert_eq!(keys.add_key("Empty", Some("Empty1")), "Empty1");
        assert_eq!(keys.add_key("Empty", None), "Empty2");
    }

    #[test]
    fn test_reserve_detects_duplicates() {
        let mut keys = KeyTracker::new();
        assert!(keys.reserve("a"));
        assert!(!keys.reserve("a"));
    }

    #[test]
    fn test_scopes_are_independent() {
        let mut keys = KeyTracker::new();
        keys.add_key("Group", None);
        keys.path_push();
        assert_eq!(keys.add_key("Empty", None), "Empty");
        assert_eq!(keys.last_key_path(), "Group.Empty");

        keys.path_push();
        assert_eq!(keys.add_key("Empty", None), "Empty");
        assert_eq!(keys.last_key_path(), "Group.Empty.Empty");
        keys.path_pop();

        assert_eq!(keys.add_key("Empty", None), "Empty1");
        assert_eq!(keys.last_key_path(), "Group.Empty1");
        keys.path_pop();
        assert_eq!(keys.last_key_path(), "Group");
    }

    #[test]
    fn test_set_last_key_renames_position() {
        let mut keys = KeyTracker::new();
        keys.add_key("App", None);
        keys.set_last_key("App-Group");
        assert_eq!(keys.last_key(), Some("App-Group"));
        keys.path_push();
        keys.add_key("Web", None);
        assert_eq!(
            keys.current_path(),
            ["App-Group", "Web"].into_iter().collect::<KeyPath>()
        );
    }
}
