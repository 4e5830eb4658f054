//! Structural delta between two built trees.
//!
//! Nodes are matched by key-path. A path present in both trees whose nodes
//! have the same component type is common; every other node is added (new
//! tree only) or deleted (old tree only). A type change at a shared path
//! therefore shows up as one deletion plus one addition.
//!
//! # Invariants
//! - `diff(T, T)` has no additions or deletions, and both common lists
//!   cover every node of `T`
//! - `diff(None, T)` adds every node of `T`; `diff(T, None)` deletes them

use rustc_hash::FxHashMap;

use crate::dom::{BuiltElement, KeyPath};

/// Result of [`dom_diff`]. Every list is in depth-first order of its tree.
#[derive(Debug, Default)]
pub struct DomDiff<'a> {
    pub added: Vec<&'a BuiltElement>,
    pub deleted: Vec<&'a BuiltElement>,
    pub common_old: Vec<&'a BuiltElement>,
    pub common_new: Vec<&'a BuiltElement>,
    /// Common `(old, new)` pairs whose props differ.
    pub updated: Vec<(&'a BuiltElement, &'a BuiltElement)>,
}

impl<'a> DomDiff<'a> {
    /// True when no node was added, deleted or updated.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }

    pub fn added_paths(&self) -> Vec<&'a KeyPath> {
        self.added.iter().map(|n| n.key_path()).collect()
    }

    pub fn deleted_paths(&self) -> Vec<&'a KeyPath> {
        self.deleted.iter().map(|n| n.key_path()).collect()
    }

    pub fn common_paths(&self) -> Vec<&'a KeyPath> {
        self.common_new.iter().map(|n| n.key_path()).collect()
    }

    pub fn updated_paths(&self) -> Vec<&'a KeyPath> {
        self.updated.iter().map(|(_, n)| n.key_path()).collect()
    }
}

fn index(tree: Option<&BuiltElement>) -> FxHashMap<&KeyPath, &BuiltElement> {
    tree.into_iter()
        .flat_map(BuiltElement::iter)
        .map(|node| (node.key_path(), node))
        .collect()
}

/// Compare two built trees.
pub fn dom_diff<'a>(old: Option<&'a BuiltElement>, new: Option<&'a BuiltElement>) -> DomDiff<'a> {
    let old_index = index(old);
    let new_index = index(new);
    let mut diff = DomDiff::default();

    for node in old.into_iter().flat_map(BuiltElement::iter) {
        match new_index.get(node.key_path()) {
            Some(other) if other.component() == node.component() => diff.common_old.push(node),
            _ => diff.deleted.push(node),
        }
    }

    for node in new.into_iter().flat_map(BuiltElement::iter) {
        match old_index.get(node.key_path()) {
            Some(prev) if prev.component() == node.component() => {
                if prev.props().values != node.props().values || prev.props().refs != node.props().refs {
                    diff.updated.push((*prev, node));
                }
                diff.common_new.push(node);
            }
            _ => diff.added.push(node),
        }
    }

    diff
}
