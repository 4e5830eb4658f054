//! Built trees: the fully expanded output of a build.

use super::component::{ComponentType, DOM_ERROR};
use super::element::{Element, Props};
use super::key_path::KeyPath;
use crate::handle::Handle;

/// A node of a built tree.
///
/// Only primitives appear here, except for composites left unexpanded by a
/// depth-limited build. `props.children` is always empty; the built
/// children live in [`BuiltElement::children`].
#[derive(Debug, Clone)]
pub struct BuiltElement {
    pub(crate) component: ComponentType,
    pub(crate) key: String,
    pub(crate) key_path: KeyPath,
    /// Where this position's state lives in the store.
    pub(crate) state_namespace: KeyPath,
    pub(crate) props: Props,
    pub(crate) children: Vec<BuiltElement>,
}

impl BuiltElement {
    #[inline]
    pub fn component(&self) -> &ComponentType {
        &self.component
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.component.name()
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn key_path(&self) -> &KeyPath {
        &self.key_path
    }

    #[inline]
    pub fn state_namespace(&self) -> &KeyPath {
        &self.state_namespace
    }

    #[inline]
    pub fn props(&self) -> &Props {
        &self.props
    }

    #[inline]
    pub fn children(&self) -> &[BuiltElement] {
        &self.children
    }

    /// Handle of the element this node was built from.
    #[inline]
    pub fn handle(&self) -> Option<&Handle> {
        self.props.handle.as_ref()
    }

    /// True for `DomError` placeholders.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.name() == DOM_ERROR
    }

    /// Depth-first, pre-order traversal including `self`.
    pub fn iter(&self) -> Nodes<'_> {
        Nodes { stack: vec![self] }
    }

    /// Number of nodes in this subtree.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Find a node by absolute key-path.
    pub fn find(&self, path: &KeyPath) -> Option<&BuiltElement> {
        if !self.key_path.is_prefix_of(path) {
            return None;
        }
        let mut node = self;
        for key in &path.segments()[self.key_path.len()..] {
            node = node.children.iter().find(|c| c.key == *key)?;
        }
        Some(node)
    }

    /// Convert back into an element tree that builds to an equal tree.
    ///
    /// Assigned keys become explicit keys. The node's own `handle` is not
    /// carried over: a handle belongs to the element it was first embedded in.
    pub fn to_element(&self) -> Element {
        let children = self.children.iter().map(BuiltElement::to_element).collect();
        let props = Props {
            key: Some(self.key.clone()),
            handle: None,
            values: self.props.values.clone(),
            refs: self.props.refs.clone(),
            children,
        };
        Element::unbound(self.component.clone(), props)
    }
}

/// Structural equality: component type, keys, namespaces, values, refs and children.
impl PartialEq for BuiltElement {
    fn eq(&self, other: &Self) -> bool {
        self.component == other.component
            && self.key == other.key
            && self.key_path == other.key_path
            && self.state_namespace == other.state_namespace
            && self.props.values == other.props.values
            && self.props.refs == other.props.refs
            && self.children == other.children
    }
}

/// Iterator returned by [`BuiltElement::iter`].
pub struct Nodes<'a> {
    stack: Vec<&'a BuiltElement>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a BuiltElement;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
