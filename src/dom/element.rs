//! Elements: immutable node descriptors that make up a component tree.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use super::component::ComponentType;
use crate::handle::{Handle, HandleError};

/// Component-specific props, in insertion order.
pub type PropMap = serde_json::Map<String, Value>;

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique element identity.
///
/// Every constructed element gets a fresh id, so two elements with equal
/// contents are still distinct. Rule bookkeeping and handle lineage are
/// tracked by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    fn next() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Props of an element.
///
/// `key` and `handle` are the two props every element understands.
/// Scalar and JSON props live in `values`; references to other nodes live
/// in `refs`; structural children in `children`.
#[derive(Debug, Clone, Default)]
pub struct Props {
    pub key: Option<String>,
    pub handle: Option<Handle>,
    pub values: PropMap,
    pub refs: BTreeMap<String, Handle>,
    pub children: Vec<Element>,
}

impl Props {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_i64)
    }

    /// Handle-valued prop.
    #[inline]
    pub fn reference(&self, name: &str) -> Option<&Handle> {
        self.refs.get(name)
    }

    /// Fill in defaults for values the element did not set.
    pub fn merge_defaults(&mut self, defaults: &PropMap) {
        for (name, value) in defaults {
            if !self.values.contains_key(name) {
                self.values.insert(name.clone(), value.clone());
            }
        }
    }

    /// Same props with children removed.
    pub(crate) fn without_children(&self) -> Self {
        Self {
            key: self.key.clone(),
            handle: self.handle.clone(),
            values: self.values.clone(),
            refs: self.refs.clone(),
            children: Vec::new(),
        }
    }
}

pub(crate) struct ElementNode {
    id: ElementId,
    component: ComponentType,
    props: Props,
}

/// Immutable `{ component, props, children }` record.
///
/// Cloning is cheap and preserves identity: a clone is the same element.
#[derive(Clone)]
pub struct Element(Arc<ElementNode>);

impl Element {
    /// Create an element, associating `props.handle` with it.
    ///
    /// Fails if that handle is already associated with another element.
    pub fn new(component: ComponentType, props: Props) -> Result<Self, HandleError> {
        let element = Self(Arc::new(ElementNode {
            id: ElementId::next(),
            component,
            props,
        }));
        if let Some(handle) = &element.0.props.handle {
            handle.associate(&element)?;
        }
        Ok(element)
    }

    /// Element without a handle. Never fails.
    pub fn with_children(component: ComponentType, children: Vec<Element>) -> Self {
        Self::unbound(
            component,
            Props {
                children,
                ..Props::default()
            },
        )
    }

    /// Element whose `props.handle` is not associated with it.
    pub(crate) fn unbound(component: ComponentType, props: Props) -> Self {
        Self(Arc::new(ElementNode {
            id: ElementId::next(),
            component,
            props,
        }))
    }

    pub fn builder(component: ComponentType) -> ElementBuilder {
        ElementBuilder {
            component,
            props: Props::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> ElementId {
        self.0.id
    }

    #[inline]
    pub fn component(&self) -> &ComponentType {
        &self.0.component
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.0.component.name()
    }

    #[inline]
    pub fn props(&self) -> &Props {
        &self.0.props
    }

    /// Explicit key, if the element was given one.
    #[inline]
    pub fn key(&self) -> Option<&str> {
        self.0.props.key.as_deref()
    }

    #[inline]
    pub fn handle(&self) -> Option<&Handle> {
        self.0.props.handle.as_ref()
    }

    #[inline]
    pub fn children(&self) -> &[Element] {
        &self.0.props.children
    }

    /// Identity comparison.
    #[inline]
    pub fn same(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<ElementNode> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn from_node(node: Arc<ElementNode>) -> Self {
        Self(node)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.name());
        s.field("id", &self.0.id);
        if let Some(key) = self.key() {
            s.field("key", &key);
        }
        if !self.0.props.values.is_empty() {
            s.field("props", &self.0.props.values);
        }
        if !self.0.props.children.is_empty() {
            s.field("children", &self.0.props.children);
        }
        s.finish()
    }
}

/// Builder for [`Element`].
///
/// ```ignore
/// let web = Element::builder(container())
///     .key("web")
///     .prop("image", "nginx:latest")
///     .handle(&web_handle)
///     .build()?;
/// ```
pub struct ElementBuilder {
    component: ComponentType,
    props: Props,
}

impl ElementBuilder {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.props.key = Some(key.into());
        self
    }

    pub fn handle(mut self, handle: &Handle) -> Self {
        self.props.handle = Some(handle.clone());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.values.insert(name.into(), value.into());
        self
    }

    /// Handle-valued prop pointing at another node.
    pub fn reference(mut self, name: impl Into<String>, handle: &Handle) -> Self {
        self.props.refs.insert(name.into(), handle.clone());
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.props.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.props.children.extend(children);
        self
    }

    pub fn build(self) -> Result<Element, HandleError> {
        Element::new(self.component, self.props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> ComponentType {
        ComponentType::primitive("Empty")
    }

    #[test]
    fn test_clone_preserves_identity() {
        let a = Element::with_children(empty(), vec![]);
        let b = a.clone();
        let c = Element::with_children(empty(), vec![]);
        assert!(a.same(&b));
        assert_eq!(a.id(), b.id());
        assert!(!a.same(&c));
    }

    #[test]
    fn test_builder_props() {
        let elem = Element::builder(empty())
            .key("first")
            .prop("id", 0)
            .prop("name", "web")
            .build()
            .unwrap();
        assert_eq!(elem.key(), Some("first"));
        assert_eq!(elem.props().get_i64("id"), Some(0));
        assert_eq!(elem.props().get_str("name"), Some("web"));
        assert!(elem.handle().is_none());
    }

    #[test]
    fn test_builder_associates_handle() {
        let handle = Handle::new();
        let elem = Element::builder(empty()).handle(&handle).build().unwrap();
        assert_eq!(handle.associated_element(), Some(elem.id()));
        assert!(handle.mounted_orig().unwrap().same(&elem));

        let second = Element::builder(empty()).handle(&handle).build();
        assert!(matches!(
            second,
            Err(HandleError::AlreadyAssociated { .. })
        ));
    }

    #[test]
    fn test_merge_defaults_keeps_explicit_values() {
        let mut props = Props::new();
        props.values.insert("replicas".into(), 3.into());
        let mut defaults = PropMap::new();
        defaults.insert("replicas".into(), 1.into());
        defaults.insert("port".into(), 80.into());

        props.merge_defaults(&defaults);
        assert_eq!(props.get_i64("replicas"), Some(3));
        assert_eq!(props.get_i64("port"), Some(80));
    }
}
