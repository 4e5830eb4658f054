//! Component types: the closed set of node kinds the build engine expands.

use futures::future::{BoxFuture, FutureExt, ready};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, LazyLock};

use thiserror::Error;

use super::element::{Element, PropMap, Props};
use crate::build::{AsyncExpandContext, ExpandContext};
use crate::handle::HandleError;

/// Name of the built-in structural primitive.
pub const GROUP: &str = "Group";

/// Name of the primitive substituted for components that cannot be built.
pub const DOM_ERROR: &str = "DomError";

/// What the engine may do with a node of a given component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Leaf of the domain model. Children are still built structurally.
    Primitive,
    /// Expands into another element (or nothing).
    Composite,
    /// A composite whose expansion is a future. Sibling expansions run
    /// concurrently and are all joined before the pass ends.
    AsyncComposite,
    /// Declared but without an implementation; always built as `DomError`.
    Abstract,
}

/// Failure of a single expansion.
#[derive(Debug, Error)]
pub enum ExpandError {
    /// The component has no usable implementation for these props.
    /// Reported as a diagnostic; the node becomes a `DomError` placeholder.
    #[error("{0}")]
    NotImplemented(String),

    /// Any other failure. Aborts the whole build.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl ExpandError {
    pub fn not_implemented(reason: impl Into<String>) -> Self {
        Self::NotImplemented(reason.into())
    }
}

impl From<HandleError> for ExpandError {
    fn from(err: HandleError) -> Self {
        Self::Failed(err.into())
    }
}

/// Result of one expansion: a replacement element, or `None` to remove the node.
pub type Expansion = Result<Option<Element>, ExpandError>;

/// A pending [`Expansion`].
pub type ExpandFuture = BoxFuture<'static, Expansion>;

/// A component implementation.
///
/// Implementors pick their [`ComponentKind`]; composites have
/// [`Component::expand`] called and async composites
/// [`Component::expand_async`]. The defaults report the component as not
/// implemented.
pub trait Component: Send + Sync {
    /// Type name, used for keys, selectors and serialized tags.
    fn name(&self) -> &str;

    fn kind(&self) -> ComponentKind {
        ComponentKind::Composite
    }

    /// Props merged under the element's own props before expansion.
    fn default_props(&self) -> PropMap {
        PropMap::new()
    }

    /// Identity written into reanimateable markup.
    fn urn(&self) -> String {
        format!("urn:stackdom:{}::{}", env!("CARGO_PKG_VERSION"), self.name())
    }

    fn expand(&self, props: &Props, cx: &mut ExpandContext<'_>) -> Expansion {
        let _ = (props, cx);
        Err(ExpandError::not_implemented(format!(
            "component {} has no expand implementation",
            self.name()
        )))
    }

    fn expand_async(&self, props: Props, cx: AsyncExpandContext) -> ExpandFuture {
        let _ = (props, cx);
        ready(Err(ExpandError::not_implemented(format!(
            "component {} has no async expand implementation",
            self.name()
        ))))
        .boxed()
    }
}

/// Shared handle to a [`Component`].
///
/// Two component types are equal when their names are equal; this is the
/// identity used by selectors, the tree differ and serialized markup.
#[derive(Clone)]
pub struct ComponentType(Arc<dyn Component>);

type ExpandFn = dyn Fn(&Props, &mut ExpandContext<'_>) -> Expansion + Send + Sync;
type AsyncExpandFn = dyn Fn(Props, AsyncExpandContext) -> ExpandFuture + Send + Sync;

struct NamedPrimitive {
    name: String,
}

impl Component for NamedPrimitive {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Primitive
    }
}

struct NamedAbstract {
    name: String,
}

impl Component for NamedAbstract {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Abstract
    }
}

struct FnComponent {
    name: String,
    defaults: PropMap,
    expand: Box<ExpandFn>,
}

impl Component for FnComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_props(&self) -> PropMap {
        self.defaults.clone()
    }

    fn expand(&self, props: &Props, cx: &mut ExpandContext<'_>) -> Expansion {
        (self.expand)(props, cx)
    }
}

struct AsyncFnComponent {
    name: String,
    expand: Box<AsyncExpandFn>,
}

impl Component for AsyncFnComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::AsyncComposite
    }

    fn expand_async(&self, props: Props, cx: AsyncExpandContext) -> ExpandFuture {
        (self.expand)(props, cx)
    }
}

static GROUP_TYPE: LazyLock<ComponentType> = LazyLock::new(|| ComponentType::primitive(GROUP));
static DOM_ERROR_TYPE: LazyLock<ComponentType> =
    LazyLock::new(|| ComponentType::primitive(DOM_ERROR));

impl ComponentType {
    pub fn new(component: impl Component + 'static) -> Self {
        Self(Arc::new(component))
    }

    /// A primitive with no behavior beyond its name.
    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(NamedPrimitive { name: name.into() })
    }

    /// A component that is declared but never buildable.
    pub fn abstract_component(name: impl Into<String>) -> Self {
        Self::new(NamedAbstract { name: name.into() })
    }

    /// A composite whose expansion is the given closure.
    pub fn composite<F>(name: impl Into<String>, expand: F) -> Self
    where
        F: Fn(&Props, &mut ExpandContext<'_>) -> Expansion + Send + Sync + 'static,
    {
        Self::composite_with_defaults(name, PropMap::new(), expand)
    }

    pub fn composite_with_defaults<F>(name: impl Into<String>, defaults: PropMap, expand: F) -> Self
    where
        F: Fn(&Props, &mut ExpandContext<'_>) -> Expansion + Send + Sync + 'static,
    {
        Self::new(FnComponent {
            name: name.into(),
            defaults,
            expand: Box::new(expand),
        })
    }

    /// A composite whose expansion is the future the closure returns.
    pub fn async_composite<F, Fut>(name: impl Into<String>, expand: F) -> Self
    where
        F: Fn(Props, AsyncExpandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Expansion> + Send + 'static,
    {
        Self::new(AsyncFnComponent {
            name: name.into(),
            expand: Box::new(move |props, cx| expand(props, cx).boxed()),
        })
    }

    /// The built-in `Group` primitive.
    pub fn group() -> Self {
        GROUP_TYPE.clone()
    }

    /// The built-in `DomError` placeholder primitive.
    pub fn dom_error() -> Self {
        DOM_ERROR_TYPE.clone()
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    pub fn kind(&self) -> ComponentKind {
        self.0.kind()
    }

    #[inline]
    pub fn is_primitive(&self) -> bool {
        self.kind() == ComponentKind::Primitive
    }

    pub fn default_props(&self) -> PropMap {
        self.0.default_props()
    }

    pub fn urn(&self) -> String {
        self.0.urn()
    }

    pub(crate) fn expand(&self, props: &Props, cx: &mut ExpandContext<'_>) -> Expansion {
        self.0.expand(props, cx)
    }

    pub(crate) fn expand_async(&self, props: Props, cx: AsyncExpandContext) -> ExpandFuture {
        self.0.expand_async(props, cx)
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.name(), self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_kinds() {
        assert_eq!(ComponentType::group().name(), GROUP);
        assert!(ComponentType::group().is_primitive());
        assert!(ComponentType::dom_error().is_primitive());
        assert_eq!(
            ComponentType::abstract_component("Compute").kind(),
            ComponentKind::Abstract
        );
    }

    #[test]
    fn test_equality_by_name() {
        let a = ComponentType::primitive("Container");
        let b = ComponentType::primitive("Container");
        let c = ComponentType::composite("Container", |_, _| Ok(None));
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_ne!(a, ComponentType::group());
    }

    #[test]
    fn test_async_composite_kind() {
        let ty = ComponentType::async_composite("Fetch", |_, _| async { Ok(None) });
        assert_eq!(ty.kind(), ComponentKind::AsyncComposite);
        assert!(!ty.is_primitive());
        assert_eq!(ty, ComponentType::primitive("Fetch"));
    }

    #[test]
    fn test_urn_contains_name() {
        let urn = ComponentType::primitive("Service").urn();
        assert!(urn.starts_with("urn:stackdom:"));
        assert!(urn.ends_with("::Service"));
    }

    #[test]
    fn test_composite_defaults() {
        let mut defaults = PropMap::new();
        defaults.insert("replicas".into(), 1.into());
        let ty = ComponentType::composite_with_defaults("Deployment", defaults, |_, _| Ok(None));
        assert_eq!(ty.default_props().get("replicas"), Some(&1.into()));
    }
}
