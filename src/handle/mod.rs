//! Handles: deferred references to the node an element eventually becomes.
//!
//! A handle is created on its own, embedded in at most one element, and
//! resolved after every build to the key-path of the final built node that
//! element turned into (or to nothing, if its expansion produced nothing).
//!
//! # Invariants
//! - A handle is associated with at most one element, ever
//! - Handles never own their target; resolution is a key-path lookup

mod registry;

pub use registry::{HandleBindings, HandleRegistry};
pub(crate) use registry::Lineage;

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;

use crate::dom::{Element, ElementId, ElementNode, KeyPath};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("handle {handle} is already associated with element {element}")]
    AlreadyAssociated { handle: HandleId, element: String },
}

struct Association {
    element: ElementId,
    name: String,
    node: Weak<ElementNode>,
}

#[derive(Default)]
struct HandleState {
    associated: Option<Association>,
    /// `None` until a build resolves it; `Some(None)` when resolved to nothing.
    target: Option<Option<KeyPath>>,
}

struct HandleInner {
    id: HandleId,
    state: Mutex<HandleState>,
}

/// Opaque, cheaply cloned reference token.
#[derive(Clone)]
pub struct Handle(Arc<HandleInner>);

impl Handle {
    pub fn new() -> Self {
        Self(Arc::new(HandleInner {
            id: HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)),
            state: Mutex::new(HandleState::default()),
        }))
    }

    #[inline]
    pub fn id(&self) -> HandleId {
        self.0.id
    }

    /// Bind this handle to `element`. Fails on a second association.
    pub fn associate(&self, element: &Element) -> Result<(), HandleError> {
        let mut state = self.0.state.lock();
        if let Some(existing) = &state.associated {
            return Err(HandleError::AlreadyAssociated {
                handle: self.0.id,
                element: format!("{}({})", existing.name, existing.element),
            });
        }
        state.associated = Some(Association {
            element: element.id(),
            name: element.name().to_string(),
            node: element.downgrade(),
        });
        Ok(())
    }

    pub fn is_associated(&self) -> bool {
        self.0.state.lock().associated.is_some()
    }

    pub fn associated_element(&self) -> Option<ElementId> {
        self.0.state.lock().associated.as_ref().map(|a| a.element)
    }

    /// The element this handle was embedded in, while it is still alive.
    pub fn mounted_orig(&self) -> Option<Element> {
        let state = self.0.state.lock();
        let node = state.associated.as_ref()?.node.upgrade()?;
        Some(Element::from_node(node))
    }

    /// True once a build has resolved this handle.
    pub fn is_resolved(&self) -> bool {
        self.0.state.lock().target.is_some()
    }

    /// Key-path of the built node this handle refers to.
    ///
    /// `None` if unresolved, or if the element built to nothing.
    pub fn target(&self) -> Option<KeyPath> {
        self.0.state.lock().target.clone().flatten()
    }

    pub(crate) fn set_target(&self, target: Option<KeyPath>) {
        self.0.state.lock().target = Some(target);
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Handle {}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.lock();
        match &state.target {
            Some(Some(path)) => write!(f, "Handle({} -> {})", self.0.id, path),
            Some(None) => write!(f, "Handle({} -> null)", self.0.id),
            None => write!(f, "Handle({})", self.0.id),
        }
    }
}
