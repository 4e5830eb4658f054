//! What a composite component sees while it expands.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::dom::{Element, ElementId, KeyPath, Message};
use crate::handle::Handle;
use crate::state::{StateStore, StateUpdate};

/// Context for a single [`Component::expand`](crate::dom::Component::expand) call.
///
/// State reads come from the snapshot taken when the pass started. Writes
/// are queued and only become visible in the next pass.
pub struct ExpandContext<'a> {
    element: &'a Element,
    namespace: KeyPath,
    snapshot: &'a StateStore,
    updates: &'a mut Vec<StateUpdate>,
    messages: &'a mut Vec<Message>,
    redirect: Option<Option<ElementId>>,
}

impl<'a> ExpandContext<'a> {
    pub(crate) fn new(
        element: &'a Element,
        namespace: KeyPath,
        snapshot: &'a StateStore,
        updates: &'a mut Vec<StateUpdate>,
        messages: &'a mut Vec<Message>,
    ) -> Self {
        Self {
            element,
            namespace,
            snapshot,
            updates,
            messages,
            redirect: None,
        }
    }

    /// Key-path of the position being expanded; also its state namespace.
    #[inline]
    pub fn key_path(&self) -> &KeyPath {
        &self.namespace
    }

    #[inline]
    pub fn key(&self) -> &str {
        self.namespace.last().unwrap_or_default()
    }

    /// The element being expanded.
    #[inline]
    pub fn element(&self) -> &Element {
        self.element
    }

    /// Handle embedded in the element being expanded.
    #[inline]
    pub fn handle(&self) -> Option<&Handle> {
        self.element.handle()
    }

    /// Persisted state for this position, as of the start of the pass.
    pub fn state(&self) -> Option<&Value> {
        self.snapshot.element_state(&self.namespace)
    }

    /// [`ExpandContext::state`] deserialized into `T`.
    ///
    /// Missing or mismatched state yields `None`.
    pub fn state_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.state()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Queue a shallow merge into this position's state.
    pub fn set_state(&mut self, value: impl Into<Value>) {
        self.updates
            .push(StateUpdate::Merge(self.namespace.clone(), value.into()));
    }

    /// Queue a state update computed from the value current when it is applied.
    pub fn update_state<F>(&mut self, update: F)
    where
        F: FnOnce(Option<&Value>) -> Value + Send + 'static,
    {
        self.updates
            .push(StateUpdate::Apply(self.namespace.clone(), Box::new(update)));
    }

    /// Point the handle of the element being expanded at `target` instead
    /// of at whatever this expansion becomes. `None` resolves it to nothing.
    pub fn replace_target(&mut self, target: Option<&Element>) {
        self.redirect = Some(target.map(Element::id));
    }

    pub fn info(&mut self, content: impl Into<String>) {
        self.messages
            .push(Message::info(self.namespace.to_string(), content));
    }

    pub fn warn(&mut self, content: impl Into<String>) {
        self.messages
            .push(Message::warning(self.namespace.to_string(), content));
    }

    pub(crate) fn take_redirect(&mut self) -> Option<Option<ElementId>> {
        self.redirect.take()
    }
}

// ============================================================================
// Asynchronous expansion
// ============================================================================

/// Context handed to an asynchronous expansion.
///
/// The expansion future owns it, so it can be held across awaits or cloned
/// into spawned tasks. Reads see the pass snapshot. Writes only ever touch
/// this position's state; they are queued and handed back to the pass when
/// the future completes.
#[derive(Clone)]
pub struct AsyncExpandContext {
    inner: Arc<AsyncShared>,
}

struct AsyncShared {
    element: Element,
    namespace: KeyPath,
    state: Option<Value>,
    queued: Mutex<Queued>,
}

#[derive(Default)]
struct Queued {
    updates: Vec<StateUpdate>,
    messages: Vec<Message>,
    redirect: Option<Option<ElementId>>,
}

/// What an asynchronous expansion queued, taken back by the pass.
pub(crate) struct Deferred {
    pub updates: Vec<StateUpdate>,
    pub messages: Vec<Message>,
    pub redirect: Option<Option<ElementId>>,
}

impl AsyncExpandContext {
    pub(crate) fn new(element: &Element, namespace: KeyPath, snapshot: &StateStore) -> Self {
        Self {
            inner: Arc::new(AsyncShared {
                element: element.clone(),
                state: snapshot.element_state(&namespace).cloned(),
                namespace,
                queued: Mutex::new(Queued::default()),
            }),
        }
    }

    #[inline]
    pub fn key_path(&self) -> &KeyPath {
        &self.inner.namespace
    }

    #[inline]
    pub fn key(&self) -> &str {
        self.inner.namespace.last().unwrap_or_default()
    }

    #[inline]
    pub fn element(&self) -> &Element {
        &self.inner.element
    }

    #[inline]
    pub fn handle(&self) -> Option<&Handle> {
        self.inner.element.handle()
    }

    /// Persisted state for this position, as of the start of the pass.
    pub fn state(&self) -> Option<&Value> {
        self.inner.state.as_ref()
    }

    pub fn state_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.state()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Queue a shallow merge into this position's state.
    pub fn set_state(&self, value: impl Into<Value>) {
        let update = StateUpdate::Merge(self.inner.namespace.clone(), value.into());
        self.inner.queued.lock().updates.push(update);
    }

    /// Queue a state update computed from the value current when it is applied.
    pub fn update_state<F>(&self, update: F)
    where
        F: FnOnce(Option<&Value>) -> Value + Send + 'static,
    {
        let update = StateUpdate::Apply(self.inner.namespace.clone(), Box::new(update));
        self.inner.queued.lock().updates.push(update);
    }

    /// See [`ExpandContext::replace_target`].
    pub fn replace_target(&self, target: Option<&Element>) {
        self.inner.queued.lock().redirect = Some(target.map(Element::id));
    }

    pub fn info(&self, content: impl Into<String>) {
        let message = Message::info(self.inner.namespace.to_string(), content);
        self.inner.queued.lock().messages.push(message);
    }

    pub fn warn(&self, content: impl Into<String>) {
        let message = Message::warning(self.inner.namespace.to_string(), content);
        self.inner.queued.lock().messages.push(message);
    }

    /// Take everything queued so far. Later writes through surviving
    /// clones are dropped.
    pub(crate) fn take(&self) -> Deferred {
        let mut queued = self.inner.queued.lock();
        Deferred {
            updates: std::mem::take(&mut queued.updates),
            messages: std::mem::take(&mut queued.messages),
            redirect: queued.redirect.take(),
        }
    }
}
