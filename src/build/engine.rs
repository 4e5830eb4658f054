//! A single build pass.
//!
//! The pass walks the element tree depth-first. At each position it:
//!
//! 1. records the element's handle
//! 2. applies the style sheet until no rule replaces the element
//! 3. finishes primitives by building their children one level down
//! 4. expands composites and continues at the same position with the result
//!
//! Children of one parent are built in three steps. Each sibling is keyed
//! and advanced until it is placed or reaches an async composite. The
//! pending async expansions of all siblings are then awaited together, and
//! finally each sibling is settled in order.
//!
//! Every replacement is recorded in the pass [`Lineage`] so handles can be
//! resolved once the final pass is known.

use futures::future::{LocalBoxFuture, join_all};

use crate::dom::{
    BuiltElement, ComponentKind, ComponentType, Element, ElementId, ExpandError, ExpandFuture,
    Expansion, KeyPath, Message, Props, lineage_key,
};
use crate::handle::{HandleError, HandleRegistry, Lineage};
use crate::state::{StateStore, StateUpdate};
use crate::style::{AppliedRules, StyleSheet, restyle};

use super::BuildError;
use super::context::{AsyncExpandContext, ExpandContext};
use super::keys::KeyTracker;
use super::recorder::{BuildEvent, BuildRecorder};

/// What a completed pass hands back to the fixpoint loop.
pub(crate) struct PassOutput {
    pub tree: Option<BuiltElement>,
    pub updates: Vec<StateUpdate>,
    pub messages: Vec<Message>,
    pub lineage: Lineage,
    /// Handles visited by this pass.
    pub handles: HandleRegistry,
}

/// Where a position stands after advancing as far as it can without waiting.
enum Step {
    /// Ready to place with the remaining budget.
    Place(Element, Option<usize>),
    /// Becomes a `DomError` placeholder.
    Fail(Element, String, Option<usize>),
    /// Built to nothing.
    Removed,
    /// An async expansion has been started.
    Pending(Pending, ExpandFuture),
    /// An async expansion has finished.
    Ready(Pending, Expansion),
}

impl Step {
    fn take_future(&mut self) -> Option<(Pending, ExpandFuture)> {
        match std::mem::replace(self, Step::Removed) {
            Step::Pending(pending, future) => Some((pending, future)),
            other => {
                *self = other;
                None
            }
        }
    }
}

/// An async composite waiting on its expansion.
struct Pending {
    element: Element,
    namespace: KeyPath,
    budget: Option<usize>,
    rewrites: usize,
    cx: AsyncExpandContext,
}

enum Accepted {
    Next(Element),
    Removed,
    Failed(String),
}

pub(crate) struct Pass<'a, R: BuildRecorder + ?Sized> {
    styles: &'a StyleSheet,
    snapshot: &'a StateStore,
    budget: Option<usize>,
    max_rewrites: usize,
    keys: KeyTracker,
    updates: Vec<StateUpdate>,
    messages: Vec<Message>,
    lineage: Lineage,
    applied: AppliedRules,
    handles: HandleRegistry,
    recorder: &'a mut R,
}

impl<'a, R: BuildRecorder + ?Sized> Pass<'a, R> {
    pub fn new(
        styles: &'a StyleSheet,
        snapshot: &'a StateStore,
        budget: Option<usize>,
        max_rewrites: usize,
        recorder: &'a mut R,
    ) -> Self {
        Self {
            styles,
            snapshot,
            budget,
            max_rewrites,
            keys: KeyTracker::new(),
            updates: Vec::new(),
            messages: Vec::new(),
            lineage: Lineage::default(),
            applied: AppliedRules::default(),
            handles: HandleRegistry::new(),
            recorder,
        }
    }

    pub async fn run(mut self, root: Option<&Element>) -> Result<PassOutput, BuildError> {
        let tree = match root {
            Some(root) => {
                self.keys.add_key(root.name(), root.key());
                let step = self.advance(root.clone(), &[], self.budget, 0)?;
                self.settle(step, &[]).await?
            }
            None => None,
        };
        Ok(PassOutput {
            tree,
            updates: self.updates,
            messages: self.messages,
            lineage: self.lineage,
            handles: self.handles,
        })
    }

    /// Run rules and synchronous expansions at the tracker's current
    /// position until the element can be placed or has to wait.
    ///
    /// `ancestors` are the names of the built nodes above, root first.
    /// `budget` is the number of expansions still allowed on this path.
    fn advance(
        &mut self,
        element: Element,
        ancestors: &[&str],
        mut budget: Option<usize>,
        mut rewrites: usize,
    ) -> Result<Step, BuildError> {
        let mut current = element;

        loop {
            self.handles.observe(&current);

            if budget == Some(0) {
                return Ok(Step::Place(current, budget));
            }
            if rewrites > self.max_rewrites {
                return Err(BuildError::RewriteLimit {
                    key_path: self.keys.current_path(),
                    limit: self.max_rewrites,
                });
            }

            let restyled = restyle(self.styles, &current, ancestors, &mut self.applied)
                .map_err(|failure| BuildError::Rule {
                    selector: failure.selector,
                    key_path: self.keys.current_path(),
                    source: failure.source,
                })?;
            if let Some(next) = restyled {
                self.lineage.replaced(current.id(), Some(next.id()));
                current = next;
                rewrites += 1;
                continue;
            }

            let kind = current.component().kind();
            match kind {
                ComponentKind::Primitive => return Ok(Step::Place(current, budget)),
                ComponentKind::Abstract => {
                    let reason = format!("component {} is abstract", current.name());
                    return Ok(Step::Fail(current, reason, budget));
                }
                ComponentKind::Composite | ComponentKind::AsyncComposite => {}
            }

            let namespace = self.keys.current_path();
            let mut props = current.props().clone();
            props.merge_defaults(&current.component().default_props());

            if kind == ComponentKind::AsyncComposite {
                let cx = AsyncExpandContext::new(&current, namespace.clone(), self.snapshot);
                let future = current.component().expand_async(props, cx.clone());
                let pending = Pending {
                    element: current,
                    namespace,
                    budget,
                    rewrites,
                    cx,
                };
                return Ok(Step::Pending(pending, future));
            }

            let mut cx = ExpandContext::new(
                &current,
                namespace.clone(),
                self.snapshot,
                &mut self.updates,
                &mut self.messages,
            );
            let expanded = current.component().expand(&props, &mut cx);
            let redirect = cx.take_redirect();

            match self.accept(&current, namespace, expanded, redirect)? {
                Accepted::Next(next) => {
                    budget = budget.map(|b| b - 1);
                    rewrites += 1;
                    current = next;
                }
                Accepted::Removed => return Ok(Step::Removed),
                Accepted::Failed(reason) => return Ok(Step::Fail(current, reason, budget)),
            }
        }
    }

    /// Take in a finished async expansion and keep advancing its position.
    fn resume(
        &mut self,
        pending: Pending,
        expanded: Expansion,
        ancestors: &[&str],
    ) -> Result<Step, BuildError> {
        let Pending {
            element,
            namespace,
            budget,
            rewrites,
            cx,
        } = pending;
        let deferred = cx.take();
        self.updates.extend(deferred.updates);
        self.messages.extend(deferred.messages);

        match self.accept(&element, namespace, expanded, deferred.redirect)? {
            Accepted::Next(next) => {
                self.advance(next, ancestors, budget.map(|b| b - 1), rewrites + 1)
            }
            Accepted::Removed => Ok(Step::Removed),
            Accepted::Failed(reason) => Ok(Step::Fail(element, reason, budget)),
        }
    }

    /// Record the outcome of expanding `current` at the current position.
    fn accept(
        &mut self,
        current: &Element,
        namespace: KeyPath,
        expanded: Expansion,
        redirect: Option<Option<ElementId>>,
    ) -> Result<Accepted, BuildError> {
        let next = match expanded {
            Ok(next) => next,
            Err(ExpandError::NotImplemented(reason)) => return Ok(Accepted::Failed(reason)),
            Err(ExpandError::Failed(source)) => {
                return Err(match source.downcast::<HandleError>() {
                    Ok(err) => BuildError::Handle(err),
                    Err(source) => BuildError::Expand {
                        component: current.name().to_string(),
                        key_path: namespace,
                        source,
                    },
                });
            }
        };

        if let Some(target) = redirect {
            self.lineage.redirected(current.id(), target);
        }
        self.lineage
            .replaced(current.id(), next.as_ref().map(Element::id));

        let Some(next) = next else {
            return Ok(Accepted::Removed);
        };
        let own = self.keys.last_key().unwrap_or_default();
        let key = lineage_key(own, next.key().unwrap_or(next.name()));
        self.keys.set_last_key(key);
        Ok(Accepted::Next(next))
    }

    /// Drive a position to its built node, awaiting any further async
    /// expansions one at a time.
    async fn settle(
        &mut self,
        mut step: Step,
        ancestors: &[&str],
    ) -> Result<Option<BuiltElement>, BuildError> {
        loop {
            step = match step {
                Step::Place(element, budget) => {
                    return self.finish_node(element, ancestors, budget).await;
                }
                Step::Fail(element, reason, budget) => {
                    return self.finish_error(element, reason, ancestors, budget).await;
                }
                Step::Removed => return Ok(None),
                Step::Pending(pending, future) => {
                    let expanded = future.await;
                    self.resume(pending, expanded, ancestors)?
                }
                Step::Ready(pending, expanded) => self.resume(pending, expanded, ancestors)?,
            };
        }
    }

    /// Place `element` at the current position and build its children.
    async fn finish_node(
        &mut self,
        element: Element,
        ancestors: &[&str],
        budget: Option<usize>,
    ) -> Result<Option<BuiltElement>, BuildError> {
        let key_path = self.keys.current_path();
        let key = key_path.last().unwrap_or_default().to_string();
        self.lineage.placed(element.id(), key_path.clone());

        let mut names = ancestors.to_vec();
        names.push(element.name());
        let children = self
            .build_children(element.children(), &names, &key_path, budget)
            .await?;

        self.recorder.record(BuildEvent::ElementBuilt {
            key_path: &key_path,
            name: element.name(),
        });
        Ok(Some(BuiltElement {
            component: element.component().clone(),
            key,
            state_namespace: key_path.clone(),
            key_path,
            props: element.props().without_children(),
            children,
        }))
    }

    /// Substitute a `DomError` placeholder for an element that cannot be built.
    async fn finish_error(
        &mut self,
        element: Element,
        reason: String,
        ancestors: &[&str],
        budget: Option<usize>,
    ) -> Result<Option<BuiltElement>, BuildError> {
        let key_path = self.keys.current_path();
        self.messages.push(Message::error(
            key_path.to_string(),
            format!("{}: {}", element.name(), reason),
        ));

        let mut props = Props::new();
        props.key = element.props().key.clone();
        props.values.insert("message".into(), reason.into());
        props.children = element.children().to_vec();
        let placeholder = Element::unbound(ComponentType::dom_error(), props);

        self.lineage
            .replaced(element.id(), Some(placeholder.id()));
        self.finish_node(placeholder, ancestors, budget).await
    }

    fn build_children<'s>(
        &'s mut self,
        children: &'s [Element],
        ancestors: &'s [&'s str],
        parent: &'s KeyPath,
        budget: Option<usize>,
    ) -> LocalBoxFuture<'s, Result<Vec<BuiltElement>, BuildError>> {
        Box::pin(async move {
            if children.is_empty() {
                return Ok(Vec::new());
            }

            self.keys.path_push();
            for child in children {
                if let Some(key) = child.key()
                    && !self.keys.reserve(key)
                {
                    return Err(BuildError::DuplicateKey {
                        key: key.to_string(),
                        parent: parent.clone(),
                    });
                }
            }

            let mut steps = Vec::with_capacity(children.len());
            for child in children {
                self.keys.add_key(child.name(), child.key());
                let step = self.advance(child.clone(), ancestors, budget, 0)?;
                let key = self.keys.last_key().unwrap_or_default().to_string();
                steps.push((key, step));
            }

            let mut waiting = Vec::new();
            let mut futures = Vec::new();
            for (index, (_, step)) in steps.iter_mut().enumerate() {
                if let Some((pending, future)) = step.take_future() {
                    waiting.push((index, pending));
                    futures.push(future);
                }
            }
            if !futures.is_empty() {
                let results = join_all(futures).await;
                for ((index, pending), expanded) in waiting.into_iter().zip(results) {
                    steps[index].1 = Step::Ready(pending, expanded);
                }
            }

            let mut built: Vec<BuiltElement> = Vec::with_capacity(children.len());
            for (key, step) in steps {
                self.keys.set_last_key(key);
                let Some(node) = self.settle(step, ancestors).await? else {
                    continue;
                };
                if built.iter().any(|sibling| sibling.key == node.key) {
                    return Err(BuildError::DuplicateKey {
                        key: node.key,
                        parent: parent.clone(),
                    });
                }
                built.push(node);
            }
            self.keys.path_pop();
            Ok(built)
        })
    }
}
