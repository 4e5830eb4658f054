//! Handle tracking and resolution across builds.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

use super::{Handle, HandleId};
use crate::dom::{Element, ElementId, KeyPath};

/// How elements turned into other elements during one build pass.
///
/// Each processed element either was placed in the built tree at a
/// key-path, or was replaced (by a style rule or an expansion) by a
/// successor element, or by nothing. Components may also redirect the
/// handles of the element they are expanding.
#[derive(Debug, Default)]
pub(crate) struct Lineage {
    successor: FxHashMap<ElementId, Option<ElementId>>,
    redirect: FxHashMap<ElementId, Option<ElementId>>,
    placed: FxHashMap<ElementId, KeyPath>,
}

impl Lineage {
    pub fn replaced(&mut self, from: ElementId, to: Option<ElementId>) {
        self.successor.insert(from, to);
    }

    pub fn redirected(&mut self, from: ElementId, to: Option<ElementId>) {
        self.redirect.insert(from, to);
    }

    pub fn placed(&mut self, element: ElementId, path: KeyPath) {
        self.placed.insert(element, path);
    }

    /// Follow redirects and successors to a final key-path.
    ///
    /// `Ok(None)` means the chain ended in nothing; `Err` carries the
    /// element at which the chain could not be followed.
    pub fn resolve(&self, start: ElementId) -> Result<Option<KeyPath>, ElementId> {
        let mut visited = FxHashSet::default();
        let mut current = start;
        loop {
            if !visited.insert(current) {
                return Err(current);
            }
            let next = if let Some(target) = self.redirect.get(&current) {
                *target
            } else if let Some(path) = self.placed.get(&current) {
                return Ok(Some(path.clone()));
            } else if let Some(next) = self.successor.get(&current) {
                *next
            } else {
                return Err(current);
            };
            match next {
                Some(id) => current = id,
                None => return Ok(None),
            }
        }
    }
}

/// Handle resolved to a target that is not part of the finished tree.
#[derive(Debug, Clone)]
pub(crate) struct Unresolved {
    pub handle: HandleId,
    pub element: ElementId,
}

/// Final handle → key-path bindings of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleBindings(BTreeMap<HandleId, Option<KeyPath>>);

impl HandleBindings {
    /// `None` if the handle was not part of the build; `Some(None)` if it
    /// resolved to nothing.
    pub fn get(&self, handle: &Handle) -> Option<Option<&KeyPath>> {
        self.0.get(&handle.id()).map(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HandleId, &Option<KeyPath>)> {
        self.0.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Handles tracked by their owner, in first-seen order.
///
/// The caller keeps one registry for the life of the tree it is building
/// and passes it to every build, which re-resolves all of its handles.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    handles: Vec<Handle>,
    seen: FxHashSet<HandleId>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unassociated handle tracked by this registry.
    pub fn create(&mut self) -> Handle {
        let handle = Handle::new();
        self.track(&handle);
        handle
    }

    pub fn track(&mut self, handle: &Handle) {
        if self.seen.insert(handle.id()) {
            self.handles.push(handle.clone());
        }
    }

    /// Record the handle embedded in a visited element.
    pub(crate) fn observe(&mut self, element: &Element) {
        if let Some(handle) = element.handle() {
            self.track(handle);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    #[inline]
    pub(crate) fn contains(&self, handle: &Handle) -> bool {
        self.seen.contains(&handle.id())
    }

    /// Re-resolve every associated handle after a build and write the
    /// result into it.
    ///
    /// Handles in `visited` (the final pass) are tracked from now on and
    /// followed through `lineage`. Tracked handles the final pass never
    /// reached resolve to nothing. Unassociated handles are skipped; they
    /// refer to nothing yet.
    pub(crate) fn finish(
        &mut self,
        visited: &HandleRegistry,
        lineage: &Lineage,
    ) -> Result<HandleBindings, Unresolved> {
        for handle in &visited.handles {
            self.track(handle);
        }

        let mut bindings = BTreeMap::new();
        for handle in &self.handles {
            let Some(element) = handle.associated_element() else {
                continue;
            };
            let target = if visited.contains(handle) {
                lineage.resolve(element).map_err(|element| Unresolved {
                    handle: handle.id(),
                    element,
                })?
            } else {
                None
            };
            bindings.insert(handle.id(), target);
        }

        for handle in &self.handles {
            if let Some(target) = bindings.get(&handle.id()) {
                handle.set_target(target.clone());
            }
        }
        Ok(HandleBindings(bindings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ComponentType;

    fn elem_with(handle: &Handle) -> Element {
        Element::builder(ComponentType::primitive("Empty"))
            .handle(handle)
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_through_successors() {
        let a = Element::with_children(ComponentType::group(), vec![]);
        let b = Element::with_children(ComponentType::group(), vec![]);
        let mut lineage = Lineage::default();
        lineage.replaced(a.id(), Some(b.id()));
        lineage.placed(b.id(), KeyPath::root("App-Group"));

        assert_eq!(lineage.resolve(a.id()), Ok(Some(KeyPath::root("App-Group"))));
    }

    #[test]
    fn test_resolve_to_nothing() {
        let a = Element::with_children(ComponentType::group(), vec![]);
        let mut lineage = Lineage::default();
        lineage.replaced(a.id(), None);
        assert_eq!(lineage.resolve(a.id()), Ok(None));
    }

    #[test]
    fn test_redirect_wins_over_successor() {
        let a = Element::with_children(ComponentType::group(), vec![]);
        let b = Element::with_children(ComponentType::group(), vec![]);
        let c = Element::with_children(ComponentType::group(), vec![]);
        let mut lineage = Lineage::default();
        lineage.replaced(a.id(), Some(b.id()));
        lineage.redirected(a.id(), Some(c.id()));
        lineage.placed(b.id(), KeyPath::root("B"));
        lineage.placed(c.id(), KeyPath::root("C"));
        assert_eq!(lineage.resolve(a.id()), Ok(Some(KeyPath::root("C"))));
    }

    #[test]
    fn test_unknown_element_and_cycles_fail() {
        let a = Element::with_children(ComponentType::group(), vec![]);
        let b = Element::with_children(ComponentType::group(), vec![]);
        let mut lineage = Lineage::default();
        assert_eq!(lineage.resolve(a.id()), Err(a.id()));

        lineage.redirected(a.id(), Some(b.id()));
        lineage.redirected(b.id(), Some(a.id()));
        assert!(lineage.resolve(a.id()).is_err());
    }

    #[test]
    fn test_registry_resolves_and_writes_targets() {
        let mut registry = HandleRegistry::new();
        let unused = registry.create();
        let handle = Handle::new();
        let elem = elem_with(&handle);
        let mut visited = HandleRegistry::new();
        visited.observe(&elem);
        visited.observe(&elem);
        assert_eq!(visited.len(), 1);

        let mut lineage = Lineage::default();
        lineage.placed(elem.id(), KeyPath::root("Empty"));
        let bindings = registry.finish(&visited, &lineage).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get(&handle), Some(Some(&KeyPath::root("Empty"))));
        assert_eq!(bindings.get(&unused), None);
        assert_eq!(handle.target(), Some(KeyPath::root("Empty")));
        assert!(!unused.is_resolved());
    }

    #[test]
    fn test_unvisited_handles_resolve_to_nothing() {
        let mut registry = HandleRegistry::new();
        let handle = Handle::new();
        let elem = elem_with(&handle);

        let mut visited = HandleRegistry::new();
        visited.observe(&elem);
        let mut lineage = Lineage::default();
        lineage.placed(elem.id(), KeyPath::root("Empty"));
        registry.finish(&visited, &lineage).unwrap();
        assert_eq!(handle.target(), Some(KeyPath::root("Empty")));

        let bindings = registry
            .finish(&HandleRegistry::new(), &Lineage::default())
            .unwrap();
        assert_eq!(bindings.get(&handle), Some(None));
        assert!(handle.is_resolved());
        assert_eq!(handle.target(), None);
    }

    #[test]
    fn test_registry_reports_unresolved() {
        let mut registry = HandleRegistry::new();
        let handle = Handle::new();
        let elem = elem_with(&handle);
        let mut visited = HandleRegistry::new();
        visited.observe(&elem);

        let err = registry.finish(&visited, &Lineage::default()).unwrap_err();
        assert_eq!(err.handle, handle.id());
        assert_eq!(err.element, elem.id());
    }
}
