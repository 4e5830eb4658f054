//! Style sheets: ordered `(selector, rewrite)` rules applied during a build.
//!
//! # Matching
//!
//! At each position the rules are tried in sheet order against the current
//! element. A rule never fires twice on the same element:
//!
//! - a rewrite returning the matched element unchanged (`orig_build`) marks
//!   the rule as applied and matching continues with the next rule
//! - a rewrite returning a new element restarts matching from the first
//!   rule against that element
//! - `no_rematch(&replacement)` carries the rules already applied to the
//!   original, plus the firing rule, over to the replacement
//!
//! Elements produced later by expansion are new and are matched again.

mod selector;

pub use selector::{Selector, SelectorError};

use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;

use crate::debug;
use crate::dom::{Element, ElementId, Props};

type RewriteFn = dyn Fn(&Props, &mut RuleContext<'_>) -> anyhow::Result<Element> + Send + Sync;

/// One `(selector, rewrite)` pair.
#[derive(Clone)]
pub struct StyleRule {
    selector: Selector,
    rewrite: Arc<RewriteFn>,
}

impl StyleRule {
    pub fn new<F>(selector: Selector, rewrite: F) -> Self
    where
        F: Fn(&Props, &mut RuleContext<'_>) -> anyhow::Result<Element> + Send + Sync + 'static,
    {
        Self {
            selector,
            rewrite: Arc::new(rewrite),
        }
    }

    #[inline]
    pub fn selector(&self) -> &Selector {
        &self.selector
    }
}

impl fmt::Debug for StyleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StyleRule({})", self.selector)
    }
}

/// Ordered list of style rules.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    rules: Vec<StyleRule>,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule, parsing its selector.
    ///
    /// ```ignore
    /// let sheet = StyleSheet::new()
    ///     .rule("Compute", |_, _| Ok(Element::with_children(docker(), vec![])))?
    ///     .rule(":root", |_, cx| Ok(cx.orig_build()))?;
    /// ```
    pub fn rule<F>(mut self, selector: &str, rewrite: F) -> Result<Self, SelectorError>
    where
        F: Fn(&Props, &mut RuleContext<'_>) -> anyhow::Result<Element> + Send + Sync + 'static,
    {
        self.push(StyleRule::new(Selector::parse(selector)?, rewrite));
        Ok(self)
    }

    pub fn push(&mut self, rule: StyleRule) {
        self.rules.push(rule);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleRule> {
        self.rules.iter()
    }
}

/// Context handed to a rule's rewrite.
pub struct RuleContext<'a> {
    element: &'a Element,
    no_rematch: Vec<ElementId>,
}

impl<'a> RuleContext<'a> {
    /// The matched element, unchanged. Returning it passes through.
    pub fn orig_build(&self) -> Element {
        self.element.clone()
    }

    #[inline]
    pub fn element(&self) -> &Element {
        self.element
    }

    /// Keep this rule (and every rule already applied to the matched
    /// element) from matching `replacement` again.
    pub fn no_rematch(&mut self, replacement: &Element) {
        self.no_rematch.push(replacement.id());
    }
}

// =============================================================================
// Matcher
// =============================================================================

/// A rewrite returned an error.
#[derive(Debug)]
pub(crate) struct RuleFailure {
    pub selector: String,
    pub source: anyhow::Error,
}

/// Rules already applied to each element during one build pass.
#[derive(Debug, Default)]
pub(crate) struct AppliedRules {
    applied: FxHashMap<ElementId, FxHashSet<usize>>,
}

impl AppliedRules {
    fn has(&self, element: ElementId, rule: usize) -> bool {
        self.applied
            .get(&element)
            .is_some_and(|rules| rules.contains(&rule))
    }

    fn mark(&mut self, element: ElementId, rule: usize) {
        self.applied.entry(element).or_default().insert(rule);
    }

    fn inherit(&mut self, from: ElementId, to: ElementId, rule: usize) {
        let mut rules = self.applied.get(&from).cloned().unwrap_or_default();
        rules.insert(rule);
        self.applied.entry(to).or_default().extend(rules);
    }
}

/// Run the sheet once against `element` at a position.
///
/// Returns the first replacement produced, or `None` once every matching
/// rule has passed through.
pub(crate) fn restyle(
    sheet: &StyleSheet,
    element: &Element,
    ancestors: &[&str],
    applied: &mut AppliedRules,
) -> Result<Option<Element>, RuleFailure> {
    for (index, rule) in sheet.rules.iter().enumerate() {
        if applied.has(element.id(), index) || !rule.selector.matches(element.name(), ancestors) {
            continue;
        }

        let mut cx = RuleContext {
            element,
            no_rematch: Vec::new(),
        };
        let next = (rule.rewrite)(element.props(), &mut cx).map_err(|source| RuleFailure {
            selector: rule.selector.to_string(),
            source,
        })?;

        if next.same(element) {
            applied.mark(element.id(), index);
            continue;
        }

        if cx.no_rematch.contains(&next.id()) {
            applied.inherit(element.id(), next.id(), index);
        }
        debug!("style"; "`{}` replaced {} with {}", rule.selector, element.name(), next.name());
        return Ok(Some(next));
    }
    Ok(None)
}
