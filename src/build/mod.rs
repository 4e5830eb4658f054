//! Build engine.
//!
//! Turns an element tree into a built tree of primitives by repeatedly
//! running passes until persisted state stops changing.
//!
//! # Passes
//!
//! ```text
//! snapshot = store.clone()
//! tree     = pass(root, snapshot)      // expansions read the snapshot
//! apply queued state updates to store
//! store == snapshot ? done : next pass
//! ```
//!
//! The tree of a pass whose updates changed the store is discarded. Handles
//! are resolved against the final pass only, and written into the caller's
//! [`HandleRegistry`] so they stay current from one build to the next.
//!
//! # Async Expansion
//!
//! Async composites return a future instead of an element. The expansions
//! of sibling positions are started together and all joined before their
//! subtrees are built, so a pass never ends with an expansion in flight.
//! Each expansion only writes its own position's state, and its queued
//! writes join the pass's other updates in sibling order.
//!
//! [`build_async`] runs on the caller's runtime. [`build`] drives the same
//! engine on a private current-thread tokio runtime and refuses to run
//! inside another one.
//!
//! # Fatal Errors
//!
//! Duplicate sibling keys, duplicate handle association, unresolved handles,
//! rule errors and expansion failures abort the build with no partial
//! result. Abstract or unimplemented components do not: they become
//! `DomError` placeholders and an error [`Message`].

mod context;
mod engine;
mod keys;
mod recorder;


pub use context::{AsyncExpandContext, ExpandContext};
pub use keys::KeyTracker;
pub use recorder::{BuildEvent, BuildRecorder, LogRecorder, NullRecorder};

use thiserror::Error;

use crate::dom::{BuiltElement, Element, ElementId, KeyPath, Message, MessageSummary};
use crate::handle::{HandleBindings, HandleError, HandleId, HandleRegistry};
use crate::state::StateStore;
use crate::style::StyleSheet;
use engine::Pass;

pub const DEFAULT_MAX_PASSES: usize = 200;
pub const DEFAULT_MAX_REWRITES: usize = 100;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("duplicate key `{key}` among children of `{parent}`")]
    DuplicateKey { key: String, parent: KeyPath },

    #[error("state did not converge after {passes} passes")]
    NoConvergence { passes: usize },

    #[error("`{key_path}` was rewritten more than {limit} times")]
    RewriteLimit { key_path: KeyPath, limit: usize },

    #[error("handle {handle} could not be resolved (lost at element {element})")]
    UnresolvedHandle { handle: HandleId, element: ElementId },

    #[error("expanding {component} at `{key_path}` failed")]
    Expand {
        component: String,
        key_path: KeyPath,
        #[source]
        source: anyhow::Error,
    },

    #[error("style rule `{selector}` failed at `{key_path}`")]
    Rule {
        selector: String,
        key_path: KeyPath,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error("synchronous build called from inside an async runtime; use build_async")]
    InsideRuntime,

    #[error("failed to start the build runtime")]
    Runtime(#[source] std::io::Error),
}

/// Build mode flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Maximum number of composite expansions along any root-to-node path.
    /// `None` expands fully; `Some(0)` only assigns keys.
    pub depth: Option<usize>,
    /// Shorthand for `depth = Some(1)`.
    pub shallow: bool,
    pub max_passes: usize,
    /// Maximum rule or expansion replacements at a single position.
    pub max_rewrites: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            depth: None,
            shallow: false,
            max_passes: DEFAULT_MAX_PASSES,
            max_rewrites: DEFAULT_MAX_REWRITES,
        }
    }
}

impl BuildOptions {
    /// Effective expansion budget.
    pub fn depth_budget(&self) -> Option<usize> {
        match (self.shallow, self.depth) {
            (true, Some(depth)) => Some(depth.min(1)),
            (true, None) => Some(1),
            (false, depth) => depth,
        }
    }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// `None` when the root was `None` or built to nothing.
    pub tree: Option<BuiltElement>,
    pub messages: Vec<Message>,
    pub handle_bindings: HandleBindings,
    /// Passes run, including the final stable one.
    pub passes: usize,
}

impl BuildOutput {
    pub fn summary(&self) -> MessageSummary {
        MessageSummary::from_messages(&self.messages)
    }

    pub fn has_errors(&self) -> bool {
        self.summary().error > 0
    }
}

/// Build `root` to a fixpoint of `store`.
///
/// `store` is updated in place with every state change made by the build.
/// Every handle in `handles`, plus every handle the build comes across, is
/// re-resolved against the finished tree.
pub fn build(
    root: Option<&Element>,
    styles: Option<&StyleSheet>,
    store: &mut StateStore,
    handles: &mut HandleRegistry,
    options: &BuildOptions,
) -> Result<BuildOutput, BuildError> {
    build_with_recorder(root, styles, store, handles, options, &mut NullRecorder)
}

/// [`build`], reporting progress to `recorder`.
pub fn build_with_recorder<R: BuildRecorder + ?Sized>(
    root: Option<&Element>,
    styles: Option<&StyleSheet>,
    store: &mut StateStore,
    handles: &mut HandleRegistry,
    options: &BuildOptions,
    recorder: &mut R,
) -> Result<BuildOutput, BuildError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(BuildError::InsideRuntime);
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(BuildError::Runtime)?;
    runtime.block_on(build_async(root, styles, store, handles, options, recorder))
}

/// [`build_with_recorder`] on the caller's runtime.
///
/// The returned future is not `Send`; await it on the task that owns the
/// tree. Async expansions themselves are `Send` and may spawn freely.
pub async fn build_async<R: BuildRecorder + ?Sized>(
    root: Option<&Element>,
    styles: Option<&StyleSheet>,
    store: &mut StateStore,
    handles: &mut HandleRegistry,
    options: &BuildOptions,
    recorder: &mut R,
) -> Result<BuildOutput, BuildError> {
    recorder.record(BuildEvent::Start);
    let result = run_passes(root, styles, store, handles, options, recorder).await;
    match &result {
        Ok(output) => recorder.record(BuildEvent::Done {
            passes: output.passes,
            messages: output.messages.len(),
        }),
        Err(err) => recorder.record(BuildEvent::Error {
            error: err.to_string(),
        }),
    }
    result
}

async fn run_passes<R: BuildRecorder + ?Sized>(
    root: Option<&Element>,
    styles: Option<&StyleSheet>,
    store: &mut StateStore,
    handles: &mut HandleRegistry,
    options: &BuildOptions,
    recorder: &mut R,
) -> Result<BuildOutput, BuildError> {
    let no_styles = StyleSheet::new();
    let styles = styles.unwrap_or(&no_styles);
    let budget = options.depth_budget();

    for pass in 1..=options.max_passes {
        recorder.record(BuildEvent::PassStart { pass });

        let snapshot = store.clone();
        let output = Pass::new(styles, &snapshot, budget, options.max_rewrites, recorder)
            .run(root)
            .await?;

        for update in output.updates {
            update.apply_to(store);
        }
        let changed = *store != snapshot;
        recorder.record(BuildEvent::PassDone { pass, changed });
        if changed {
            continue;
        }

        let handle_bindings = handles.finish(&output.handles, &output.lineage).map_err(|lost| {
            BuildError::UnresolvedHandle {
                handle: lost.handle,
                element: lost.element,
            }
        })?;
        return Ok(BuildOutput {
            tree: output.tree,
            messages: output.messages,
            handle_bindings,
            passes: pass,
        });
    }

    Err(BuildError::NoConvergence {
        passes: options.max_passes,
    })
}
