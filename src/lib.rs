//! Stackdom - declarative component trees for infrastructure.
//!
//! A tree of [`dom::Element`]s is built to a fixpoint of persisted
//! [`state::StateStore`] values: composite components expand, style rules
//! rewrite matching nodes, every node gets a stable key-path, and handles
//! resolve to the nodes they end up naming. Built trees can be diffed
//! against each other and serialized to markup.
//!
//! ```ignore
//! use stackdom::{BuildOptions, ComponentType, Element, HandleRegistry, StateStore, build};
//!
//! let mut store = StateStore::new();
//! let mut handles = HandleRegistry::new();
//! let root = Element::with_children(ComponentType::group(), vec![]);
//! let output = build(Some(&root), None, &mut store, &mut handles, &BuildOptions::default())?;
//! ```

pub mod logger;

pub mod build;
pub mod cli;
pub mod config;
pub mod diff;
pub mod dom;
pub mod handle;
pub mod serialize;
pub mod state;
pub mod style;

pub use build::{BuildError, BuildOptions, BuildOutput, build, build_async};
pub use dom::{BuiltElement, ComponentType, Element, KeyPath, Message};
pub use handle::{Handle, HandleRegistry};
pub use state::StateStore;
