//! Tree data model.
//!
//! - `element` - immutable input nodes (`Element`, `Props`)
//! - `component` - component types and the `Component` trait
//! - `key_path` - stable node identity
//! - `built` - output nodes produced by a build
//! - `message` - build diagnostics

mod built;
mod component;
mod element;
mod key_path;
mod message;

pub use built::{BuiltElement, Nodes};
pub use component::{
    Component, ComponentKind, ComponentType, DOM_ERROR, ExpandError, ExpandFuture, Expansion,
    GROUP,
};
pub use element::{Element, ElementBuilder, ElementId, PropMap, Props};
pub(crate) use element::ElementNode;
pub use key_path::{KeyPath, LINEAGE_DELIMITER, lineage_key};
pub use message::{Message, MessageSummary, MessageType};
