//! Persisted per-node state.
//!
//! The store maps a node's key-path (its state namespace) to an arbitrary
//! JSON value. Builds read it at the start of every pass and only change it
//! through updates queued by `set_state` / `update_state` during expansion,
//! applied after the pass completes.
//!
//! # Serialized Form
//!
//! ```json
//! { "[\"App\"]": { "ready": true } }
//! ```
//!
//! Each namespace is rendered as a JSON array string so keys containing
//! dots round-trip unchanged.

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::dom::KeyPath;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state JSON error")]
    Json(#[from] serde_json::Error),

    #[error("state document must be a JSON object")]
    NotAnObject,

    #[error("invalid state namespace `{0}`")]
    InvalidNamespace(String),
}

/// Mapping from state namespace to persisted value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateStore {
    entries: BTreeMap<KeyPath, Value>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn element_state(&self, namespace: &KeyPath) -> Option<&Value> {
        self.entries.get(namespace)
    }

    pub fn set_element_state(&mut self, namespace: KeyPath, value: Value) {
        self.entries.insert(namespace, value);
    }

    pub fn delete(&mut self, namespace: &KeyPath) -> Option<Value> {
        self.entries.remove(namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &KeyPath> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KeyPath, &Value)> {
        self.entries.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a store previously written by [`StateStore::to_json`].
    pub fn from_json(content: &str) -> Result<Self, StateError> {
        let Value::Object(map) = serde_json::from_str::<Value>(content)? else {
            return Err(StateError::NotAnObject);
        };

        let mut entries = BTreeMap::new();
        for (namespace, value) in map {
            let path = KeyPath::from_json_str(&namespace)
                .map_err(|_| StateError::InvalidNamespace(namespace.clone()))?;
            entries.insert(path, value);
        }
        Ok(Self { entries })
    }

    pub fn to_json(&self) -> Result<String, StateError> {
        let map: serde_json::Map<String, Value> = self
            .entries
            .iter()
            .map(|(path, value)| (path.to_json_string(), value.clone()))
            .collect();
        Ok(serde_json::to_string_pretty(&Value::Object(map))?)
    }
}

// =============================================================================
// Queued Updates
// =============================================================================

type UpdateFn = Box<dyn FnOnce(Option<&Value>) -> Value + Send>;

/// A state change requested during expansion, applied after the pass.
pub(crate) enum StateUpdate {
    /// Shallow-merge into the previous value when both are objects,
    /// otherwise replace.
    Merge(KeyPath, Value),
    /// Compute the next value from the previous one.
    Apply(KeyPath, UpdateFn),
}

impl StateUpdate {
    pub fn apply_to(self, store: &mut StateStore) {
        match self {
            Self::Merge(namespace, value) => {
                let next = merge(store.element_state(&namespace), value);
                store.set_element_state(namespace, next);
            }
            Self::Apply(namespace, update) => {
                let next = update(store.element_state(&namespace));
                store.set_element_state(namespace, next);
            }
        }
    }
}

fn merge(prev: Option<&Value>, next: Value) -> Value {
    match (prev, next) {
        (Some(Value::Object(prev)), Value::Object(next)) => {
            let mut merged = prev.clone();
            merged.extend(next);
            Value::Object(merged)
        }
        (_, next) => next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trip_keeps_dotted_keys() {
        let mut store = StateStore::new();
        store.set_element_state(KeyPath::root("App"), json!({ "ready": true }));
        store.set_element_state(
            ["App-Group", "db.primary"].into_iter().collect(),
            json!([1, 2]),
        );

        let restored = StateStore::from_json(&store.to_json().unwrap()).unwrap();
        assert_eq!(restored, store);
        assert_eq!(restored.len(), 2);
    }

    #[test]
    fn test_from_json_rejects_bad_documents() {
        assert!(matches!(
            StateStore::from_json("[1]"),
            Err(StateError::NotAnObject)
        ));
        assert!(matches!(
            StateStore::from_json(r#"{"App": 1}"#),
            Err(StateError::InvalidNamespace(ns)) if ns == "App"
        ));
        assert!(matches!(
            StateStore::from_json("{"),
            Err(StateError::Json(_))
        ));
    }

    #[test]
    fn test_merge_update_is_shallow() {
        let ns = KeyPath::root("App");
        let mut store = StateStore::new();
        store.set_element_state(ns.clone(), json!({ "a": 1, "b": 2 }));

        StateUpdate::Merge(ns.clone(), json!({ "b": 3, "c": 4 })).apply_to(&mut store);
        assert_eq!(
            store.element_state(&ns),
            Some(&json!({ "a": 1, "b": 3, "c": 4 }))
        );

        StateUpdate::Merge(ns.clone(), json!(7)).apply_to(&mut store);
        assert_eq!(store.element_state(&ns), Some(&json!(7)));
    }

    #[test]
    fn test_apply_update_sees_previous_value() {
        let ns = KeyPath::root("Counter");
        let mut store = StateStore::new();
        for _ in 0..3 {
            StateUpdate::Apply(
                ns.clone(),
                Box::new(|prev| json!(prev.and_then(Value::as_i64).unwrap_or(0) + 1)),
            )
            .apply_to(&mut store);
        }
        assert_eq!(store.element_state(&ns), Some(&json!(3)));
    }

    #[test]
    fn test_delete() {
        let ns = KeyPath::root("App");
        let mut store = StateStore::new();
        store.set_element_state(ns.clone(), json!(null));
        assert_eq!(store.delete(&ns), Some(json!(null)));
        assert!(store.is_empty());
    }
}
