//! Backend entity state snapshots
//!
//! The host framework owns the live state and pushes an immutable snapshot
//! into each widget. Widgets only ever read from it.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entity's state as published by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Primary state string (`on`, `playing`, `23.5`, ...)
    pub state: String,
    /// Attribute mapping
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityState {
    /// Create a state with no attributes
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: Map::new(),
        }
    }

    /// Builder: add an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Look up an attribute by name
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Immutable mapping from entity id to entity state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HassSnapshot {
    states: FxHashMap<String, EntityState>,
}

impl HassSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add or replace an entity
    pub fn with_entity(mut self, entity_id: impl Into<String>, state: EntityState) -> Self {
        self.states.insert(entity_id.into(), state);
        self
    }

    /// Add or replace an entity
    pub fn insert(&mut self, entity_id: impl Into<String>, state: EntityState) {
        self.states.insert(entity_id.into(), state);
    }

    /// Look up an entity
    pub fn get(&self, entity_id: &str) -> Option<&EntityState> {
        self.states.get(entity_id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// The domain part of an entity id (`light` for `light.kitchen`)
pub fn domain_of(entity_id: &str) -> &str {
    entity_id.split_once('.').map_or("", |(domain, _)| domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_from_json() {
        let snapshot: HassSnapshot = serde_json::from_value(json!({
            "light.kitchen": { "state": "on", "attributes": { "brightness": 128 } },
            "switch.fan": { "state": "off" }
        }))
        .unwrap();

        assert_eq!(snapshot.len(), 2);
        let light = snapshot.get("light.kitchen").unwrap();
        assert_eq!(light.state, "on");
        assert_eq!(light.attr("brightness"), Some(&json!(128)));
        assert!(snapshot.get("switch.fan").unwrap().attributes.is_empty());
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("light.kitchen"), "light");
        assert_eq!(domain_of("timer.laundry.extra"), "timer");
        assert_eq!(domain_of("nodomain"), "");
    }
}
