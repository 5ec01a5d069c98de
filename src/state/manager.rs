// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Schema registry for state fields.
//!
//! The [`StateManagerBuilder`] accumulates field declarations, per-field
//! properties, tags and named states; [`StateManagerBuilder::build`]
//! freezes them into an immutable [`StateManager`] with dense ids. After
//! the freeze, fields cannot be renamed, retyped or re-defaulted.
//!
//! # Lookup conventions
//!
//! Strict getters (`bool_field`, `int_field`, `named_state`, ...) panic on
//! an unknown name: an unknown name at query time is a programmer error,
//! not a data condition. The `try_` variants return `Option` for callers
//! that genuinely don't know whether a name exists.
//!
//! # Example
//!
//! ```
//! use rando_engine::state::StateManagerBuilder;
//! use rando_engine::state::field::PROP_DEFAULT_VALUE;
//!
//! let mut smb = StateManagerBuilder::new();
//! smb.bool_field("HASRING");
//! smb.int_field("CHARGES");
//! smb.set_property("HASRING", PROP_DEFAULT_VALUE, 1);
//! smb.set_property("CHARGES", PROP_DEFAULT_VALUE, 3);
//! let sm = smb.build().unwrap();
//!
//! let start = sm.start_state();
//! assert!(start.get_bool(sm.bool_field("HASRING").id()));
//! assert_eq!(start.get_int(sm.int_field("CHARGES").id()), 3);
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use thiserror::Error;

use crate::state::field::{
    BoolFieldId, IntFieldId, StateBool, StateFieldId, StateInt, PROP_DEFAULT_VALUE,
    PROP_LOW_IS_BETTER,
};
use crate::state::vector::bool_word_count;
use crate::state::{LazyStateBuilder, State, StateUnion};

/// Errors raised while building a [`StateManager`].
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Duplicate state field: {0}")]
    DuplicateField(String),

    #[error("Unknown state field: {0}")]
    UnknownField(String),

    #[error("Duplicate named state: {0}")]
    DuplicateNamedState(String),

    #[error("Unknown named state: {0}")]
    UnknownNamedState(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Bool,
    Int,
}

/// Mutable accumulator for the state schema.
#[derive(Debug, Default)]
pub struct StateManagerBuilder {
    fields: Vec<(String, FieldKind)>,
    properties: HashMap<String, HashMap<String, i64>>,
    tags: HashMap<String, Vec<String>>,
    named_states: Vec<(String, Vec<(String, i64)>)>,
    named_unions: Vec<(String, Vec<String>)>,
}

impl StateManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a boolean field. Default value `false`, default direction
    /// "true is better"; both can be overridden via properties.
    pub fn bool_field(&mut self, name: &str) -> &mut Self {
        self.fields.push((name.to_string(), FieldKind::Bool));
        self
    }

    /// Declare an integer field. Default value `0`, default direction
    /// "higher is better".
    pub fn int_field(&mut self, name: &str) -> &mut Self {
        self.fields.push((name.to_string(), FieldKind::Int));
        self
    }

    /// Set (or rewrite) a property on a declared field. Recognized keys:
    /// [`PROP_DEFAULT_VALUE`], [`PROP_LOW_IS_BETTER`]; unrecognized keys
    /// are kept and queryable via [`StateManager::try_property`].
    pub fn set_property(&mut self, field: &str, key: &str, value: i64) -> &mut Self {
        self.properties
            .entry(field.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self
    }

    /// Attach a tag to a field. A field may carry any number of tags.
    pub fn add_tag(&mut self, field: &str, tag: &str) -> &mut Self {
        self.tags
            .entry(tag.to_string())
            .or_default()
            .push(field.to_string());
        self
    }

    /// Register a named state: the start state with the given field
    /// overrides applied (bools: non-zero = true).
    pub fn named_state(&mut self, name: &str, overrides: Vec<(String, i64)>) -> &mut Self {
        self.named_states.push((name.to_string(), overrides));
        self
    }

    /// Register a named union over previously registered named states.
    pub fn named_state_union(&mut self, name: &str, members: Vec<String>) -> &mut Self {
        self.named_unions.push((name.to_string(), members));
        self
    }

    /// Freeze the schema.
    pub fn build(self) -> Result<StateManager, StateError> {
        let mut bools = Vec::new();
        let mut ints = Vec::new();
        let mut bool_lookup = HashMap::new();
        let mut int_lookup = HashMap::new();

        for (name, kind) in &self.fields {
            let props = self.properties.get(name);
            let default = props
                .and_then(|p| p.get(PROP_DEFAULT_VALUE))
                .copied()
                .unwrap_or(0);
            let low_is_better = props
                .and_then(|p| p.get(PROP_LOW_IS_BETTER))
                .copied()
                .unwrap_or(0)
                != 0;
            match kind {
                FieldKind::Bool => {
                    let id = BoolFieldId(bools.len() as u32);
                    if bool_lookup.insert(name.clone(), id).is_some() {
                        return Err(StateError::DuplicateField(name.clone()));
                    }
                    bools.push(StateBool {
                        id,
                        name: name.clone(),
                        default: default != 0,
                        low_is_better,
                    });
                }
                FieldKind::Int => {
                    let id = IntFieldId(ints.len() as u32);
                    if int_lookup.insert(name.clone(), id).is_some() {
                        return Err(StateError::DuplicateField(name.clone()));
                    }
                    ints.push(StateInt {
                        id,
                        name: name.clone(),
                        default: default as i32,
                        low_is_better,
                    });
                }
            }
        }

        // Reject properties and tags on fields that were never declared.
        for field in self.properties.keys() {
            if !bool_lookup.contains_key(field) && !int_lookup.contains_key(field) {
                return Err(StateError::UnknownField(field.clone()));
            }
        }
        let mut tags = HashMap::new();
        for (tag, fields) in &self.tags {
            let mut ids = Vec::new();
            for field in fields {
                if let Some(&id) = bool_lookup.get(field) {
                    ids.push(StateFieldId::Bool(id));
                } else if let Some(&id) = int_lookup.get(field) {
                    ids.push(StateFieldId::Int(id));
                } else {
                    return Err(StateError::UnknownField(field.clone()));
                }
            }
            tags.insert(tag.clone(), ids);
        }

        // Materialize the start state from field defaults.
        let mut words = vec![0u64; bool_word_count(bools.len())];
        for field in &bools {
            if field.default {
                words[field.id.index() / 64] |= 1u64 << (field.id.index() % 64);
            }
        }
        let int_defaults: Vec<i32> = ints.iter().map(|f| f.default).collect();
        let start_state = State::from_parts(
            Rc::from(words.into_boxed_slice()),
            Rc::from(int_defaults.into_boxed_slice()),
        );

        let mut sm = StateManager {
            bools,
            ints,
            bool_lookup,
            int_lookup,
            properties: self.properties,
            tags,
            start_state,
            named_states: HashMap::new(),
            named_unions: HashMap::new(),
        };

        // Named states apply overrides to the start state.
        for (name, overrides) in self.named_states {
            let mut builder = LazyStateBuilder::new(sm.start_state.clone());
            for (field, value) in overrides {
                if let Some(b) = sm.try_bool_field(&field) {
                    builder.set_bool(b.id(), value != 0);
                } else if let Some(i) = sm.try_int_field(&field) {
                    builder.set_int(i.id(), value as i32);
                } else {
                    return Err(StateError::UnknownField(field));
                }
            }
            if sm
                .named_states
                .insert(name.clone(), builder.into_state())
                .is_some()
            {
                return Err(StateError::DuplicateNamedState(name));
            }
        }

        for (name, members) in self.named_unions {
            let states: Result<Vec<State>, StateError> = members
                .iter()
                .map(|m| {
                    sm.named_states
                        .get(m)
                        .cloned()
                        .ok_or_else(|| StateError::UnknownNamedState(m.clone()))
                })
                .collect();
            let union = StateUnion::from_states(states?, &sm);
            if sm.named_unions.insert(name.clone(), union).is_some() {
                return Err(StateError::DuplicateNamedState(name));
            }
        }

        Ok(sm)
    }
}

/// Frozen field schema: dense ids, defaults, directions, tags and named
/// states. Immutable after [`StateManagerBuilder::build`].
#[derive(Debug)]
pub struct StateManager {
    bools: Vec<StateBool>,
    ints: Vec<StateInt>,
    bool_lookup: HashMap<String, BoolFieldId>,
    int_lookup: HashMap<String, IntFieldId>,
    properties: HashMap<String, HashMap<String, i64>>,
    tags: HashMap<String, Vec<StateFieldId>>,
    start_state: State,
    named_states: HashMap<String, State>,
    named_unions: HashMap<String, StateUnion>,
}

impl StateManager {
    /// All boolean fields, in id order.
    pub fn bools(&self) -> &[StateBool] {
        &self.bools
    }

    /// All integer fields, in id order.
    pub fn ints(&self) -> &[StateInt] {
        &self.ints
    }

    /// Look up a bool field by name.
    ///
    /// # Panics
    ///
    /// Panics if no bool field with this name exists.
    pub fn bool_field(&self, name: &str) -> &StateBool {
        self.try_bool_field(name)
            .unwrap_or_else(|| panic!("Unknown bool state field: {}", name))
    }

    pub fn try_bool_field(&self, name: &str) -> Option<&StateBool> {
        self.bool_lookup.get(name).map(|id| &self.bools[id.index()])
    }

    /// Look up an int field by name.
    ///
    /// # Panics
    ///
    /// Panics if no int field with this name exists.
    pub fn int_field(&self, name: &str) -> &StateInt {
        self.try_int_field(name)
            .unwrap_or_else(|| panic!("Unknown int state field: {}", name))
    }

    pub fn try_int_field(&self, name: &str) -> Option<&StateInt> {
        self.int_lookup.get(name).map(|id| &self.ints[id.index()])
    }

    /// All fields carrying `tag`, in declaration order. Empty for an
    /// unknown tag.
    pub fn fields_by_tag(&self, tag: &str) -> &[StateFieldId] {
        self.tags.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Read a raw field property, if set.
    pub fn try_property(&self, field: &str, key: &str) -> Option<i64> {
        self.properties.get(field).and_then(|p| p.get(key)).copied()
    }

    /// The state with every field at its declared default.
    pub fn start_state(&self) -> &State {
        &self.start_state
    }

    /// Look up a named state.
    ///
    /// # Panics
    ///
    /// Panics if no named state with this name was registered.
    pub fn named_state(&self, name: &str) -> &State {
        self.try_named_state(name)
            .unwrap_or_else(|| panic!("Unknown named state: {}", name))
    }

    pub fn try_named_state(&self, name: &str) -> Option<&State> {
        self.named_states.get(name)
    }

    /// Look up a named state union.
    ///
    /// # Panics
    ///
    /// Panics if no named union with this name was registered.
    pub fn named_state_union(&self, name: &str) -> &StateUnion {
        self.try_named_state_union(name)
            .unwrap_or_else(|| panic!("Unknown named state union: {}", name))
    }

    pub fn try_named_state_union(&self, name: &str) -> Option<&StateUnion> {
        self.named_unions.get(name)
    }

    pub fn bool_count(&self) -> usize {
        self.bools.len()
    }

    pub fn int_count(&self) -> usize {
        self.ints.len()
    }

    /// Render a state for diagnostics: every field as `name=value`.
    pub fn pretty_print(&self, state: &State) -> String {
        let mut out = String::new();
        for field in &self.bools {
            let _ = write!(out, "{}={} ", field.name(), state.get_bool(field.id()));
        }
        for field in &self.ints {
            let _ = write!(out, "{}={} ", field.name(), state.get_int(field.id()));
        }
        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manager() -> StateManager {
        let mut smb = StateManagerBuilder::new();
        smb.bool_field("HASRING");
        smb.bool_field("DAMAGED");
        smb.int_field("CHARGES");
        smb.set_property("HASRING", PROP_DEFAULT_VALUE, 1);
        smb.set_property("DAMAGED", PROP_LOW_IS_BETTER, 1);
        smb.set_property("CHARGES", PROP_DEFAULT_VALUE, 3);
        smb.add_tag("HASRING", "equipment");
        smb.add_tag("CHARGES", "equipment");
        smb.named_state("worn", vec![("HASRING".to_string(), 0)]);
        smb.named_state_union("start_or_worn", vec!["worn".to_string()]);
        smb.build().unwrap()
    }

    #[test]
    fn test_dense_ids_per_kind() {
        let sm = sample_manager();
        assert_eq!(sm.bool_field("HASRING").id().index(), 0);
        assert_eq!(sm.bool_field("DAMAGED").id().index(), 1);
        assert_eq!(sm.int_field("CHARGES").id().index(), 0);
    }

    #[test]
    fn test_start_state_applies_defaults() {
        let sm = sample_manager();
        let start = sm.start_state();
        assert!(start.get_bool(sm.bool_field("HASRING").id()));
        assert!(!start.get_bool(sm.bool_field("DAMAGED").id()));
        assert_eq!(start.get_int(sm.int_field("CHARGES").id()), 3);
    }

    #[test]
    fn test_direction_property_applies() {
        let sm = sample_manager();
        assert!(!sm.bool_field("HASRING").low_is_better());
        assert!(sm.bool_field("DAMAGED").low_is_better());
    }

    #[test]
    fn test_tag_lookup() {
        let sm = sample_manager();
        assert_eq!(sm.fields_by_tag("equipment").len(), 2);
        assert!(sm.fields_by_tag("nonexistent").is_empty());
    }

    #[test]
    fn test_try_variants_return_none() {
        let sm = sample_manager();
        assert!(sm.try_bool_field("MISSING").is_none());
        assert!(sm.try_int_field("MISSING").is_none());
        assert!(sm.try_named_state("MISSING").is_none());
    }

    #[test]
    #[should_panic(expected = "Unknown bool state field")]
    fn test_strict_getter_panics() {
        let sm = sample_manager();
        sm.bool_field("MISSING");
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut smb = StateManagerBuilder::new();
        smb.bool_field("X");
        smb.bool_field("X");
        assert!(matches!(smb.build(), Err(StateError::DuplicateField(_))));
    }

    #[test]
    fn test_named_state_overrides() {
        let sm = sample_manager();
        let worn = sm.named_state("worn");
        assert!(!worn.get_bool(sm.bool_field("HASRING").id()));
        assert_eq!(sm.named_state_union("start_or_worn").len(), 1);
    }

    #[test]
    fn test_property_on_unknown_field_rejected() {
        let mut smb = StateManagerBuilder::new();
        smb.bool_field("X");
        smb.set_property("Y", PROP_DEFAULT_VALUE, 1);
        assert!(matches!(smb.build(), Err(StateError::UnknownField(_))));
    }

    #[test]
    fn test_pretty_print() {
        let sm = sample_manager();
        let text = sm.pretty_print(sm.start_state());
        assert!(text.contains("HASRING=true"));
        assert!(text.contains("CHARGES=3"));
    }
}
