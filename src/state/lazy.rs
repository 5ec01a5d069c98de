// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Copy-on-write state mutation.
//!
//! A [`LazyStateBuilder`] wraps a base [`State`] and defers all allocation
//! until the first write: reads go straight to the base, and the first
//! mutation of each kind (bool word array, int array) copies that array
//! into an owned overlay. The shared base is never touched.
//!
//! Builders are cloned freely during clause evaluation (every disjunctive
//! branch of a state-logic walk gets its own builder), so the clean-clone
//! path must stay cheap: two `Rc` bumps.

use std::rc::Rc;

use crate::state::field::{BoolFieldId, IntFieldId};
use crate::state::vector::BOOLS_PER_WORD;
use crate::state::State;

/// Copy-on-write mutable view over a base [`State`].
#[derive(Debug, Clone)]
pub struct LazyStateBuilder {
    base: State,
    /// Owned copy of the bool words, allocated on first bool write.
    bools: Option<Vec<u64>>,
    /// Owned copy of the int slice, allocated on first int write.
    ints: Option<Vec<i32>>,
}

impl LazyStateBuilder {
    /// Wrap a state without copying anything.
    pub fn new(base: State) -> Self {
        Self {
            base,
            bools: None,
            ints: None,
        }
    }

    pub fn get_bool(&self, id: BoolFieldId) -> bool {
        match &self.bools {
            Some(words) => {
                (words[id.index() / BOOLS_PER_WORD] >> (id.index() % BOOLS_PER_WORD)) & 1 != 0
            }
            None => self.base.get_bool(id),
        }
    }

    pub fn get_int(&self, id: IntFieldId) -> i32 {
        match &self.ints {
            Some(ints) => ints[id.index()],
            None => self.base.get_int(id),
        }
    }

    /// Set a bool field, allocating the overlay on first write.
    pub fn set_bool(&mut self, id: BoolFieldId, value: bool) {
        let words = self
            .bools
            .get_or_insert_with(|| self.base.bools.to_vec());
        let word = &mut words[id.index() / BOOLS_PER_WORD];
        let bit = 1u64 << (id.index() % BOOLS_PER_WORD);
        if value {
            *word |= bit;
        } else {
            *word &= !bit;
        }
    }

    /// Set an int field, allocating the overlay on first write.
    pub fn set_int(&mut self, id: IntFieldId, value: i32) {
        let ints = self.ints.get_or_insert_with(|| self.base.ints.to_vec());
        ints[id.index()] = value;
    }

    /// Add `delta` to an int field.
    pub fn increment(&mut self, id: IntFieldId, delta: i32) {
        let current = self.get_int(id);
        self.set_int(id, current + delta);
    }

    /// Whether any write has occurred.
    pub fn is_dirty(&self) -> bool {
        self.bools.is_some() || self.ints.is_some()
    }

    /// Materialize back into an immutable [`State`].
    ///
    /// Untouched arrays are shared with the base; dirty arrays move into
    /// the new state without a further copy.
    pub fn into_state(self) -> State {
        let bools = match self.bools {
            Some(words) => Rc::from(words.into_boxed_slice()),
            None => self.base.bools,
        };
        let ints = match self.ints {
            Some(ints) => Rc::from(ints.into_boxed_slice()),
            None => self.base.ints,
        };
        State::from_parts(bools, ints)
    }
}
