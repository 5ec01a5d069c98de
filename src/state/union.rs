// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Antichains of states under the dominance order.
//!
//! A [`StateUnion`] records the ways a term can currently be reached: "at
//! least one of these resource configurations is attainable". Internally it
//! is a minimal antichain (no element is dominated by another), so adding
//! a state that some existing element subsumes is a no-op, and adding a
//! state that subsumes existing elements evicts them.
//!
//! The *empty* union is a real value: it means "reachable, with
//! indeterminate state". Absence of a union (modeled as `Option::None` at
//! the progression layer) means "not yet reachable". Keep the two distinct;
//! conflating them loses the difference between "we cannot get here" and
//! "we can get here but know nothing extra".

use std::fmt;

use crate::state::{State, StateManager};

/// A minimal antichain of [`State`]s under dominance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUnion {
    states: Vec<State>,
}

impl StateUnion {
    /// The canonical empty union: reachable with indeterminate state.
    pub fn empty() -> Self {
        Self { states: Vec::new() }
    }

    /// A singleton union.
    pub fn of(state: State) -> Self {
        Self {
            states: vec![state],
        }
    }

    /// Construct from a list, discarding any element dominated by another.
    pub fn from_states(states: Vec<State>, sm: &StateManager) -> Self {
        let mut union = Self::empty();
        for s in states {
            union.absorb(s, sm);
        }
        union
    }

    /// Merge two unions into a reduced antichain.
    pub fn union(a: &StateUnion, b: &StateUnion, sm: &StateManager) -> StateUnion {
        let mut out = a.clone();
        for s in &b.states {
            out.absorb(s.clone(), sm);
        }
        out
    }

    /// Merge `new_states` into `current`.
    ///
    /// Returns `None` only when `current` is absent and `new_states` is
    /// empty, i.e. there is no state information at all. Otherwise returns
    /// the reduced union; when nothing in `new_states` improves `current`,
    /// the result is a clone of `current` (callers can use equality against
    /// the previous value to detect a real change).
    pub fn try_union(
        current: Option<&StateUnion>,
        new_states: &[State],
        sm: &StateManager,
    ) -> Option<StateUnion> {
        match current {
            None if new_states.is_empty() => None,
            None => Some(Self::from_states(new_states.to_vec(), sm)),
            Some(cur) => {
                let mut out = cur.clone();
                for s in new_states {
                    out.absorb(s.clone(), sm);
                }
                Some(out)
            }
        }
    }

    /// Add one state, keeping the antichain minimal.
    ///
    /// Does nothing if an existing element dominates `state`; otherwise
    /// evicts every element `state` dominates and appends it.
    pub fn absorb(&mut self, state: State, sm: &StateManager) {
        if self
            .states
            .iter()
            .any(|existing| existing.dominates(&state, sm))
        {
            return;
        }
        self.states.retain(|existing| !state.dominates(existing, sm));
        self.states.push(state);
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True for the canonical empty ("indeterminate") union.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Set equality, ignoring element order.
    pub fn same_states(&self, other: &StateUnion) -> bool {
        self.states.len() == other.states.len()
            && self.states.iter().all(|s| other.states.contains(s))
    }

    /// True iff every element of `other` is dominated by some element of
    /// `self`: replacing `other` with `self` loses nothing.
    pub fn subsumes(&self, other: &StateUnion, sm: &StateManager) -> bool {
        other
            .states
            .iter()
            .all(|o| self.states.iter().any(|s| s.dominates(o, sm)))
    }
}

impl fmt::Display for StateUnion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} state(s)}}", self.states.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{LazyStateBuilder, StateManagerBuilder};

    fn two_bool_manager() -> StateManager {
        let mut smb = StateManagerBuilder::new();
        smb.bool_field("A");
        smb.bool_field("B");
        smb.build().unwrap()
    }

    fn make(sm: &StateManager, a: bool, b: bool) -> State {
        let mut builder = LazyStateBuilder::new(sm.start_state().clone());
        builder.set_bool(sm.bool_field("A").id(), a);
        builder.set_bool(sm.bool_field("B").id(), b);
        builder.into_state()
    }

    #[test]
    fn test_incomparable_states_form_antichain() {
        let sm = two_bool_manager();
        let union = StateUnion::from_states(
            vec![make(&sm, true, false), make(&sm, false, true)],
            &sm,
        );
        assert_eq!(union.len(), 2);
    }

    #[test]
    fn test_dominating_state_reduces_union() {
        let sm = two_bool_manager();
        let mut union = StateUnion::from_states(
            vec![make(&sm, true, false), make(&sm, false, true)],
            &sm,
        );
        union.absorb(make(&sm, true, true), &sm);
        assert_eq!(union.len(), 1);
        assert_eq!(union.states()[0], make(&sm, true, true));
    }

    #[test]
    fn test_dominated_state_is_discarded() {
        let sm = two_bool_manager();
        let mut union = StateUnion::of(make(&sm, true, true));
        union.absorb(make(&sm, true, false), &sm);
        assert_eq!(union.len(), 1);
        assert_eq!(union.states()[0], make(&sm, true, true));
    }

    #[test]
    fn test_try_union_absent_and_empty() {
        let sm = two_bool_manager();
        assert!(StateUnion::try_union(None, &[], &sm).is_none());
    }

    #[test]
    fn test_try_union_no_improvement_keeps_current() {
        let sm = two_bool_manager();
        let current = StateUnion::of(make(&sm, true, true));
        let result =
            StateUnion::try_union(Some(&current), &[make(&sm, true, false)], &sm).unwrap();
        assert!(result.same_states(&current));
    }

    #[test]
    fn test_union_is_commutative() {
        let sm = two_bool_manager();
        let a = StateUnion::of(make(&sm, true, false));
        let b = StateUnion::of(make(&sm, false, true));
        let ab = StateUnion::union(&a, &b, &sm);
        let ba = StateUnion::union(&b, &a, &sm);
        assert!(ab.same_states(&ba));
    }

    #[test]
    fn test_empty_union_is_distinct_value() {
        let empty = StateUnion::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
    }
}
