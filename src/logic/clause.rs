// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! A single conjunctive clause of a DNF formula, and its evaluation.
//!
//! A clause holds two compiled sequences plus a state provider id:
//!
//! - `logic`: the boolean part: term requirements, `ANY`/`NONE`, integer
//!   comparisons.
//! - `state_logic`: the state part: modifier variables and comparisons
//!   over the lazy state being threaded through.
//! - `state_provider`: where the clause's input states come from: a
//!   state-valued term, a provider variable, or the `NONE` sentinel.
//!
//! # State walking
//!
//! State evaluation is a depth-first walk over `state_logic`. Each input
//! state starts a [`LazyStateBuilder`]; modifiers branch the walk (zero
//! outputs fail the branch), comparisons gate it, and a builder that
//! survives past the end of the sequence materializes into an output
//! state.
//!
//! When the input union is absent ("not yet reachable") or empty
//! ("reachable, indeterminate"), the walk runs on the *empty branch*:
//! only modifiers may appear (each is asked to `provide_state`) and
//! comparisons fail the branch, since there is no state to compare
//! against. A chain of empty `provide_state` answers all the way to the
//! end is an indeterminate success, which is what
//! [`Clause::evaluate_state_change`] reports in its return value.
//!
//! Comparison operands are always the next two sequence entries and the
//! cursor advances by 3, in every walker.

use crate::logic::term::TermId;
use crate::logic::token::{self, decode, LogicToken, NONE};
use crate::logic::variable::Variable;
use crate::progression::ProgressionManager;
use crate::state::{LazyStateBuilder, State, StateUnion};

/// One conjunctive clause of a [`DnfLogicDef`](crate::logic::DnfLogicDef).
#[derive(Debug, Clone)]
pub struct Clause {
    pub(crate) logic: Vec<i32>,
    pub(crate) state_logic: Vec<i32>,
    pub(crate) state_provider: i32,
}

impl Clause {
    pub(crate) fn new(logic: Vec<i32>, state_logic: Vec<i32>, state_provider: i32) -> Self {
        Self {
            logic,
            state_logic,
            state_provider,
        }
    }

    pub fn logic(&self) -> &[i32] {
        &self.logic
    }

    pub fn state_logic(&self) -> &[i32] {
        &self.state_logic
    }

    /// Raw provider id: a term id, a provider variable id, or `NONE`.
    pub fn state_provider_raw(&self) -> i32 {
        self.state_provider
    }

    /// Evaluate the boolean part against the current progression.
    ///
    /// Walks `logic` left to right; any failing atom short-circuits the
    /// clause to false.
    pub fn evaluate_logic(&self, pm: &ProgressionManager) -> bool {
        let seq = &self.logic;
        let mut i = 0;
        while i < seq.len() {
            match decode(seq[i]).expect("compiled logic decodes") {
                LogicToken::Term(t) => {
                    if !pm.has(t) {
                        return false;
                    }
                    i += 1;
                }
                LogicToken::Any => i += 1,
                LogicToken::None => return false,
                LogicToken::Variable(v) => {
                    if pm.lm().variable(v).int_value(self, pm) <= 0 {
                        return false;
                    }
                    i += 1;
                }
                LogicToken::Compare(op) => {
                    let left = self.int_operand(pm, seq[i + 1]);
                    let right = self.int_operand(pm, seq[i + 2]);
                    if !op.holds(left, right) {
                        return false;
                    }
                    i += 3;
                }
                LogicToken::And | LogicToken::Or => {
                    panic!("AND/OR marker inside compiled clause")
                }
            }
        }
        true
    }

    /// The clause's input state union, if any.
    ///
    /// A provider term that is not yet reachable yields `None`; the state
    /// walk then runs on the empty branch, and the boolean part (which
    /// always mentions the provider term) keeps the clause from
    /// succeeding spuriously.
    pub fn input_state(&self, pm: &ProgressionManager) -> Option<StateUnion> {
        match decode(self.state_provider) {
            Some(LogicToken::Term(t)) => pm.get_state(t).cloned(),
            Some(LogicToken::Variable(v)) => match pm.lm().variable(v) {
                Variable::StateProvider(p) => p.input_state(self, pm),
                other => panic!(
                    "State provider {} is not a StateProvider variable",
                    other.name()
                ),
            },
            _ => None,
        }
    }

    /// Does at least one (input × state-logic) path succeed?
    pub fn evaluate_state_discard(&self, pm: &ProgressionManager) -> bool {
        match self.input_state(pm) {
            Some(union) if !union.is_empty() => union
                .states()
                .iter()
                .any(|s| self.walk_discard(pm, LazyStateBuilder::new(s.clone()), 0)),
            _ => self.walk_empty_discard(pm, 0),
        }
    }

    /// Enumerate output states into `result`.
    ///
    /// Returns true iff the clause succeeds on the empty/indeterminate
    /// branch (the `provide_state` chain alone is viable), in which case
    /// the caller owes the term an empty union even if `result` gained
    /// nothing.
    pub fn evaluate_state_change(&self, pm: &ProgressionManager, result: &mut Vec<State>) -> bool {
        match self.input_state(pm) {
            Some(union) if !union.is_empty() => {
                for s in union.states() {
                    self.walk_change(pm, LazyStateBuilder::new(s.clone()), 0, result);
                }
                false
            }
            _ => self.walk_empty_change(pm, 0, result),
        }
    }

    /// Boolean part and state part together.
    pub fn can_get(&self, pm: &ProgressionManager) -> bool {
        self.evaluate_logic(pm) && self.evaluate_state_discard(pm)
    }

    /// Every term this clause depends on: atoms of both sequences, the
    /// term dependencies of every referenced variable, and the provider
    /// term. Sorted and deduplicated.
    pub fn terms(&self, lm: &crate::logic::LogicManager) -> Vec<TermId> {
        let mut out = Vec::new();
        for atom in token::atoms(&self.logic).chain(token::atoms(&self.state_logic)) {
            match atom {
                token::Atom::Term(t) => out.push(t),
                token::Atom::Variable(v) => out.extend(lm.variable(v).terms()),
            }
        }
        if self.state_provider != NONE {
            if let Some(LogicToken::Term(t)) = decode(self.state_provider) {
                out.push(t);
            } else if let Some(LogicToken::Variable(v)) = decode(self.state_provider) {
                out.extend(lm.variable(v).terms());
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    // Operand resolution

    /// Integer operand in the boolean part: term value or variable value.
    fn int_operand(&self, pm: &ProgressionManager, raw: i32) -> i32 {
        match decode(raw).expect("compiled operand decodes") {
            LogicToken::Term(t) => pm.get(t),
            LogicToken::Variable(v) => pm.lm().variable(v).int_value(self, pm),
            other => panic!("Operand {:?} is not a term or variable", other),
        }
    }

    /// Operand during state evaluation: also consults access variables
    /// against the current builder.
    fn state_operand(&self, pm: &ProgressionManager, builder: &LazyStateBuilder, raw: i32) -> i32 {
        match decode(raw).expect("compiled operand decodes") {
            LogicToken::Term(t) => pm.get(t),
            LogicToken::Variable(v) => match pm.lm().variable(v) {
                Variable::StateAccess(a) => a.value_in(builder, pm),
                var @ (Variable::Int(_) | Variable::StateProvider(_)) => var.int_value(self, pm),
                other => panic!(
                    "Variable {} cannot be a comparison operand",
                    other.name()
                ),
            },
            other => panic!("Operand {:?} is not a term or variable", other),
        }
    }

    // State-logic walkers

    fn walk_discard(&self, pm: &ProgressionManager, builder: LazyStateBuilder, i: usize) -> bool {
        let seq = &self.state_logic;
        if i >= seq.len() {
            return true;
        }
        match decode(seq[i]).expect("compiled state logic decodes") {
            LogicToken::Variable(v) => match pm.lm().variable(v) {
                Variable::StateModifier(m) => m
                    .modify_state(self, pm, &builder)
                    .into_iter()
                    .any(|b| self.walk_discard(pm, b, i + 1)),
                other => panic!("Variable {} is not a StateModifier", other.name()),
            },
            LogicToken::Compare(op) => {
                let left = self.state_operand(pm, &builder, seq[i + 1]);
                let right = self.state_operand(pm, &builder, seq[i + 2]);
                op.holds(left, right) && self.walk_discard(pm, builder, i + 3)
            }
            other => panic!("Token {:?} is not valid in state logic", other),
        }
    }

    fn walk_empty_discard(&self, pm: &ProgressionManager, i: usize) -> bool {
        let seq = &self.state_logic;
        if i >= seq.len() {
            return true;
        }
        match decode(seq[i]).expect("compiled state logic decodes") {
            LogicToken::Variable(v) => match pm.lm().variable(v) {
                Variable::StateModifier(m) => match m.provide_state(self, pm) {
                    Option::None => false,
                    Some(builders) if builders.is_empty() => self.walk_empty_discard(pm, i + 1),
                    Some(builders) => builders
                        .into_iter()
                        .any(|b| self.walk_discard(pm, b, i + 1)),
                },
                other => panic!("Variable {} is not a StateModifier", other.name()),
            },
            // No input state to compare against: the empty branch fails.
            LogicToken::Compare(_) => false,
            other => panic!("Token {:?} is not valid in state logic", other),
        }
    }

    fn walk_change(
        &self,
        pm: &ProgressionManager,
        builder: LazyStateBuilder,
        i: usize,
        result: &mut Vec<State>,
    ) {
        let seq = &self.state_logic;
        if i >= seq.len() {
            result.push(builder.into_state());
            return;
        }
        match decode(seq[i]).expect("compiled state logic decodes") {
            LogicToken::Variable(v) => match pm.lm().variable(v) {
                Variable::StateModifier(m) => {
                    for b in m.modify_state(self, pm, &builder) {
                        self.walk_change(pm, b, i + 1, result);
                    }
                }
                other => panic!("Variable {} is not a StateModifier", other.name()),
            },
            LogicToken::Compare(op) => {
                let left = self.state_operand(pm, &builder, seq[i + 1]);
                let right = self.state_operand(pm, &builder, seq[i + 2]);
                if op.holds(left, right) {
                    self.walk_change(pm, builder, i + 3, result);
                }
            }
            other => panic!("Token {:?} is not valid in state logic", other),
        }
    }

    /// Empty-branch change walk. Returns true only when the chain
    /// completes through empty `provide_state` answers; concrete
    /// branches contribute to `result` instead.
    fn walk_empty_change(
        &self,
        pm: &ProgressionManager,
        i: usize,
        result: &mut Vec<State>,
    ) -> bool {
        let seq = &self.state_logic;
        if i >= seq.len() {
            return true;
        }
        match decode(seq[i]).expect("compiled state logic decodes") {
            LogicToken::Variable(v) => match pm.lm().variable(v) {
                Variable::StateModifier(m) => match m.provide_state(self, pm) {
                    Option::None => false,
                    Some(builders) if builders.is_empty() => {
                        self.walk_empty_change(pm, i + 1, result)
                    }
                    Some(builders) => {
                        for b in builders {
                            self.walk_change(pm, b, i + 1, result);
                        }
                        false
                    }
                },
                other => panic!("Variable {} is not a StateModifier", other.name()),
            },
            LogicToken::Compare(_) => false,
            other => panic!("Token {:?} is not valid in state logic", other),
        }
    }
}
