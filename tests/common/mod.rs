// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::rc::Rc;

use rando_engine::logic::token::{AND, NONE, OR, VARIABLE_ID_OFFSET};
use rando_engine::logic::{
    AtomRef, ClauseBlueprint, ClauseElement, LogicManager, LogicManagerBuilder, TermKind, Variable,
};
use rando_engine::logic::variable::StateModifierVariable;
use rando_engine::progression::{LogicItem, SingleItem};
use rando_engine::rando::{RandoItem, RandoLocation, RandomizationGroup};
use rando_engine::state::field::BoolFieldId;
use rando_engine::state::{LazyStateBuilder, StateManager, StateManagerBuilder};

/// A state manager with no fields, for pure-boolean logic tests.
pub fn empty_sm() -> Rc<StateManager> {
    Rc::new(StateManagerBuilder::new().build().unwrap())
}

/// A conjunction-of-terms clause.
pub fn term_clause(terms: &[&str]) -> ClauseBlueprint {
    ClauseBlueprint {
        logic: terms
            .iter()
            .map(|t| ClauseElement::Term((*t).to_string()))
            .collect(),
        ..Default::default()
    }
}

/// Define `name` as an OR of term conjunctions.
pub fn define_dnf(lmb: &mut LogicManagerBuilder, name: &str, clauses: &[&[&str]]) {
    lmb.define_logic(name, clauses.iter().map(|c| term_clause(c)).collect())
        .unwrap();
}

/// A single-term item named after its term.
pub fn key_item(lm: &LogicManager, term: &str) -> Rc<dyn LogicItem> {
    Rc::new(SingleItem::new(term, lm.term(term).id(), 1))
}

/// A rando item wrapping a single-term grant.
pub fn rando_item(lm: &LogicManager, term: &str) -> Rc<RandoItem> {
    RandoItem::new(key_item(lm, term))
}

/// A rando location bound to a registered logic def of the same name.
pub fn rando_location(lm: &LogicManager, name: &str) -> Rc<RandoLocation> {
    RandoLocation::new(name, lm.logic_def(name).clone())
}

/// One-group helper: items granting the named terms, locations bound to
/// the named defs.
pub fn group_of(
    lm: &LogicManager,
    label: &str,
    items: &[&str],
    locations: &[&str],
) -> RandomizationGroup {
    RandomizationGroup::new(
        label,
        items.iter().map(|t| rando_item(lm, t)).collect(),
        locations.iter().map(|l| rando_location(lm, l)).collect(),
    )
}

/// A state modifier that consumes a true bool field: passes with the
/// field cleared when set, fails the branch otherwise.
#[derive(Debug)]
pub struct ConsumeFlag {
    name: String,
    field: BoolFieldId,
}

impl ConsumeFlag {
    pub fn new(name: &str, field: BoolFieldId) -> Self {
        Self {
            name: name.to_string(),
            field,
        }
    }
}

impl StateModifierVariable for ConsumeFlag {
    fn name(&self) -> &str {
        &self.name
    }

    fn terms(&self) -> Vec<rando_engine::TermId> {
        Vec::new()
    }

    fn modify_state(
        &self,
        _clause: &rando_engine::logic::Clause,
        _pm: &rando_engine::ProgressionManager,
        input: &LazyStateBuilder,
    ) -> Vec<LazyStateBuilder> {
        if input.get_bool(self.field) {
            let mut out = input.clone();
            out.set_bool(self.field, false);
            vec![out]
        } else {
            Vec::new()
        }
    }
}

/// A state modifier that decrements an int field, unconditionally.
#[derive(Debug)]
pub struct SpendCharge {
    name: String,
    field: rando_engine::state::field::IntFieldId,
}

impl SpendCharge {
    pub fn new(name: &str, field: rando_engine::state::field::IntFieldId) -> Self {
        Self {
            name: name.to_string(),
            field,
        }
    }
}

impl StateModifierVariable for SpendCharge {
    fn name(&self) -> &str {
        &self.name
    }

    fn terms(&self) -> Vec<rando_engine::TermId> {
        Vec::new()
    }

    fn modify_state(
        &self,
        _clause: &rando_engine::logic::Clause,
        _pm: &rando_engine::ProgressionManager,
        input: &LazyStateBuilder,
    ) -> Vec<LazyStateBuilder> {
        let mut out = input.clone();
        out.increment(self.field, -1);
        vec![out]
    }
}

/// An access variable reading an int field from the state under
/// evaluation.
#[derive(Debug)]
pub struct ReadCharge {
    name: String,
    field: rando_engine::state::field::IntFieldId,
}

impl ReadCharge {
    pub fn new(name: &str, field: rando_engine::state::field::IntFieldId) -> Self {
        Self {
            name: name.to_string(),
            field,
        }
    }
}

impl rando_engine::logic::StateAccessVariable for ReadCharge {
    fn name(&self) -> &str {
        &self.name
    }

    fn terms(&self) -> Vec<rando_engine::TermId> {
        Vec::new()
    }

    fn value_in(
        &self,
        state: &LazyStateBuilder,
        _pm: &rando_engine::ProgressionManager,
    ) -> i32 {
        state.get_int(self.field)
    }
}

/// A world with one consumable ring: state bool HASRING (default true),
/// state term START, modifier USE_RING, def FIGHT := START + USE_RING.
pub struct RingWorld {
    pub lm: Rc<LogicManager>,
    pub hasring: BoolFieldId,
    pub start: rando_engine::TermId,
}

pub fn ring_world() -> RingWorld {
    let mut smb = StateManagerBuilder::new();
    smb.bool_field("HASRING");
    smb.set_property("HASRING", rando_engine::state::field::PROP_DEFAULT_VALUE, 1);
    let sm = Rc::new(smb.build().unwrap());
    let hasring = sm.bool_field("HASRING").id();

    let mut lmb = LogicManagerBuilder::new(sm);
    let start = lmb.term("START", TermKind::State).unwrap();
    lmb.register_variable(Variable::StateModifier(Rc::new(ConsumeFlag::new(
        "USE_RING", hasring,
    ))))
    .unwrap();
    lmb.define_logic(
        "FIGHT",
        vec![ClauseBlueprint {
            logic: vec![ClauseElement::Term("START".into())],
            state_logic: vec![ClauseElement::Variable("USE_RING".into())],
            state_provider: Some(AtomRef::Term("START".into())),
        }],
    )
    .unwrap();

    RingWorld {
        lm: Rc::new(lmb.build()),
        hasring,
        start,
    }
}

/// Reassemble an RPN token stream (as produced by
/// `DnfLogicDef::to_token_sequence`) back into compiled clause triples
/// `(logic, state_logic, state_provider)`.
///
/// AND of two clause lists is their cartesian merge, OR concatenates;
/// comparison operators pop their two operand atoms. Atoms route to the
/// state side when they are modifier variables (or comparisons over
/// access variables); the provider of a rebuilt clause is its first
/// provider variable, else its first state-valued term.
pub fn rpn_reassemble(tokens: &[i32], lm: &LogicManager) -> Vec<(Vec<i32>, Vec<i32>, i32)> {
    #[derive(Clone, Default)]
    struct ClauseAcc {
        logic: Vec<i32>,
        state_logic: Vec<i32>,
    }

    #[derive(Clone)]
    enum Entry {
        Atom(i32),
        Clauses(Vec<ClauseAcc>),
    }

    fn is_modifier(lm: &LogicManager, raw: i32) -> bool {
        raw <= VARIABLE_ID_OFFSET
            && matches!(
                lm.variables()[(VARIABLE_ID_OFFSET - raw) as usize],
                Variable::StateModifier(_)
            )
    }

    fn is_access(lm: &LogicManager, raw: i32) -> bool {
        raw <= VARIABLE_ID_OFFSET
            && matches!(
                lm.variables()[(VARIABLE_ID_OFFSET - raw) as usize],
                Variable::StateAccess(_)
            )
    }

    fn unit_clause(lm: &LogicManager, raw: i32) -> ClauseAcc {
        let mut acc = ClauseAcc::default();
        if is_modifier(lm, raw) {
            acc.state_logic.push(raw);
        } else {
            acc.logic.push(raw);
        }
        acc
    }

    fn to_clauses(lm: &LogicManager, entry: Entry) -> Vec<ClauseAcc> {
        match entry {
            Entry::Atom(raw) => vec![unit_clause(lm, raw)],
            Entry::Clauses(c) => c,
        }
    }

    let mut stack: Vec<Entry> = Vec::new();
    for &raw in tokens {
        match raw {
            AND => {
                let b = to_clauses(lm, stack.pop().unwrap());
                let a = to_clauses(lm, stack.pop().unwrap());
                let mut merged = Vec::new();
                for left in &a {
                    for right in &b {
                        let mut acc = left.clone();
                        acc.logic.extend_from_slice(&right.logic);
                        acc.state_logic.extend_from_slice(&right.state_logic);
                        merged.push(acc);
                    }
                }
                stack.push(Entry::Clauses(merged));
            }
            OR => {
                let b = to_clauses(lm, stack.pop().unwrap());
                let mut a = to_clauses(lm, stack.pop().unwrap());
                a.extend(b);
                stack.push(Entry::Clauses(a));
            }
            op if op == rando_engine::logic::token::EQ
                || op == rando_engine::logic::token::LT
                || op == rando_engine::logic::token::GT =>
            {
                let Some(Entry::Atom(rhs)) = stack.pop() else {
                    panic!("comparison rhs must be an atom");
                };
                let Some(Entry::Atom(lhs)) = stack.pop() else {
                    panic!("comparison lhs must be an atom");
                };
                let mut acc = ClauseAcc::default();
                if is_access(lm, lhs) || is_access(lm, rhs) {
                    acc.state_logic.extend([op, lhs, rhs]);
                } else {
                    acc.logic.extend([op, lhs, rhs]);
                }
                stack.push(Entry::Clauses(vec![acc]));
            }
            _ => stack.push(Entry::Atom(raw)),
        }
    }

    assert_eq!(stack.len(), 1, "token stream reduces to one def");
    let clauses = to_clauses(lm, stack.pop().unwrap());
    clauses
        .into_iter()
        .map(|acc| {
            let provider = acc
                .state_logic
                .iter()
                .chain(acc.logic.iter())
                .copied()
                .find(|&raw| {
                    raw <= VARIABLE_ID_OFFSET
                        && matches!(
                            lm.variables()[(VARIABLE_ID_OFFSET - raw) as usize],
                            Variable::StateProvider(_)
                        )
                })
                .or_else(|| {
                    acc.logic.iter().copied().find(|&raw| {
                        raw >= 0
                            && lm.terms()[raw as usize].kind() == TermKind::State
                    })
                })
                .unwrap_or(NONE);
            (acc.logic, acc.state_logic, provider)
        })
        .collect()
}
