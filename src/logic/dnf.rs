// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Compiled logic definitions in disjunctive normal form.
//!
//! A [`DnfLogicDef`] is an ordered array of [`Clause`]s. The definition is
//! satisfied when any clause is; clause order matters only for
//! tie-breaking queries like [`DnfLogicDef::first_successful_clause`].
//!
//! Definitions are immutable and shared (`Rc<DnfLogicDef>`): the same
//! compiled def may back a location, a waypoint watcher and a validation
//! pass at once, and per the crate's sharing rules may be consulted
//! from several runs in parallel. The incremental-evaluation lookup is
//! therefore behind a `OnceLock`.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::logic::clause::Clause;
use crate::logic::term::TermId;
use crate::logic::token::{self, decode, LogicToken, AND, ANY, OR};
use crate::logic::LogicManager;
use crate::progression::ProgressionManager;
use crate::state::{State, StateUnion};

/// A compiled formula in DNF.
#[derive(Debug)]
pub struct DnfLogicDef {
    name: String,
    clauses: Vec<Clause>,
    /// Raw term id -> indices of clauses depending on that term.
    /// Built lazily on the first incremental evaluation.
    term_clause_lookup: OnceLock<HashMap<i32, Vec<usize>>>,
}

impl DnfLogicDef {
    pub(crate) fn new(name: String, clauses: Vec<Clause>) -> Self {
        Self {
            name,
            clauses,
            term_clause_lookup: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Is the definition satisfied under the current progression?
    pub fn can_get(&self, pm: &ProgressionManager) -> bool {
        self.clauses.iter().any(|c| c.can_get(pm))
    }

    /// Index of the lowest satisfied clause, in declaration order.
    pub fn first_successful_clause(&self, pm: &ProgressionManager) -> Option<usize> {
        self.clauses.iter().position(|c| c.can_get(pm))
    }

    /// Every term the definition depends on, sorted and deduplicated.
    pub fn terms(&self, lm: &LogicManager) -> Vec<TermId> {
        let mut out = Vec::new();
        for clause in &self.clauses {
            out.extend(clause.terms(lm));
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Full state evaluation: run every satisfied clause, append outputs
    /// to `result`. Returns true iff any clause succeeded on the empty
    /// branch.
    pub fn evaluate_state(&self, pm: &ProgressionManager, result: &mut Vec<State>) -> bool {
        let mut on_empty = false;
        for clause in &self.clauses {
            if clause.evaluate_logic(pm) {
                on_empty |= clause.evaluate_state_change(pm, result);
            }
        }
        on_empty
    }

    fn lookup(&self, lm: &LogicManager) -> &HashMap<i32, Vec<usize>> {
        self.term_clause_lookup.get_or_init(|| {
            let mut map: HashMap<i32, Vec<usize>> = HashMap::new();
            for (idx, clause) in self.clauses.iter().enumerate() {
                for term in clause.terms(lm) {
                    map.entry(term.raw()).or_default().push(idx);
                }
            }
            map
        })
    }

    /// Incremental state re-evaluation after `modified_term` changed.
    ///
    /// Only clauses depending on the modified term are re-run (pass
    /// `Option::None` to re-run everything, e.g. on the initial sweep);
    /// their outputs are merged into `current` via
    /// [`StateUnion::try_union`]. `scratch` is a reusable buffer.
    ///
    /// Returns:
    /// - `None`: no state at all, the term stays unreachable;
    /// - `Some(union)`: reachable, with the (possibly empty =
    ///   indeterminate) union to store. When nothing improved, the union
    ///   equals `current`.
    pub fn check_for_updated_state(
        &self,
        pm: &ProgressionManager,
        current: Option<&StateUnion>,
        scratch: &mut Vec<State>,
        modified_term: Option<TermId>,
    ) -> Option<StateUnion> {
        scratch.clear();
        let mut on_empty = false;

        let run = |clause: &Clause, scratch: &mut Vec<State>| -> bool {
            clause.evaluate_logic(pm) && clause.evaluate_state_change(pm, scratch)
        };

        match modified_term {
            Option::None => {
                for clause in &self.clauses {
                    on_empty |= run(clause, scratch);
                }
            }
            Some(term) => {
                let lookup = self.lookup(pm.lm());
                if let Some(indices) = lookup.get(&term.raw()) {
                    for &idx in indices {
                        on_empty |= run(&self.clauses[idx], scratch);
                    }
                }
            }
        }

        let sm = pm.lm().state_manager();
        if scratch.is_empty() && on_empty && current.is_none() {
            // Reachable with indeterminate state.
            return Some(StateUnion::empty());
        }
        StateUnion::try_union(current, scratch, sm)
    }

    /// Reconstruct an RPN token stream equivalent to this definition.
    ///
    /// Conjuncts within a clause are joined by `AND`, clauses by `OR`;
    /// comparisons appear operands-first. A provider variable that does
    /// not occur in the clause sequences is appended as an extra conjunct
    /// so nothing is lost in the round trip. An empty clause renders as
    /// `ANY`.
    pub fn to_token_sequence(&self) -> Vec<i32> {
        let mut out = Vec::new();
        for (clause_idx, clause) in self.clauses.iter().enumerate() {
            let mut conjuncts = 0usize;
            let mut emit = |unit: &[i32], out: &mut Vec<i32>| {
                out.extend_from_slice(unit);
                conjuncts += 1;
                if conjuncts > 1 {
                    out.push(AND);
                }
            };

            for seq in [&clause.logic, &clause.state_logic] {
                let mut i = 0;
                while i < seq.len() {
                    match decode(seq[i]).expect("compiled logic decodes") {
                        LogicToken::Compare(op) => {
                            emit(&[seq[i + 1], seq[i + 2], op.raw()], &mut out);
                            i += 3;
                        }
                        _ => {
                            emit(&[seq[i]], &mut out);
                            i += 1;
                        }
                    }
                }
            }

            // A provider variable is part of the formula even when no
            // sequence entry names it.
            if clause.state_provider <= token::VARIABLE_ID_OFFSET
                && !clause.logic.contains(&clause.state_provider)
                && !clause.state_logic.contains(&clause.state_provider)
            {
                emit(&[clause.state_provider], &mut out);
            }

            if conjuncts == 0 {
                out.push(ANY);
            }
            if clause_idx > 0 {
                out.push(OR);
            }
        }
        out
    }
}
