// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Item contracts and the basic combinators.
//!
//! An item is anything that mutates progression when obtained. The
//! randomizer and updater only ever see the [`LogicItem`] trait; the
//! concrete combinators here ([`SingleItem`], [`MultiItem`],
//! [`FirstOfItem`]) cover the common shapes, and games supply their own
//! for anything richer.

use std::fmt::Debug;
use std::rc::Rc;

use crate::logic::term::TermId;
use crate::progression::ProgressionManager;
use crate::state::StateUnion;

/// One primitive progression effect.
#[derive(Debug, Clone)]
pub enum ItemEffect {
    /// Add to a term's integer value.
    Incr(TermId, i32),
    /// Merge a state union into a state-valued term.
    GiveState(TermId, StateUnion),
}

impl ItemEffect {
    pub fn term(&self) -> TermId {
        match self {
            ItemEffect::Incr(t, _) | ItemEffect::GiveState(t, _) => *t,
        }
    }

    pub(crate) fn apply(&self, pm: &mut ProgressionManager) {
        match self {
            ItemEffect::Incr(t, n) => pm.incr(*t, *n),
            ItemEffect::GiveState(t, union) => pm.give_state(*t, union.clone()),
        }
    }
}

/// Anything that can be obtained.
pub trait LogicItem: Debug {
    fn name(&self) -> &str;

    /// Apply this item's effects to the progression.
    fn add_to(&self, pm: &mut ProgressionManager);

    /// Terms this item can affect, for dependency analysis.
    fn affected_terms(&self) -> Vec<TermId>;
}

/// An item whose effect depends on the current progression.
pub trait ConditionalItem: LogicItem {
    /// Would [`LogicItem::add_to`] change anything right now?
    fn check_for_effect(&self, pm: &ProgressionManager) -> bool;
}

/// The workhorse: one term, one increment.
#[derive(Debug, Clone)]
pub struct SingleItem {
    name: String,
    term: TermId,
    value: i32,
}

impl SingleItem {
    pub fn new(name: &str, term: TermId, value: i32) -> Self {
        Self {
            name: name.to_string(),
            term,
            value,
        }
    }
}

impl LogicItem for SingleItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_to(&self, pm: &mut ProgressionManager) {
        pm.incr(self.term, self.value);
    }

    fn affected_terms(&self) -> Vec<TermId> {
        vec![self.term]
    }
}

impl ConditionalItem for SingleItem {
    fn check_for_effect(&self, _pm: &ProgressionManager) -> bool {
        self.value != 0
    }
}

/// Several effects applied together.
#[derive(Debug, Clone)]
pub struct MultiItem {
    name: String,
    effects: Vec<ItemEffect>,
}

impl MultiItem {
    pub fn new(name: &str, effects: Vec<ItemEffect>) -> Self {
        Self {
            name: name.to_string(),
            effects,
        }
    }
}

impl LogicItem for MultiItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_to(&self, pm: &mut ProgressionManager) {
        for effect in &self.effects {
            effect.apply(pm);
        }
    }

    fn affected_terms(&self) -> Vec<TermId> {
        self.effects.iter().map(ItemEffect::term).collect()
    }
}

impl ConditionalItem for MultiItem {
    fn check_for_effect(&self, _pm: &ProgressionManager) -> bool {
        !self.effects.is_empty()
    }
}

/// Fires the first nested item whose effect check passes.
///
/// Used for progressive items: the same physical pickup grants whichever
/// upgrade tier the player does not have yet.
#[derive(Debug)]
pub struct FirstOfItem {
    name: String,
    nested: Vec<Rc<dyn ConditionalItem>>,
}

impl FirstOfItem {
    pub fn new(name: &str, nested: Vec<Rc<dyn ConditionalItem>>) -> Self {
        Self {
            name: name.to_string(),
            nested,
        }
    }
}

impl LogicItem for FirstOfItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_to(&self, pm: &mut ProgressionManager) {
        if let Some(item) = self.nested.iter().find(|i| i.check_for_effect(pm)) {
            item.add_to(pm);
        }
    }

    fn affected_terms(&self) -> Vec<TermId> {
        let mut out: Vec<TermId> = self
            .nested
            .iter()
            .flat_map(|i| i.affected_terms())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

impl ConditionalItem for FirstOfItem {
    fn check_for_effect(&self, pm: &ProgressionManager) -> bool {
        self.nested.iter().any(|i| i.check_for_effect(pm))
    }
}
