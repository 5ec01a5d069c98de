// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The progression manager: the live knowledge base of a run.
//!
//! Holds an integer per term and a state union per state-valued term.
//! Mutations (from items, or written back by updater entries) enqueue the
//! affected term; an attached [`MainUpdater`] drains the queue to a fixed
//! point after every [`ProgressionManager::add`].
//!
//! # Monotonicity
//!
//! Within a stage, term values are non-decreasing and state unions only
//! ever improve under the dominance order. The updater's termination
//! argument rests on this. The only sanctioned ways backward are
//! [`reset`] (between stages) and [`rewind`] to a checkpoint taken
//! earlier in the same stage (the sphere builder retracting a rejected
//! proposal batch).
//!
//! [`reset`]: ProgressionManager::reset
//! [`rewind`]: ProgressionManager::rewind

use std::collections::VecDeque;
use std::rc::Rc;

use crate::logic::term::{TermId, TermKind};
use crate::logic::LogicManager;
use crate::progression::item::LogicItem;
use crate::progression::updater::MainUpdater;
use crate::state::StateUnion;

/// Snapshot of progression (and updater entry flags) for later rewind.
#[derive(Debug, Clone)]
pub struct ProgressionSnapshot {
    obtained: Vec<i32>,
    state_unions: Vec<Option<StateUnion>>,
    entry_flags: Option<Vec<bool>>,
}

/// Mutable fixed-point store of term values and state unions.
#[derive(Debug)]
pub struct ProgressionManager {
    lm: Rc<LogicManager>,
    obtained: Vec<i32>,
    state_unions: Vec<Option<StateUnion>>,
    queue: VecDeque<TermId>,
    updater: Option<MainUpdater>,
}

impl ProgressionManager {
    pub fn new(lm: Rc<LogicManager>) -> Self {
        let n = lm.term_count();
        Self {
            lm,
            obtained: vec![0; n],
            state_unions: vec![None; n],
            queue: VecDeque::new(),
            updater: None,
        }
    }

    pub fn lm(&self) -> &LogicManager {
        &self.lm
    }

    /// Current value of a term. A state-valued term reads as 1 when its
    /// union is present (reachable) and 0 otherwise.
    pub fn get(&self, term: TermId) -> i32 {
        match self.lm.term_by_id(term).kind() {
            TermKind::Int => self.obtained[term.index()],
            TermKind::State => i32::from(self.state_unions[term.index()].is_some()),
        }
    }

    pub fn has(&self, term: TermId) -> bool {
        self.get(term) > 0
    }

    pub fn get_state(&self, term: TermId) -> Option<&StateUnion> {
        self.state_unions[term.index()].as_ref()
    }

    /// Add to a term's integer value and enqueue the change.
    pub fn incr(&mut self, term: TermId, delta: i32) {
        if delta == 0 {
            return;
        }
        self.obtained[term.index()] += delta;
        self.queue.push_back(term);
    }

    /// Merge a state union into a state-valued term.
    ///
    /// The write is monotone: the stored union only changes when the
    /// incoming one actually improves it, and only a real change enqueues
    /// the term. This is what makes updater drains terminate.
    pub fn give_state(&mut self, term: TermId, union: StateUnion) {
        let slot = &self.state_unions[term.index()];
        let merged = match slot {
            None if union.is_empty() => StateUnion::empty(),
            _ => {
                match StateUnion::try_union(slot.as_ref(), union.states(), self.lm.state_manager())
                {
                    Some(m) => m,
                    None => return,
                }
            }
        };
        let changed = match slot {
            None => true,
            Some(existing) => !existing.same_states(&merged),
        };
        if changed {
            self.state_unions[term.index()] = Some(merged);
            self.queue.push_back(term);
        }
    }

    /// Apply an item's effects and drive the attached updater to a fixed
    /// point.
    pub fn add(&mut self, item: &dyn LogicItem) {
        item.add_to(self);
        self.drain();
    }

    /// [`add`](Self::add), noting the source location in the trace log.
    pub fn add_at(&mut self, item: &dyn LogicItem, location: &str) {
        tracing::trace!(item = item.name(), location, "granting placed item");
        self.add(item);
    }

    /// Add a batch of items, draining once at the end.
    pub fn add_items<'a>(&mut self, items: impl IntoIterator<Item = &'a Rc<dyn LogicItem>>) {
        for item in items {
            item.add_to(self);
        }
        self.drain();
    }

    /// Attach an updater: perform its initial full sweep, then drain to a
    /// fixed point.
    pub fn hook(&mut self, mut updater: MainUpdater) {
        updater.sweep(self);
        self.updater = Some(updater);
        self.drain();
    }

    /// Re-run the attached updater's full sweep (e.g. after a rewind left
    /// entry outputs behind the queue), then drain.
    pub fn rehook(&mut self) {
        if let Some(mut updater) = self.updater.take() {
            updater.sweep(self);
            self.updater = Some(updater);
        }
        self.drain();
    }

    /// Detach and return the updater, if any.
    pub fn unhook(&mut self) -> Option<MainUpdater> {
        self.updater.take()
    }

    pub fn updater(&self) -> Option<&MainUpdater> {
        self.updater.as_ref()
    }

    pub(crate) fn pop_change(&mut self) -> Option<TermId> {
        self.queue.pop_front()
    }

    /// Drain queued changes through the attached updater until quiescent.
    /// With no updater attached the queue is simply discarded; a later
    /// [`hook`](Self::hook) starts from a full sweep anyway.
    fn drain(&mut self) {
        match self.updater.take() {
            Some(mut updater) => {
                updater.drain(self);
                self.updater = Some(updater);
            }
            None => self.queue.clear(),
        }
    }

    /// Zero every term and clear every state union, returning to the
    /// start of a stage. Updater entries are reset too; re-`hook`/`rehook`
    /// to sweep again.
    pub fn reset(&mut self) {
        self.obtained.fill(0);
        self.state_unions.fill(None);
        self.queue.clear();
        if let Some(updater) = self.updater.as_mut() {
            updater.reset_entries();
        }
    }

    /// Capture the current progression for a later [`rewind`](Self::rewind).
    pub fn checkpoint(&self) -> ProgressionSnapshot {
        ProgressionSnapshot {
            obtained: self.obtained.clone(),
            state_unions: self.state_unions.clone(),
            entry_flags: self.updater.as_ref().map(|u| u.entry_flags()),
        }
    }

    /// Restore a checkpoint taken earlier in this stage. Pending queue
    /// entries are dropped along with the retracted changes.
    pub fn rewind(&mut self, snapshot: &ProgressionSnapshot) {
        self.obtained.clone_from(&snapshot.obtained);
        self.state_unions.clone_from(&snapshot.state_unions);
        self.queue.clear();
        if let (Some(updater), Some(flags)) = (self.updater.as_mut(), &snapshot.entry_flags) {
            updater.set_entry_flags(flags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{LogicManagerBuilder, TermKind};
    use crate::progression::item::SingleItem;
    use crate::state::StateManagerBuilder;

    fn small_lm() -> Rc<LogicManager> {
        let sm = Rc::new(StateManagerBuilder::new().build().unwrap());
        let mut lmb = LogicManagerBuilder::new(sm);
        lmb.term("KEY", TermKind::Int).unwrap();
        lmb.term("WP", TermKind::State).unwrap();
        Rc::new(lmb.build())
    }

    #[test]
    fn test_incr_and_get() {
        let lm = small_lm();
        let key = lm.term("KEY").id();
        let mut pm = ProgressionManager::new(lm);
        assert_eq!(pm.get(key), 0);
        assert!(!pm.has(key));
        pm.incr(key, 2);
        assert_eq!(pm.get(key), 2);
        assert!(pm.has(key));
    }

    #[test]
    fn test_state_term_reads_by_union_presence() {
        let lm = small_lm();
        let wp = lm.term("WP").id();
        let mut pm = ProgressionManager::new(lm);
        assert_eq!(pm.get(wp), 0);
        pm.give_state(wp, StateUnion::empty());
        assert_eq!(pm.get(wp), 1);
        assert!(pm.get_state(wp).unwrap().is_empty());
    }

    #[test]
    fn test_add_applies_item_effects() {
        let lm = small_lm();
        let key = lm.term("KEY").id();
        let item = SingleItem::new("Key", key, 1);
        let mut pm = ProgressionManager::new(lm);
        pm.add(&item);
        assert!(pm.has(key));
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let lm = small_lm();
        let key = lm.term("KEY").id();
        let wp = lm.term("WP").id();
        let mut pm = ProgressionManager::new(lm);
        pm.incr(key, 3);
        pm.give_state(wp, StateUnion::empty());
        pm.reset();
        assert_eq!(pm.get(key), 0);
        assert_eq!(pm.get(wp), 0);
        assert!(pm.get_state(wp).is_none());
    }

    #[test]
    fn test_checkpoint_rewind() {
        let lm = small_lm();
        let key = lm.term("KEY").id();
        let mut pm = ProgressionManager::new(lm);
        pm.incr(key, 1);
        let snap = pm.checkpoint();
        pm.incr(key, 5);
        assert_eq!(pm.get(key), 6);
        pm.rewind(&snap);
        assert_eq!(pm.get(key), 1);
    }

    #[test]
    fn test_give_state_is_monotone() {
        let lm = small_lm();
        let wp = lm.term("WP").id();
        let mut pm = ProgressionManager::new(lm);
        pm.give_state(wp, StateUnion::empty());
        // Re-giving the empty union changes nothing.
        pm.give_state(wp, StateUnion::empty());
        assert!(pm.get_state(wp).unwrap().is_empty());
    }
}
