// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The main updater: event-driven propagation to a fixed point.
//!
//! Each [`UpdateEntry`] watches the terms its logic depends on and fires
//! when one of them changes. Firing may mutate the progression manager
//! (granting a pre-placed item, improving a waypoint's state union),
//! which enqueues further terms; the drain loop keeps going until the
//! queue is empty. Every write is monotone (term values only grow,
//! unions only improve), so the drain reaches a fixed point in
//! finitely many steps.
//!
//! Firing order within a drain is an implementation detail (registration
//! order among the watchers of one term, queue order among terms); no
//! entry may depend on it.

use std::collections::HashMap;
use std::rc::Rc;

use crate::logic::dnf::DnfLogicDef;
use crate::logic::term::TermId;
use crate::progression::item::LogicItem;
use crate::progression::manager::ProgressionManager;
use crate::state::State;

/// A watcher registered with the [`MainUpdater`].
#[derive(Debug)]
pub enum UpdateEntry {
    /// Grants `item` once `logic` (the location's availability) holds.
    PrePlacedItem {
        item: Rc<dyn LogicItem>,
        logic: Rc<DnfLogicDef>,
        obtained: bool,
    },
    /// Keeps a state-valued term (waypoint, transition) up to date by
    /// incremental re-evaluation of its logic.
    StateUpdate {
        term: TermId,
        logic: Rc<DnfLogicDef>,
    },
}

impl UpdateEntry {
    fn logic(&self) -> &Rc<DnfLogicDef> {
        match self {
            UpdateEntry::PrePlacedItem { logic, .. } => logic,
            UpdateEntry::StateUpdate { logic, .. } => logic,
        }
    }
}

/// Event-driven propagator over a [`ProgressionManager`].
#[derive(Debug, Default)]
pub struct MainUpdater {
    entries: Vec<UpdateEntry>,
    /// Raw term id -> indices of entries watching it. Rebuilt on sweep.
    watchers: HashMap<i32, Vec<usize>>,
    hooked: bool,
    /// Statistics: entry invocations.
    fires: u64,
    /// Statistics: term changes drained.
    epochs: u64,
    scratch: Vec<State>,
}

impl MainUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry.
    ///
    /// # Panics
    ///
    /// Panics if the updater has already been hooked; the watcher index
    /// is built at hook time and entries must all exist by then.
    pub fn add_entry(&mut self, entry: UpdateEntry) {
        assert!(!self.hooked, "add_entry after hook");
        self.entries.push(entry);
    }

    /// Register a pre-placed item: granted when its location is reachable.
    pub fn add_preplaced(&mut self, item: Rc<dyn LogicItem>, logic: Rc<DnfLogicDef>) {
        self.add_entry(UpdateEntry::PrePlacedItem {
            item,
            logic,
            obtained: false,
        });
    }

    /// Register a waypoint/transition state watcher.
    pub fn add_state_waypoint(&mut self, term: TermId, logic: Rc<DnfLogicDef>) {
        self.add_entry(UpdateEntry::StateUpdate { term, logic });
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// (entry invocations, term changes drained) since construction.
    pub fn statistics(&self) -> (u64, u64) {
        (self.fires, self.epochs)
    }

    /// Names of pre-placed items not yet granted. Empty at a run's end
    /// means every placement was reached.
    pub fn unobtained(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                UpdateEntry::PrePlacedItem {
                    item,
                    obtained: false,
                    ..
                } => Some(item.name().to_string()),
                _ => None,
            })
            .collect()
    }

    /// Full sweep: rebuild the watcher index and fire every entry once.
    /// Subsequent changes drain incrementally.
    pub(crate) fn sweep(&mut self, pm: &mut ProgressionManager) {
        self.watchers.clear();
        for (idx, entry) in self.entries.iter().enumerate() {
            for term in entry.logic().terms(pm.lm()) {
                self.watchers.entry(term.raw()).or_default().push(idx);
            }
        }
        self.hooked = true;
        for idx in 0..self.entries.len() {
            self.fire(idx, pm, None);
        }
    }

    /// Drain the progression queue to a fixed point.
    pub(crate) fn drain(&mut self, pm: &mut ProgressionManager) {
        while let Some(term) = pm.pop_change() {
            self.epochs += 1;
            let Some(indices) = self.watchers.get(&term.raw()).cloned() else {
                continue;
            };
            for idx in indices {
                self.fire(idx, pm, Some(term));
            }
        }
        tracing::trace!(
            fires = self.fires,
            epochs = self.epochs,
            "updater quiescent"
        );
    }

    fn fire(&mut self, idx: usize, pm: &mut ProgressionManager, modified: Option<TermId>) {
        self.fires += 1;
        let mut scratch = std::mem::take(&mut self.scratch);
        match &mut self.entries[idx] {
            UpdateEntry::PrePlacedItem {
                item,
                logic,
                obtained,
            } => {
                if !*obtained && logic.can_get(pm) {
                    *obtained = true;
                    tracing::trace!(item = item.name(), "pre-placed item reached");
                    item.add_to(pm);
                }
            }
            UpdateEntry::StateUpdate { term, logic } => {
                let term = *term;
                let current = pm.get_state(term).cloned();
                let result =
                    logic.check_for_updated_state(pm, current.as_ref(), &mut scratch, modified);
                if let Some(union) = result {
                    pm.give_state(term, union);
                }
            }
        }
        self.scratch = scratch;
    }

    /// Forget all obtained flags (stage reset). The next sweep starts
    /// from scratch.
    pub(crate) fn reset_entries(&mut self) {
        for entry in &mut self.entries {
            if let UpdateEntry::PrePlacedItem { obtained, .. } = entry {
                *obtained = false;
            }
        }
    }

    pub(crate) fn entry_flags(&self) -> Vec<bool> {
        self.entries
            .iter()
            .map(|e| matches!(e, UpdateEntry::PrePlacedItem { obtained: true, .. }))
            .collect()
    }

    pub(crate) fn set_entry_flags(&mut self, flags: &[bool]) {
        for (entry, &flag) in self.entries.iter_mut().zip(flags) {
            if let UpdateEntry::PrePlacedItem { obtained, .. } = entry {
                *obtained = flag;
            }
        }
    }
}
