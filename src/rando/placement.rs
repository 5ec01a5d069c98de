// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Randomizable items, locations, placements and groups.
//!
//! [`RandoItem`] and [`RandoLocation`] wrap the logic-layer contracts
//! with the mutable bookkeeping the engine needs: a shuffled priority and
//! a tri-state placement/reachability flag. Both are shared via `Rc`
//! (the same location object appears in its group, in spheres, and in
//! placements), so the mutable bits live in `Cell`s; the engine is
//! single-threaded throughout.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::logic::dnf::DnfLogicDef;
use crate::progression::item::LogicItem;

/// The canonical tri-state for items (placed) and locations (reachable).
///
/// `Temporary` marks look-ahead results from forward passes that a later
/// rerandomization will overwrite; `Permanent` marks settled results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PlacedState {
    #[default]
    None,
    Temporary,
    Permanent,
}

/// An item under randomization.
#[derive(Debug)]
pub struct RandoItem {
    item: Rc<dyn LogicItem>,
    priority: Cell<f32>,
    placed: Cell<PlacedState>,
    /// For coupled groups: the location this item is the flip side of.
    dual: RefCell<Option<Weak<RandoLocation>>>,
}

impl RandoItem {
    pub fn new(item: Rc<dyn LogicItem>) -> Rc<Self> {
        Rc::new(Self {
            item,
            priority: Cell::new(0.0),
            placed: Cell::new(PlacedState::None),
            dual: RefCell::new(None),
        })
    }

    pub fn name(&self) -> &str {
        self.item.name()
    }

    pub fn item(&self) -> &Rc<dyn LogicItem> {
        &self.item
    }

    pub fn priority(&self) -> f32 {
        self.priority.get()
    }

    pub fn set_priority(&self, priority: f32) {
        self.priority.set(priority);
    }

    pub fn placed(&self) -> PlacedState {
        self.placed.get()
    }

    pub fn set_placed(&self, state: PlacedState) {
        self.placed.set(state);
    }

    /// The dual location, for members of coupled groups.
    pub fn dual(&self) -> Option<Rc<RandoLocation>> {
        self.dual.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_dual(&self, location: &Rc<RandoLocation>) {
        *self.dual.borrow_mut() = Some(Rc::downgrade(location));
    }
}

impl fmt::Display for RandoItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A location under randomization.
#[derive(Debug)]
pub struct RandoLocation {
    name: String,
    logic: Rc<DnfLogicDef>,
    priority: Cell<f32>,
    reachable: Cell<PlacedState>,
}

impl RandoLocation {
    pub fn new(name: &str, logic: Rc<DnfLogicDef>) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            logic,
            priority: Cell::new(0.0),
            reachable: Cell::new(PlacedState::None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logic(&self) -> &Rc<DnfLogicDef> {
        &self.logic
    }

    pub fn priority(&self) -> f32 {
        self.priority.get()
    }

    pub fn set_priority(&self, priority: f32) {
        self.priority.set(priority);
    }

    pub fn reachable(&self) -> PlacedState {
        self.reachable.get()
    }

    pub fn set_reachable(&self, state: PlacedState) {
        self.reachable.set(state);
    }
}

impl fmt::Display for RandoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One item assigned to one location.
#[derive(Debug, Clone)]
pub struct RandoPlacement {
    pub item: Rc<RandoItem>,
    pub location: Rc<RandoLocation>,
}

impl fmt::Display for RandoPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.item.name(), self.location.name())
    }
}

/// A labeled pool of items and the locations they may land in.
#[derive(Debug)]
pub struct RandomizationGroup {
    label: String,
    items: Vec<Rc<RandoItem>>,
    locations: Vec<Rc<RandoLocation>>,
    coupled: bool,
}

impl RandomizationGroup {
    pub fn new(
        label: &str,
        items: Vec<Rc<RandoItem>>,
        locations: Vec<Rc<RandoLocation>>,
    ) -> Self {
        Self {
            label: label.to_string(),
            items,
            locations,
            coupled: false,
        }
    }

    /// A coupled group: every member is simultaneously an item and a
    /// location. Each pair is wired together so the selector can retire
    /// items whose location side has already been reached.
    pub fn coupled(label: &str, couples: Vec<(Rc<RandoItem>, Rc<RandoLocation>)>) -> Self {
        let mut items = Vec::with_capacity(couples.len());
        let mut locations = Vec::with_capacity(couples.len());
        for (item, location) in couples {
            item.set_dual(&location);
            items.push(item);
            locations.push(location);
        }
        Self {
            label: label.to_string(),
            items,
            locations,
            coupled: true,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn items(&self) -> &[Rc<RandoItem>] {
        &self.items
    }

    pub fn locations(&self) -> &[Rc<RandoLocation>] {
        &self.locations
    }

    pub fn is_coupled(&self) -> bool {
        self.coupled
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<Rc<RandoItem>> {
        &mut self.items
    }

    pub(crate) fn locations_mut(&mut self) -> &mut Vec<Rc<RandoLocation>> {
        &mut self.locations
    }

    /// Clear placement and reachability flags for a fresh pass.
    pub(crate) fn reset_state(&self) {
        for item in &self.items {
            item.set_placed(PlacedState::None);
        }
        for location in &self.locations {
            location.set_reachable(PlacedState::None);
        }
    }
}
