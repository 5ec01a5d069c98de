// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Logic-driven progression randomizer core.
//!
//! Given a declarative description of items, locations, waypoints and
//! transitions together with boolean-logic availability formulae, this
//! crate produces a randomized assignment of items to locations such that
//! every placement remains reachable from the start state under the
//! logic.
//!
//! # Architecture
//!
//! Two subsystems, built bottom-up:
//!
//! ## The logic evaluator
//!
//! - [`state`]: field schema ([`StateManager`]), packed immutable
//!   [`State`] vectors, dominance antichains ([`StateUnion`]) and the
//!   copy-on-write [`LazyStateBuilder`].
//! - [`logic`]: terms, polymorphic variables, and compiled
//!   [`DnfLogicDef`] formulae over a mixed-form integer bytecode, with
//!   full and incremental state evaluation.
//!
//! ## The progression / randomization engine
//!
//! - [`progression`]: the mutable [`ProgressionManager`] and the
//!   event-driven [`MainUpdater`] that drives it to a monotone fixed
//!   point.
//! - [`rando`]: sphere-by-sphere reachability expansion
//!   ([`SphereBuilder`]), per-group item proposal
//!   ([`GroupItemSelector`]), and the staged [`Randomizer`] with retry
//!   and validation.
//!
//! # Execution model
//!
//! Everything is single-threaded and synchronous. The frozen registries
//! ([`StateManager`], [`LogicManager`], compiled defs) may be shared
//! across runs; each run owns its progression manager, updater,
//! randomizer and RNG. Given identical inputs and seed, the output
//! placements are identical.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use rando_engine::logic::{ClauseBlueprint, ClauseElement, LogicManagerBuilder, TermKind};
//! use rando_engine::progression::{ProgressionManager, SingleItem};
//! use rando_engine::state::StateManagerBuilder;
//!
//! let sm = Rc::new(StateManagerBuilder::new().build().unwrap());
//! let mut lmb = LogicManagerBuilder::new(sm);
//! let key = lmb.term("KEY", TermKind::Int).unwrap();
//! lmb.define_logic(
//!     "DOOR",
//!     vec![ClauseBlueprint {
//!         logic: vec![ClauseElement::Term("KEY".into())],
//!         ..Default::default()
//!     }],
//! )
//! .unwrap();
//! let lm = Rc::new(lmb.build());
//!
//! let door = lm.logic_def("DOOR").clone();
//! let mut pm = ProgressionManager::new(lm);
//! assert!(!door.can_get(&pm));
//! pm.add(&SingleItem::new("Key", key, 1));
//! assert!(door.can_get(&pm));
//! ```

pub mod logic;
pub mod progression;
pub mod rando;
pub mod state;

// Re-export the primary API surface at the crate root.
pub use logic::{DnfLogicDef, LogicError, LogicManager, LogicManagerBuilder, Term, TermId, TermKind};
pub use progression::{LogicItem, MainUpdater, ProgressionManager};
pub use rando::{
    GroupItemSelector, PlacedState, RandoContext, RandoError, RandoMonitor, Randomizer,
    RandomizationGroup, RandomizationStage, SphereBuilder,
};
pub use state::{LazyStateBuilder, State, StateManager, StateManagerBuilder, StateUnion};
