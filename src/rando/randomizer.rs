// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The staged randomizer: permute, forward-fill, rerandomize, validate.
//!
//! # Pipeline
//!
//! 1. **Permute.** Every group's items and locations get uniformly
//!    shuffled priorities from the seeded RNG; items load the proposal
//!    stacks sorted descending, locations sort ascending.
//! 2. **Forward passes.** Stages `0..n-1` are placed `Temporary`, each
//!    with all *later* stages' items granted up front (they will be
//!    obtainable eventually) and all *earlier* stages' placements
//!    honored through pre-placed watchers.
//! 3. **Permanent pass.** The last stage places with no look-ahead.
//! 4. **Rerandomization.** Stages `n-2..0` are redone `Permanent`, each
//!    constrained by every other stage's current placements.
//! 5. **Retry.** An out-of-locations failure anywhere resets everything
//!    and starts over from step 1 with the RNG stream continuing, so a
//!    run is a deterministic function of its seed. Retries continue
//!    until success or cooperative cancellation through the monitor.
//! 6. **Validate.** Replaying all placements into a fresh progression
//!    must reach every placed location.

use std::rc::Rc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::logic::dnf::DnfLogicDef;
use crate::logic::term::TermId;
use crate::logic::LogicManager;
use crate::progression::item::LogicItem;
use crate::progression::updater::MainUpdater;
use crate::progression::ProgressionManager;
use crate::rando::errors::RandoError;
use crate::rando::monitor::{RandoEvent, RandoMonitor};
use crate::rando::placement::{PlacedState, RandoPlacement};
use crate::rando::selector::GroupItemSelector;
use crate::rando::sphere::SphereBuilder;
use crate::rando::stage::RandomizationStage;

/// The fixed surroundings of a randomization: logic, start inventory,
/// waypoints and vanilla (unrandomized) placements.
pub struct RandoContext {
    pub lm: Rc<LogicManager>,
    /// Items granted at the start of every stage.
    pub start_items: Vec<Rc<dyn LogicItem>>,
    /// State-valued terms kept current by incremental re-evaluation.
    pub waypoints: Vec<(TermId, Rc<DnfLogicDef>)>,
    /// Fixed item-at-location pairs outside randomization.
    pub vanilla: Vec<(Rc<dyn LogicItem>, Rc<DnfLogicDef>)>,
}

impl RandoContext {
    pub fn new(lm: Rc<LogicManager>) -> Self {
        Self {
            lm,
            start_items: Vec::new(),
            waypoints: Vec::new(),
            vanilla: Vec::new(),
        }
    }
}

/// Placements of a full run: stage -> group -> placements.
pub type StagedPlacements = Vec<Vec<Vec<RandoPlacement>>>;

/// Orchestrates staged randomization with retry and validation.
pub struct Randomizer {
    ctx: RandoContext,
    stages: Vec<RandomizationStage>,
    rng: StdRng,
    monitor: Rc<RandoMonitor>,
    staged_placements: StagedPlacements,
}

impl Randomizer {
    pub fn new(ctx: RandoContext, stages: Vec<RandomizationStage>, seed: u64) -> Self {
        Self::with_monitor(ctx, stages, seed, Rc::new(RandoMonitor::new()))
    }

    pub fn with_monitor(
        ctx: RandoContext,
        stages: Vec<RandomizationStage>,
        seed: u64,
        monitor: Rc<RandoMonitor>,
    ) -> Self {
        assert!(!stages.is_empty(), "a randomizer needs at least one stage");
        let stage_count = stages.len();
        Self {
            ctx,
            stages,
            rng: StdRng::seed_from_u64(seed),
            monitor,
            staged_placements: vec![Vec::new(); stage_count],
        }
    }

    pub fn monitor(&self) -> &Rc<RandoMonitor> {
        &self.monitor
    }

    pub fn stages(&self) -> &[RandomizationStage] {
        &self.stages
    }

    /// Run to a validated result.
    ///
    /// Out-of-locations failures are recovered internally (monitor
    /// `Error` event, full reset, fresh permutation); validation failures
    /// and cancellation surface.
    pub fn run(&mut self) -> Result<StagedPlacements, RandoError> {
        loop {
            if self.monitor.is_cancelled() {
                return Err(RandoError::Cancelled);
            }
            self.monitor.send(RandoEvent::NewAttempt, "");
            match self.attempt() {
                Ok(()) => {
                    self.monitor.send(RandoEvent::Validating, "");
                    self.validate()?;
                    self.monitor.send(RandoEvent::Finished, "");
                    return Ok(self.staged_placements.clone());
                }
                Err(err @ RandoError::OutOfLocations(_)) => {
                    tracing::debug!(error = %err, "attempt failed, resetting");
                    self.monitor.send(RandoEvent::Error, &err.to_string());
                    self.reset();
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn attempt(&mut self) -> Result<(), RandoError> {
        self.permute_all();
        let n = self.stages.len();
        for i in 0..n - 1 {
            self.randomize_stage(i, PlacedState::Temporary, false)?;
        }
        self.randomize_stage(n - 1, PlacedState::Permanent, false)?;
        for i in (0..n - 1).rev() {
            self.randomize_stage(i, PlacedState::Permanent, true)?;
        }
        Ok(())
    }

    /// Uniform-permute priorities; items stack-load descending, locations
    /// sort ascending.
    fn permute_all(&mut self) {
        for stage in &mut self.stages {
            for group in stage.groups_mut() {
                let items = group.items_mut();
                items.shuffle(&mut self.rng);
                for (i, item) in items.iter().enumerate() {
                    item.set_priority(i as f32);
                }
                items.sort_by(|a, b| {
                    b.priority()
                        .partial_cmp(&a.priority())
                        .expect("priorities are never NaN")
                });

                let locations = group.locations_mut();
                locations.shuffle(&mut self.rng);
                for (i, location) in locations.iter().enumerate() {
                    location.set_priority(i as f32);
                }
                locations.sort_by(|a, b| {
                    a.priority()
                        .partial_cmp(&b.priority())
                        .expect("priorities are never NaN")
                });
            }
        }
    }

    fn randomize_stage(
        &mut self,
        index: usize,
        mode: PlacedState,
        rerandomize: bool,
    ) -> Result<(), RandoError> {
        tracing::debug!(
            stage = self.stages[index].label(),
            ?mode,
            rerandomize,
            "randomizing stage"
        );
        if rerandomize {
            for group in self.stages[index].groups() {
                group.reset_state();
            }
        }

        let mut pm = ProgressionManager::new(self.ctx.lm.clone());
        for item in &self.ctx.start_items {
            item.add_to(&mut pm);
        }

        // Look-ahead: later stages' items are assumed obtainable.
        if !rerandomize {
            for stage in &self.stages[index + 1..] {
                for group in stage.groups() {
                    for item in group.items() {
                        item.item().add_to(&mut pm);
                    }
                }
            }
        }

        let mut updater = MainUpdater::new();
        for (term, logic) in &self.ctx.waypoints {
            updater.add_state_waypoint(*term, logic.clone());
        }
        for (item, logic) in &self.ctx.vanilla {
            updater.add_preplaced(item.clone(), logic.clone());
        }
        // Other stages constrain through their current placements.
        for (j, stage_placements) in self.staged_placements.iter().enumerate() {
            let constrains = if rerandomize { j != index } else { j < index };
            if !constrains {
                continue;
            }
            for group_placements in stage_placements {
                for placement in group_placements {
                    updater.add_preplaced(
                        placement.item.item().clone(),
                        placement.location.logic().clone(),
                    );
                }
            }
        }
        pm.hook(updater);

        let stage = &self.stages[index];
        let mut selectors = Vec::with_capacity(stage.groups().len());
        let mut pending = Vec::with_capacity(stage.groups().len());
        for group in stage.groups() {
            let locations: Vec<_> = group
                .locations()
                .iter()
                .filter(|l| l.reachable() == PlacedState::None)
                .cloned()
                .collect();
            let cap = if group.is_coupled() {
                locations.len() as i32
            } else {
                group.items().len() as i32
            };
            selectors.push(GroupItemSelector::new(
                group.label(),
                group.items().to_vec(),
                group.is_coupled(),
                cap,
            ));
            pending.push(locations);
        }

        let outcome = SphereBuilder::new(&mut pm, selectors, pending, mode).advance_all()?;
        let mut placements = stage.place_items(&outcome.spheres, mode)?;

        // Discarded couples land on their own dual.
        for (g, discarded) in outcome.discarded.into_iter().enumerate() {
            for item in discarded {
                if let Some(dual) = item.dual() {
                    item.set_placed(mode);
                    placements[g].push(RandoPlacement {
                        item,
                        location: dual,
                    });
                }
            }
        }

        self.staged_placements[index] = placements;
        Ok(())
    }

    /// Clear staged placements and group flags for a fresh attempt. The
    /// RNG stream continues, so retries stay a deterministic function of
    /// the original seed.
    fn reset(&mut self) {
        for placements in &mut self.staged_placements {
            placements.clear();
        }
        for stage in &self.stages {
            for group in stage.groups() {
                group.reset_state();
            }
        }
    }

    /// Post-run invariants: placement counts match item counts, and
    /// replaying every placement into a fresh progression reaches every
    /// placed location.
    fn validate(&self) -> Result<(), RandoError> {
        let mut failures = Vec::new();

        for (stage, stage_placements) in self.stages.iter().zip(&self.staged_placements) {
            if stage.groups().len() != stage_placements.len() {
                failures.push(format!(
                    "stage {} produced {} group lists for {} groups",
                    stage.label(),
                    stage_placements.len(),
                    stage.groups().len()
                ));
                continue;
            }
            for (group, group_placements) in stage.groups().iter().zip(stage_placements) {
                if group.items().len() != group_placements.len() {
                    failures.push(format!(
                        "group {} placed {} of {} items",
                        group.label(),
                        group_placements.len(),
                        group.items().len()
                    ));
                }
            }
        }

        let mut pm = ProgressionManager::new(self.ctx.lm.clone());
        for item in &self.ctx.start_items {
            item.add_to(&mut pm);
        }
        let mut updater = MainUpdater::new();
        for (term, logic) in &self.ctx.waypoints {
            updater.add_state_waypoint(*term, logic.clone());
        }
        for (item, logic) in &self.ctx.vanilla {
            updater.add_preplaced(item.clone(), logic.clone());
        }
        for stage_placements in &self.staged_placements {
            for group_placements in stage_placements {
                for placement in group_placements {
                    updater.add_preplaced(
                        placement.item.item().clone(),
                        placement.location.logic().clone(),
                    );
                }
            }
        }
        pm.hook(updater);

        for stage_placements in &self.staged_placements {
            for group_placements in stage_placements {
                for placement in group_placements {
                    if !placement.location.logic().can_get(&pm) {
                        failures.push(format!("{} is unreachable", placement));
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RandoError::Validation { failures })
        }
    }
}
