// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Randomization stages and placement strategies.
//!
//! A stage is a set of groups randomized together; the stage's strategy
//! turns the sphere sequence into concrete placements. The strategy seam
//! is a trait so games can bias placement (favor late locations, weight
//! by depth, ...) without touching the reachability machinery.

use std::rc::Rc;

use crate::rando::errors::RandoError;
use crate::rando::placement::{PlacedState, RandoLocation, RandomizationGroup, RandoPlacement};
use crate::rando::sphere::Sphere;

/// A named batch of groups randomized together.
#[derive(Debug)]
pub struct RandomizationStage {
    label: String,
    groups: Vec<RandomizationGroup>,
    strategy: Box<dyn PlacementStrategy>,
}

impl RandomizationStage {
    pub fn new(
        label: &str,
        groups: Vec<RandomizationGroup>,
        strategy: Box<dyn PlacementStrategy>,
    ) -> Self {
        Self {
            label: label.to_string(),
            groups,
            strategy,
        }
    }

    /// A stage using the default placement strategy.
    pub fn with_default_strategy(label: &str, groups: Vec<RandomizationGroup>) -> Self {
        Self::new(label, groups, Box::new(DefaultPlacementStrategy))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn groups(&self) -> &[RandomizationGroup] {
        &self.groups
    }

    pub(crate) fn groups_mut(&mut self) -> &mut [RandomizationGroup] {
        &mut self.groups
    }

    pub(crate) fn place_items(
        &self,
        spheres: &[Sphere],
        state: PlacedState,
    ) -> Result<Vec<Vec<RandoPlacement>>, RandoError> {
        self.strategy.place_items(self, spheres, state)
    }
}

/// Turns spheres into placements, one list per group in declaration
/// order.
pub trait PlacementStrategy: std::fmt::Debug {
    fn place_items(
        &self,
        stage: &RandomizationStage,
        spheres: &[Sphere],
        state: PlacedState,
    ) -> Result<Vec<Vec<RandoPlacement>>, RandoError>;
}

/// Default strategy: each sphere's items land in locations unlocked by
/// *earlier* spheres, lowest priority first.
///
/// The strict ordering is what makes placements provably valid: an item
/// of sphere k sits somewhere reachable using only items of spheres
/// before k, so replaying placements in sphere order reaches everything.
/// Exhausting the pool of earlier locations is the out-of-locations
/// failure the randomizer retries on.
#[derive(Debug, Default)]
pub struct DefaultPlacementStrategy;

impl PlacementStrategy for DefaultPlacementStrategy {
    fn place_items(
        &self,
        stage: &RandomizationStage,
        spheres: &[Sphere],
        state: PlacedState,
    ) -> Result<Vec<Vec<RandoPlacement>>, RandoError> {
        let group_count = stage.groups().len();
        let mut placements: Vec<Vec<RandoPlacement>> = vec![Vec::new(); group_count];
        let mut pools: Vec<Vec<Rc<RandoLocation>>> = vec![Vec::new(); group_count];

        for sphere in spheres {
            for (g, contents) in sphere.groups.iter().enumerate() {
                for item in &contents.items {
                    let location = take_lowest(&mut pools[g]).ok_or_else(|| {
                        RandoError::OutOfLocations(format!(
                            "group {} exhausted its unlocked locations placing {}",
                            stage.groups()[g].label(),
                            item.name()
                        ))
                    })?;
                    item.set_placed(state);
                    placements[g].push(RandoPlacement {
                        item: item.clone(),
                        location,
                    });
                }
                pools[g].extend(contents.locations.iter().cloned());
            }
        }
        Ok(placements)
    }
}

/// Remove and return the lowest-priority location.
fn take_lowest(pool: &mut Vec<Rc<RandoLocation>>) -> Option<Rc<RandoLocation>> {
    let idx = pool
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.priority()
                .partial_cmp(&b.priority())
                .expect("priorities are never NaN")
        })
        .map(|(i, _)| i)?;
    Some(pool.swap_remove(idx))
}
